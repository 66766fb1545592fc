pub mod config;
pub mod error;
pub mod segment;
pub mod types;

pub use config::{FallbackPolicy, PredictorConfig, PredictorWeights, SelectionConfig};
pub use error::{Collaborator, SelectionError, SelectionResult};
pub use segment::{Segment, SegmentList};
pub use types::{
    AdEvent, BrowsingHistoryEntry, CapScope, CapWindow, ConfirmationType, CreativeAd, Daypart,
    FrequencyCap, UserModel,
};
