//! Eligible ad selection — resolves a targeting tier, filters the candidate
//! pool through dedup, exclusion rules, anti-targeting and last-served
//! suppression, and optionally chooses a single ad to serve.

pub mod eligible_ads;
pub mod filters;
pub mod predictor;
pub mod sources;

pub use eligible_ads::{Collaborators, EligibleAds, Selection};
pub use predictor::AdPredictor;
pub use sources::{
    AdCatalog, AdEventSource, BrowsingHistorySource, InMemoryAdEvents, InMemoryBrowsingHistory,
    InMemoryCatalog,
};
