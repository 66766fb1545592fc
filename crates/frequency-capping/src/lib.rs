//! Frequency capping and exclusion rules — decides whether a creative may
//! still be shown given the user's ad event history.

pub mod evaluator;
pub mod exclusion_rules;

pub use evaluator::{AdEventIndex, CapDecision, FrequencyCapEvaluator};
pub use exclusion_rules::{
    ConversionRule, DaypartRule, ExclusionRule, ExclusionRules, FlightWindowRule, FrequencyCapRule,
};
