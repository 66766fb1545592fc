use serde::Deserialize;

/// Selection engine configuration. Loaded from environment variables with
/// the prefix `AD_SELECTION__` and an optional config file.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectionConfig {
    #[serde(default)]
    pub fallback_policy: FallbackPolicy,
    #[serde(default = "default_exclude_last_served")]
    pub exclude_last_served: bool,
    #[serde(default = "default_exclude_converted_creative_sets")]
    pub exclude_converted_creative_sets: bool,
    #[serde(default)]
    pub predictor: PredictorConfig,
}

/// When the resolver moves on to the next targeting tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// A tier whose segment/dimension/geo-matched pool is non-empty is final,
    /// even when capping or anti-targeting removes every candidate.
    #[default]
    SegmentMatch,
    /// Fall through whenever the fully filtered pool of a tier is empty.
    PostFilter,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictorConfig {
    #[serde(default)]
    pub weights: PredictorWeights,
    /// Fixed RNG seed for reproducible choices.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictorWeights {
    #[serde(default = "default_intent_child")]
    pub intent_child: f64,
    #[serde(default = "default_intent_parent")]
    pub intent_parent: f64,
    #[serde(default = "default_interest_child")]
    pub interest_child: f64,
    #[serde(default = "default_interest_parent")]
    pub interest_parent: f64,
    #[serde(default = "default_untargeted")]
    pub untargeted: f64,
}

// Default functions
fn default_exclude_last_served() -> bool {
    true
}
fn default_exclude_converted_creative_sets() -> bool {
    true
}
fn default_intent_child() -> f64 {
    1.0
}
fn default_intent_parent() -> f64 {
    1.0
}
fn default_interest_child() -> f64 {
    1.0
}
fn default_interest_parent() -> f64 {
    1.0
}
fn default_untargeted() -> f64 {
    0.0001
}

impl Default for PredictorWeights {
    fn default() -> Self {
        Self {
            intent_child: default_intent_child(),
            intent_parent: default_intent_parent(),
            interest_child: default_interest_child(),
            interest_parent: default_interest_parent(),
            untargeted: default_untargeted(),
        }
    }
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            weights: PredictorWeights::default(),
            seed: None,
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            fallback_policy: FallbackPolicy::default(),
            exclude_last_served: default_exclude_last_served(),
            exclude_converted_creative_sets: default_exclude_converted_creative_sets(),
            predictor: PredictorConfig::default(),
        }
    }
}

impl SelectionConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from an optional file, overridden by environment
    /// variables.
    pub fn load_from(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("AD_SELECTION")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
