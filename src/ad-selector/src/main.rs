//! Ad Selector — runs the eligible ad pipeline against JSON fixtures and
//! prints the eligible ads, or the chosen ad, as JSON.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use adserve_core::{
    AdEvent, BrowsingHistoryEntry, CreativeAd, FallbackPolicy, Segment, SelectionConfig, UserModel,
};
use adserve_eligible_ads::{
    Collaborators, EligibleAds, InMemoryAdEvents, InMemoryBrowsingHistory, InMemoryCatalog,
};
use adserve_targeting::{
    AllowAllSubdivisions, InMemoryAntiTargeting, StaticSubdivision, SubdivisionTargeting,
};
use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "ad-selector")]
#[command(about = "Select eligible ads for a placement from JSON fixtures")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Creative ad inventory (JSON array)
    #[arg(long, global = true, env = "AD_SELECTOR__INVENTORY", default_value = "inventory.json")]
    inventory: String,

    /// Ad event history (JSON array)
    #[arg(long, global = true)]
    ad_events: Option<String>,

    /// Browsing history (JSON array of {url, visited_at})
    #[arg(long, global = true)]
    history: Option<String>,

    /// Anti-targeting resource (JSON object: key -> [sites])
    #[arg(long, global = true)]
    anti_targeting: Option<String>,

    /// Interest segments, comma separated
    #[arg(long, global = true, value_delimiter = ',')]
    interest: Vec<String>,

    /// Purchase intent segments, comma separated
    #[arg(long, global = true, value_delimiter = ',')]
    intent: Vec<String>,

    /// Placement dimensions
    #[arg(long, global = true, default_value = "200x100")]
    dimensions: String,

    /// User subdivision code, e.g. US-CA (geo-targeting disabled if omitted)
    #[arg(long, global = true, env = "AD_SELECTOR__SUBDIVISION")]
    subdivision: Option<String>,

    /// Countries where subdivision targeting is supported, comma separated
    #[arg(long, global = true, value_delimiter = ',', default_value = "US,CA")]
    supported_regions: Vec<String>,

    /// Config file (overridden by AD_SELECTION__* environment variables)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Tier fallback policy (overrides config)
    #[arg(long, global = true, value_enum)]
    fallback_policy: Option<FallbackArg>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every eligible ad
    Eligible,
    /// Choose a single ad to serve
    Choose,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FallbackArg {
    SegmentMatch,
    PostFilter,
}

impl From<FallbackArg> for FallbackPolicy {
    fn from(arg: FallbackArg) -> Self {
        match arg {
            FallbackArg::SegmentMatch => FallbackPolicy::SegmentMatch,
            FallbackArg::PostFilter => FallbackPolicy::PostFilter,
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let file = File::open(Path::new(path)).with_context(|| format!("failed to open {path}"))?;
    serde_json::from_reader(BufReader::new(file)).with_context(|| format!("failed to parse {path}"))
}

fn read_optional<T: DeserializeOwned + Default>(path: Option<&str>) -> anyhow::Result<T> {
    match path {
        Some(path) => read_json(path),
        None => Ok(T::default()),
    }
}

fn segments(values: &[String]) -> Vec<Segment> {
    values
        .iter()
        .filter(|v| !v.trim().is_empty())
        .map(|v| Segment::new(v.as_str()))
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ad_selector=info,adserve_eligible_ads=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = SelectionConfig::load_from(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        SelectionConfig::default()
    });
    if let Some(policy) = cli.fallback_policy {
        config.fallback_policy = policy.into();
    }

    let inventory: Vec<CreativeAd> = read_json(&cli.inventory)?;
    let ad_events: Vec<AdEvent> = read_optional(cli.ad_events.as_deref())?;
    let history: Vec<BrowsingHistoryEntry> = read_optional(cli.history.as_deref())?;

    let anti_targeting = InMemoryAntiTargeting::new();
    if let Some(path) = cli.anti_targeting.as_deref() {
        let sets: HashMap<String, Vec<String>> = read_json(path)?;
        anti_targeting.load(sets);
    }

    let subdivision_targeting: Arc<dyn SubdivisionTargeting> = match cli.subdivision.as_deref() {
        Some(code) => {
            let regions: Vec<&str> = cli.supported_regions.iter().map(String::as_str).collect();
            Arc::new(StaticSubdivision::new(Some(code), &regions))
        }
        None => Arc::new(AllowAllSubdivisions),
    };

    info!(
        inventory = inventory.len(),
        ad_events = ad_events.len(),
        history = history.len(),
        fallback_policy = ?config.fallback_policy,
        "Configuration loaded"
    );

    let engine = Arc::new(EligibleAds::new(
        config,
        Collaborators {
            catalog: Arc::new(InMemoryCatalog::new(inventory)),
            ad_events: Arc::new(InMemoryAdEvents::new(ad_events)),
            browsing_history: Arc::new(InMemoryBrowsingHistory::new(history)),
            subdivision_targeting,
            anti_targeting: Arc::new(anti_targeting),
        },
    ));

    let interest = segments(&cli.interest);
    let intent = segments(&cli.intent);

    let output = match cli.command {
        Command::Eligible => {
            let user_model = UserModel {
                interest_segments: interest,
                purchase_intent_segments: intent,
                ..UserModel::default()
            };
            let selection = engine.get_async(user_model, cli.dimensions).await?;
            serde_json::json!({
                "tier": selection.tier.map(|t| t.as_str()),
                "ads": selection.ads,
            })
        }
        Command::Choose => {
            let chosen = engine
                .get_for_features_async(interest, intent, cli.dimensions)
                .await?;
            serde_json::json!({ "ad": chosen })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
