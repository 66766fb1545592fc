//! Anti-targeting — keeps creatives away from users who recently visited
//! sites the advertiser asked to avoid (competitors, brand-safety lists).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use adserve_core::{BrowsingHistoryEntry, Collaborator, CreativeAd, Segment, SelectionError, SelectionResult};
use dashmap::DashMap;
use tracing::{debug, info, warn};
use url::Url;

/// Creative set id or ad segment → sites that must not have been visited.
pub type AntiTargetingSets = HashMap<Segment, HashSet<Segment>>;

pub trait AntiTargetingResource: Send + Sync {
    fn get_segments(&self) -> SelectionResult<AntiTargetingSets>;
}

/// Anti-targeting resource held in memory. Reports itself unavailable until
/// the first [`InMemoryAntiTargeting::load`].
pub struct InMemoryAntiTargeting {
    sets: DashMap<Segment, HashSet<Segment>>,
    loaded: AtomicBool,
}

impl InMemoryAntiTargeting {
    pub fn new() -> Self {
        Self {
            sets: DashMap::new(),
            loaded: AtomicBool::new(false),
        }
    }

    /// Replace the resource contents. Sites may be given as URLs or hosts.
    pub fn load(&self, sets: HashMap<String, Vec<String>>) {
        self.sets.clear();
        for (key, sites) in sets {
            let sites: HashSet<Segment> = sites.iter().filter_map(|s| site_key(s)).collect();
            self.sets.insert(Segment::new(key), sites);
        }
        self.loaded.store(true, Ordering::Release);
        info!(keys = self.sets.len(), "anti-targeting resource loaded");
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }
}

impl Default for InMemoryAntiTargeting {
    fn default() -> Self {
        Self::new()
    }
}

impl AntiTargetingResource for InMemoryAntiTargeting {
    fn get_segments(&self) -> SelectionResult<AntiTargetingSets> {
        if !self.is_loaded() {
            return Err(SelectionError::unavailable(
                Collaborator::AntiTargeting,
                "resource not loaded",
            ));
        }
        Ok(self
            .sets
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }
}

/// Normalize a URL or bare host to a comparable site key.
pub fn site_key(site: &str) -> Option<Segment> {
    let site = site.trim();
    if site.is_empty() {
        return None;
    }
    let parsed = Url::parse(site)
        .ok()
        .filter(|u| u.host_str().is_some())
        .or_else(|| Url::parse(&format!("https://{site}")).ok())?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    Some(Segment::new(host))
}

/// Anti-targeting snapshot for one selection call.
pub struct AntiTargetingFilter {
    sets: Option<AntiTargetingSets>,
    visited: HashSet<Segment>,
}

impl AntiTargetingFilter {
    /// Collaborator failure makes the filter pass everything through.
    pub fn snapshot(resource: &dyn AntiTargetingResource, history: &[BrowsingHistoryEntry]) -> Self {
        let sets = match resource.get_segments() {
            Ok(sets) => Some(sets),
            Err(e) => {
                warn!(error = %e, "anti-targeting unavailable, skipping filter");
                metrics::counter!(
                    "eligible_ads.collaborator_failures",
                    "collaborator" => "anti_targeting"
                )
                .increment(1);
                None
            }
        };
        let visited = history.iter().filter_map(|h| site_key(&h.url)).collect();
        Self { sets, visited }
    }

    pub fn is_active(&self) -> bool {
        self.sets.is_some()
    }

    pub fn excludes(&self, ad: &CreativeAd) -> bool {
        let Some(sets) = &self.sets else {
            return false;
        };
        if self.visited.is_empty() {
            return false;
        }

        let creative_set = Segment::new(ad.creative_set_id.as_str());
        std::iter::once(&creative_set)
            .chain(ad.segments.iter())
            .filter_map(|key| sets.get(key))
            .any(|sites| sites.iter().any(|site| self.visited.contains(site)))
    }

    pub fn apply(&self, ads: Vec<CreativeAd>) -> Vec<CreativeAd> {
        ads.into_iter()
            .filter(|ad| {
                let excluded = self.excludes(ad);
                if excluded {
                    debug!(
                        creative_instance_id = %ad.creative_instance_id,
                        "excluded by anti-targeting"
                    );
                }
                !excluded
            })
            .collect()
    }
}
