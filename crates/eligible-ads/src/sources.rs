//! Materialized inputs to selection: the creative catalog, ad event history
//! and browsing history. Each call takes one snapshot from each source.

use adserve_core::{AdEvent, BrowsingHistoryEntry, CreativeAd, SelectionResult};
use parking_lot::RwLock;

pub trait AdCatalog: Send + Sync {
    fn creative_ads(&self) -> SelectionResult<Vec<CreativeAd>>;
}

pub trait AdEventSource: Send + Sync {
    fn ad_events(&self) -> SelectionResult<Vec<AdEvent>>;
}

pub trait BrowsingHistorySource: Send + Sync {
    fn browsing_history(&self) -> SelectionResult<Vec<BrowsingHistoryEntry>>;
}

#[derive(Default)]
pub struct InMemoryCatalog {
    ads: RwLock<Vec<CreativeAd>>,
}

impl InMemoryCatalog {
    pub fn new(ads: Vec<CreativeAd>) -> Self {
        Self {
            ads: RwLock::new(ads),
        }
    }

    /// Swap in a new catalog; calls already running keep their snapshot.
    pub fn replace(&self, ads: Vec<CreativeAd>) {
        *self.ads.write() = ads;
    }
}

impl AdCatalog for InMemoryCatalog {
    fn creative_ads(&self) -> SelectionResult<Vec<CreativeAd>> {
        Ok(self.ads.read().clone())
    }
}

#[derive(Default)]
pub struct InMemoryAdEvents {
    events: RwLock<Vec<AdEvent>>,
}

impl InMemoryAdEvents {
    pub fn new(events: Vec<AdEvent>) -> Self {
        Self {
            events: RwLock::new(events),
        }
    }

    pub fn record(&self, event: AdEvent) {
        self.events.write().push(event);
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl AdEventSource for InMemoryAdEvents {
    fn ad_events(&self) -> SelectionResult<Vec<AdEvent>> {
        Ok(self.events.read().clone())
    }
}

#[derive(Default)]
pub struct InMemoryBrowsingHistory {
    entries: RwLock<Vec<BrowsingHistoryEntry>>,
}

impl InMemoryBrowsingHistory {
    pub fn new(entries: Vec<BrowsingHistoryEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn record(&self, entry: BrowsingHistoryEntry) {
        self.entries.write().push(entry);
    }
}

impl BrowsingHistorySource for InMemoryBrowsingHistory {
    fn browsing_history(&self) -> SelectionResult<Vec<BrowsingHistoryEntry>> {
        Ok(self.entries.read().clone())
    }
}
