//! Frequency cap evaluation — counts qualifying ad events per cap scope and
//! window and compares them against each configured limit.

use std::collections::HashMap;

use adserve_core::{AdEvent, CapScope, CreativeAd, FrequencyCap, SelectionResult};
use chrono::{DateTime, Utc};
use tracing::warn;

const SCOPES: [CapScope; 4] = [
    CapScope::CreativeInstance,
    CapScope::CreativeSet,
    CapScope::Campaign,
    CapScope::Advertiser,
];

/// Ad events partitioned by cap scope identifier.
pub struct AdEventIndex<'a> {
    partitions: HashMap<CapScope, HashMap<&'a str, Vec<&'a AdEvent>>>,
}

impl<'a> AdEventIndex<'a> {
    pub fn new(ad_events: &'a [AdEvent]) -> Self {
        let mut partitions: HashMap<CapScope, HashMap<&'a str, Vec<&'a AdEvent>>> = HashMap::new();
        for event in ad_events {
            for scope in SCOPES {
                let id = event.id_for(scope);
                if id.is_empty() {
                    continue;
                }
                partitions
                    .entry(scope)
                    .or_default()
                    .entry(id)
                    .or_default()
                    .push(event);
            }
        }
        Self { partitions }
    }

    pub fn events_for(&self, scope: CapScope, id: &str) -> &[&'a AdEvent] {
        self.partitions
            .get(&scope)
            .and_then(|ids| ids.get(id))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapDecision {
    Eligible,
    Capped {
        cap: FrequencyCap,
        count: i64,
    },
}

impl CapDecision {
    pub fn is_eligible(&self) -> bool {
        matches!(self, CapDecision::Eligible)
    }
}

/// Read-only frequency cap evaluator over a snapshot of ad events.
pub struct FrequencyCapEvaluator<'a> {
    index: AdEventIndex<'a>,
    now: DateTime<Utc>,
}

impl<'a> FrequencyCapEvaluator<'a> {
    pub fn new(ad_events: &'a [AdEvent], now: DateTime<Utc>) -> Self {
        Self {
            index: AdEventIndex::new(ad_events),
            now,
        }
    }

    pub fn index(&self) -> &AdEventIndex<'a> {
        &self.index
    }

    /// Qualifying events for `cap` on `ad` inside the cap's window. Fails on
    /// a non-positive window.
    pub fn count(&self, ad: &CreativeAd, cap: &FrequencyCap) -> SelectionResult<i64> {
        let window_start = cap.window.start(self.now)?;
        let id = ad.id_for(cap.scope);
        if id.is_empty() {
            return Ok(0);
        }
        Ok(self
            .index
            .events_for(cap.scope, id)
            .iter()
            .filter(|e| e.confirmation_type == cap.confirmation_type)
            .filter(|e| window_start.map_or(true, |start| e.timestamp > start))
            .count() as i64)
    }

    /// An ad fails if any cap's count has reached its limit. Non-positive
    /// limits and windows always cap.
    pub fn evaluate(&self, ad: &CreativeAd) -> CapDecision {
        for cap in &ad.caps {
            if cap.limit <= 0 {
                warn!(
                    creative_instance_id = %ad.creative_instance_id,
                    limit = cap.limit,
                    "non-positive frequency cap limit, suppressing ad"
                );
                return CapDecision::Capped {
                    cap: cap.clone(),
                    count: 0,
                };
            }

            let count = match self.count(ad, cap) {
                Ok(count) => count,
                Err(e) => {
                    warn!(
                        creative_instance_id = %ad.creative_instance_id,
                        error = %e,
                        "invalid frequency cap window, suppressing ad"
                    );
                    return CapDecision::Capped {
                        cap: cap.clone(),
                        count: 0,
                    };
                }
            };
            if count >= cap.limit {
                return CapDecision::Capped {
                    cap: cap.clone(),
                    count,
                };
            }
        }
        CapDecision::Eligible
    }

    pub fn is_capped(&self, ad: &CreativeAd) -> bool {
        !self.evaluate(ad).is_eligible()
    }
}
