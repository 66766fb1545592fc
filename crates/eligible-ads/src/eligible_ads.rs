//! Selection orchestrator: snapshots collaborators, walks the targeting
//! tiers, filters each tier's pool and reports the result through a
//! single-shot callback.

use std::sync::Arc;

use adserve_core::{
    CreativeAd, FallbackPolicy, Segment, SelectionConfig, SelectionError, SelectionResult,
    UserModel,
};
use adserve_frequency_capping::ExclusionRules;
use adserve_targeting::{
    AntiTargetingFilter, AntiTargetingResource, SubdivisionFilter, SubdivisionTargeting,
    TargetingFallbackResolver, TargetingTier,
};
use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::filters;
use crate::predictor::AdPredictor;
use crate::sources::{AdCatalog, AdEventSource, BrowsingHistorySource};

/// Collaborators injected at construction. The host keeps them alive for
/// as long as the engine.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn AdCatalog>,
    pub ad_events: Arc<dyn AdEventSource>,
    pub browsing_history: Arc<dyn BrowsingHistorySource>,
    pub subdivision_targeting: Arc<dyn SubdivisionTargeting>,
    pub anti_targeting: Arc<dyn AntiTargetingResource>,
}

/// Outcome of one selection pass.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Tier the ads came from; `None` when no tier had candidates.
    pub tier: Option<TargetingTier>,
    pub ads: Vec<CreativeAd>,
}

/// Eligible ads for a placement. Safe to share across threads; the only
/// mutable state is the last served ad.
pub struct EligibleAds {
    config: SelectionConfig,
    collaborators: Collaborators,
    predictor: AdPredictor,
    last_served: RwLock<Option<CreativeAd>>,
}

impl EligibleAds {
    pub fn new(config: SelectionConfig, collaborators: Collaborators) -> Self {
        let predictor = AdPredictor::new(&config.predictor);
        Self {
            config,
            collaborators,
            predictor,
            last_served: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    pub fn set_last_served_ad(&self, ad: CreativeAd) {
        debug!(creative_instance_id = %ad.creative_instance_id, "last served ad updated");
        *self.last_served.write() = Some(ad);
    }

    /// Forget the last served ad, e.g. when a new browsing session starts.
    pub fn reset_last_served_ad(&self) {
        *self.last_served.write() = None;
    }

    pub fn last_served_ad(&self) -> Option<CreativeAd> {
        self.last_served.read().clone()
    }

    /// Eligible ads for a full user model. `callback` runs exactly once;
    /// `success` is false only when a required collaborator failed.
    pub fn get<F>(&self, user_model: &UserModel, dimensions: &str, callback: F)
    where
        F: FnOnce(bool, Vec<CreativeAd>),
    {
        let interest = user_model.interests();
        match self.select(&interest, &user_model.purchase_intent_segments, dimensions) {
            Ok(selection) => callback(true, selection.ads),
            Err(e) => {
                warn!(error = %e, "failed to get eligible ads");
                callback(false, Vec::new())
            }
        }
    }

    /// Choose a single ad for already-resolved segments. The chosen ad
    /// becomes the last served ad.
    pub fn get_for_features<F>(
        &self,
        interest_segments: &[Segment],
        intent_segments: &[Segment],
        dimensions: &str,
        callback: F,
    ) where
        F: FnOnce(bool, Option<CreativeAd>),
    {
        match self.choose(interest_segments, intent_segments, dimensions) {
            Ok(chosen) => callback(true, chosen),
            Err(e) => {
                warn!(error = %e, "failed to get eligible ads for features");
                callback(false, None)
            }
        }
    }

    /// Async form of [`EligibleAds::get`]; the pipeline runs on the blocking
    /// pool so the caller's executor is never held up.
    pub async fn get_async(
        self: Arc<Self>,
        user_model: UserModel,
        dimensions: String,
    ) -> SelectionResult<Selection> {
        tokio::task::spawn_blocking(move || {
            let interest = user_model.interests();
            self.select(&interest, &user_model.purchase_intent_segments, &dimensions)
        })
        .await
        .map_err(|e| SelectionError::Internal(anyhow::anyhow!("selection task failed: {e}")))?
    }

    /// Async form of [`EligibleAds::get_for_features`].
    pub async fn get_for_features_async(
        self: Arc<Self>,
        interest_segments: Vec<Segment>,
        intent_segments: Vec<Segment>,
        dimensions: String,
    ) -> SelectionResult<Option<CreativeAd>> {
        tokio::task::spawn_blocking(move || {
            self.choose(&interest_segments, &intent_segments, &dimensions)
        })
        .await
        .map_err(|e| SelectionError::Internal(anyhow::anyhow!("selection task failed: {e}")))?
    }

    fn choose(
        &self,
        interest_segments: &[Segment],
        intent_segments: &[Segment],
        dimensions: &str,
    ) -> SelectionResult<Option<CreativeAd>> {
        let selection = self.select(interest_segments, intent_segments, dimensions)?;
        let chosen = self
            .predictor
            .choose(&selection.ads, interest_segments, intent_segments);
        if let Some(ad) = &chosen {
            info!(
                creative_instance_id = %ad.creative_instance_id,
                campaign_id = %ad.campaign_id,
                "ad chosen"
            );
            self.set_last_served_ad(ad.clone());
        }
        Ok(chosen)
    }

    /// Run the full pipeline against point-in-time snapshots of every
    /// collaborator.
    pub fn select(
        &self,
        interest_segments: &[Segment],
        intent_segments: &[Segment],
        dimensions: &str,
    ) -> SelectionResult<Selection> {
        metrics::counter!("eligible_ads.requests").increment(1);
        let now = Utc::now();

        let inventory = self
            .collaborators
            .catalog
            .creative_ads()
            .map_err(record_failure)?;
        let ad_events = self
            .collaborators
            .ad_events
            .ad_events()
            .map_err(record_failure)?;
        let history = self
            .collaborators
            .browsing_history
            .browsing_history()
            .unwrap_or_else(|e| {
                warn!(error = %e, "browsing history unavailable, continuing without it");
                record_failure(e);
                Vec::new()
            });
        let last_served = self.last_served_ad();

        let geo = SubdivisionFilter::snapshot(self.collaborators.subdivision_targeting.as_ref());
        let anti_targeting =
            AntiTargetingFilter::snapshot(self.collaborators.anti_targeting.as_ref(), &history);
        let rules = ExclusionRules::standard(&self.config, &ad_events, now);
        let resolver = TargetingFallbackResolver::new(
            &inventory,
            dimensions,
            &geo,
            interest_segments,
            intent_segments,
        );

        let policy = self.config.fallback_policy;
        let resolved = resolver.resolve_with(|tier, pool| {
            let candidates = pool.len();
            let eligible = self.filter_ineligible(pool, &rules, &anti_targeting, last_served.as_ref());
            debug!(tier = %tier, candidates, eligible = eligible.len(), "filtered tier");
            if eligible.is_empty() && policy == FallbackPolicy::PostFilter {
                return None;
            }
            Some(eligible)
        });

        let selection = match resolved {
            Some((tier, ads)) => {
                metrics::counter!("eligible_ads.tier", "tier" => tier.as_str()).increment(1);
                Selection {
                    tier: Some(tier),
                    ads,
                }
            }
            None => Selection::default(),
        };

        if selection.ads.is_empty() {
            metrics::counter!("eligible_ads.no_eligible_ads").increment(1);
            info!(dimensions, tier = ?selection.tier, "no eligible ads");
        } else {
            info!(
                dimensions,
                tier = ?selection.tier,
                eligible = selection.ads.len(),
                "eligible ads found"
            );
        }
        Ok(selection)
    }

    fn filter_ineligible(
        &self,
        ads: Vec<CreativeAd>,
        rules: &ExclusionRules<'_>,
        anti_targeting: &AntiTargetingFilter,
        last_served: Option<&CreativeAd>,
    ) -> Vec<CreativeAd> {
        let ads = filters::deduplicate(ads);
        let ads = rules.apply(ads);
        let ads = anti_targeting.apply(ads);
        if self.config.exclude_last_served {
            filters::exclude_last_served(ads, last_served)
        } else {
            ads
        }
    }
}

fn record_failure(error: SelectionError) -> SelectionError {
    if let Some(collaborator) = error.collaborator() {
        metrics::counter!(
            "eligible_ads.collaborator_failures",
            "collaborator" => collaborator.as_str()
        )
        .increment(1);
    }
    error
}
