//! Tiered targeting fallback: parent-child segments, then parent segments,
//! then untargeted inventory. Each tier is narrowed by placement dimensions
//! and subdivision targeting before it is considered non-empty.

use std::fmt;

use adserve_core::segment::{matches_exact, matches_parent, parent_segments};
use adserve_core::{CreativeAd, Segment, SegmentList};
use tracing::debug;

use crate::subdivision::SubdivisionFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetingTier {
    ParentChild,
    Parent,
    Untargeted,
}

impl TargetingTier {
    pub const ALL: [TargetingTier; 3] = [
        TargetingTier::ParentChild,
        TargetingTier::Parent,
        TargetingTier::Untargeted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetingTier::ParentChild => "parent_child",
            TargetingTier::Parent => "parent",
            TargetingTier::Untargeted => "untargeted",
        }
    }
}

impl fmt::Display for TargetingTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct TargetingFallbackResolver<'a> {
    inventory: &'a [CreativeAd],
    dimensions: &'a str,
    geo: &'a SubdivisionFilter,
    segments: SegmentList,
    parents: SegmentList,
}

impl<'a> TargetingFallbackResolver<'a> {
    pub fn new(
        inventory: &'a [CreativeAd],
        dimensions: &'a str,
        geo: &'a SubdivisionFilter,
        interest_segments: &[Segment],
        intent_segments: &[Segment],
    ) -> Self {
        let mut segments: SegmentList = Vec::new();
        for segment in interest_segments.iter().chain(intent_segments) {
            if !segment.is_untargeted() && !segments.contains(segment) {
                segments.push(segment.clone());
            }
        }
        let parents = parent_segments(&segments);
        Self {
            inventory,
            dimensions,
            geo,
            segments,
            parents,
        }
    }

    fn in_tier(&self, tier: TargetingTier, ad: &CreativeAd) -> bool {
        match tier {
            TargetingTier::ParentChild => matches_exact(&ad.segments, &self.segments),
            TargetingTier::Parent => matches_parent(&ad.segments, &self.parents),
            TargetingTier::Untargeted => ad.is_untargeted(),
        }
    }

    /// Candidates of one tier, in inventory order.
    pub fn pool(&self, tier: TargetingTier) -> Vec<CreativeAd> {
        self.inventory
            .iter()
            .filter(|ad| ad.dimensions.eq_ignore_ascii_case(self.dimensions))
            .filter(|ad| self.in_tier(tier, ad))
            .filter(|ad| self.geo.allows(ad))
            .cloned()
            .collect()
    }

    /// First non-empty tier pool.
    pub fn resolve(&self) -> Option<(TargetingTier, Vec<CreativeAd>)> {
        self.resolve_with(|_, pool| Some(pool))
    }

    /// Offer each non-empty tier pool to `accept` in order, stopping at the
    /// first tier it accepts.
    pub fn resolve_with<T>(
        &self,
        mut accept: impl FnMut(TargetingTier, Vec<CreativeAd>) -> Option<T>,
    ) -> Option<(TargetingTier, T)> {
        for tier in TargetingTier::ALL {
            let pool = self.pool(tier);
            if pool.is_empty() {
                debug!(tier = %tier, "no candidates for tier, falling back");
                continue;
            }
            debug!(tier = %tier, candidates = pool.len(), "tier has candidates");
            if let Some(accepted) = accept(tier, pool) {
                return Some((tier, accepted));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ad(id: &str, segment: &str) -> CreativeAd {
        CreativeAd::new(id, format!("cs-{id}"), format!("c-{id}"), vec![segment.into()], "200x100")
    }

    fn segs(values: &[&str]) -> SegmentList {
        values.iter().map(|v| Segment::new(*v)).collect()
    }

    fn ids(ads: &[CreativeAd]) -> Vec<&str> {
        ads.iter().map(|a| a.creative_instance_id.as_str()).collect()
    }

    #[test]
    fn test_parent_child_tier_wins() {
        let inventory = vec![ad("a", "tech-computing"), ad("b", "tech"), ad("c", "untargeted")];
        let geo = SubdivisionFilter::allow_all();
        let resolver = TargetingFallbackResolver::new(&inventory, "200x100", &geo, &segs(&["Tech-Computing"]), &[]);
        let (tier, pool) = resolver.resolve().unwrap();
        assert_eq!(tier, TargetingTier::ParentChild);
        assert_eq!(ids(&pool), vec!["a"]);
    }

    #[test]
    fn test_parent_tier_covers_both_directions() {
        let inventory = vec![ad("a", "tech"), ad("b", "tech-gadgets"), ad("c", "travel")];
        let geo = SubdivisionFilter::allow_all();
        let resolver = TargetingFallbackResolver::new(&inventory, "200x100", &geo, &segs(&["tech-computing"]), &[]);
        let (tier, pool) = resolver.resolve().unwrap();
        assert_eq!(tier, TargetingTier::Parent);
        assert_eq!(ids(&pool), vec!["a", "b"]);
    }

    #[test]
    fn test_intent_segments_participate() {
        let inventory = vec![ad("a", "automotive-suv")];
        let geo = SubdivisionFilter::allow_all();
        let resolver = TargetingFallbackResolver::new(&inventory, "200x100", &geo, &[], &segs(&["automotive-suv"]));
        assert_eq!(resolver.resolve().unwrap().0, TargetingTier::ParentChild);
    }

    #[test]
    fn test_empty_user_model_goes_untargeted() {
        let inventory = vec![ad("a", "tech"), ad("b", "untargeted")];
        let geo = SubdivisionFilter::allow_all();
        let resolver = TargetingFallbackResolver::new(&inventory, "200x100", &geo, &[], &[]);
        let (tier, pool) = resolver.resolve().unwrap();
        assert_eq!(tier, TargetingTier::Untargeted);
        assert_eq!(ids(&pool), vec!["b"]);
    }

    #[test]
    fn test_geo_filtered_tier_falls_through() {
        let inventory = vec![
            ad("a", "tech-computing").with_geo_targets(&["US-NY"]),
            ad("b", "untargeted"),
        ];
        let geo = SubdivisionFilter::snapshot(&crate::StaticSubdivision::new(Some("US-CA"), &["US"]));
        let resolver = TargetingFallbackResolver::new(&inventory, "200x100", &geo, &segs(&["tech-computing"]), &[]);
        let (tier, pool) = resolver.resolve().unwrap();
        assert_eq!(tier, TargetingTier::Untargeted);
        assert_eq!(ids(&pool), vec!["b"]);
    }

    #[test]
    fn test_dimensions_mismatch_excluded() {
        let mut wide = ad("a", "tech-computing");
        wide.dimensions = "300x250".into();
        let inventory = vec![wide];
        let geo = SubdivisionFilter::allow_all();
        let resolver = TargetingFallbackResolver::new(&inventory, "200x100", &geo, &segs(&["tech-computing"]), &[]);
        assert!(resolver.resolve().is_none());
    }

    #[test]
    fn test_resolve_with_rejection_tries_next_tier() {
        let inventory = vec![ad("a", "tech-computing"), ad("b", "untargeted")];
        let geo = SubdivisionFilter::allow_all();
        let resolver = TargetingFallbackResolver::new(&inventory, "200x100", &geo, &segs(&["tech-computing"]), &[]);
        let mut seen = Vec::new();
        let result = resolver.resolve_with(|tier, pool| {
            seen.push(tier);
            (tier == TargetingTier::Untargeted).then_some(pool)
        });
        assert_eq!(
            seen,
            vec![TargetingTier::ParentChild, TargetingTier::Parent, TargetingTier::Untargeted]
        );
        assert_eq!(ids(&result.unwrap().1), vec!["b"]);
    }
}
