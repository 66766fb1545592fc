//! Subdivision targeting — restricts ads carrying subdivision-level geo
//! targets (`"US-CA"`) to users located in that subdivision.

use std::collections::HashSet;

use adserve_core::{CreativeAd, Segment, SelectionResult};
use tracing::{debug, warn};

const SUBDIVISION_DELIMITER: char = '-';

/// Read-only lookup of the user's current subdivision.
pub trait SubdivisionTargeting: Send + Sync {
    /// `false` disables geo filtering entirely.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Whether subdivision targeting is available for a country code.
    fn is_supported(&self, region: &str) -> bool;

    /// The user's subdivision code, e.g. `"US-CA"`.
    fn get_subdivision(&self) -> SelectionResult<Segment>;
}

/// Policy used when geo-targeting is switched off: every ad is allowed.
pub struct AllowAllSubdivisions;

impl SubdivisionTargeting for AllowAllSubdivisions {
    fn is_enabled(&self) -> bool {
        false
    }

    fn is_supported(&self, _region: &str) -> bool {
        true
    }

    fn get_subdivision(&self) -> SelectionResult<Segment> {
        Err(adserve_core::SelectionError::unavailable(
            adserve_core::Collaborator::SubdivisionTargeting,
            "geo-targeting disabled",
        ))
    }
}

/// Fixed subdivision with an explicit set of supported countries.
pub struct StaticSubdivision {
    code: Option<Segment>,
    supported_regions: HashSet<String>,
}

impl StaticSubdivision {
    pub fn new(code: Option<&str>, supported_regions: &[&str]) -> Self {
        Self {
            code: code.map(Segment::new),
            supported_regions: supported_regions
                .iter()
                .map(|r| r.to_ascii_uppercase())
                .collect(),
        }
    }
}

impl SubdivisionTargeting for StaticSubdivision {
    fn is_supported(&self, region: &str) -> bool {
        self.supported_regions.contains(&region.to_ascii_uppercase())
    }

    fn get_subdivision(&self) -> SelectionResult<Segment> {
        self.code.clone().ok_or_else(|| {
            adserve_core::SelectionError::unavailable(
                adserve_core::Collaborator::SubdivisionTargeting,
                "subdivision not yet resolved",
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum GeoContext {
    Disabled,
    /// Lookup failed or the region is unsupported; subdivision-targeted ads
    /// are excluded.
    Closed,
    Known { region: String, code: String },
}

/// Point-in-time snapshot of the subdivision collaborator, applied as a hard
/// filter to every targeting tier.
#[derive(Debug, Clone)]
pub struct SubdivisionFilter {
    context: GeoContext,
}

impl SubdivisionFilter {
    pub fn snapshot(targeting: &dyn SubdivisionTargeting) -> Self {
        if !targeting.is_enabled() {
            return Self {
                context: GeoContext::Disabled,
            };
        }

        let context = match targeting.get_subdivision() {
            Ok(code) => {
                let code = code.key().to_ascii_uppercase();
                let region = code
                    .split_once(SUBDIVISION_DELIMITER)
                    .map(|(region, _)| region.to_string())
                    .unwrap_or_else(|| code.clone());
                if targeting.is_supported(&region) {
                    GeoContext::Known { region, code }
                } else {
                    debug!(region = %region, "subdivision targeting unsupported for region");
                    GeoContext::Closed
                }
            }
            Err(e) => {
                warn!(error = %e, "subdivision lookup failed, excluding subdivision-targeted ads");
                metrics::counter!(
                    "eligible_ads.collaborator_failures",
                    "collaborator" => "subdivision_targeting"
                )
                .increment(1);
                GeoContext::Closed
            }
        };
        Self { context }
    }

    /// Filter that lets every ad through.
    pub fn allow_all() -> Self {
        Self {
            context: GeoContext::Disabled,
        }
    }

    pub fn allows(&self, ad: &CreativeAd) -> bool {
        let targets_subdivision = ad
            .geo_targets
            .iter()
            .any(|t| t.contains(SUBDIVISION_DELIMITER));
        if !targets_subdivision {
            return true;
        }

        match &self.context {
            GeoContext::Disabled => true,
            GeoContext::Closed => false,
            GeoContext::Known { region, code } => ad
                .geo_targets
                .iter()
                .any(|t| t.eq_ignore_ascii_case(code) || t.eq_ignore_ascii_case(region)),
        }
    }

    pub fn apply(&self, ads: Vec<CreativeAd>) -> Vec<CreativeAd> {
        ads.into_iter().filter(|ad| self.allows(ad)).collect()
    }
}
