//! Exclusion rules applied to a candidate pool. Each rule is evaluated
//! independently; an ad survives only if no rule excludes it.

use std::collections::HashSet;

use adserve_core::{AdEvent, ConfirmationType, CreativeAd, SelectionConfig};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::evaluator::{CapDecision, FrequencyCapEvaluator};

pub trait ExclusionRule {
    /// Rule name for logs and metrics.
    fn name(&self) -> &'static str;

    fn should_exclude(&self, ad: &CreativeAd) -> bool;
}

pub struct FrequencyCapRule<'a> {
    evaluator: FrequencyCapEvaluator<'a>,
}

impl<'a> FrequencyCapRule<'a> {
    pub fn new(ad_events: &'a [AdEvent], now: DateTime<Utc>) -> Self {
        Self {
            evaluator: FrequencyCapEvaluator::new(ad_events, now),
        }
    }
}

impl ExclusionRule for FrequencyCapRule<'_> {
    fn name(&self) -> &'static str {
        "frequency_cap"
    }

    fn should_exclude(&self, ad: &CreativeAd) -> bool {
        match self.evaluator.evaluate(ad) {
            CapDecision::Eligible => false,
            CapDecision::Capped { cap, count } => {
                debug!(
                    creative_instance_id = %ad.creative_instance_id,
                    scope = ?cap.scope,
                    limit = cap.limit,
                    count,
                    "frequency cap reached"
                );
                true
            }
        }
    }
}

/// Excludes creative sets the user already converted on.
pub struct ConversionRule {
    converted_creative_sets: HashSet<String>,
}

impl ConversionRule {
    pub fn new(ad_events: &[AdEvent]) -> Self {
        Self {
            converted_creative_sets: ad_events
                .iter()
                .filter(|e| e.confirmation_type == ConfirmationType::Conversion)
                .map(|e| e.creative_set_id.clone())
                .collect(),
        }
    }
}

impl ExclusionRule for ConversionRule {
    fn name(&self) -> &'static str {
        "conversion"
    }

    fn should_exclude(&self, ad: &CreativeAd) -> bool {
        self.converted_creative_sets.contains(&ad.creative_set_id)
    }
}

/// Excludes ads outside their campaign start/end dates.
pub struct FlightWindowRule {
    now: DateTime<Utc>,
}

impl FlightWindowRule {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

impl ExclusionRule for FlightWindowRule {
    fn name(&self) -> &'static str {
        "flight_window"
    }

    fn should_exclude(&self, ad: &CreativeAd) -> bool {
        !ad.is_within_flight(self.now)
    }
}

/// Ads with dayparts only run inside one of them.
pub struct DaypartRule {
    now: DateTime<Utc>,
}

impl DaypartRule {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

impl ExclusionRule for DaypartRule {
    fn name(&self) -> &'static str {
        "daypart"
    }

    fn should_exclude(&self, ad: &CreativeAd) -> bool {
        !ad.dayparts.is_empty() && !ad.dayparts.iter().any(|d| d.contains(self.now))
    }
}

/// The rule set for one selection call.
pub struct ExclusionRules<'a> {
    rules: Vec<Box<dyn ExclusionRule + 'a>>,
}

impl<'a> ExclusionRules<'a> {
    pub fn new(rules: Vec<Box<dyn ExclusionRule + 'a>>) -> Self {
        Self { rules }
    }

    /// Standard rules for a snapshot of ad events at `now`.
    pub fn standard(config: &SelectionConfig, ad_events: &'a [AdEvent], now: DateTime<Utc>) -> Self {
        let mut rules: Vec<Box<dyn ExclusionRule + 'a>> = vec![
            Box::new(FlightWindowRule::new(now)),
            Box::new(DaypartRule::new(now)),
            Box::new(FrequencyCapRule::new(ad_events, now)),
        ];
        if config.exclude_converted_creative_sets {
            rules.push(Box::new(ConversionRule::new(ad_events)));
        }
        Self::new(rules)
    }

    /// Name of the first rule excluding `ad`, if any.
    pub fn excluded_by(&self, ad: &CreativeAd) -> Option<&'static str> {
        self.rules
            .iter()
            .find(|rule| rule.should_exclude(ad))
            .map(|rule| rule.name())
    }

    pub fn apply(&self, ads: Vec<CreativeAd>) -> Vec<CreativeAd> {
        ads.into_iter()
            .filter(|ad| match self.excluded_by(ad) {
                Some(rule) => {
                    debug!(creative_instance_id = %ad.creative_instance_id, rule, "ad excluded");
                    metrics::counter!("eligible_ads.excluded", "rule" => rule).increment(1);
                    false
                }
                None => true,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adserve_core::{CapScope, Daypart, FrequencyCap};
    use chrono::{Duration, TimeZone, Weekday};

    fn now() -> DateTime<Utc> {
        // A Friday.
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    fn ad(id: &str, creative_set_id: &str) -> CreativeAd {
        CreativeAd::new(id, creative_set_id, "campaign-1", vec!["tech".into()], "200x100")
    }

    #[test]
    fn test_conversion_excludes_creative_set() {
        let converted = ad("a", "cs-1");
        let events = vec![AdEvent::for_ad(&converted, ConfirmationType::Conversion, now() - Duration::days(3))];
        let rule = ConversionRule::new(&events);
        assert!(rule.should_exclude(&ad("b", "cs-1")));
        assert!(!rule.should_exclude(&ad("c", "cs-2")));
    }

    #[test]
    fn test_daypart_rule() {
        let mut ad = ad("a", "cs-1");
        let rule = DaypartRule::new(now());
        assert!(!rule.should_exclude(&ad));
        ad.dayparts = vec![Daypart {
            days_of_week: vec![Weekday::Mon],
            start_minute: 0,
            end_minute: 1439,
        }];
        assert!(rule.should_exclude(&ad));
        ad.dayparts.push(Daypart {
            days_of_week: vec![Weekday::Fri],
            start_minute: 11 * 60,
            end_minute: 13 * 60,
        });
        assert!(!rule.should_exclude(&ad));
    }

    #[test]
    fn test_flight_window_rule() {
        let mut ad = ad("a", "cs-1");
        ad.end_at = Some(now() - Duration::days(1));
        assert!(FlightWindowRule::new(now()).should_exclude(&ad));
    }

    #[test]
    fn test_standard_rules_report_first_exclusion() {
        let capped = ad("a", "cs-1").with_cap(FrequencyCap::per_day(CapScope::CreativeInstance, 1));
        let events = vec![AdEvent::for_ad(&capped, ConfirmationType::Viewed, now() - Duration::hours(1))];
        let config = SelectionConfig::default();
        let rules = ExclusionRules::standard(&config, &events, now());
        assert_eq!(rules.excluded_by(&capped), Some("frequency_cap"));
        assert_eq!(rules.excluded_by(&ad("b", "cs-2")), None);
    }

    #[test]
    fn test_conversion_rule_can_be_disabled() {
        let converted = ad("a", "cs-1");
        let events = vec![AdEvent::for_ad(&converted, ConfirmationType::Conversion, now())];
        let config = SelectionConfig {
            exclude_converted_creative_sets: false,
            ..SelectionConfig::default()
        };
        let rules = ExclusionRules::standard(&config, &events, now());
        assert_eq!(rules.apply(vec![converted]).len(), 1);
    }

    #[test]
    fn test_apply_keeps_order() {
        let capped = ad("b", "cs-2").with_cap(FrequencyCap::per_day(CapScope::CreativeInstance, 1));
        let events = vec![AdEvent::for_ad(&capped, ConfirmationType::Viewed, now())];
        let config = SelectionConfig::default();
        let rules = ExclusionRules::standard(&config, &events, now());
        let kept = rules.apply(vec![ad("a", "cs-1"), capped, ad("c", "cs-3")]);
        let ids: Vec<_> = kept.iter().map(|a| a.creative_instance_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
