use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{SelectionError, SelectionResult};
use crate::segment::{Segment, SegmentList};

/// A creative that can be served into a placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreativeAd {
    pub creative_instance_id: String,
    pub creative_set_id: String,
    pub campaign_id: String,
    #[serde(default)]
    pub advertiser_id: String,
    pub segments: SegmentList,
    /// Placement size, e.g. `"200x100"`.
    pub dimensions: String,
    #[serde(default)]
    pub caps: Vec<FrequencyCap>,
    /// Country (`"US"`) or subdivision (`"US-CA"`) codes.
    #[serde(default)]
    pub geo_targets: Vec<String>,
    #[serde(default)]
    pub dayparts: Vec<Daypart>,
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
    /// Pass-through weight applied by the ad predictor.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Render payload, opaque to selection.
    #[serde(default)]
    pub payload: serde_json::Value,
}

fn default_weight() -> f64 {
    1.0
}

impl CreativeAd {
    pub fn new(
        creative_instance_id: impl Into<String>,
        creative_set_id: impl Into<String>,
        campaign_id: impl Into<String>,
        segments: SegmentList,
        dimensions: impl Into<String>,
    ) -> Self {
        Self {
            creative_instance_id: creative_instance_id.into(),
            creative_set_id: creative_set_id.into(),
            campaign_id: campaign_id.into(),
            advertiser_id: String::new(),
            segments,
            dimensions: dimensions.into(),
            caps: Vec::new(),
            geo_targets: Vec::new(),
            dayparts: Vec::new(),
            start_at: None,
            end_at: None,
            weight: default_weight(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_cap(mut self, cap: FrequencyCap) -> Self {
        self.caps.push(cap);
        self
    }

    pub fn with_geo_targets(mut self, targets: &[&str]) -> Self {
        self.geo_targets = targets.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn is_untargeted(&self) -> bool {
        self.segments.iter().any(Segment::is_untargeted)
    }

    pub fn same_creative(&self, other: &CreativeAd) -> bool {
        self.creative_instance_id == other.creative_instance_id
    }

    /// Identifier of this ad at the given cap scope.
    pub fn id_for(&self, scope: CapScope) -> &str {
        match scope {
            CapScope::CreativeInstance => &self.creative_instance_id,
            CapScope::CreativeSet => &self.creative_set_id,
            CapScope::Campaign => &self.campaign_id,
            CapScope::Advertiser => &self.advertiser_id,
        }
    }

    pub fn is_within_flight(&self, now: DateTime<Utc>) -> bool {
        self.start_at.map_or(true, |start| now >= start)
            && self.end_at.map_or(true, |end| now <= end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationType {
    Served,
    Viewed,
    Clicked,
    Dismissed,
    Conversion,
}

/// Which identifier a cap counts events against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapScope {
    CreativeInstance,
    CreativeSet,
    Campaign,
    Advertiser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CapWindow {
    Rolling { seconds: i64 },
    Lifetime,
}

impl CapWindow {
    pub fn hours(hours: i64) -> Self {
        CapWindow::Rolling {
            seconds: hours.saturating_mul(3600),
        }
    }

    /// Earliest timestamp (exclusive) an event may have to count. `None`
    /// counts every event, including rolling windows reaching past the
    /// earliest representable time. Non-positive windows are invalid.
    pub fn start(&self, now: DateTime<Utc>) -> SelectionResult<Option<DateTime<Utc>>> {
        match *self {
            CapWindow::Rolling { seconds } if seconds <= 0 => Err(
                SelectionError::InvalidCapConfiguration(format!("window of {seconds}s")),
            ),
            CapWindow::Rolling { seconds } => Ok(Duration::try_seconds(seconds)
                .and_then(|window| now.checked_sub_signed(window))),
            CapWindow::Lifetime => Ok(None),
        }
    }
}

/// "At most `limit` events of `confirmation_type` per `window` for `scope`".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyCap {
    pub scope: CapScope,
    #[serde(default = "default_confirmation_type")]
    pub confirmation_type: ConfirmationType,
    pub window: CapWindow,
    /// Signed so a misconfigured cap can be represented and suppressed.
    pub limit: i64,
}

fn default_confirmation_type() -> ConfirmationType {
    ConfirmationType::Viewed
}

impl FrequencyCap {
    pub fn new(scope: CapScope, window: CapWindow, limit: i64) -> Self {
        Self {
            scope,
            confirmation_type: default_confirmation_type(),
            window,
            limit,
        }
    }

    pub fn per_day(scope: CapScope, limit: i64) -> Self {
        Self::new(scope, CapWindow::hours(24), limit)
    }

    pub fn per_week(scope: CapScope, limit: i64) -> Self {
        Self::new(scope, CapWindow::hours(24 * 7), limit)
    }

    pub fn per_month(scope: CapScope, limit: i64) -> Self {
        Self::new(scope, CapWindow::hours(24 * 30), limit)
    }

    pub fn rolling_hours(scope: CapScope, hours: i64, limit: i64) -> Self {
        Self::new(scope, CapWindow::hours(hours), limit)
    }

    pub fn total(scope: CapScope, limit: i64) -> Self {
        Self::new(scope, CapWindow::Lifetime, limit)
    }

    pub fn counting(mut self, confirmation_type: ConfirmationType) -> Self {
        self.confirmation_type = confirmation_type;
        self
    }
}

/// Time-of-week slot an ad may run in. Minutes are from UTC midnight,
/// inclusive on both ends. A slot with `start_minute > end_minute` runs
/// past midnight into the following day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Daypart {
    pub days_of_week: Vec<Weekday>,
    pub start_minute: u32,
    pub end_minute: u32,
}

impl Daypart {
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let minute = now.hour() * 60 + now.minute();
        let today = self.days_of_week.contains(&now.weekday());
        if self.start_minute <= self.end_minute {
            return today && minute >= self.start_minute && minute <= self.end_minute;
        }
        let yesterday = self.days_of_week.contains(&now.weekday().pred());
        (today && minute >= self.start_minute) || (yesterday && minute <= self.end_minute)
    }
}

/// A recorded interaction with a creative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdEvent {
    pub creative_instance_id: String,
    pub creative_set_id: String,
    pub campaign_id: String,
    #[serde(default)]
    pub advertiser_id: String,
    pub confirmation_type: ConfirmationType,
    pub timestamp: DateTime<Utc>,
}

impl AdEvent {
    pub fn for_ad(
        ad: &CreativeAd,
        confirmation_type: ConfirmationType,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            creative_instance_id: ad.creative_instance_id.clone(),
            creative_set_id: ad.creative_set_id.clone(),
            campaign_id: ad.campaign_id.clone(),
            advertiser_id: ad.advertiser_id.clone(),
            confirmation_type,
            timestamp,
        }
    }

    pub fn id_for(&self, scope: CapScope) -> &str {
        match scope {
            CapScope::CreativeInstance => &self.creative_instance_id,
            CapScope::CreativeSet => &self.creative_set_id,
            CapScope::Campaign => &self.campaign_id,
            CapScope::Advertiser => &self.advertiser_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowsingHistoryEntry {
    pub url: String,
    pub visited_at: DateTime<Utc>,
}

impl BrowsingHistoryEntry {
    pub fn new(url: impl Into<String>, visited_at: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            visited_at,
        }
    }
}

/// Behavioral targeting model for the current user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserModel {
    #[serde(default)]
    pub interest_segments: SegmentList,
    #[serde(default)]
    pub latent_interest_segments: SegmentList,
    #[serde(default)]
    pub purchase_intent_segments: SegmentList,
}

impl UserModel {
    /// Interest and latent interest segments, deduplicated in rank order.
    pub fn interests(&self) -> SegmentList {
        let mut interests = self.interest_segments.clone();
        for segment in &self.latent_interest_segments {
            if !interests.contains(segment) {
                interests.push(segment.clone());
            }
        }
        interests
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_creative_ad_defaults_from_json() {
        let json = r#"{
            "creative_instance_id": "ci-1",
            "creative_set_id": "cs-1",
            "campaign_id": "c-1",
            "segments": ["Technology-Computing"],
            "dimensions": "200x100"
        }"#;
        let ad: CreativeAd = serde_json::from_str(json).unwrap();
        assert_eq!(ad.weight, 1.0);
        assert!(ad.caps.is_empty());
        assert!(!ad.is_untargeted());
        assert_eq!(ad.segments[0], Segment::new("technology-computing"));
    }

    #[test]
    fn test_frequency_cap_json() {
        let json = r#"{"scope": "campaign", "window": {"kind": "rolling", "seconds": 86400}, "limit": 1}"#;
        let cap: FrequencyCap = serde_json::from_str(json).unwrap();
        assert_eq!(cap, FrequencyCap::per_day(CapScope::Campaign, 1));
    }

    #[test]
    fn test_cap_window_start() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        assert_eq!(
            CapWindow::hours(48).start(now).unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 5, 8, 12, 0, 0).unwrap())
        );
        assert_eq!(CapWindow::Lifetime.start(now).unwrap(), None);
    }

    #[test]
    fn test_cap_window_beyond_representable_time_counts_everything() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        for seconds in [i64::MAX, 10_000_000_000_000] {
            let window = CapWindow::Rolling { seconds };
            assert_eq!(window.start(now).unwrap(), None);
        }
        assert_eq!(CapWindow::hours(i64::MAX).start(now).unwrap(), None);
    }

    #[test]
    fn test_non_positive_cap_window_is_invalid() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        for seconds in [0, -86_400, i64::MIN] {
            let err = CapWindow::Rolling { seconds }.start(now).unwrap_err();
            assert!(matches!(err, SelectionError::InvalidCapConfiguration(_)));
        }
    }

    #[test]
    fn test_flight_window() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let mut ad = CreativeAd::new("ci", "cs", "c", vec![], "200x100");
        assert!(ad.is_within_flight(now));
        ad.start_at = Some(now + Duration::days(1));
        assert!(!ad.is_within_flight(now));
        ad.start_at = Some(now - Duration::days(1));
        ad.end_at = Some(now - Duration::hours(1));
        assert!(!ad.is_within_flight(now));
    }

    #[test]
    fn test_daypart_contains() {
        // 2024-05-10 is a Friday.
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 9, 30, 0).unwrap();
        let daypart = Daypart {
            days_of_week: vec![Weekday::Fri],
            start_minute: 9 * 60,
            end_minute: 10 * 60,
        };
        assert!(daypart.contains(now));
        let weekend = Daypart {
            days_of_week: vec![Weekday::Sat, Weekday::Sun],
            ..daypart
        };
        assert!(!weekend.contains(now));
    }

    #[test]
    fn test_daypart_across_midnight() {
        let late_night = Daypart {
            days_of_week: vec![Weekday::Fri],
            start_minute: 22 * 60,
            end_minute: 2 * 60,
        };
        // Friday 23:15 and Saturday 01:30 fall inside; Friday 01:30 does not.
        assert!(late_night.contains(Utc.with_ymd_and_hms(2024, 5, 10, 23, 15, 0).unwrap()));
        assert!(late_night.contains(Utc.with_ymd_and_hms(2024, 5, 11, 1, 30, 0).unwrap()));
        assert!(!late_night.contains(Utc.with_ymd_and_hms(2024, 5, 10, 1, 30, 0).unwrap()));
        assert!(!late_night.contains(Utc.with_ymd_and_hms(2024, 5, 11, 3, 0, 0).unwrap()));
    }

    #[test]
    fn test_user_model_interests_merge_latent() {
        let model = UserModel {
            interest_segments: vec!["tech-computing".into()],
            latent_interest_segments: vec!["Tech-Computing".into(), "travel".into()],
            purchase_intent_segments: vec![],
        };
        assert_eq!(
            model.interests(),
            vec![Segment::new("tech-computing"), Segment::new("travel")]
        );
    }

    #[test]
    fn test_ad_event_scope_ids() {
        let mut ad = CreativeAd::new("ci", "cs", "c", vec![], "200x100");
        ad.advertiser_id = "adv".into();
        let event = AdEvent::for_ad(&ad, ConfirmationType::Viewed, Utc::now());
        assert_eq!(event.id_for(CapScope::CreativeSet), "cs");
        assert_eq!(event.id_for(CapScope::Advertiser), ad.id_for(CapScope::Advertiser));
    }
}
