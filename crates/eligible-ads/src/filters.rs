//! Candidate pool filters. Every filter returns a stable-ordered subset of
//! its input.

use std::collections::HashSet;

use adserve_core::CreativeAd;
use tracing::debug;

/// Drops repeated creatives, keeping the first occurrence.
pub fn deduplicate(ads: Vec<CreativeAd>) -> Vec<CreativeAd> {
    let mut seen = HashSet::with_capacity(ads.len());
    ads.into_iter()
        .filter(|ad| seen.insert(ad.creative_instance_id.clone()))
        .collect()
}

/// Drops the last served creative unless it is the only candidate left.
pub fn exclude_last_served(ads: Vec<CreativeAd>, last_served: Option<&CreativeAd>) -> Vec<CreativeAd> {
    let Some(last_served) = last_served else {
        return ads;
    };
    if ads.len() <= 1 {
        return ads;
    }

    let remaining: Vec<CreativeAd> = ads
        .iter()
        .filter(|ad| !ad.same_creative(last_served))
        .cloned()
        .collect();
    if remaining.is_empty() {
        return ads;
    }
    if remaining.len() < ads.len() {
        debug!(
            creative_instance_id = %last_served.creative_instance_id,
            "excluded last served ad"
        );
    }
    remaining
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ad(id: &str) -> CreativeAd {
        CreativeAd::new(id, "cs", "c", vec!["tech".into()], "200x100")
    }

    fn ids(ads: &[CreativeAd]) -> Vec<&str> {
        ads.iter().map(|a| a.creative_instance_id.as_str()).collect()
    }

    #[test]
    fn test_deduplicate_keeps_first() {
        let mut second_a = ad("a");
        second_a.weight = 5.0;
        let ads = deduplicate(vec![ad("a"), ad("b"), second_a, ad("c"), ad("b")]);
        assert_eq!(ids(&ads), vec!["a", "b", "c"]);
        assert_eq!(ads[0].weight, 1.0);
    }

    #[test]
    fn test_deduplicate_idempotent() {
        let once = deduplicate(vec![ad("a"), ad("a"), ad("b")]);
        let twice = deduplicate(once.clone());
        assert_eq!(ids(&once), ids(&twice));
    }

    #[test]
    fn test_exclude_last_served() {
        let last = ad("b");
        let ads = exclude_last_served(vec![ad("a"), ad("b"), ad("c")], Some(&last));
        assert_eq!(ids(&ads), vec!["a", "c"]);
    }

    #[test]
    fn test_sole_candidate_may_repeat() {
        let last = ad("a");
        let ads = exclude_last_served(vec![ad("a")], Some(&last));
        assert_eq!(ids(&ads), vec!["a"]);
    }

    #[test]
    fn test_never_empties_pool_of_duplicates() {
        let last = ad("a");
        let ads = exclude_last_served(vec![ad("a"), ad("a")], Some(&last));
        assert_eq!(ads.len(), 2);
    }

    #[test]
    fn test_no_last_served_is_noop() {
        let ads = exclude_last_served(vec![ad("a"), ad("b")], None);
        assert_eq!(ids(&ads), vec!["a", "b"]);
    }
}
