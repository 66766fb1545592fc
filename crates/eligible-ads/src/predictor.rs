//! Ad predictor — scores eligible ads by how well their segments match the
//! user's intent and interest segments, then picks one by weighted draw.

use adserve_core::segment::{matches_exact, matches_parent, parent_segments};
use adserve_core::{CreativeAd, PredictorConfig, PredictorWeights, Segment};
use parking_lot::Mutex;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

pub struct AdPredictor {
    weights: PredictorWeights,
    rng: Mutex<StdRng>,
}

impl AdPredictor {
    pub fn new(config: &PredictorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            weights: config.weights.clone(),
            rng: Mutex::new(rng),
        }
    }

    pub fn score(&self, ad: &CreativeAd, interest: &[Segment], intent: &[Segment]) -> f64 {
        let w = &self.weights;
        let mut score = 0.0;
        if matches_exact(&ad.segments, intent) {
            score += w.intent_child;
        }
        if matches_parent(&ad.segments, &parent_segments(intent)) {
            score += w.intent_parent;
        }
        if matches_exact(&ad.segments, interest) {
            score += w.interest_child;
        }
        if matches_parent(&ad.segments, &parent_segments(interest)) {
            score += w.interest_parent;
        }
        if ad.is_untargeted() {
            score += w.untargeted;
        }
        score * ad.weight.max(0.0)
    }

    /// Choose one ad. Falls back to a uniform draw when no ad has a positive
    /// score.
    pub fn choose(&self, ads: &[CreativeAd], interest: &[Segment], intent: &[Segment]) -> Option<CreativeAd> {
        match ads.len() {
            0 => return None,
            1 => return ads.first().cloned(),
            _ => {}
        }

        let scores: Vec<f64> = ads.iter().map(|ad| self.score(ad, interest, intent)).collect();
        let mut rng = self.rng.lock();
        let index = match WeightedIndex::new(&scores) {
            Ok(dist) => dist.sample(&mut *rng),
            Err(e) => {
                debug!(error = %e, "no usable ad scores, choosing uniformly");
                rng.gen_range(0..ads.len())
            }
        };
        ads.get(index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predictor(seed: u64) -> AdPredictor {
        AdPredictor::new(&PredictorConfig {
            seed: Some(seed),
            ..PredictorConfig::default()
        })
    }

    fn ad(id: &str, segment: &str) -> CreativeAd {
        CreativeAd::new(id, "cs", "c", vec![segment.into()], "200x100")
    }

    fn segs(values: &[&str]) -> Vec<Segment> {
        values.iter().map(|v| Segment::new(*v)).collect()
    }

    #[test]
    fn test_score_child_and_parent_matches() {
        let p = predictor(1);
        let interest = segs(&["tech-computing"]);
        assert_eq!(p.score(&ad("a", "tech-computing"), &interest, &[]), 2.0);
        assert_eq!(p.score(&ad("b", "tech-gadgets"), &interest, &[]), 1.0);
        assert_eq!(p.score(&ad("c", "travel"), &interest, &[]), 0.0);
    }

    #[test]
    fn test_score_scaled_by_weight() {
        let p = predictor(1);
        let mut heavy = ad("a", "tech");
        heavy.weight = 3.0;
        assert_eq!(p.score(&heavy, &segs(&["tech"]), &[]), 6.0);
    }

    #[test]
    fn test_choose_empty_and_single() {
        let p = predictor(1);
        assert!(p.choose(&[], &[], &[]).is_none());
        let only = vec![ad("a", "travel")];
        assert_eq!(p.choose(&only, &[], &[]).unwrap().creative_instance_id, "a");
    }

    #[test]
    fn test_choose_never_picks_zero_score_when_others_positive() {
        let p = predictor(42);
        let ads = vec![ad("a", "travel"), ad("b", "tech-computing")];
        for _ in 0..50 {
            let chosen = p.choose(&ads, &segs(&["tech-computing"]), &[]).unwrap();
            assert_eq!(chosen.creative_instance_id, "b");
        }
    }

    #[test]
    fn test_choose_uniform_when_all_zero() {
        let p = predictor(7);
        let ads = vec![ad("a", "travel"), ad("b", "food")];
        let chosen = p.choose(&ads, &segs(&["tech"]), &[]).unwrap();
        assert!(ads.iter().any(|a| a.same_creative(&chosen)));
    }

    #[test]
    fn test_seeded_choices_are_reproducible() {
        let ads = vec![ad("a", "tech"), ad("b", "tech"), ad("c", "tech")];
        let interest = segs(&["tech"]);
        let draw = |p: &AdPredictor| -> Vec<String> {
            (0..10)
                .map(|_| p.choose(&ads, &interest, &[]).unwrap().creative_instance_id)
                .collect()
        };
        assert_eq!(draw(&predictor(9)), draw(&predictor(9)));
    }
}
