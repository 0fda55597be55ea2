// Posterior predictive win probabilities, per state.

use log::{debug, info};
use rand::Rng;
use snafu::ensure;

use crate::config::*;
use crate::electoral::NATIONAL;
use crate::sampler::PosteriorDraws;
use crate::transform::{Covariates, ModelData};

/// Win probabilities of the tracked candidate, in insertion order.
///
/// Never contains the national pseudo-state.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct StateWinProbabilities {
    entries: Vec<(String, f64)>,
}

impl StateWinProbabilities {
    pub fn new() -> StateWinProbabilities {
        StateWinProbabilities::default()
    }

    /// Sets the probability of a state, replacing any previous value.
    pub fn insert(&mut self, state: &str, probability: f64) {
        if state == NATIONAL {
            return;
        }
        match self.entries.iter_mut().find(|(s, _)| s == state) {
            Some(e) => e.1 = probability,
            None => self.entries.push((state.to_string(), probability)),
        }
    }

    pub fn get(&self, state: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(s, _)| s == state)
            .map(|(_, p)| *p)
    }

    pub fn contains(&self, state: &str) -> bool {
        self.get(state).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(s, p)| (s.as_str(), *p))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Share of the tracked candidate in each state at the previous election,
/// in percent.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct HistoricalBaseline {
    entries: Vec<(String, f64)>,
}

impl HistoricalBaseline {
    pub fn new(entries: Vec<(String, f64)>) -> HistoricalBaseline {
        HistoricalBaseline { entries }
    }

    pub fn get(&self, state: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(s, _)| s == state)
            .map(|(_, p)| *p)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(s, p)| (s.as_str(), *p))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Rounds a probability to two decimals on the percent scale.
pub fn round_probability(p: f64) -> f64 {
    (p * 10_000.0).round() / 10_000.0
}

/// For every polled state, the fraction of posterior predictive draws in
/// which the tracked candidate gets more than half of the two-way share.
///
/// Draws that produce no valid outcome (degenerate Beta shapes) are skipped.
pub fn predict_states<R: Rng>(
    draws: &PosteriorDraws,
    data: &ModelData,
    today: &TodayScenario,
    rng: &mut R,
) -> ForecastResult<StateWinProbabilities> {
    let row = Covariates::today(data.max_month(), today);
    let params: Vec<_> = (0..draws.len()).map(|d| draws.parameters(d)).collect();
    let mut res = StateWinProbabilities::new();
    for (s, state) in data.state_index.names().iter().enumerate() {
        let mut valid = 0usize;
        let mut wins = 0usize;
        for p in params.iter() {
            let eta = p.linear_predictor(s, &row);
            if let Some(y) = draws.family.sample_outcome(eta, p.dispersion, rng) {
                if y.is_finite() {
                    valid += 1;
                    if y > 0.5 {
                        wins += 1;
                    }
                }
            }
        }
        ensure!(valid > 0, NoValidDrawsSnafu { state });
        let probability = wins as f64 / valid as f64;
        if valid < params.len() {
            debug!(
                "predict_states: {}: {} of {} draws were degenerate",
                state,
                params.len() - valid,
                params.len()
            );
        }
        debug!("predict_states: {}: {:.4}", state, probability);
        res.insert(state, round_probability(probability));
    }
    info!("predict_states: {} polled states", res.len());
    Ok(res)
}

/// Fills the states without polls from the previous election's result.
///
/// The national pseudo-state is never added.
pub fn backfill(
    mut probabilities: StateWinProbabilities,
    baseline: &HistoricalBaseline,
    policy: &BackfillPolicy,
) -> StateWinProbabilities {
    let mut filled = 0;
    for (state, pct) in baseline.iter() {
        if state == NATIONAL || probabilities.contains(state) {
            continue;
        }
        let p = if pct > policy.threshold {
            policy.high
        } else {
            policy.low
        };
        probabilities.insert(state, p);
        filled += 1;
    }
    info!("backfill: {} states filled from the historical baseline", filled);
    probabilities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{beta_shapes, HierarchicalModel, ModelPriors, Param, ParamLayout};
    use crate::sampler::sample_posterior;
    use crate::stats;
    use crate::transform::tests::*;
    use crate::transform::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn baseline() -> HistoricalBaseline {
        HistoricalBaseline::new(vec![
            ("Ohio".to_string(), 53.3),
            ("Vermont".to_string(), 30.7),
            ("Wyoming".to_string(), 69.9),
            ("Georgia".to_string(), 50.0),
            ("National".to_string(), 46.8),
        ])
    }

    #[test]
    fn backfill_uses_exact_clamp_values() {
        let mut probs = StateWinProbabilities::new();
        probs.insert("Ohio", 0.42);
        let res = backfill(probs, &baseline(), &BackfillPolicy::DEFAULT);
        // Polled states are untouched.
        assert_eq!(res.get("Ohio"), Some(0.42));
        assert_eq!(res.get("Wyoming"), Some(0.99));
        assert_eq!(res.get("Vermont"), Some(0.01));
        // The threshold is strict.
        assert_eq!(res.get("Georgia"), Some(0.01));
        assert_eq!(res.get("National"), None);
        assert_eq!(res.len(), 4);
    }

    #[test]
    fn national_is_never_stored() {
        let mut probs = StateWinProbabilities::new();
        probs.insert("National", 0.6);
        probs.insert("Iowa", 0.3);
        probs.insert("Iowa", 0.35);
        assert_eq!(probs.iter().collect::<Vec<_>>(), vec![("Iowa", 0.35)]);
    }

    #[test]
    fn rounding_to_percent_hundredths() {
        assert_eq!(round_probability(0.123456), 0.1235);
        assert_eq!(round_probability(1.0), 1.0);
        assert_eq!(round_probability(0.0), 0.0);
    }

    #[test]
    fn predicted_probabilities_follow_the_data() {
        let mut polls = Vec::new();
        for k in 0..10 {
            polls.extend(question(k, "Ohio", 58.0, 42.0));
            polls.extend(question(100 + k, "Oregon", 40.0, 60.0));
            polls.extend(question(200 + k, "National", 49.0, 51.0));
        }
        let data = transform_polls(&polls, &options()).unwrap();
        let family = OutcomeFamily::Gaussian;
        let model = HierarchicalModel::new(
            family,
            &data,
            ModelPriors::defaults(family, data.state_index.len()),
        );
        let settings = SamplerSettings {
            warmup: 300,
            draws: 300,
            seed: Some(5),
            ..SamplerSettings::DEFAULT
        };
        let draws = sample_posterior(&model, &settings).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let today = TodayScenario { sample_size: 800.0 };
        let probs = predict_states(&draws, &data, &today, &mut rng).unwrap();
        assert_eq!(probs.len(), 2);
        assert!(probs.get("National").is_none());
        for (_, p) in probs.iter() {
            assert!((0.0..=1.0).contains(&p));
        }
        assert!(probs.get("Ohio").unwrap() > probs.get("Oregon").unwrap());
    }

    #[test]
    fn degenerate_draws_are_fatal_when_all_invalid() {
        let polls = question(1, "Ohio", 55.0, 45.0);
        let data = transform_polls(&polls, &options()).unwrap();
        let layout = ParamLayout { n_states: 1 };
        // phi = -1 for every draw.
        let mut values = vec![0.0; layout.len()];
        values[layout.len() - 1] = -1.0;
        let draws = PosteriorDraws::from_values(
            OutcomeFamily::BoundedBeta,
            layout,
            vec![values.clone(), values],
        );
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let today = TodayScenario { sample_size: 2000.0 };
        let res = predict_states(&draws, &data, &today, &mut rng);
        assert!(matches!(res, Err(ForecastError::NoValidDraws { .. })));
    }

    #[test]
    fn beta_predictions_follow_poll_share() {
        let polls = varied_polls(
            &[("Ohio", 55.0), ("Oregon", 43.0), ("National", 49.5), ("Georgia", 50.5)],
            12,
        );
        let data = transform_polls(&polls, &options()).unwrap();
        let family = OutcomeFamily::BoundedBeta;
        let model = HierarchicalModel::new(
            family,
            &data,
            ModelPriors::defaults(family, data.state_index.len()),
        );
        let settings = SamplerSettings {
            warmup: 500,
            draws: 500,
            seed: Some(5),
            ..SamplerSettings::DEFAULT
        };
        let draws = sample_posterior(&model, &settings).unwrap();
        assert_eq!(draws.diagnostics.non_finite, 0);

        // Every draw gives valid shapes for today's poll.
        let today = RunSettings::default().today;
        let row = Covariates::today(data.max_month(), &today);
        for d in 0..draws.len() {
            let p = draws.parameters(d);
            for s in 0..data.state_index.len() {
                let mean = stats::logistic(p.linear_predictor(s, &row));
                assert!(beta_shapes(mean, p.dispersion).is_some(), "draw {}", d);
            }
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let probs = predict_states(&draws, &data, &today, &mut rng).unwrap();
        assert_eq!(probs.len(), 3);
        for (_, p) in probs.iter() {
            assert!((0.0..=1.0).contains(&p));
        }
        let ohio = probs.get("Ohio").unwrap();
        let georgia = probs.get("Georgia").unwrap();
        let oregon = probs.get("Oregon").unwrap();
        assert!(ohio > georgia, "{} {}", ohio, georgia);
        assert!(georgia > oregon, "{} {}", georgia, oregon);
    }

    #[test]
    fn degenerate_beta_draws_are_skipped() {
        assert_eq!(beta_shapes(0.4, 10.0), Some((4.0, 6.0)));
        assert_eq!(beta_shapes(0.5, -1.0), None);
        assert_eq!(beta_shapes(0.0, 10.0), None);
        assert_eq!(beta_shapes(0.5, f64::INFINITY), None);

        let polls = question(1, "Ohio", 55.0, 45.0);
        let data = transform_polls(&polls, &options()).unwrap();
        let layout = ParamLayout { n_states: 1 };
        let mut degenerate = vec![0.0; layout.len()];
        degenerate[layout.index(Param::Dispersion)] = -1.0;
        let mut valid = degenerate.clone();
        valid[layout.index(Param::MuB0)] = 2.0;
        valid[layout.index(Param::Dispersion)] = 400.0;
        let draws = PosteriorDraws::from_values(
            OutcomeFamily::BoundedBeta,
            layout,
            vec![degenerate.clone(), valid, degenerate],
        );
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let today = TodayScenario { sample_size: 2000.0 };
        let probs = predict_states(&draws, &data, &today, &mut rng).unwrap();
        // Only the valid draw counts, and its mean share is about 0.88.
        assert_eq!(probs.get("Ohio"), Some(1.0));
    }
}
