mod config;
pub mod electoral;
pub mod interval;
pub mod manual;
pub mod model;
pub mod predict;
pub mod priors;
pub mod sampler;
pub mod stats;
pub mod store;
pub mod tracking;
pub mod transform;

use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use snafu::ensure;

pub use crate::config::*;
use crate::electoral::{simulate_elections, ElectionSimulation, ElectoralTable};
use crate::interval::{credible_interval, CredibleInterval};
use crate::model::{HierarchicalModel, ModelPriors};
use crate::predict::{backfill, predict_states, HistoricalBaseline, StateWinProbabilities};
use crate::priors::{propagate, PriorTable};
use crate::sampler::{coefficient_means, sample_posterior, PosteriorDraws};
use crate::transform::{transform_polls, StateIndex};

/// Everything a daily run reads.
#[derive(Debug, Clone, Copy)]
pub struct ForecastInputs<'a> {
    pub polls: &'a [RawPoll],
    /// The prior table of the previous run. None fits with the default priors.
    pub priors: Option<&'a PriorTable>,
    pub baseline: &'a HistoricalBaseline,
    pub electoral: &'a ElectoralTable,
}

/// Everything a daily run produces.
#[derive(Debug, Clone)]
pub struct ForecastOutcome {
    pub state_index: StateIndex,
    pub draws: PosteriorDraws,
    /// The prior table for the next run.
    pub next_priors: PriorTable,
    pub state_probabilities: StateWinProbabilities,
    pub simulation: ElectionSimulation,
    pub interval: CredibleInterval,
    /// The seed every random stream of the run was derived from.
    pub seed: u64,
}

fn check_settings(settings: &RunSettings) -> ForecastResult<()> {
    ensure!(
        settings.prior_sd_scale > 0.0,
        InvalidSettingSnafu {
            name: "prior_sd_scale",
            value: settings.prior_sd_scale.to_string(),
        }
    );
    ensure!(
        settings.sampler.draws > 0,
        InvalidSettingSnafu {
            name: "draws",
            value: settings.sampler.draws.to_string(),
        }
    );
    ensure!(
        settings.sampler.target_acceptance > 0.0 && settings.sampler.target_acceptance < 1.0,
        InvalidSettingSnafu {
            name: "target_acceptance",
            value: settings.sampler.target_acceptance.to_string(),
        }
    );
    Ok(())
}

/// Runs the whole forecast for one day: transformation, fit, predictive
/// simulation, Electoral College simulation and credible interval.
///
/// Arguments:
/// * `inputs` the poll feed and the reference tables
/// * `settings` the knobs of the run. With an explicit sampler seed, the
/// result is fully deterministic.
pub fn run_forecast(inputs: ForecastInputs, settings: &RunSettings) -> ForecastResult<ForecastOutcome> {
    check_settings(settings)?;
    let seed = match settings.sampler.seed {
        Some(s) => s,
        None => rand::thread_rng().gen(),
    };
    info!("run_forecast: seed {}, family {:?}", seed, settings.family);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

    let data = transform_polls(inputs.polls, &settings.transform)?;

    let priors = match inputs.priors {
        Some(table) => {
            debug!(
                "run_forecast: {} prior rows, sd scaled by {}",
                table.len(),
                settings.prior_sd_scale
            );
            let table = table.softened(settings.prior_sd_scale);
            ModelPriors::from_table(&table, settings.family, &data.state_index)
        }
        None => {
            info!("run_forecast: no previous priors, using the defaults");
            ModelPriors::defaults(settings.family, data.state_index.len())
        }
    };
    let model = HierarchicalModel::new(settings.family, &data, priors);
    let sampler_settings = SamplerSettings {
        seed: Some(rng.gen()),
        ..settings.sampler
    };
    let draws = sample_posterior(&model, &sampler_settings)?;
    for (covariate, mean) in coefficient_means(&draws) {
        debug!("run_forecast: {} effect {:.4}", covariate.prior_name(), mean);
    }
    let next_priors = propagate(&draws, &data.state_index);

    let polled = predict_states(&draws, &data, &settings.today, &mut rng)?;
    let state_probabilities = backfill(polled, inputs.baseline, &settings.backfill);

    let simulation = simulate_elections(
        &state_probabilities,
        inputs.electoral,
        settings.simulations,
        settings.majority,
        &mut rng,
    )?;
    let interval = credible_interval(
        &simulation.trials,
        settings.confidence,
        &settings.bootstrap,
        &mut rng,
    )?;
    info!(
        "run_forecast: win fraction {:.4}, {}% interval [{:.4}, {:.4}]",
        simulation.win_fraction, settings.confidence, interval.lower, interval.upper
    );

    Ok(ForecastOutcome {
        state_index: data.state_index.clone(),
        draws,
        next_priors,
        state_probabilities,
        simulation,
        interval,
        seed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::tests::*;

    fn polls() -> Vec<RawPoll> {
        let mut res = Vec::new();
        for k in 0..6 {
            res.extend(question(k, "Ohio", 55.0, 45.0));
            res.extend(question(10 + k, "Michigan", 48.0, 52.0));
            res.extend(question(20 + k, "National", 49.0, 51.0));
        }
        res
    }

    fn settings() -> RunSettings {
        let mut s = RunSettings::default();
        s.sampler.warmup = 200;
        s.sampler.draws = 200;
        s.sampler.seed = Some(2024);
        s.simulations = 2_000;
        s
    }

    #[test]
    fn full_run_is_deterministic() {
        let _ = env_logger::builder().is_test(true).try_init();
        let polls = polls();
        let baseline = HistoricalBaseline::new(vec![
            ("Texas".to_string(), 52.1),
            ("California".to_string(), 34.3),
        ]);
        let electoral = ElectoralTable::standard_2024();
        let inputs = ForecastInputs {
            polls: &polls,
            priors: None,
            baseline: &baseline,
            electoral: &electoral,
        };
        let first = run_forecast(inputs, &settings()).unwrap();
        let second = run_forecast(inputs, &settings()).unwrap();
        assert_eq!(first.simulation, second.simulation);
        assert_eq!(first.next_priors, second.next_priors);
        assert_eq!(first.state_probabilities.len(), 4);
        assert_eq!(first.state_probabilities.get("Texas"), Some(0.99));
        assert!(first.interval.lower <= first.interval.upper);

        // Yesterday's posterior as today's prior.
        let inputs = ForecastInputs {
            priors: Some(&first.next_priors),
            ..inputs
        };
        let next = run_forecast(inputs, &settings()).unwrap();
        assert!(next.next_priors.entries().iter().all(|e| e.sd > 0.0));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let polls = polls();
        let baseline = HistoricalBaseline::default();
        let electoral = ElectoralTable::standard_2024();
        let inputs = ForecastInputs {
            polls: &polls,
            priors: None,
            baseline: &baseline,
            electoral: &electoral,
        };
        let mut s = settings();
        s.prior_sd_scale = 0.0;
        assert!(matches!(
            run_forecast(inputs, &s),
            Err(ForecastError::InvalidSetting { .. })
        ));
    }
}
