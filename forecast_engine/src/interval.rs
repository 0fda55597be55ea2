// Bootstrap credible interval of the win fraction.

use log::debug;
use rand::Rng;
use snafu::{ensure, OptionExt};

use crate::config::*;
use crate::electoral::Trial;
use crate::stats;

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct CredibleInterval {
    pub lower: f64,
    pub upper: f64,
}

impl CredibleInterval {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, x: f64) -> bool {
        self.lower <= x && x <= self.upper
    }
}

/// Resamples the trials with replacement and returns the central
/// `confidence` percent range of the resampled win fractions.
pub fn credible_interval<R: Rng>(
    trials: &[Trial],
    confidence: f64,
    settings: &BootstrapSettings,
    rng: &mut R,
) -> ForecastResult<CredibleInterval> {
    ensure!(!trials.is_empty(), EmptySimulationSnafu {});
    ensure!(
        confidence > 0.0 && confidence < 100.0,
        InvalidSettingSnafu {
            name: "confidence",
            value: confidence.to_string(),
        }
    );
    ensure!(
        settings.resamples > 0 && settings.resample_size > 0,
        InvalidSettingSnafu {
            name: "bootstrap",
            value: format!("{}x{}", settings.resamples, settings.resample_size),
        }
    );

    let mut fractions: Vec<f64> = (0..settings.resamples)
        .map(|_| {
            let wins = (0..settings.resample_size)
                .filter(|_| trials[rng.gen_range(0..trials.len())].tracked_wins)
                .count();
            wins as f64 / settings.resample_size as f64
        })
        .collect();
    fractions.sort_by(|a, b| a.total_cmp(b));

    let tail = (100.0 - confidence) / 2.0;
    let bounds = |q: f64| {
        stats::percentile(&fractions, q).context(InvalidSettingSnafu {
            name: "bootstrap",
            value: "no resamples",
        })
    };
    let res = CredibleInterval {
        lower: bounds(tail)?,
        upper: bounds(100.0 - tail)?,
    };
    debug!(
        "credible_interval: {}% [{:.4}, {:.4}] over {} resamples",
        confidence, res.lower, res.upper, settings.resamples
    );
    Ok(res)
}
