//! Prior tables, and their construction from a previous posterior.
//!
//! Today's posterior summary becomes tomorrow's prior: every sampled
//! parameter is summarized by its mean and standard deviation.

use log::{debug, info};

use crate::model::Param;
use crate::sampler::PosteriorDraws;
use crate::stats;
use crate::transform::StateIndex;

/// Standard deviations at or under 0 are replaced by this value.
pub const MIN_PRIOR_SD: f64 = 0.01;

/// One row of a prior table.
#[derive(PartialEq, Debug, Clone)]
pub struct PriorEntry {
    pub name: String,
    pub mean: f64,
    pub sd: f64,
    /// Set for the per-state offsets. The state ids are only stable within a
    /// run, so the offsets are matched by state name.
    pub state: Option<String>,
}

impl PriorEntry {
    pub fn new(name: &str, mean: f64, sd: f64) -> PriorEntry {
        PriorEntry {
            name: name.to_string(),
            mean,
            sd,
            state: None,
        }
    }

    pub fn for_state(name: &str, state: &str, mean: f64, sd: f64) -> PriorEntry {
        PriorEntry {
            state: Some(state.to_string()),
            ..PriorEntry::new(name, mean, sd)
        }
    }
}

/// Mapping from parameter name to its prior mean and standard deviation.
///
/// All the standard deviations are positive.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct PriorTable {
    entries: Vec<PriorEntry>,
}

impl PriorTable {
    pub fn new(entries: Vec<PriorEntry>) -> PriorTable {
        let entries = entries
            .into_iter()
            .map(|mut e| {
                if e.sd.is_nan() || e.sd <= 0.0 {
                    debug!("prior {}: sd {} floored to {}", e.name, e.sd, MIN_PRIOR_SD);
                    e.sd = MIN_PRIOR_SD;
                }
                e
            })
            .collect();
        PriorTable { entries }
    }

    /// The global entry with this name. Per-state rows are not returned.
    pub fn get(&self, name: &str) -> Option<&PriorEntry> {
        self.entries
            .iter()
            .find(|e| e.state.is_none() && e.name == name)
    }

    /// The offset prior of a state, if the table has one.
    pub fn state_prior(&self, state: &str) -> Option<&PriorEntry> {
        self.entries
            .iter()
            .find(|e| e.state.as_deref() == Some(state))
    }

    pub fn entries(&self) -> &[PriorEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The same table with every standard deviation multiplied by `factor`.
    pub fn softened(&self, factor: f64) -> PriorTable {
        PriorTable::new(
            self.entries
                .iter()
                .map(|e| PriorEntry {
                    sd: e.sd * factor,
                    ..e.clone()
                })
                .collect(),
        )
    }
}

/// Summarizes the posterior draws into the prior table of the next run.
///
/// The rows follow the parameter layout: mu_b0, sigma_b0, one a_offset row
/// per state (with its state name), the coefficients, then the dispersion.
pub fn propagate(draws: &PosteriorDraws, states: &StateIndex) -> PriorTable {
    let layout = draws.layout;
    let mut entries = Vec::with_capacity(layout.len());
    for p in layout.params() {
        let column = draws.column(p);
        let mean = stats::mean(&column).unwrap_or(0.0);
        let sd = stats::std_dev(&column).unwrap_or(0.0);
        let name = layout.name(p, draws.family);
        let entry = match p {
            Param::Offset(s) => match states.name(s) {
                Some(state) => PriorEntry::for_state(&name, state, mean, sd),
                None => PriorEntry::new(&name, mean, sd),
            },
            _ => PriorEntry::new(&name, mean, sd),
        };
        entries.push(entry);
    }
    let res = PriorTable::new(entries);
    info!("propagate: {} prior rows from {} draws", res.len(), draws.len());
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutcomeFamily;
    use crate::model::ParamLayout;

    #[test]
    fn non_positive_sd_is_floored() {
        let table = PriorTable::new(vec![
            PriorEntry::new("mu_b0", 0.1, 0.0),
            PriorEntry::new("month", 0.1, -2.0),
            PriorEntry::new("lv", 0.1, f64::NAN),
            PriorEntry::new("rv", 0.1, 0.3),
        ]);
        let sds: Vec<f64> = table.entries().iter().map(|e| e.sd).collect();
        assert_eq!(sds, vec![MIN_PRIOR_SD, MIN_PRIOR_SD, MIN_PRIOR_SD, 0.3]);
    }

    #[test]
    fn state_rows_are_separate_from_globals() {
        let table = PriorTable::new(vec![
            PriorEntry::for_state("a_offset[0]", "Ohio", 0.5, 0.2),
            PriorEntry::new("a_offset[0]", 9.0, 9.0),
        ]);
        assert_eq!(table.state_prior("Ohio").map(|e| e.mean), Some(0.5));
        assert_eq!(table.get("a_offset[0]").map(|e| e.mean), Some(9.0));
        assert!(table.state_prior("Iowa").is_none());
    }

    #[test]
    fn softening_scales_every_sd() {
        let table = PriorTable::new(vec![
            PriorEntry::new("mu_b0", 0.1, 0.2),
            PriorEntry::for_state("a_offset[0]", "Ohio", 0.5, 0.01),
        ]);
        let soft = table.softened(50.0);
        assert!((soft.entries()[0].sd - 10.0).abs() < 1e-12);
        assert!((soft.entries()[1].sd - 0.5).abs() < 1e-12);
        assert_eq!(soft.entries()[1].state.as_deref(), Some("Ohio"));
        assert_eq!(soft.entries()[0].mean, 0.1);
    }

    #[test]
    fn propagate_summarizes_each_parameter() {
        let layout = ParamLayout { n_states: 2 };
        let states = StateIndex::from_names(&["Ohio".to_string(), "Iowa".to_string()]);
        let mut d1: Vec<f64> = vec![0.0; layout.len()];
        let mut d2: Vec<f64> = vec![0.0; layout.len()];
        d1[0] = 1.0;
        d2[0] = 3.0;
        d1[layout.index(Param::Offset(1))] = -1.0;
        d2[layout.index(Param::Offset(1))] = 1.0;
        let draws = PosteriorDraws::from_values(OutcomeFamily::BoundedBeta, layout, vec![d1, d2]);
        let table = propagate(&draws, &states);

        assert_eq!(table.len(), layout.len());
        let mu = table.get("mu_b0").unwrap();
        assert!((mu.mean - 2.0).abs() < 1e-12);
        // Population standard deviation.
        assert!((mu.sd - 1.0).abs() < 1e-12);
        let iowa = table.state_prior("Iowa").unwrap();
        assert_eq!(iowa.name, "a_offset[1]");
        assert!((iowa.sd - 1.0).abs() < 1e-12);
        // Constant columns get the floor.
        assert_eq!(table.get("phi").unwrap().sd, MIN_PRIOR_SD);
        assert!(table.entries().iter().all(|e| e.sd > 0.0));
        assert_eq!(table.entries()[0].name, "mu_b0");
        assert_eq!(table.entries()[1].name, "sigma_b0");
    }
}
