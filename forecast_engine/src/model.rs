//! The hierarchical regression over states.
//!
//! ```text
//! intercept[s] = mu_b0 + a_offset[s] * sigma_b0
//! eta_i        = intercept[state_i] + sum_k coefficient_k * x_ik
//! ```
//!
//! The per-state offsets are centered at zero a priori (unless yesterday's
//! posterior says otherwise): standard normal for the Gaussian family and
//! N(0, 10) for the bounded Beta family. sigma_b0 sets how far the states
//! spread around mu_b0.

use rand::Rng;
use rand_distr::{Beta, Distribution, Normal};

use crate::config::*;
use crate::priors::PriorTable;
use crate::stats;
use crate::transform::*;

/// Outcomes of the bounded family are kept this far from 0 and 1.
const OUTCOME_EPSILON: f64 = 1e-6;

impl OutcomeFamily {
    /// Name of the dispersion parameter in the prior table.
    pub fn dispersion_name(&self) -> &'static str {
        match self {
            OutcomeFamily::Gaussian => "error",
            OutcomeFamily::BoundedBeta => "phi",
        }
    }

    /// Whether the dispersion parameter lives on the positive half-line.
    pub fn positive_dispersion(&self) -> bool {
        matches!(self, OutcomeFamily::Gaussian)
    }

    pub fn log_likelihood(&self, y: f64, eta: f64, dispersion: f64) -> f64 {
        match self {
            OutcomeFamily::Gaussian => {
                if dispersion <= 0.0 {
                    return f64::NEG_INFINITY;
                }
                stats::normal_ln_pdf(y, eta, dispersion)
            }
            OutcomeFamily::BoundedBeta => match beta_shapes(stats::logistic(eta), dispersion) {
                Some((a, b)) => {
                    let y = y.clamp(OUTCOME_EPSILON, 1.0 - OUTCOME_EPSILON);
                    stats::beta_ln_pdf(y, a, b)
                }
                None => f64::NEG_INFINITY,
            },
        }
    }

    /// Draws one outcome from the likelihood. None for degenerate parameters.
    pub fn sample_outcome<R: Rng>(&self, eta: f64, dispersion: f64, rng: &mut R) -> Option<f64> {
        match self {
            OutcomeFamily::Gaussian => Normal::new(eta, dispersion)
                .ok()
                .map(|d| d.sample(rng)),
            OutcomeFamily::BoundedBeta => {
                let (a, b) = beta_shapes(stats::logistic(eta), dispersion)?;
                Beta::new(a, b).ok().map(|d| d.sample(rng))
            }
        }
    }
}

/// Beta shape parameters from a mean and a dispersion.
///
/// Degenerate parameterizations (a <= 0 or b <= 0) have zero likelihood and
/// are reported as None.
pub fn beta_shapes(mean: f64, phi: f64) -> Option<(f64, f64)> {
    let a = mean * phi;
    let b = phi - a;
    if a > 0.0 && b > 0.0 && a.is_finite() && b.is_finite() {
        Some((a, b))
    } else {
        None
    }
}

/// A named model parameter.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Param {
    MuB0,
    SigmaB0,
    Offset(usize),
    Coefficient(Covariate),
    Dispersion,
}

/// Position of each parameter in a flat parameter vector.
///
/// Order: mu_b0, sigma_b0, a_offset[0..n], coefficients, dispersion.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct ParamLayout {
    pub n_states: usize,
}

impl ParamLayout {
    pub fn len(&self) -> usize {
        3 + self.n_states + NUM_COVARIATES
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn index(&self, p: Param) -> usize {
        match p {
            Param::MuB0 => 0,
            Param::SigmaB0 => 1,
            Param::Offset(s) => 2 + s,
            Param::Coefficient(c) => 2 + self.n_states + c.index(),
            Param::Dispersion => 2 + self.n_states + NUM_COVARIATES,
        }
    }

    pub fn params(&self) -> Vec<Param> {
        let mut res = vec![Param::MuB0, Param::SigmaB0];
        res.extend((0..self.n_states).map(Param::Offset));
        res.extend(Covariate::ALL.iter().map(|c| Param::Coefficient(*c)));
        res.push(Param::Dispersion);
        res
    }

    pub fn name(&self, p: Param, family: OutcomeFamily) -> String {
        match p {
            Param::MuB0 => "mu_b0".to_string(),
            Param::SigmaB0 => "sigma_b0".to_string(),
            Param::Offset(s) => format!("a_offset[{}]", s),
            Param::Coefficient(c) => c.prior_name().to_string(),
            Param::Dispersion => family.dispersion_name().to_string(),
        }
    }
}

/// Typed view over one flat parameter vector.
#[derive(PartialEq, Debug, Clone)]
pub struct ModelParameters {
    pub mu_b0: f64,
    pub sigma_b0: f64,
    pub offsets: Vec<f64>,
    pub coefficients: [f64; NUM_COVARIATES],
    pub dispersion: f64,
}

impl ModelParameters {
    pub fn from_slice(layout: &ParamLayout, values: &[f64]) -> ModelParameters {
        let mut coefficients = [0.0; NUM_COVARIATES];
        for c in Covariate::ALL {
            coefficients[c.index()] = values[layout.index(Param::Coefficient(c))];
        }
        ModelParameters {
            mu_b0: values[layout.index(Param::MuB0)],
            sigma_b0: values[layout.index(Param::SigmaB0)],
            offsets: values[2..2 + layout.n_states].to_vec(),
            coefficients,
            dispersion: values[layout.index(Param::Dispersion)],
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        let mut res = vec![self.mu_b0, self.sigma_b0];
        res.extend(self.offsets.iter());
        res.extend(self.coefficients.iter());
        res.push(self.dispersion);
        res
    }

    /// The partially pooled intercept of a state.
    pub fn intercept(&self, state: usize) -> f64 {
        self.mu_b0 + self.offsets[state] * self.sigma_b0
    }

    pub fn linear_predictor(&self, state: usize, row: &Covariates) -> f64 {
        self.intercept(state) + row.dot(&self.coefficients)
    }
}

/// Prior distribution of one parameter. Densities are up to a constant.
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum PriorDist {
    Normal { mean: f64, sd: f64 },
    HalfNormal { scale: f64 },
    HalfCauchy { scale: f64 },
}

impl PriorDist {
    pub fn log_density(&self, x: f64) -> f64 {
        match *self {
            PriorDist::Normal { mean, sd } => {
                let z = (x - mean) / sd;
                -sd.ln() - 0.5 * z * z
            }
            PriorDist::HalfNormal { scale } => {
                if x < 0.0 {
                    return f64::NEG_INFINITY;
                }
                let z = x / scale;
                -scale.ln() - 0.5 * z * z
            }
            PriorDist::HalfCauchy { scale } => {
                if x < 0.0 {
                    return f64::NEG_INFINITY;
                }
                let z = x / scale;
                -scale.ln() - (1.0 + z * z).ln()
            }
        }
    }

    /// A typical value, used to start the chain.
    pub fn center(&self) -> f64 {
        match *self {
            PriorDist::Normal { mean, .. } => mean,
            PriorDist::HalfNormal { scale } => scale,
            PriorDist::HalfCauchy { scale } => scale,
        }
    }

    /// A typical spread, used to size the first proposals.
    pub fn spread(&self) -> f64 {
        match *self {
            PriorDist::Normal { sd, .. } => sd,
            PriorDist::HalfNormal { scale } => scale,
            PriorDist::HalfCauchy { scale } => scale,
        }
    }
}

/// The priors of every parameter of a fit.
#[derive(PartialEq, Debug, Clone)]
pub struct ModelPriors {
    pub mu_b0: PriorDist,
    pub sigma_b0: PriorDist,
    pub offsets: Vec<PriorDist>,
    pub coefficients: [PriorDist; NUM_COVARIATES],
    pub dispersion: PriorDist,
}

const STANDARD_NORMAL: PriorDist = PriorDist::Normal { mean: 0.0, sd: 1.0 };

impl ModelPriors {
    /// The priors used when no previous posterior is available.
    pub fn defaults(family: OutcomeFamily, n_states: usize) -> ModelPriors {
        let mut coefficients = [STANDARD_NORMAL; NUM_COVARIATES];
        for c in Covariate::ALL {
            let sd = match (family, c) {
                (_, Covariate::Month) => 0.1,
                (
                    OutcomeFamily::Gaussian,
                    Covariate::LivePhone
                    | Covariate::OnlinePanel
                    | Covariate::AppPanel
                    | Covariate::OtherMethod,
                ) => 0.1,
                (OutcomeFamily::Gaussian, _) => 1.0,
                (OutcomeFamily::BoundedBeta, Covariate::SampleSize) => 10.0,
                (OutcomeFamily::BoundedBeta, _) => 20.0,
            };
            coefficients[c.index()] = PriorDist::Normal { mean: 0.0, sd };
        }
        let (sigma_b0, dispersion) = match family {
            OutcomeFamily::Gaussian => (
                PriorDist::HalfCauchy { scale: 5.0 },
                PriorDist::HalfNormal { scale: 1.0 },
            ),
            OutcomeFamily::BoundedBeta => (
                PriorDist::HalfCauchy { scale: 1.0 },
                PriorDist::Normal {
                    mean: 100.0,
                    sd: 1.0,
                },
            ),
        };
        let offset = match family {
            OutcomeFamily::Gaussian => STANDARD_NORMAL,
            OutcomeFamily::BoundedBeta => PriorDist::Normal { mean: 0.0, sd: 10.0 },
        };
        ModelPriors {
            mu_b0: STANDARD_NORMAL,
            sigma_b0,
            offsets: vec![offset; n_states],
            coefficients,
            dispersion,
        }
    }

    /// Priors read from a previous posterior summary. Entries missing from
    /// the table fall back to the defaults.
    ///
    /// The scale parameters (sigma_b0, error) use the previous posterior mean
    /// as the scale of their half distribution.
    pub fn from_table(table: &PriorTable, family: OutcomeFamily, states: &StateIndex) -> ModelPriors {
        let mut res = ModelPriors::defaults(family, states.len());
        let normal = |name: &str, default: PriorDist| match table.get(name) {
            Some(e) => PriorDist::Normal {
                mean: e.mean,
                sd: e.sd,
            },
            None => default,
        };
        let positive_mean = |name: &str| table.get(name).map(|e| e.mean).filter(|m| *m > 0.0);

        res.mu_b0 = normal("mu_b0", res.mu_b0);
        if let Some(scale) = positive_mean("sigma_b0") {
            res.sigma_b0 = PriorDist::HalfCauchy { scale };
        }
        for (s, name) in states.names().iter().enumerate() {
            if let Some(e) = table.state_prior(name) {
                res.offsets[s] = PriorDist::Normal {
                    mean: e.mean,
                    sd: e.sd,
                };
            }
        }
        for c in Covariate::ALL {
            res.coefficients[c.index()] = normal(c.prior_name(), res.coefficients[c.index()]);
        }
        res.dispersion = match family {
            OutcomeFamily::Gaussian => match positive_mean("error") {
                Some(scale) => PriorDist::HalfNormal { scale },
                None => res.dispersion,
            },
            OutcomeFamily::BoundedBeta => normal("phi", res.dispersion),
        };
        res
    }

    pub fn get(&self, p: Param) -> PriorDist {
        match p {
            Param::MuB0 => self.mu_b0,
            Param::SigmaB0 => self.sigma_b0,
            Param::Offset(s) => self.offsets[s],
            Param::Coefficient(c) => self.coefficients[c.index()],
            Param::Dispersion => self.dispersion,
        }
    }
}

/// The model bound to one day of data.
#[derive(Debug, Clone)]
pub struct HierarchicalModel<'a> {
    pub family: OutcomeFamily,
    pub data: &'a ModelData,
    pub priors: ModelPriors,
    pub layout: ParamLayout,
}

impl<'a> HierarchicalModel<'a> {
    pub fn new(family: OutcomeFamily, data: &'a ModelData, priors: ModelPriors) -> HierarchicalModel<'a> {
        HierarchicalModel {
            family,
            data,
            priors,
            layout: ParamLayout {
                n_states: data.state_index.len(),
            },
        }
    }

    pub fn log_prior(&self, values: &[f64]) -> f64 {
        self.layout
            .params()
            .iter()
            .map(|p| self.priors.get(*p).log_density(values[self.layout.index(*p)]))
            .sum()
    }

    pub fn log_likelihood(&self, values: &[f64]) -> f64 {
        let params = ModelParameters::from_slice(&self.layout, values);
        let mut total = 0.0;
        for (i, row) in self.data.rows.iter().enumerate() {
            let eta = params.linear_predictor(self.data.states[i], row);
            total += self
                .family
                .log_likelihood(self.data.outcome[i], eta, params.dispersion);
        }
        total
    }

    pub fn log_posterior(&self, values: &[f64]) -> f64 {
        let lp = self.log_prior(values);
        if !lp.is_finite() {
            return f64::NEG_INFINITY;
        }
        lp + self.log_likelihood(values)
    }

    /// A starting point close to the data: the intercept at the mean share,
    /// everything else at its prior center.
    pub fn initial_values(&self) -> Vec<f64> {
        let mut values: Vec<f64> = self
            .layout
            .params()
            .iter()
            .map(|p| self.priors.get(*p).center())
            .collect();
        let mean_share = stats::mean(&self.data.outcome).unwrap_or(0.5);
        values[self.layout.index(Param::MuB0)] = match self.family {
            OutcomeFamily::Gaussian => mean_share,
            OutcomeFamily::BoundedBeta => {
                stats::logit(mean_share.clamp(OUTCOME_EPSILON, 1.0 - OUTCOME_EPSILON))
            }
        };
        values[self.layout.index(Param::SigmaB0)] = 0.1;
        for c in Covariate::ALL {
            values[self.layout.index(Param::Coefficient(c))] = 0.0;
        }
        let dispersion = self.layout.index(Param::Dispersion);
        values[dispersion] = match self.family {
            OutcomeFamily::Gaussian => stats::std_dev(&self.data.outcome)
                .unwrap_or(0.05)
                .max(0.01),
            OutcomeFamily::BoundedBeta if values[dispersion] <= 0.0 => 100.0,
            OutcomeFamily::BoundedBeta => values[dispersion],
        };
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::priors::PriorEntry;

    #[test]
    fn degenerate_beta_shapes_have_zero_likelihood() {
        assert_eq!(beta_shapes(0.5, -3.0), None);
        assert_eq!(beta_shapes(0.5, 0.0), None);
        assert_eq!(beta_shapes(1.0, 10.0), None);
        assert_eq!(beta_shapes(0.25, 8.0), Some((2.0, 6.0)));
        let ll = OutcomeFamily::BoundedBeta.log_likelihood(0.5, 0.0, -10.0);
        assert_eq!(ll, f64::NEG_INFINITY);
    }

    #[test]
    fn beta_likelihood_peaks_near_the_mean() {
        let fam = OutcomeFamily::BoundedBeta;
        let at_mean = fam.log_likelihood(0.5, 0.0, 100.0);
        let off = fam.log_likelihood(0.6, 0.0, 100.0);
        assert!(at_mean > off);
        // Boundary outcomes stay finite.
        assert!(fam.log_likelihood(1.0, 0.0, 100.0).is_finite());
    }

    #[test]
    fn gaussian_likelihood_requires_positive_scale() {
        let fam = OutcomeFamily::Gaussian;
        assert_eq!(fam.log_likelihood(0.5, 0.5, 0.0), f64::NEG_INFINITY);
        assert!(fam.log_likelihood(0.5, 0.5, 0.1) > fam.log_likelihood(0.7, 0.5, 0.1));
    }

    #[test]
    fn layout_round_trip() {
        let layout = ParamLayout { n_states: 3 };
        let values: Vec<f64> = (0..layout.len()).map(|i| i as f64).collect();
        let params = ModelParameters::from_slice(&layout, &values);
        assert_eq!(params.offsets, vec![2.0, 3.0, 4.0]);
        assert_eq!(params.coefficients[0], 5.0);
        assert_eq!(params.dispersion, 16.0);
        assert_eq!(params.to_vec(), values);
        assert_eq!(
            layout.name(Param::Offset(2), OutcomeFamily::Gaussian),
            "a_offset[2]"
        );
        assert_eq!(layout.name(Param::Dispersion, OutcomeFamily::BoundedBeta), "phi");
    }

    #[test]
    fn partial_pooling_intercept() {
        let params = ModelParameters {
            mu_b0: 0.4,
            sigma_b0: 0.5,
            offsets: vec![1.0, -2.0],
            coefficients: [0.0; NUM_COVARIATES],
            dispersion: 0.1,
        };
        assert!((params.intercept(0) - 0.9).abs() < 1e-12);
        assert!((params.intercept(1) + 0.6).abs() < 1e-12);
    }

    #[test]
    fn half_priors_reject_negative_values() {
        assert_eq!(
            PriorDist::HalfCauchy { scale: 1.0 }.log_density(-0.1),
            f64::NEG_INFINITY
        );
        assert_eq!(
            PriorDist::HalfNormal { scale: 1.0 }.log_density(-0.1),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn priors_come_from_the_table() {
        let states = StateIndex::from_names(&["Ohio".to_string(), "Iowa".to_string()]);
        let table = PriorTable::new(vec![
            PriorEntry::new("mu_b0", 0.2, 0.3),
            PriorEntry::new("sigma_b0", 0.7, 0.1),
            PriorEntry::new("month", -0.01, 0.02),
            PriorEntry::new("phi", 250.0, 12.0),
            PriorEntry::for_state("a_offset[5]", "Iowa", 0.4, 0.5),
        ]);
        let priors = ModelPriors::from_table(&table, OutcomeFamily::BoundedBeta, &states);
        assert_eq!(priors.mu_b0, PriorDist::Normal { mean: 0.2, sd: 0.3 });
        assert_eq!(priors.sigma_b0, PriorDist::HalfCauchy { scale: 0.7 });
        assert_eq!(
            priors.get(Param::Coefficient(Covariate::Month)),
            PriorDist::Normal {
                mean: -0.01,
                sd: 0.02
            }
        );
        assert_eq!(priors.offsets[0], PriorDist::Normal { mean: 0.0, sd: 10.0 });
        assert_eq!(priors.offsets[1], PriorDist::Normal { mean: 0.4, sd: 0.5 });
        let gaussian = ModelPriors::from_table(&table, OutcomeFamily::Gaussian, &states);
        assert_eq!(gaussian.offsets[0], STANDARD_NORMAL);
        assert_eq!(
            priors.dispersion,
            PriorDist::Normal {
                mean: 250.0,
                sd: 12.0
            }
        );
        // Untouched entries keep their default.
        assert_eq!(
            priors.get(Param::Coefficient(Covariate::SampleSize)),
            PriorDist::Normal { mean: 0.0, sd: 10.0 }
        );
    }
}
