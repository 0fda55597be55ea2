//! Posterior sampling by adaptive random-walk Metropolis.
//!
//! The offsets, sigma_b0 and the dispersion move one at a time. Scale
//! parameters (sigma_b0, and the Gaussian error) move on the log scale.
//! mu_b0 and the coefficients move together along the directions of their
//! warm-up covariance. Two more moves change mu_b0 or sigma_b0 together with
//! all the offsets while keeping every state intercept.
//!
//! The proposal widths and the block covariance adapt during warm-up only,
//! so the retained draws come from a fixed Markov kernel.
//!
//! The linear predictor and the log-likelihood of every row are cached: an
//! offset proposal only touches the rows of its state.

use log::{debug, info, warn};
use nalgebra::DMatrix;
use rand::Rng;
use rand::SeedableRng;
use rand_distr::StandardNormal;
use rand_xoshiro::Xoshiro256PlusPlus;
use snafu::ensure;

use crate::config::*;
use crate::model::*;
use crate::stats;
use crate::transform::{Covariate, NUM_COVARIATES};

/// Effective sample sizes under this value are reported.
const LOW_ESS: f64 = 100.0;
const MIN_LOG_STEP: f64 = -25.0;
const MAX_LOG_STEP: f64 = 5.0;
/// The cached linear predictors are recomputed this often.
const REFRESH_EVERY: usize = 100;

/// Mixing statistics of one chain. None of them stops the run.
#[derive(PartialEq, Debug, Clone)]
pub struct SamplerDiagnostics {
    pub names: Vec<String>,
    /// Acceptance rate of each parameter during the sampling phase. For mu_b0
    /// and the coefficients, the rate of the block direction at their rank.
    pub acceptance: Vec<f64>,
    pub ess: Vec<f64>,
    /// Proposals whose log density was not finite (rejected).
    pub non_finite: usize,
}

impl SamplerDiagnostics {
    pub fn min_ess(&self) -> f64 {
        self.ess.iter().cloned().fold(f64::INFINITY, f64::min)
    }

    pub fn low_ess_params(&self) -> Vec<(&str, f64)> {
        self.names
            .iter()
            .zip(self.ess.iter())
            .filter(|(_, ess)| **ess < LOW_ESS)
            .map(|(n, ess)| (n.as_str(), *ess))
            .collect()
    }

    pub fn log_summary(&self) {
        info!(
            "sampler: min ESS {:.1}, {} rejected non-finite proposals",
            self.min_ess(),
            self.non_finite
        );
        let low = self.low_ess_params();
        if !low.is_empty() {
            warn!(
                "sampler: {} parameter(s) with an effective sample size under {}: {:?}",
                low.len(),
                LOW_ESS,
                low
            );
        }
        for (name, rate) in self.names.iter().zip(self.acceptance.iter()) {
            if *rate < 0.05 || *rate > 0.9 {
                warn!("sampler: acceptance rate of {} is {:.3}", name, rate);
            }
        }
    }
}

/// The retained draws of a fit, one flat parameter vector per draw.
#[derive(PartialEq, Debug, Clone)]
pub struct PosteriorDraws {
    pub family: OutcomeFamily,
    pub layout: ParamLayout,
    pub draws: Vec<Vec<f64>>,
    pub diagnostics: SamplerDiagnostics,
}

impl PosteriorDraws {
    /// Wraps externally produced draws. Acceptance rates are unknown.
    pub fn from_values(family: OutcomeFamily, layout: ParamLayout, draws: Vec<Vec<f64>>) -> PosteriorDraws {
        let names: Vec<String> = layout
            .params()
            .iter()
            .map(|p| layout.name(*p, family))
            .collect();
        let mut res = PosteriorDraws {
            family,
            layout,
            draws,
            diagnostics: SamplerDiagnostics {
                acceptance: vec![f64::NAN; names.len()],
                ess: Vec::new(),
                names,
                non_finite: 0,
            },
        };
        res.diagnostics.ess = layout
            .params()
            .iter()
            .map(|p| stats::effective_sample_size(&res.column(*p)))
            .collect();
        res
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    pub fn parameters(&self, draw: usize) -> ModelParameters {
        ModelParameters::from_slice(&self.layout, &self.draws[draw])
    }

    pub fn column(&self, p: Param) -> Vec<f64> {
        let idx = self.layout.index(p);
        self.draws.iter().map(|d| d[idx]).collect()
    }
}

enum Step {
    Accepted,
    Rejected,
    NonFinite,
}

/// Length of the regression block: mu_b0, then one coefficient per covariate.
const BLOCK_LEN: usize = 1 + NUM_COVARIATES;
/// A covariance window needs at least this many warm-up draws.
const MIN_WINDOW_DRAWS: usize = 20;

fn block_params() -> [Param; BLOCK_LEN] {
    let mut res = [Param::MuB0; BLOCK_LEN];
    for c in Covariate::ALL {
        res[1 + c.index()] = Param::Coefficient(c);
    }
    res
}

/// Ends of the warm-up windows after which the covariance of the regression
/// block is estimated again. Each window is twice as long as the previous one.
fn adaptation_windows(warmup: usize) -> Vec<usize> {
    let first = warmup / 8;
    if first < MIN_WINDOW_DRAWS {
        return Vec::new();
    }
    vec![first, 3 * first, 7 * first]
}

/// Cholesky factor of the covariance of the regression block over one
/// warm-up window, shrunk towards its diagonal.
///
/// Elements that did not move in the window keep a small share of their
/// previous proposal variance. None if the matrix is not positive definite.
fn block_factor(draws: &[[f64; BLOCK_LEN]], previous: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let n = draws.len();
    if n < MIN_WINDOW_DRAWS {
        return None;
    }
    let mut mean = [0.0; BLOCK_LEN];
    for d in draws.iter() {
        for k in 0..BLOCK_LEN {
            mean[k] += d[k] / n as f64;
        }
    }
    let mut cov = DMatrix::<f64>::zeros(BLOCK_LEN, BLOCK_LEN);
    for d in draws.iter() {
        for a in 0..BLOCK_LEN {
            for b in 0..BLOCK_LEN {
                cov[(a, b)] += (d[a] - mean[a]) * (d[b] - mean[b]) / (n - 1) as f64;
            }
        }
    }
    let shrink = 5.0 / (n as f64 + 5.0);
    let mut reg = cov.scale(1.0 - shrink);
    for k in 0..BLOCK_LEN {
        let floor = 1e-4 * previous.row(k).norm_squared();
        reg[(k, k)] += shrink * cov[(k, k)].max(floor);
    }
    if reg.iter().any(|x| !x.is_finite()) {
        return None;
    }
    reg.cholesky().map(|c| c.l())
}

// Invariant: eta[i] and row_ll[i] are the linear predictor and log-likelihood
// of row i at theta.
struct Chain<'m, 'd> {
    model: &'m HierarchicalModel<'d>,
    theta: Vec<f64>,
    eta: Vec<f64>,
    row_ll: Vec<f64>,
    rows_by_state: Vec<Vec<usize>>,
    // Lower triangular. Column j is the j-th direction of the regression block.
    factor: DMatrix<f64>,
    // Change of each row's linear predictor along each block direction.
    row_effects: Vec<Vec<f64>>,
    // (row, proposed eta, proposed log-likelihood)
    scratch: Vec<(usize, f64, f64)>,
}

impl<'m, 'd> Chain<'m, 'd> {
    fn new(model: &'m HierarchicalModel<'d>, theta: Vec<f64>, factor: DMatrix<f64>) -> Chain<'m, 'd> {
        let mut rows_by_state: Vec<Vec<usize>> = vec![Vec::new(); model.layout.n_states];
        for (i, s) in model.data.states.iter().enumerate() {
            rows_by_state[*s].push(i);
        }
        let n = model.data.len();
        let mut chain = Chain {
            model,
            theta,
            eta: vec![0.0; n],
            row_ll: vec![0.0; n],
            rows_by_state,
            factor: DMatrix::zeros(BLOCK_LEN, BLOCK_LEN),
            row_effects: Vec::new(),
            scratch: Vec::with_capacity(n),
        };
        chain.set_factor(factor);
        chain.refresh();
        chain
    }

    fn set_factor(&mut self, factor: DMatrix<f64>) {
        let data = self.model.data;
        self.row_effects = (0..BLOCK_LEN)
            .map(|j| {
                data.rows
                    .iter()
                    .map(|row| {
                        factor[(0, j)]
                            + Covariate::ALL
                                .iter()
                                .map(|c| factor[(1 + c.index(), j)] * row.get(*c))
                                .sum::<f64>()
                    })
                    .collect()
            })
            .collect();
        self.factor = factor;
    }

    fn refresh(&mut self) {
        let params = ModelParameters::from_slice(&self.model.layout, &self.theta);
        let data = self.model.data;
        for (i, row) in data.rows.iter().enumerate() {
            self.eta[i] = params.linear_predictor(data.states[i], row);
            self.row_ll[i] =
                self.model
                    .family
                    .log_likelihood(data.outcome[i], self.eta[i], params.dispersion);
        }
    }

    fn log_density(&self) -> f64 {
        self.model.log_prior(&self.theta) + self.row_ll.iter().sum::<f64>()
    }

    fn value(&self, p: Param) -> f64 {
        self.theta[self.model.layout.index(p)]
    }

    /// The regression block as seen by the data: the first element is the
    /// average state intercept rather than mu_b0, which also moves with the
    /// offsets.
    fn block_values(&self) -> [f64; BLOCK_LEN] {
        let mut res = [0.0; BLOCK_LEN];
        for (k, p) in block_params().iter().enumerate() {
            res[k] = self.value(*p);
        }
        let n_states = self.model.layout.n_states;
        if n_states > 0 {
            let mean_offset = (0..n_states)
                .map(|s| self.value(Param::Offset(s)))
                .sum::<f64>()
                / n_states as f64;
            res[0] += self.value(Param::SigmaB0) * mean_offset;
        }
        res
    }

    fn is_log_scale(&self, p: Param) -> bool {
        match p {
            Param::SigmaB0 => true,
            Param::Dispersion => self.model.family.positive_dispersion(),
            _ => false,
        }
    }

    fn prior_delta(&self, changes: &[(Param, f64)]) -> f64 {
        changes
            .iter()
            .map(|(p, new)| {
                let prior = self.model.priors.get(*p);
                prior.log_density(*new) - prior.log_density(self.value(*p))
            })
            .sum()
    }

    /// Metropolis decision. The proposed rows are in `scratch`.
    fn accept_or_reject<R: Rng>(&mut self, changes: &[(Param, f64)], log_ratio: f64, rng: &mut R) -> Step {
        if !log_ratio.is_finite() {
            return Step::NonFinite;
        }
        let u: f64 = rng.gen();
        if u.ln() < log_ratio {
            for (p, new) in changes.iter() {
                let idx = self.model.layout.index(*p);
                self.theta[idx] = *new;
            }
            for (i, e, ll) in self.scratch.iter() {
                self.eta[*i] = *e;
                self.row_ll[*i] = *ll;
            }
            Step::Accepted
        } else {
            Step::Rejected
        }
    }

    /// Single-site move of sigma_b0, an offset or the dispersion.
    fn update<R: Rng>(&mut self, p: Param, log_step: f64, rng: &mut R) -> Step {
        let old = self.value(p);
        let z: f64 = rng.sample(StandardNormal);
        let step = log_step.exp();
        let (new, log_jacobian) = if self.is_log_scale(p) {
            let u = old.ln() + step * z;
            (u.exp(), u - old.ln())
        } else {
            (old + step * z, 0.0)
        };
        let changes = [(p, new)];
        let delta_prior = self.prior_delta(&changes);

        let data = self.model.data;
        let family = self.model.family;
        let delta = new - old;
        let dispersion = if p == Param::Dispersion {
            new
        } else {
            self.value(Param::Dispersion)
        };
        let sigma = self.value(Param::SigmaB0);
        let layout = self.model.layout;

        self.scratch.clear();
        let mut delta_ll = 0.0;
        {
            let eta = &self.eta;
            let row_ll = &self.row_ll;
            let theta = &self.theta;
            let scratch = &mut self.scratch;
            let mut push = |i: usize, new_eta: f64| {
                let ll = family.log_likelihood(data.outcome[i], new_eta, dispersion);
                delta_ll += ll - row_ll[i];
                scratch.push((i, new_eta, ll));
            };
            match p {
                Param::SigmaB0 => (0..data.len()).for_each(|i| {
                    let offset = theta[layout.index(Param::Offset(data.states[i]))];
                    push(i, eta[i] + offset * delta)
                }),
                Param::Offset(s) => self.rows_by_state[s]
                    .iter()
                    .for_each(|i| push(*i, eta[*i] + sigma * delta)),
                Param::Dispersion => (0..data.len()).for_each(|i| push(i, eta[i])),
                Param::MuB0 => (0..data.len()).for_each(|i| push(i, eta[i] + delta)),
                Param::Coefficient(c) => (0..data.len())
                    .for_each(|i| push(i, eta[i] + data.rows[i].get(c) * delta)),
            }
        }
        self.accept_or_reject(&changes, delta_prior + delta_ll + log_jacobian, rng)
    }

    /// Moves the regression block along its j-th direction.
    fn update_block<R: Rng>(&mut self, j: usize, log_step: f64, rng: &mut R) -> Step {
        let z: f64 = rng.sample(StandardNormal);
        let delta = log_step.exp() * z;
        let changes: Vec<(Param, f64)> = block_params()
            .iter()
            .enumerate()
            .filter(|(k, _)| self.factor[(*k, j)] != 0.0)
            .map(|(k, p)| (*p, self.value(*p) + self.factor[(k, j)] * delta))
            .collect();
        let delta_prior = self.prior_delta(&changes);

        let data = self.model.data;
        let family = self.model.family;
        let dispersion = self.value(Param::Dispersion);
        self.scratch.clear();
        let mut delta_ll = 0.0;
        for i in 0..data.len() {
            let new_eta = self.eta[i] + delta * self.row_effects[j][i];
            let ll = family.log_likelihood(data.outcome[i], new_eta, dispersion);
            delta_ll += ll - self.row_ll[i];
            self.scratch.push((i, new_eta, ll));
        }
        self.accept_or_reject(&changes, delta_prior + delta_ll, rng)
    }

    /// Shifts mu_b0 and moves every offset the other way, so that no state
    /// intercept changes.
    fn shift_location<R: Rng>(&mut self, log_step: f64, rng: &mut R) -> Step {
        let z: f64 = rng.sample(StandardNormal);
        let delta = log_step.exp() * z;
        let sigma = self.value(Param::SigmaB0);
        let mut changes = vec![(Param::MuB0, self.value(Param::MuB0) + delta)];
        changes.extend((0..self.model.layout.n_states).map(|s| {
            let p = Param::Offset(s);
            (p, self.value(p) - delta / sigma)
        }));
        let delta_prior = self.prior_delta(&changes);
        self.scratch.clear();
        self.accept_or_reject(&changes, delta_prior, rng)
    }

    /// Scales sigma_b0 up and every offset down by the same factor, so that
    /// no state intercept changes.
    fn rescale_spread<R: Rng>(&mut self, log_step: f64, rng: &mut R) -> Step {
        let z: f64 = rng.sample(StandardNormal);
        let u = log_step.exp() * z;
        let n_states = self.model.layout.n_states;
        let mut changes = vec![(Param::SigmaB0, self.value(Param::SigmaB0) * u.exp())];
        changes.extend((0..n_states).map(|s| {
            let p = Param::Offset(s);
            (p, self.value(p) * (-u).exp())
        }));
        let delta_prior = self.prior_delta(&changes);
        // Jacobian of (sigma, offsets) -> (sigma e^u, offsets e^-u).
        let log_jacobian = u * (1.0 - n_states as f64);
        self.scratch.clear();
        self.accept_or_reject(&changes, delta_prior + log_jacobian, rng)
    }
}

/// Metropolis sampler over a hierarchical model.
///
/// Every iteration runs, in order:
/// * single-site moves of sigma_b0, each offset and the dispersion,
/// * two moves of the hyperparameters that leave every state intercept
///   unchanged (a shift of mu_b0, a rescaling of sigma_b0),
/// * one move along each direction of the regression block (mu_b0 and the
///   coefficients). The directions come from the covariance of the block,
///   estimated over doubling warm-up windows.
pub struct MetropolisSampler<'m, 'd> {
    model: &'m HierarchicalModel<'d>,
    settings: SamplerSettings,
    rng: Xoshiro256PlusPlus,
}

impl<'m, 'd> MetropolisSampler<'m, 'd> {
    pub fn new(model: &'m HierarchicalModel<'d>, settings: &SamplerSettings) -> MetropolisSampler<'m, 'd> {
        let seed = match settings.seed {
            Some(s) => s,
            None => {
                let s: u64 = rand::thread_rng().gen();
                info!("sampler: no seed provided, using {}", s);
                s
            }
        };
        MetropolisSampler {
            model,
            settings: *settings,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    /// Initial proposal widths, on the log scale.
    fn initial_log_steps(&self) -> Vec<f64> {
        let layout = self.model.layout;
        let scale = self.model.data.column_scale();
        layout
            .params()
            .iter()
            .map(|p| {
                let step = match p {
                    Param::MuB0 => 0.05,
                    Param::SigmaB0 => 0.2,
                    Param::Offset(_) => 0.5,
                    Param::Coefficient(c) if scale[c.index()] > 0.0 => {
                        (0.1 / scale[c.index()]).min(self.model.priors.get(*p).spread())
                    }
                    Param::Coefficient(_) => self.model.priors.get(*p).spread(),
                    Param::Dispersion if self.model.family.positive_dispersion() => 0.1,
                    Param::Dispersion => 0.5 * self.model.priors.get(*p).spread(),
                };
                step.ln()
            })
            .collect()
    }

    pub fn run(mut self) -> ForecastResult<PosteriorDraws> {
        let model = self.model;
        let layout = model.layout;
        let params = layout.params();
        let block = block_params();
        let theta = model.initial_values();
        ensure!(
            model.log_posterior(&theta).is_finite(),
            NonFiniteInitialStateSnafu {}
        );

        // The block starts with independent directions of the initial widths.
        let mut log_steps = self.initial_log_steps();
        let mut factor = DMatrix::<f64>::zeros(BLOCK_LEN, BLOCK_LEN);
        for (k, p) in block.iter().enumerate() {
            let idx = layout.index(*p);
            factor[(k, k)] = log_steps[idx].exp();
            log_steps[idx] = 0.0;
        }
        let mut chain = Chain::new(model, theta, factor);
        let single_site: Vec<Param> = params.iter().filter(|p| !block.contains(p)).cloned().collect();
        // Shift of mu_b0, rescaling of sigma_b0.
        let mut hyper_log_steps = [(0.05f64).ln(), (0.2f64).ln()];
        let mut hyper_accepted = [0usize; 2];

        let windows = adaptation_windows(self.settings.warmup);
        let mut window_start = 0;
        let mut window_draws: Vec<[f64; BLOCK_LEN]> = Vec::new();

        let mut accepted = vec![0usize; params.len()];
        let mut non_finite = 0usize;
        let mut draws: Vec<Vec<f64>> = Vec::with_capacity(self.settings.draws);
        let total = self.settings.warmup + self.settings.draws;
        let target = self.settings.target_acceptance;
        info!(
            "sampler: {} parameters, {} rows, {} warm-up + {} sampling iterations",
            params.len(),
            model.data.len(),
            self.settings.warmup,
            self.settings.draws
        );

        for iter in 0..total {
            let warming_up = iter < self.settings.warmup;
            let gamma = ((iter + 1) as f64).powf(-0.6);
            let block_gamma = ((iter + 1 - window_start) as f64).powf(-0.6);
            let mut record = |step: Step, log_step: &mut f64, gamma: f64, count: &mut usize| {
                let acc = match step {
                    Step::Accepted => 1.0,
                    Step::Rejected => 0.0,
                    Step::NonFinite => {
                        non_finite += 1;
                        0.0
                    }
                };
                if warming_up {
                    *log_step = (*log_step + gamma * (acc - target)).clamp(MIN_LOG_STEP, MAX_LOG_STEP);
                } else if acc > 0.0 {
                    *count += 1;
                }
            };

            for p in single_site.iter() {
                let idx = layout.index(*p);
                let step = chain.update(*p, log_steps[idx], &mut self.rng);
                record(step, &mut log_steps[idx], gamma, &mut accepted[idx]);
            }
            let step = chain.shift_location(hyper_log_steps[0], &mut self.rng);
            record(step, &mut hyper_log_steps[0], gamma, &mut hyper_accepted[0]);
            let step = chain.rescale_spread(hyper_log_steps[1], &mut self.rng);
            record(step, &mut hyper_log_steps[1], gamma, &mut hyper_accepted[1]);
            for (j, p) in block.iter().enumerate() {
                let idx = layout.index(*p);
                let step = chain.update_block(j, log_steps[idx], &mut self.rng);
                record(step, &mut log_steps[idx], block_gamma, &mut accepted[idx]);
            }

            if (iter + 1) % REFRESH_EVERY == 0 {
                chain.refresh();
            }
            if warming_up {
                window_draws.push(chain.block_values());
                if windows.contains(&(iter + 1)) {
                    match block_factor(&window_draws, &chain.factor) {
                        Some(f) => {
                            chain.set_factor(f);
                            for p in block.iter() {
                                log_steps[layout.index(*p)] = 0.0;
                            }
                            window_start = iter + 1;
                            debug!("sampler: block covariance updated after {} iterations", iter + 1);
                        }
                        None => warn!(
                            "sampler: block covariance not positive definite after {} iterations",
                            iter + 1
                        ),
                    }
                    window_draws.clear();
                }
            } else {
                draws.push(chain.theta.clone());
            }
            if (iter + 1) % 500 == 0 {
                debug!(
                    "sampler: iteration {}/{} log density {:.3}",
                    iter + 1,
                    total,
                    chain.log_density()
                );
            }
        }

        let n_draws = self.settings.draws.max(1) as f64;
        debug!(
            "sampler: acceptance of the mu_b0 shift {:.3}, of the sigma_b0 rescaling {:.3}",
            hyper_accepted[0] as f64 / n_draws,
            hyper_accepted[1] as f64 / n_draws
        );
        let mut res = PosteriorDraws::from_values(model.family, layout, draws);
        res.diagnostics.acceptance = accepted.iter().map(|a| *a as f64 / n_draws).collect();
        res.diagnostics.non_finite = non_finite;
        res.diagnostics.log_summary();
        Ok(res)
    }
}

/// Draws from the posterior of the model.
pub fn sample_posterior(
    model: &HierarchicalModel,
    settings: &SamplerSettings,
) -> ForecastResult<PosteriorDraws> {
    MetropolisSampler::new(model, settings).run()
}

/// The posterior mean of each coefficient, by covariate.
pub fn coefficient_means(draws: &PosteriorDraws) -> Vec<(Covariate, f64)> {
    Covariate::ALL
        .iter()
        .map(|c| {
            let col = draws.column(Param::Coefficient(*c));
            (*c, stats::mean(&col).unwrap_or(0.0))
        })
        .collect()
}
