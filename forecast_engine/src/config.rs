// ********* Input data structures ***********

use chrono::NaiveDate;
use snafu::Snafu;

/// One response row of the raw polling feed, as parsed by the readers.
///
/// A polling question is spread over several rows, one per candidate. All the
/// fields except the identifiers may be missing in the feed.
#[derive(PartialEq, Debug, Clone)]
pub struct RawPoll {
    pub question_id: u64,
    pub candidate_id: u64,
    pub state: Option<String>,
    pub methodology: Option<String>,
    pub population: Option<String>,
    pub sample_size: Option<f64>,
    pub end_date: Option<NaiveDate>,
    pub numeric_grade: Option<f64>,
    pub partisan: Option<String>,
    /// The share of the response, in percent.
    pub pct: Option<f64>,
}

/// The two candidates of the race. The tracked candidate is the one whose
/// share is modelled and whose win probabilities are reported.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct TargetPair {
    pub tracked: u64,
    pub opponent: u64,
}

// ********* Configuration **********

/// The likelihood of the poll outcome.
///
/// Both families share the same hierarchical linear predictor.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum OutcomeFamily {
    /// outcome ~ Normal(eta, error)
    Gaussian,
    /// outcome ~ Beta(mu * phi, phi - mu * phi) with mu = logistic(eta)
    BoundedBeta,
}

/// What to do with questions that offered more than two candidates.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum MultiCandidateMode {
    /// Keep the target pair and set the MultiCandidate covariate.
    Flag,
    /// Any question with more than two responses stops the run.
    Reject,
}

#[derive(PartialEq, Debug, Clone)]
pub struct TransformOptions {
    pub targets: TargetPair,
    pub multi_candidate: MultiCandidateMode,
    /// Pollsters at or above this numeric grade are flagged as good quality.
    pub grade_cutoff: f64,
    /// Sponsor code that sets the partisan covariate.
    pub partisan_code: String,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct SamplerSettings {
    pub warmup: usize,
    pub draws: usize,
    /// Without a seed, a fresh one is drawn and logged.
    pub seed: Option<u64>,
    pub target_acceptance: f64,
}

impl SamplerSettings {
    pub const DEFAULT: SamplerSettings = SamplerSettings {
        warmup: 1000,
        draws: 1000,
        seed: None,
        target_acceptance: 0.44,
    };
}

/// The covariate values at which every state is predicted.
///
/// The categorical covariates are fixed: likely voters, good pollster grade,
/// non-partisan, head-to-head question, reference methodology.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct TodayScenario {
    pub sample_size: f64,
}

/// How states without polls are filled from the previous cycle.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct BackfillPolicy {
    /// Baseline estimates strictly above this value (in percent) favor the
    /// tracked candidate.
    pub threshold: f64,
    pub high: f64,
    pub low: f64,
}

impl BackfillPolicy {
    pub const DEFAULT: BackfillPolicy = BackfillPolicy {
        threshold: 50.0,
        high: 0.99,
        low: 0.01,
    };
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct BootstrapSettings {
    pub resamples: usize,
    pub resample_size: usize,
}

impl BootstrapSettings {
    pub const DEFAULT: BootstrapSettings = BootstrapSettings {
        resamples: 1000,
        resample_size: 100,
    };
}

/// All the knobs of a daily run.
#[derive(PartialEq, Debug, Clone)]
pub struct RunSettings {
    pub family: OutcomeFamily,
    pub transform: TransformOptions,
    pub sampler: SamplerSettings,
    /// Multiplier applied to every prior standard deviation before the fit.
    ///
    /// Values above 1 weaken yesterday's posterior when it is used as today's
    /// prior. There is no principled derivation for a particular value.
    pub prior_sd_scale: f64,
    pub today: TodayScenario,
    pub backfill: BackfillPolicy,
    pub simulations: usize,
    pub majority: u32,
    pub bootstrap: BootstrapSettings,
    /// Confidence level of the credible interval, in percent.
    pub confidence: f64,
}

impl Default for RunSettings {
    fn default() -> Self {
        RunSettings {
            family: OutcomeFamily::BoundedBeta,
            transform: TransformOptions {
                targets: TargetPair {
                    tracked: 16651,
                    opponent: 16661,
                },
                multi_candidate: MultiCandidateMode::Flag,
                grade_cutoff: 2.0,
                partisan_code: "REP".to_string(),
            },
            sampler: SamplerSettings::DEFAULT,
            prior_sd_scale: 1.0,
            today: TodayScenario {
                sample_size: 2000.0,
            },
            backfill: BackfillPolicy::DEFAULT,
            simulations: 50_000,
            majority: crate::electoral::MAJORITY,
            bootstrap: BootstrapSettings::DEFAULT,
            confidence: 95.0,
        }
    }
}

// ******** Errors *********

/// Errors that prevent a forecast from completing.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ForecastError {
    #[snafu(display("question {question_id} has {responses} response(s), at least 2 are required"))]
    TooFewResponses { question_id: u64, responses: usize },

    #[snafu(display("question {question_id} lists candidate {candidate_id} {count} times"))]
    DuplicateCandidate {
        question_id: u64,
        candidate_id: u64,
        count: usize,
    },

    #[snafu(display(
        "question {question_id} has {responses} responses; multi-candidate questions are rejected"
    ))]
    MultiCandidateQuestion { question_id: u64, responses: usize },

    #[snafu(display("no usable poll remains after cleaning the feed"))]
    EmptyPollSet {},

    #[snafu(display("the initial parameters have a non-finite log density"))]
    NonFiniteInitialState {},

    #[snafu(display("state {state} has no valid posterior predictive draw"))]
    NoValidDraws { state: String },

    #[snafu(display("state {state} has a win probability but no elector count"))]
    UnknownState { state: String },

    #[snafu(display("probability {probability} for state {state} is outside [0, 1]"))]
    InvalidProbability { state: String, probability: f64 },

    #[snafu(display("cannot compute an interval from an empty simulation"))]
    EmptySimulation {},

    #[snafu(display("invalid setting {name}: {value}"))]
    InvalidSetting { name: String, value: String },
}

pub type ForecastResult<T> = Result<T, ForecastError>;
