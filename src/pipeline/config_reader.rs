use crate::pipeline::*;

use serde::{Deserialize, Serialize};

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CandidateConfig {
    /// The candidate id in the poll feed.
    pub id: u64,
    pub name: String,
    /// Short name used in the column headers and the simulation table.
    pub label: Option<String>,
}

impl CandidateConfig {
    pub fn label(&self) -> &str {
        match &self.label {
            Some(l) if !l.is_empty() => l.as_str(),
            _ => self.name.as_str(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CandidatesConfig {
    pub tracked: CandidateConfig,
    pub opponent: CandidateConfig,
}

impl Default for CandidatesConfig {
    fn default() -> Self {
        CandidatesConfig {
            tracked: CandidateConfig {
                id: 16651,
                name: "Donald Trump".to_string(),
                label: Some("Trump".to_string()),
            },
            opponent: CandidateConfig {
                id: 16661,
                name: "Kamala Harris".to_string(),
                label: Some("Harris".to_string()),
            },
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputFiles {
    pub polls: Option<String>,
    pub priors: Option<String>,
    pub baseline: Option<String>,
    pub electoral: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelRules {
    /// `beta` (default) or `gaussian`.
    pub family: Option<String>,
    /// `flag` (default) or `reject`.
    #[serde(rename = "multiCandidate")]
    pub multi_candidate: Option<String>,
    #[serde(rename = "gradeCutoff")]
    pub grade_cutoff: Option<f64>,
    #[serde(rename = "partisanCode")]
    pub partisan_code: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    pub warmup: Option<usize>,
    pub draws: Option<usize>,
    pub seed: Option<u64>,
    #[serde(rename = "targetAcceptance")]
    pub target_acceptance: Option<f64>,
    pub simulations: Option<usize>,
    pub majority: Option<u32>,
    #[serde(rename = "bootstrapResamples")]
    pub bootstrap_resamples: Option<usize>,
    #[serde(rename = "bootstrapSize")]
    pub bootstrap_size: Option<usize>,
    pub confidence: Option<f64>,
    #[serde(rename = "priorSdScale")]
    pub prior_sd_scale: Option<f64>,
    #[serde(rename = "todaySampleSize")]
    pub today_sample_size: Option<f64>,
    #[serde(rename = "clampThreshold")]
    pub clamp_threshold: Option<f64>,
    #[serde(rename = "clampHigh")]
    pub clamp_high: Option<f64>,
    #[serde(rename = "clampLow")]
    pub clamp_low: Option<f64>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default)]
    pub candidates: CandidatesConfig,
    pub inputs: Option<InputFiles>,
    #[serde(rename = "outputSettings")]
    pub output_settings: Option<OutputSettings>,
    pub rules: Option<ModelRules>,
    pub run: Option<RunConfig>,
    /// YYYY-MM-DD
    #[serde(rename = "electionDate")]
    pub election_date: Option<String>,
}

impl ForecastConfig {
    pub fn election_date(&self) -> PipelineResult<Option<NaiveDate>> {
        match &self.election_date {
            Some(s) => parse_date(s)
                .map(Some)
                .context(InvalidDateOptionSnafu {
                    option: "electionDate",
                    value: s.clone(),
                }),
            None => Ok(None),
        }
    }
}

/// Reads the configuration file. Returns it with the directory against which
/// its relative paths are resolved.
pub fn read_config(path: &str) -> PipelineResult<(ForecastConfig, PathBuf)> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let config: ForecastConfig =
        serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    let root = Path::new(path)
        .parent()
        .context(MissingParentDirSnafu { path })?
        .to_path_buf();
    info!("read_config: {:?}", config);
    Ok((config, root))
}

pub fn parse_family(s: &str) -> PipelineResult<OutcomeFamily> {
    match s.to_lowercase().as_str() {
        "beta" | "bounded_beta" => Ok(OutcomeFamily::BoundedBeta),
        "gaussian" | "normal" => Ok(OutcomeFamily::Gaussian),
        _ => InvalidOptionSnafu {
            option: "family",
            value: s,
        }
        .fail(),
    }
}

pub fn parse_multi_candidate(s: &str) -> PipelineResult<MultiCandidateMode> {
    match s.to_lowercase().as_str() {
        "flag" => Ok(MultiCandidateMode::Flag),
        "reject" => Ok(MultiCandidateMode::Reject),
        _ => InvalidOptionSnafu {
            option: "multiCandidate",
            value: s,
        }
        .fail(),
    }
}

/// The settings of the run: the defaults, overridden by the configuration
/// file, overridden by the command line.
pub fn build_settings(config: &ForecastConfig, args: &Args) -> PipelineResult<RunSettings> {
    let mut s = RunSettings::default();
    s.transform.targets = TargetPair {
        tracked: config.candidates.tracked.id,
        opponent: config.candidates.opponent.id,
    };

    if let Some(rules) = &config.rules {
        if let Some(f) = &rules.family {
            s.family = parse_family(f)?;
        }
        if let Some(m) = &rules.multi_candidate {
            s.transform.multi_candidate = parse_multi_candidate(m)?;
        }
        if let Some(g) = rules.grade_cutoff {
            s.transform.grade_cutoff = g;
        }
        if let Some(code) = &rules.partisan_code {
            s.transform.partisan_code = code.clone();
        }
    }

    if let Some(run) = &config.run {
        s.sampler.warmup = run.warmup.unwrap_or(s.sampler.warmup);
        s.sampler.draws = run.draws.unwrap_or(s.sampler.draws);
        s.sampler.seed = run.seed.or(s.sampler.seed);
        s.sampler.target_acceptance = run
            .target_acceptance
            .unwrap_or(s.sampler.target_acceptance);
        s.simulations = run.simulations.unwrap_or(s.simulations);
        s.majority = run.majority.unwrap_or(s.majority);
        s.bootstrap.resamples = run.bootstrap_resamples.unwrap_or(s.bootstrap.resamples);
        s.bootstrap.resample_size = run.bootstrap_size.unwrap_or(s.bootstrap.resample_size);
        s.confidence = run.confidence.unwrap_or(s.confidence);
        s.prior_sd_scale = run.prior_sd_scale.unwrap_or(s.prior_sd_scale);
        s.today.sample_size = run.today_sample_size.unwrap_or(s.today.sample_size);
        s.backfill.threshold = run.clamp_threshold.unwrap_or(s.backfill.threshold);
        s.backfill.high = run.clamp_high.unwrap_or(s.backfill.high);
        s.backfill.low = run.clamp_low.unwrap_or(s.backfill.low);
    }

    if let Some(f) = &args.family {
        s.family = parse_family(f)?;
    }
    if args.seed.is_some() {
        s.sampler.seed = args.seed;
    }
    debug!("build_settings: {:?}", s);
    Ok(s)
}
