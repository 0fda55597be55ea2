use log::{debug, info, warn};

use chrono::NaiveDate;
use forecast_engine::electoral::ElectoralTable;
use forecast_engine::predict::HistoricalBaseline;
use forecast_engine::store::{PriorRepository, TrackingRepository};
use forecast_engine::tracking::daily_records;
use forecast_engine::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use crate::args::Args;
use crate::pipeline::config_reader::*;
use crate::pipeline::io_common::parse_date;
use crate::pipeline::io_outputs::*;
use crate::pipeline::io_priors::CsvPriorStore;

pub mod config_reader;
mod io_common;
pub mod io_outputs;
pub mod io_polls;
pub mod io_priors;
pub mod io_tables;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PipelineError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing the JSON configuration {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("{path}: cannot read line {lineno}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error writing CSV file {path}"))]
    CsvWrite { source: csv::Error, path: String },
    #[snafu(display("{path}: line {lineno}: cannot parse date {value:?}"))]
    InvalidDate {
        path: String,
        lineno: usize,
        value: String,
    },
    #[snafu(display("Cannot parse date {value:?} for option {option}"))]
    InvalidDateOption { option: String, value: String },
    #[snafu(display("Unknown value {value:?} for option {option}"))]
    InvalidOption { option: String, value: String },
    #[snafu(display("No {what} file was provided"))]
    MissingInput { what: String },
    #[snafu(display("Missing parent directory for {path}"))]
    MissingParentDir { path: String },
    #[snafu(display("The forecast failed: {source}"))]
    Forecast { source: ForecastError },
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// The files used by a daily run, after merging the command line and the
/// configuration file.
#[derive(Eq, PartialEq, Debug, Clone)]
struct RunPaths {
    polls: PathBuf,
    priors: PathBuf,
    baseline: Option<PathBuf>,
    electoral: Option<PathBuf>,
    out_dir: PathBuf,
}

fn run_paths(args: &Args, config: &ForecastConfig, root: &Path) -> PipelineResult<RunPaths> {
    let inputs = config.inputs.clone().unwrap_or_default();
    let pick = |arg: &Option<String>, conf: &Option<String>| -> Option<PathBuf> {
        match (arg, conf) {
            (Some(a), _) => Some(PathBuf::from(a)),
            (None, Some(c)) => Some(root.join(c)),
            (None, None) => None,
        }
    };
    let out_dir = pick(
        &args.out_dir,
        &config
            .output_settings
            .as_ref()
            .and_then(|o| o.output_directory.clone()),
    )
    .unwrap_or_else(|| root.to_path_buf());
    let polls = pick(&args.polls, &inputs.polls).context(MissingInputSnafu { what: "poll" })?;
    let priors = pick(&args.priors, &inputs.priors).unwrap_or_else(|| out_dir.join(PRIORS_FILE));
    Ok(RunPaths {
        polls,
        priors,
        baseline: pick(&args.baseline, &inputs.baseline),
        electoral: pick(&args.electoral, &inputs.electoral),
        out_dir,
    })
}

fn path_str(p: &Path) -> String {
    p.display().to_string()
}

/// The outcome of a daily run, as written to the output files.
#[derive(PartialEq, Debug, Clone)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub win_fraction: f64,
    pub lower: f64,
    pub upper: f64,
    pub projected_winner: String,
    pub tracking_rows: usize,
}

/// Runs the forecast for one day and updates the files shared with the
/// next runs (prior table and tracking series).
pub fn run_daily(args: &Args) -> PipelineResult<DailyReport> {
    let (config, root) = match &args.config {
        Some(p) => read_config(p)?,
        None => (ForecastConfig::default(), PathBuf::from(".")),
    };
    debug!("run_daily: config {:?}", config);
    let settings = build_settings(&config, args)?;
    let paths = run_paths(args, &config, &root)?;
    info!("run_daily: files {:?}", paths);

    let date = match &args.date {
        Some(d) => parse_date(d).context(InvalidDateOptionSnafu {
            option: "date",
            value: d.clone(),
        })?,
        None => chrono::Local::now().date_naive(),
    };

    let polls = io_polls::read_polls(&paths.polls)?;
    let baseline = match &paths.baseline {
        Some(p) => io_tables::read_baseline(p)?,
        None => {
            warn!("run_daily: no historical baseline, states without polls are left out");
            HistoricalBaseline::default()
        }
    };
    let electoral = match &paths.electoral {
        Some(p) => io_tables::read_electoral(p)?,
        None => ElectoralTable::standard_2024(),
    };

    let mut prior_store = CsvPriorStore::new(&paths.priors);
    let previous = if args.reset_priors {
        info!("run_daily: resetting the priors");
        None
    } else {
        prior_store.load()?
    };

    let inputs = ForecastInputs {
        polls: &polls,
        priors: previous.as_ref(),
        baseline: &baseline,
        electoral: &electoral,
    };
    let outcome = run_forecast(inputs, &settings).context(ForecastSnafu {})?;

    fs::create_dir_all(&paths.out_dir).context(OpeningFileSnafu {
        path: path_str(&paths.out_dir),
    })?;

    let tracked = config.candidates.tracked.clone();
    let opponent = config.candidates.opponent.clone();
    write_state_probabilities(
        &paths.out_dir.join(STATE_PROBABILITIES_FILE),
        &outcome.state_probabilities,
        tracked.label(),
    )?;
    write_simulation(
        &paths.out_dir.join(SIMULATION_FILE),
        &outcome.simulation,
        tracked.label(),
        opponent.label(),
    )?;

    let win_fraction = outcome.simulation.win_fraction;
    let day = daily_records(
        date,
        &tracked.name,
        &opponent.name,
        win_fraction,
        &outcome.interval,
    );
    let mut tracking_store = CsvTrackingStore::new(&paths.out_dir.join(TRACKING_FILE));
    let series = if args.reset_tracker {
        info!("run_daily: starting a new tracking series");
        tracking_store.replace_all(&day)?;
        day
    } else {
        tracking_store.upsert(day)?
    };
    // Stored last: a failed run must not leave its posterior as the next prior.
    prior_store.store(&outcome.next_priors)?;

    let projected_winner = if win_fraction >= 0.5 {
        tracked.name.clone()
    } else {
        opponent.name.clone()
    };
    info!(
        "run_daily: projected winner {} ({:.2}% of {} simulations)",
        projected_winner,
        100.0 * win_fraction.max(1.0 - win_fraction),
        outcome.simulation.trials.len()
    );
    if let Some(election_date) = config.election_date()? {
        let days = (election_date - date).num_days();
        info!("run_daily: {} days until the election", days);
    }

    Ok(DailyReport {
        date,
        win_fraction,
        lower: outcome.interval.lower,
        upper: outcome.interval.upper,
        projected_winner,
        tracking_rows: series.len(),
    })
}
