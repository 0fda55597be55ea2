// Writers for the daily output tables, and the tracking series on disk.

use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use forecast_engine::electoral::ElectionSimulation;
use forecast_engine::predict::StateWinProbabilities;
use forecast_engine::store::TrackingRepository;
use forecast_engine::tracking::TrackingRecord;

use crate::pipeline::io_common::*;
use crate::pipeline::io_tables::state_abbreviation;
use crate::pipeline::*;

pub const STATE_PROBABILITIES_FILE: &str = "state_probabilities.csv";
pub const SIMULATION_FILE: &str = "simulation_data.csv";
pub const TRACKING_FILE: &str = "tracking_data.csv";
pub const PRIORS_FILE: &str = "priors.csv";

/// Writes `State, <label> Win Prob.` with the probabilities in percent.
pub fn write_state_probabilities(
    path: &Path,
    probabilities: &StateWinProbabilities,
    tracked_label: &str,
) -> PipelineResult<()> {
    let path_s = path.display().to_string();
    let mut wtr = create_writer(path)?;
    let header = format!("{} Win Prob.", tracked_label);
    wtr.write_record(["State", header.as_str()])
        .context(CsvWriteSnafu {
            path: path_s.clone(),
        })?;
    for (state, p) in probabilities.iter() {
        let pct = (p * 10_000.0).round() / 100.0;
        wtr.write_record([state_abbreviation(state), pct.to_string()])
            .context(CsvWriteSnafu {
                path: path_s.clone(),
            })?;
    }
    wtr.flush().context(OpeningFileSnafu {
        path: path_s.clone(),
    })?;
    info!("write_state_probabilities: {} states to {}", probabilities.len(), path_s);
    Ok(())
}

#[derive(Debug, Serialize)]
struct SimulationLine<'a> {
    winner: &'a str,
    points: u32,
}

/// Writes one `winner, points` line per simulated election.
pub fn write_simulation(
    path: &Path,
    simulation: &ElectionSimulation,
    tracked_label: &str,
    opponent_label: &str,
) -> PipelineResult<()> {
    let path_s = path.display().to_string();
    let mut wtr = create_writer(path)?;
    for t in simulation.trials.iter() {
        let winner = if t.tracked_wins {
            tracked_label
        } else {
            opponent_label
        };
        wtr.serialize(SimulationLine {
            winner,
            points: t.points,
        })
        .context(CsvWriteSnafu {
            path: path_s.clone(),
        })?;
    }
    wtr.flush().context(OpeningFileSnafu {
        path: path_s.clone(),
    })?;
    debug!("write_simulation: {} trials to {}", simulation.trials.len(), path_s);
    Ok(())
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
struct TrackingLine {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Candidate")]
    candidate: String,
    #[serde(rename = "Win Percentage")]
    win_percentage: f64,
    #[serde(rename = "LB")]
    lower: f64,
    #[serde(rename = "UB")]
    upper: f64,
}

/// The tracking series, stored as CSV: `Date, Candidate, Win Percentage, LB, UB`.
#[derive(Debug, Clone)]
pub struct CsvTrackingStore {
    path: PathBuf,
}

impl CsvTrackingStore {
    pub fn new(path: &Path) -> CsvTrackingStore {
        CsvTrackingStore {
            path: path.to_path_buf(),
        }
    }
}

impl TrackingRepository for CsvTrackingStore {
    type Error = PipelineError;

    fn load(&self) -> PipelineResult<Vec<TrackingRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let path_s = self.path.display().to_string();
        let mut rdr = open_reader(&self.path)?;
        let mut res = Vec::new();
        for (idx, line_r) in rdr.deserialize::<TrackingLine>().enumerate() {
            let lineno = idx + 2;
            let line = line_r.context(CsvLineParseSnafu {
                path: path_s.clone(),
                lineno,
            })?;
            let date = parse_date(&line.date).context(InvalidDateSnafu {
                path: path_s.clone(),
                lineno,
                value: line.date.clone(),
            })?;
            res.push(TrackingRecord {
                date,
                candidate: line.candidate,
                win_percentage: line.win_percentage,
                lower: line.lower,
                upper: line.upper,
            });
        }
        Ok(res)
    }

    fn replace_all(&mut self, records: &[TrackingRecord]) -> PipelineResult<()> {
        let path_s = self.path.display().to_string();
        let mut wtr = create_writer(&self.path)?;
        for r in records {
            wtr.serialize(TrackingLine {
                date: format_date(&r.date),
                candidate: r.candidate.clone(),
                win_percentage: r.win_percentage,
                lower: r.lower,
                upper: r.upper,
            })
            .context(CsvWriteSnafu {
                path: path_s.clone(),
            })?;
        }
        wtr.flush().context(OpeningFileSnafu {
            path: path_s.clone(),
        })?;
        info!("tracking: {} rows in {}", records.len(), path_s);
        Ok(())
    }
}
