// Reader for the raw poll feed.

use std::path::Path;

use log::{debug, info};
use serde::Deserialize;
use snafu::prelude::*;

use forecast_engine::RawPoll;

use crate::pipeline::io_common::*;
use crate::pipeline::*;

/// One line of the feed. Only the columns used by the model are read.
#[derive(PartialEq, Debug, Clone, Deserialize)]
struct PollLine {
    question_id: u64,
    candidate_id: u64,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    methodology: Option<String>,
    #[serde(default)]
    population: Option<String>,
    #[serde(default)]
    sample_size: Option<f64>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    numeric_grade: Option<f64>,
    #[serde(default)]
    partisan: Option<String>,
    #[serde(default)]
    pct: Option<f64>,
}

pub fn read_polls(path: &Path) -> PipelineResult<Vec<RawPoll>> {
    let path_s = path.display().to_string();
    info!("read_polls: reading {}", path_s);
    let mut rdr = open_reader(path)?;
    let mut res: Vec<RawPoll> = Vec::new();
    for (idx, line_r) in rdr.deserialize::<PollLine>().enumerate() {
        // Line 1 is the header.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu {
            path: path_s.clone(),
            lineno,
        })?;
        let end_date = match non_empty(line.end_date) {
            Some(s) => Some(parse_date(&s).context(InvalidDateSnafu {
                path: path_s.clone(),
                lineno,
                value: s.clone(),
            })?),
            None => None,
        };
        res.push(RawPoll {
            question_id: line.question_id,
            candidate_id: line.candidate_id,
            state: non_empty(line.state),
            methodology: non_empty(line.methodology),
            population: non_empty(line.population),
            sample_size: line.sample_size,
            end_date,
            numeric_grade: line.numeric_grade,
            partisan: non_empty(line.partisan),
            pct: line.pct,
        });
    }
    debug!("read_polls: {} rows from {}", res.len(), path_s);
    Ok(res)
}
