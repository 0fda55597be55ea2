// Readers for the reference tables, and the postal abbreviations.

use std::path::Path;

use log::info;
use serde::Deserialize;
use snafu::prelude::*;

use forecast_engine::electoral::ElectoralTable;
use forecast_engine::predict::HistoricalBaseline;
use forecast_engine::transform::normalize_state;

use crate::pipeline::io_common::*;
use crate::pipeline::*;

const POSTAL_CODES: [(&str, &str); 51] = [
    ("Alabama", "AL"),
    ("Alaska", "AK"),
    ("Arizona", "AZ"),
    ("Arkansas", "AR"),
    ("California", "CA"),
    ("Colorado", "CO"),
    ("Connecticut", "CT"),
    ("Delaware", "DE"),
    ("District of Columbia", "DC"),
    ("Florida", "FL"),
    ("Georgia", "GA"),
    ("Hawaii", "HI"),
    ("Idaho", "ID"),
    ("Illinois", "IL"),
    ("Indiana", "IN"),
    ("Iowa", "IA"),
    ("Kansas", "KS"),
    ("Kentucky", "KY"),
    ("Louisiana", "LA"),
    ("Maine", "ME"),
    ("Maryland", "MD"),
    ("Massachusetts", "MA"),
    ("Michigan", "MI"),
    ("Minnesota", "MN"),
    ("Mississippi", "MS"),
    ("Missouri", "MO"),
    ("Montana", "MT"),
    ("Nebraska", "NE"),
    ("Nevada", "NV"),
    ("New Hampshire", "NH"),
    ("New Jersey", "NJ"),
    ("New Mexico", "NM"),
    ("New York", "NY"),
    ("North Carolina", "NC"),
    ("North Dakota", "ND"),
    ("Ohio", "OH"),
    ("Oklahoma", "OK"),
    ("Oregon", "OR"),
    ("Pennsylvania", "PA"),
    ("Rhode Island", "RI"),
    ("South Carolina", "SC"),
    ("South Dakota", "SD"),
    ("Tennessee", "TN"),
    ("Texas", "TX"),
    ("Utah", "UT"),
    ("Vermont", "VT"),
    ("Virginia", "VA"),
    ("Washington", "WA"),
    ("West Virginia", "WV"),
    ("Wisconsin", "WI"),
    ("Wyoming", "WY"),
];

/// The postal code of a state. Districts and unknown names are kept as is.
pub fn state_abbreviation(state: &str) -> String {
    POSTAL_CODES
        .iter()
        .find(|(name, _)| *name == state)
        .map(|(_, code)| code.to_string())
        .unwrap_or_else(|| state.to_string())
}

#[derive(Debug, Deserialize)]
struct ElectorsLine {
    state: String,
    electors: u32,
}

#[derive(Debug, Deserialize)]
struct BaselineLine {
    state: String,
    pct_estimate: f64,
}

fn read_lines<T: serde::de::DeserializeOwned>(path: &Path) -> PipelineResult<Vec<T>> {
    let path_s = path.display().to_string();
    let mut rdr = open_reader(path)?;
    let mut res = Vec::new();
    for (idx, line_r) in rdr.deserialize::<T>().enumerate() {
        let line = line_r.context(CsvLineParseSnafu {
            path: path_s.clone(),
            lineno: idx + 2,
        })?;
        res.push(line);
    }
    Ok(res)
}

/// Reads a `state, electors` table. District labels are normalized like the
/// poll feed.
pub fn read_electoral(path: &Path) -> PipelineResult<ElectoralTable> {
    let lines: Vec<ElectorsLine> = read_lines(path)?;
    let table = ElectoralTable::from_entries(
        lines
            .into_iter()
            .map(|l| (normalize_state(&l.state), l.electors))
            .collect(),
    );
    info!(
        "read_electoral: {} states, {} electors from {}",
        table.len(),
        table.total(),
        path.display()
    );
    Ok(table)
}

/// Reads a `state, pct_estimate` table.
pub fn read_baseline(path: &Path) -> PipelineResult<HistoricalBaseline> {
    let lines: Vec<BaselineLine> = read_lines(path)?;
    info!("read_baseline: {} states from {}", lines.len(), path.display());
    Ok(HistoricalBaseline::new(
        lines
            .into_iter()
            .map(|l| (normalize_state(&l.state), l.pct_estimate))
            .collect(),
    ))
}
