// The prior table on disk: `var, mean, sd, state`.

use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use forecast_engine::priors::{PriorEntry, PriorTable};
use forecast_engine::store::PriorRepository;

use crate::pipeline::io_common::*;
use crate::pipeline::*;

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
struct PriorLine {
    var: String,
    mean: f64,
    sd: f64,
    #[serde(default)]
    state: Option<String>,
}

pub fn read_priors(path: &Path) -> PipelineResult<PriorTable> {
    let path_s = path.display().to_string();
    let mut rdr = open_reader(path)?;
    let mut entries: Vec<PriorEntry> = Vec::new();
    for (idx, line_r) in rdr.deserialize::<PriorLine>().enumerate() {
        let line = line_r.context(CsvLineParseSnafu {
            path: path_s.clone(),
            lineno: idx + 2,
        })?;
        entries.push(match non_empty(line.state) {
            Some(state) => PriorEntry::for_state(&line.var, &state, line.mean, line.sd),
            None => PriorEntry::new(&line.var, line.mean, line.sd),
        });
    }
    let table = PriorTable::new(entries);
    info!("read_priors: {} rows from {}", table.len(), path_s);
    Ok(table)
}

pub fn write_priors(path: &Path, table: &PriorTable) -> PipelineResult<()> {
    let path_s = path.display().to_string();
    let mut wtr = create_writer(path)?;
    for e in table.entries() {
        wtr.serialize(PriorLine {
            var: e.name.clone(),
            mean: e.mean,
            sd: e.sd,
            state: e.state.clone(),
        })
        .context(CsvWriteSnafu {
            path: path_s.clone(),
        })?;
    }
    wtr.flush().context(OpeningFileSnafu { path: path_s })?;
    Ok(())
}

/// The prior table of the previous run, stored as CSV.
#[derive(Debug, Clone)]
pub struct CsvPriorStore {
    path: PathBuf,
}

impl CsvPriorStore {
    pub fn new(path: &Path) -> CsvPriorStore {
        CsvPriorStore {
            path: path.to_path_buf(),
        }
    }
}

impl PriorRepository for CsvPriorStore {
    type Error = PipelineError;

    fn load(&self) -> PipelineResult<Option<PriorTable>> {
        if !self.path.exists() {
            info!("no prior table at {}", self.path.display());
            return Ok(None);
        }
        read_priors(&self.path).map(Some)
    }

    fn store(&mut self, table: &PriorTable) -> PipelineResult<()> {
        write_priors(&self.path, table)
    }
}
