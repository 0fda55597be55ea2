// Primitives shared by the CSV readers and writers.

use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use snafu::prelude::*;

use crate::pipeline::{CsvOpenSnafu, PipelineResult};

const DATE_FORMATS: [&str; 3] = ["%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d"];

/// Parses the date formats found in the feeds: `9/15/24`, `9/15/2024` and
/// `2024-09-15`. A time of day after the date is ignored.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let day = s.split_whitespace().next()?;
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(day, f).ok())
}

pub fn format_date(d: &NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub fn open_reader(path: &Path) -> PipelineResult<csv::Reader<File>> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .context(CsvOpenSnafu {
            path: path.display().to_string(),
        })
}

pub fn create_writer(path: &Path) -> PipelineResult<csv::Writer<File>> {
    csv::Writer::from_path(path).context(CsvOpenSnafu {
        path: path.display().to_string(),
    })
}

/// Empty cells are missing values.
pub fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|x| !x.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 9, 5);
        assert_eq!(parse_date("9/5/24"), expected);
        assert_eq!(parse_date("09/05/2024"), expected);
        assert_eq!(parse_date("2024-09-05"), expected);
        assert_eq!(parse_date("2024-09-05 00:00:00"), expected);
        assert_eq!(parse_date("Sept 5"), None);
        assert_eq!(parse_date(""), None);
    }
}
