// The national time series: one row per day and candidate.

use chrono::NaiveDate;
use log::debug;

use crate::interval::CredibleInterval;

#[derive(PartialEq, Debug, Clone)]
pub struct TrackingRecord {
    pub date: NaiveDate,
    pub candidate: String,
    /// Win probability, as a fraction.
    pub win_percentage: f64,
    pub lower: f64,
    pub upper: f64,
}

/// The rows of one day for both candidates.
///
/// The opponent's interval is the tracked candidate's interval reflected
/// around the opponent's win fraction, clipped to [0, 1].
pub fn daily_records(
    date: NaiveDate,
    tracked: &str,
    opponent: &str,
    win_fraction: f64,
    interval: &CredibleInterval,
) -> Vec<TrackingRecord> {
    let other = 1.0 - win_fraction;
    vec![
        TrackingRecord {
            date,
            candidate: tracked.to_string(),
            win_percentage: win_fraction,
            lower: interval.lower,
            upper: interval.upper,
        },
        TrackingRecord {
            date,
            candidate: opponent.to_string(),
            win_percentage: other,
            lower: (other - (win_fraction - interval.lower)).clamp(0.0, 1.0),
            upper: (other + (interval.upper - win_fraction)).clamp(0.0, 1.0),
        },
    ]
}

/// Replaces the rows of the dates present in `day` and keeps the series
/// sorted by date. Rows of the same date keep their order.
pub fn upsert_day(series: Vec<TrackingRecord>, day: Vec<TrackingRecord>) -> Vec<TrackingRecord> {
    let before = series.len();
    let mut res: Vec<TrackingRecord> = series
        .into_iter()
        .filter(|r| !day.iter().any(|d| d.date == r.date))
        .collect();
    if res.len() < before {
        debug!("upsert_day: replaced {} existing row(s)", before - res.len());
    }
    res.extend(day);
    res.sort_by_key(|r| r.date);
    res
}
