//! Storage seams for the state that survives between daily runs.
//!
//! The engine never touches the disk: the caller injects the repositories.

use std::convert::Infallible;

use crate::priors::PriorTable;
use crate::tracking::{upsert_day, TrackingRecord};

pub trait PriorRepository {
    type Error;

    /// The table written by the previous run, if any.
    fn load(&self) -> Result<Option<PriorTable>, Self::Error>;

    fn store(&mut self, table: &PriorTable) -> Result<(), Self::Error>;
}

pub trait TrackingRepository {
    type Error;

    fn load(&self) -> Result<Vec<TrackingRecord>, Self::Error>;

    fn replace_all(&mut self, records: &[TrackingRecord]) -> Result<(), Self::Error>;

    /// Stores the rows of one day, replacing the rows already stored for
    /// that date. Returns the full series.
    fn upsert(&mut self, day: Vec<TrackingRecord>) -> Result<Vec<TrackingRecord>, Self::Error> {
        let series = upsert_day(self.load()?, day);
        self.replace_all(&series)?;
        Ok(series)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryPriorStore {
    pub table: Option<PriorTable>,
}

impl PriorRepository for MemoryPriorStore {
    type Error = Infallible;

    fn load(&self) -> Result<Option<PriorTable>, Infallible> {
        Ok(self.table.clone())
    }

    fn store(&mut self, table: &PriorTable) -> Result<(), Infallible> {
        self.table = Some(table.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTrackingStore {
    pub records: Vec<TrackingRecord>,
}

impl TrackingRepository for MemoryTrackingStore {
    type Error = Infallible;

    fn load(&self) -> Result<Vec<TrackingRecord>, Infallible> {
        Ok(self.records.clone())
    }

    fn replace_all(&mut self, records: &[TrackingRecord]) -> Result<(), Infallible> {
        self.records = records.to_vec();
        Ok(())
    }
}
