use chrono::{DateTime, Local};

use crate::quantity::rate::KilowattHourRate;

/// One entry of the dynamic price series, aligned with the load table slots.
#[derive(Copy, Clone, Debug, PartialEq, serde::Serialize)]
pub struct RateEntry {
    pub index: usize,
    pub rate: KilowattHourRate,
    pub starts_at: DateTime<Local>,
}

impl RateEntry {
    /// Merge per-day series into one indexed horizon-long series.
    #[must_use]
    pub fn index_merged(days: Vec<Vec<(DateTime<Local>, KilowattHourRate)>>) -> Vec<Self> {
        days.into_iter()
            .flatten()
            .enumerate()
            .map(|(index, (starts_at, rate))| Self { index, rate, starts_at })
            .collect()
    }
}
