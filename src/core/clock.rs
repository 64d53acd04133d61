use chrono::{DateTime, Local, NaiveTime, Timelike};

/// Reference time and its position within the planning horizon.
///
/// The horizon is anchored at the start of the day the slot series begins on,
/// so the slot index is simply the number of whole hours since the anchor.
#[derive(Copy, Clone, Debug)]
pub struct Clock {
    now: DateTime<Local>,
    horizon_start: DateTime<Local>,
}

impl Clock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self { now, horizon_start: start_of_day(now) }
    }

    /// Re-anchor to a new series origin and move the reference time.
    pub fn renew(&mut self, horizon_start: DateTime<Local>, now: DateTime<Local>) {
        self.horizon_start = horizon_start;
        self.now = now;
    }

    pub fn set_now(&mut self, now: DateTime<Local>) {
        self.now = now;
    }

    #[must_use]
    pub const fn now(&self) -> DateTime<Local> {
        self.now
    }

    #[must_use]
    pub const fn horizon_start(&self) -> DateTime<Local> {
        self.horizon_start
    }

    /// Index of the slot containing the reference time.
    #[must_use]
    pub fn index(&self) -> usize {
        usize::try_from((self.now - self.horizon_start).num_hours().max(0)).unwrap_or_default()
    }

    /// Unelapsed fraction of the current slot.
    #[must_use]
    pub fn remaining_fraction(&self) -> f64 {
        f64::from(60 - self.now.minute()) / 60.0
    }
}

/// Midnight of the day the given time falls on.
pub fn start_of_day(time: DateTime<Local>) -> DateTime<Local> {
    time.with_time(NaiveTime::MIN).earliest().unwrap_or(time)
}
