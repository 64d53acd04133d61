use chrono::{DateTime, Local, TimeDelta};

use crate::{
    core::window::TimeWindow,
    quantity::{energy::WattHours, percent::Percent, power::Watts, rate::KilowattHourRate},
};

/// A PV production estimate point: energy produced during the hour starting
/// at `time`.
#[derive(Copy, Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct EnergyPoint {
    pub time: DateTime<Local>,
    pub energy: WattHours,
}

/// A planned energy shift into a cheap slot, ahead of a costlier one.
#[derive(Copy, Clone, Debug, PartialEq, serde::Serialize)]
pub struct ChargePoint {
    pub index: usize,

    pub start: DateTime<Local>,

    /// Energy to move into this slot.
    pub energy: WattHours,

    pub power: Watts,

    /// Price paid for the shifted energy.
    pub rate: KilowattHourRate,

    /// Index of the expensive slot this shift protects.
    pub covers_index: usize,

    /// Projected state of charge once the shift is realised.
    pub target_soc: Percent,
}

impl ChargePoint {
    /// The window during which a process may pick this point up: the battery
    /// is woken up to 45 minutes early, and a late start is tolerated for the
    /// rest of the slot.
    pub fn wake_window(&self) -> TimeWindow {
        TimeWindow::new(self.start - TimeDelta::minutes(45), self.start + TimeDelta::minutes(60))
    }

    /// The slot itself.
    pub fn charge_window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.start + TimeDelta::minutes(60))
    }
}
