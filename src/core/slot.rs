use chrono::{DateTime, Local};

use crate::quantity::{Zero, energy::WattHours};

/// One hour of the two-day planning horizon.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Slot {
    pub index: usize,

    pub start: DateTime<Local>,

    /// Forecast household consumption during the slot.
    pub consumption: WattHours,

    /// Forecast PV production during the slot.
    pub pv: WattHours,

    /// Running sum of production minus consumption up to and including this slot.
    pub balance: WattHours,

    /// Energy the scheduler committed to move into this slot (positive),
    /// or to hold back from feeding in (negative).
    pub charged_energy: WattHours,

    pub lock_charging: bool,

    /// Fraction of the slot during which battery discharge is suppressed.
    pub lock_discharge_fraction: f64,
}

impl Slot {
    pub fn new(index: usize, start: DateTime<Local>, consumption: WattHours) -> Self {
        Self {
            index,
            start,
            consumption,
            pv: WattHours::ZERO,
            balance: WattHours::ZERO,
            charged_energy: WattHours::ZERO,
            lock_charging: false,
            lock_discharge_fraction: 0.0,
        }
    }

    /// Consumption not covered by the slot's own production.
    #[must_use]
    pub fn deficit(&self) -> WattHours {
        self.consumption - self.pv
    }

    #[must_use]
    pub fn is_discharge_locked(&self) -> bool {
        self.lock_discharge_fraction >= 1.0
    }

    pub fn add_discharge_lock(&mut self, fraction: f64) {
        self.lock_discharge_fraction = (self.lock_discharge_fraction + fraction).min(1.0);
    }
}
