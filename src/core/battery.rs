pub mod simulator;

use bon::Builder;

use crate::{
    prelude::*,
    quantity::{Zero, energy::WattHours, percent::Percent, power::Watts},
};

/// Physical battery parameters. Must be validated before the engine starts.
#[derive(Copy, Clone, Debug, Builder)]
pub struct BatteryParameters {
    /// Rated capacity.
    pub capacity: WattHours,

    pub max_charge_power: Watts,

    /// State of charge below which the battery must not discharge.
    pub discharge_cutoff: Percent,

    /// State of charge above which the battery must not charge.
    pub charging_cutoff: Percent,

    /// Round-trip loss, split evenly between the charge and discharge legs.
    pub loss_fraction: f64,

    /// Fixed stand-by loss per slot.
    #[builder(default = WattHours(64.0))]
    pub stand_by_load: WattHours,
}

impl BatteryParameters {
    pub fn validated(self) -> Result<Self> {
        ensure!(self.capacity > WattHours::ZERO, "battery capacity must be positive");
        ensure!(self.max_charge_power > Watts::ZERO, "maximum charge power must be positive");
        ensure!(
            Percent::ZERO <= self.discharge_cutoff
                && self.discharge_cutoff < self.charging_cutoff
                && self.charging_cutoff <= Percent(100.0),
            "cut-off capacities must satisfy 0 ≤ discharge < charging ≤ 100",
        );
        ensure!((0.0..1.0).contains(&self.loss_fraction), "loss fraction must be within [0, 1)");
        ensure!(self.stand_by_load >= WattHours::ZERO, "stand-by load cannot be negative");
        Ok(self)
    }

    #[must_use]
    pub fn level_for(&self, soc: Percent) -> WattHours {
        WattHours(self.capacity.0 * soc.0 / 100.0)
    }

    #[must_use]
    pub fn soc_for(&self, level: WattHours) -> Percent {
        Percent((level.0 * 100.0 / self.capacity.0).round())
    }

    #[must_use]
    pub fn min_level(&self) -> WattHours {
        self.level_for(self.discharge_cutoff)
    }

    #[must_use]
    pub fn max_level(&self) -> WattHours {
        self.level_for(self.charging_cutoff)
    }

    /// Single-leg efficiency: half of the round-trip loss.
    #[must_use]
    pub fn half_loss_factor(&self) -> f64 {
        1.0 - self.loss_fraction / 2.0
    }

    /// Grid energy needed to put one unit of energy through the battery.
    #[must_use]
    pub fn uplift_factor(&self) -> f64 {
        1.0 + self.loss_fraction
    }
}
