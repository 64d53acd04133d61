mod allocation;
mod buffer;
mod locks;
mod windows;

use bon::Builder;

pub use self::{
    buffer::{ChargeBuffer, SurplusToday},
    windows::HighPriceWindow,
};
use crate::{
    core::{
        battery::{BatteryParameters, simulator::Simulator},
        clock::Clock,
        point::ChargePoint,
        rates::RateEntry,
        table::LoadTable,
    },
    prelude::*,
    quantity::{energy::WattHours, percent::Percent},
};

/// The price-based scheduler.
///
/// Pure and idempotent: rerunning it with identical inputs reproduces the
/// identical plan.
#[derive(Builder)]
pub struct Scheduler<'a> {
    parameters: &'a BatteryParameters,
    rates: &'a [RateEntry],
    clock: &'a Clock,

    /// Planned shifts smaller than this are treated as noise and dropped.
    #[builder(default = WattHours(200.0))]
    min_point_energy: WattHours,

    /// Fraction of the forecast surplus counted on when deferring charging.
    #[builder(default = 0.75)]
    surplus_reserve_factor: f64,
}

impl Scheduler<'_> {
    pub(crate) fn simulator(&self) -> Simulator<'_> {
        Simulator::new(self.parameters)
    }

    pub(crate) const fn parameters(&self) -> &BatteryParameters {
        self.parameters
    }

    pub(crate) const fn rates(&self) -> &[RateEntry] {
        self.rates
    }

    pub(crate) const fn clock(&self) -> &Clock {
        self.clock
    }

    pub(crate) const fn min_point_energy(&self) -> WattHours {
        self.min_point_energy
    }

    pub(crate) const fn surplus_reserve_factor(&self) -> f64 {
        self.surplus_reserve_factor
    }

    /// The length of the horizon the price series covers.
    pub(crate) fn horizon(&self) -> usize {
        self.rates.len()
    }

    /// The full shift pass: search the expensive slots, preserve stored
    /// energy for them, then pre-charge the cheap slots ahead of them.
    #[instrument(skip_all)]
    pub fn plan(&self, table: &mut LoadTable, soc: Percent) -> Vec<ChargePoint> {
        if self.rates.is_empty() {
            warn!("no prices available, passing through without shifts");
            return Vec::new();
        }

        let windows = self.find_high_price_windows(table, soc);
        debug!(n_windows = windows.len(), "searched the high prices");
        self.lock_cheap_discharge(table, &windows, soc);

        // The locks change the projected grid draw, so search again:
        let windows = self.find_high_price_windows(table, soc);
        let mut points = self.allocate_charge_shifts(table, &windows, soc);

        let projection =
            self.simulator().project_soc(table, self.clock, self.horizon(), soc, false);
        for point in &mut points {
            if let Some(entry) = projection.get(point.index) {
                point.target_soc = entry.soc;
            }
        }

        info!(n_points = points.len(), "planned");
        points
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{Local, TimeDelta, TimeZone};

    use super::*;
    use crate::{
        core::slot::Slot,
        quantity::{Zero, power::Watts, rate::KilowattHourRate},
    };

    pub(crate) fn parameters() -> BatteryParameters {
        BatteryParameters::builder()
            .capacity(WattHours(10000.0))
            .max_charge_power(Watts(3000.0))
            .discharge_cutoff(Percent(10.0))
            .charging_cutoff(Percent(90.0))
            .loss_fraction(0.17)
            .stand_by_load(WattHours::ZERO)
            .build()
            .validated()
            .unwrap()
    }

    pub(crate) fn clock_at(hour: u32, minute: u32) -> Clock {
        Clock::new(Local.with_ymd_and_hms(2026, 1, 15, hour, minute, 0).unwrap())
    }

    pub(crate) fn flat_table(consumption: f64, pv: f64, len: usize) -> LoadTable {
        let start = Local.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        let slots = (0..len)
            .map(|index| {
                let mut slot = Slot::new(
                    index,
                    start + TimeDelta::hours(i64::try_from(index).unwrap()),
                    WattHours(consumption),
                );
                slot.pv = WattHours(pv);
                slot
            })
            .collect();
        LoadTable::new(slots).unwrap()
    }

    pub(crate) fn rates_from(values: &[f64]) -> Vec<RateEntry> {
        let start = Local.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(index, &rate)| RateEntry {
                index,
                rate: KilowattHourRate(rate),
                starts_at: start + TimeDelta::hours(i64::try_from(index).unwrap()),
            })
            .collect()
    }

    #[test]
    fn identical_prices_produce_an_empty_plan() {
        let parameters = parameters();
        let clock = clock_at(0, 0);
        let rates = rates_from(&[0.25; 24]);
        let scheduler = Scheduler::builder()
            .parameters(&parameters)
            .rates(&rates)
            .clock(&clock)
            .build();
        let mut table = flat_table(400.0, 0.0, 24);
        let points = scheduler.plan(&mut table, Percent(50.0));
        assert!(points.is_empty());
    }

    #[test]
    fn an_empty_price_series_passes_through() {
        let parameters = parameters();
        let clock = clock_at(0, 0);
        let rates: Vec<RateEntry> = Vec::new();
        let scheduler = Scheduler::builder()
            .parameters(&parameters)
            .rates(&rates)
            .clock(&clock)
            .build();
        let mut table = flat_table(400.0, 0.0, 24);
        assert!(scheduler.plan(&mut table, Percent(50.0)).is_empty());
    }

    #[test]
    fn replanning_identical_inputs_is_deterministic() {
        let parameters = parameters();
        let clock = clock_at(0, 0);
        let rates = rates_from(&[0.10, 0.10, 0.12, 0.10, 0.40, 0.38, 0.11, 0.35]);
        let scheduler = Scheduler::builder()
            .parameters(&parameters)
            .rates(&rates)
            .clock(&clock)
            .build();

        let pristine = flat_table(800.0, 0.0, 8);
        let mut first_table = pristine.clone();
        let mut second_table = pristine.clone();
        let first = scheduler.plan(&mut first_table, Percent(20.0));
        let second = scheduler.plan(&mut second_table, Percent(20.0));

        assert_eq!(first, second);
        assert_eq!(first_table, second_table);
        assert!(!first.is_empty());
        // The plan comes out ordered by slot:
        assert!(first.windows(2).all(|pair| pair[0].index < pair[1].index));
    }

    #[test]
    fn target_soc_reflects_the_committed_charge() {
        let parameters = parameters();
        let clock = clock_at(0, 0);
        let rates = rates_from(&[0.10, 0.10, 0.10, 0.10, 0.40]);
        let scheduler = Scheduler::builder()
            .parameters(&parameters)
            .rates(&rates)
            .clock(&clock)
            .build();
        let mut table = flat_table(1000.0, 0.0, 5);
        let points = scheduler.plan(&mut table, Percent(10.0));
        assert_eq!(points.len(), 1);
        // Charging raises the projection above the resting cut-off:
        assert!(points[0].target_soc > parameters.discharge_cutoff);
    }
}
