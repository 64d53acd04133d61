use chrono::{DateTime, Local};

use crate::{
    core::{battery::BatteryParameters, clock::Clock, slot::Slot, table::LoadTable},
    quantity::{
        Zero,
        energy::WattHours,
        percent::Percent,
        rate::KilowattHourRate,
        time::Hours,
    },
};

/// Pure battery physics over the slot series. Stateless per call: the caller
/// passes the starting energy level in and gets the outcome back.
#[derive(Copy, Clone)]
pub struct Simulator<'a> {
    parameters: &'a BatteryParameters,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StepOutcome {
    pub level: WattHours,

    /// Energy drawn from the grid during the slot; negative means feed-in.
    pub grid: WattHours,

    /// Energy the battery could not accept.
    pub overload: WattHours,
}

/// One row of the state-of-charge projection.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct SocEntry {
    pub index: usize,
    pub start: DateTime<Local>,
    pub level: WattHours,
    pub soc: Percent,
    pub grid: WattHours,
    pub overload: WattHours,
    pub pv: WattHours,
    pub consumption: WattHours,
    pub rate: KilowattHourRate,
}

impl SocEntry {
    /// A slot in the past: carried for alignment, not simulated.
    fn skipped(index: usize, start: DateTime<Local>) -> Self {
        Self {
            index,
            start,
            level: WattHours::ZERO,
            soc: Percent::ZERO,
            grid: WattHours::ZERO,
            overload: WattHours::ZERO,
            pv: WattHours::ZERO,
            consumption: WattHours::ZERO,
            rate: KilowattHourRate::ZERO,
        }
    }
}

impl<'a> Simulator<'a> {
    pub const fn new(parameters: &'a BatteryParameters) -> Self {
        Self { parameters }
    }

    /// Single-slot physics update.
    pub fn step(&self, level: WattHours, slot: &Slot, injected: WattHours) -> StepOutcome {
        self.step_with(level, slot, injected, false)
    }

    fn step_with(
        &self,
        mut level: WattHours,
        slot: &Slot,
        injected: WattHours,
        allow_negative: bool,
    ) -> StepOutcome {
        let parameters = self.parameters;
        let mut grid = WattHours::ZERO;
        let mut overload = WattHours::ZERO;

        let mut charge = injected + slot.charged_energy;
        let mut lock_fraction = slot.lock_discharge_fraction;
        if slot.charged_energy > WattHours::ZERO {
            // A slot with committed charge never discharges at the same time.
            lock_fraction = 1.0;
        }

        let mut deficit = slot.deficit() + parameters.stand_by_load;

        if charge != WattHours::ZERO {
            let per_slot = parameters.max_charge_power * Hours(1.0);
            if charge > per_slot {
                overload += charge - per_slot;
                charge = per_slot;
            }
            if charge > WattHours::ZERO {
                level += charge * parameters.half_loss_factor();
                lock_fraction = 1.0;
            } else {
                // Held-back feed-in covers the deficit first.
                deficit -= charge;
            }
            grid += charge;
        }

        if deficit > WattHours::ZERO {
            if allow_negative {
                // Buffer-sizing mode: grid import is absorbed by letting the
                // level sink below the floor.
                level -= deficit;
            } else {
                let via_grid = deficit * lock_fraction;
                let from_battery = deficit - via_grid;
                grid += via_grid;
                let headroom = (level - parameters.min_level()) * parameters.half_loss_factor();
                if from_battery > headroom {
                    grid += from_battery - headroom;
                    level = parameters.min_level();
                } else {
                    level -= from_battery;
                }
            }
        } else {
            // Surplus charges the battery.
            level -= deficit;
        }

        if level > parameters.max_level() {
            let excess = level - parameters.max_level();
            overload += excess;
            grid -= excess;
            level = parameters.max_level();
        }

        StepOutcome { level: level.round(), grid: grid.round(), overload }
    }

    /// Test the feasibility of injecting energy at a slot: the worst overload
    /// seen at or after the injection.
    pub fn simulate_forward(
        &self,
        table: &LoadTable,
        from_index: usize,
        inject_at: usize,
        injected: WattHours,
        start_soc: Percent,
    ) -> WattHours {
        let mut level = self.parameters.level_for(start_soc);
        let mut worst = WattHours::ZERO;
        for slot in table.slots().iter().skip(from_index) {
            let injected_here =
                if slot.index == inject_at { injected } else { WattHours::ZERO };
            let outcome = self.step(level, slot, injected_here);
            level = outcome.level;
            if slot.index >= inject_at {
                worst = worst.max(outcome.overload);
            }
        }
        worst
    }

    /// Project the state of charge over the table up to `to_index`.
    ///
    /// Slots before the reference time are emitted unsimulated; the current
    /// slot is scaled down to its unelapsed part.
    pub fn project_soc(
        &self,
        table: &LoadTable,
        clock: &Clock,
        to_index: usize,
        start_soc: Percent,
        allow_negative: bool,
    ) -> Vec<SocEntry> {
        let now_index = clock.index();
        let mut level = self.parameters.level_for(start_soc);
        let mut entries = Vec::with_capacity(to_index.min(table.len()));
        for slot in table.slots().iter().take(to_index) {
            if slot.index < now_index {
                entries.push(SocEntry::skipped(slot.index, slot.start));
                continue;
            }
            let simulated = if slot.index == now_index {
                let fraction = clock.remaining_fraction();
                let mut scaled = slot.clone();
                scaled.pv = (slot.pv * fraction).round();
                scaled.consumption = (slot.consumption * fraction).round();
                scaled
            } else {
                slot.clone()
            };
            let outcome = self.step_with(level, &simulated, WattHours::ZERO, allow_negative);
            level = outcome.level;
            entries.push(SocEntry {
                index: slot.index,
                start: slot.start,
                level,
                soc: self.parameters.soc_for(level),
                grid: outcome.grid,
                overload: outcome.overload,
                pv: simulated.pv,
                consumption: simulated.consumption,
                rate: KilowattHourRate::ZERO,
            });
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};

    use super::*;
    use crate::quantity::power::Watts;

    fn parameters() -> BatteryParameters {
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

    fn flat_table(consumption: f64, pv: f64, len: usize) -> LoadTable {
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

    fn clock_at(hour: u32) -> Clock {
        Clock::new(Local.with_ymd_and_hms(2026, 1, 15, hour, 0, 0).unwrap())
    }

    #[test]
    fn balanced_slot_only_loses_the_stand_by_load() {
        let parameters = BatteryParameters::builder()
            .capacity(WattHours(10000.0))
            .max_charge_power(Watts(3000.0))
            .discharge_cutoff(Percent(10.0))
            .charging_cutoff(Percent(90.0))
            .loss_fraction(0.17)
            .build()
            .validated()
            .unwrap();
        let simulator = Simulator::new(&parameters);
        let table = flat_table(500.0, 500.0, 1);
        let outcome = simulator.step(WattHours(5000.0), &table[0], WattHours::ZERO);
        assert_eq!(outcome.level, WattHours(5000.0) - parameters.stand_by_load);
        assert_eq!(outcome.overload, WattHours::ZERO);
    }

    #[test]
    fn level_never_leaves_the_bounds() {
        let parameters = parameters();
        let simulator = Simulator::new(&parameters);
        let table = flat_table(0.0, 0.0, 1);

        // Overcharging reports overload and caps the level:
        let mut slot = table[0].clone();
        slot.charged_energy = WattHours(3000.0);
        let outcome = simulator.step(WattHours(8500.0), &slot, WattHours::ZERO);
        assert_eq!(outcome.level, parameters.max_level());
        assert!(outcome.overload > WattHours::ZERO);

        // Draining stops at the floor and the rest comes from the grid:
        let heavy = {
            let mut slot = table[0].clone();
            slot.consumption = WattHours(5000.0);
            slot
        };
        let outcome = simulator.step(WattHours(1200.0), &heavy, WattHours::ZERO);
        assert_eq!(outcome.level, parameters.min_level());
        assert!(outcome.grid > WattHours::ZERO);
    }

    #[test]
    fn charge_above_the_power_limit_is_overload() {
        let parameters = parameters();
        let simulator = Simulator::new(&parameters);
        let table = flat_table(0.0, 0.0, 1);
        let outcome = simulator.step(WattHours(2000.0), &table[0], WattHours(4000.0));
        // Only one slot-hour of maximum power fits:
        assert_eq!(outcome.overload, WattHours(1000.0));
        assert_eq!(
            outcome.level,
            (WattHours(2000.0) + WattHours(3000.0) * parameters.half_loss_factor()).round()
        );
    }

    #[test]
    fn feed_in_is_negative_grid() {
        let parameters = parameters();
        let simulator = Simulator::new(&parameters);
        let table = flat_table(0.0, 3000.0, 1);
        let outcome = simulator.step(WattHours(8000.0), &table[0], WattHours::ZERO);
        // 8000 + 3000 exceeds the 9000 ceiling by 2000:
        assert_eq!(outcome.level, parameters.max_level());
        assert_eq!(outcome.grid, WattHours(-2000.0));
        assert_eq!(outcome.overload, WattHours(2000.0));
    }

    #[test]
    fn discharge_lock_routes_the_deficit_to_the_grid() {
        let parameters = parameters();
        let simulator = Simulator::new(&parameters);
        let mut table = flat_table(1000.0, 0.0, 1);
        table[0].add_discharge_lock(1.0);
        let outcome = simulator.step(WattHours(5000.0), &table[0], WattHours::ZERO);
        assert_eq!(outcome.level, WattHours(5000.0));
        assert_eq!(outcome.grid, WattHours(1000.0));
    }

    #[test]
    fn partial_lock_splits_the_deficit() {
        let parameters = parameters();
        let simulator = Simulator::new(&parameters);
        let mut table = flat_table(1000.0, 0.0, 1);
        table[0].add_discharge_lock(0.5);
        let outcome = simulator.step(WattHours(5000.0), &table[0], WattHours::ZERO);
        assert_eq!(outcome.grid, WattHours(500.0));
        assert_eq!(outcome.level, WattHours(4500.0));
    }

    #[test]
    fn no_injection_means_no_overload() {
        let parameters = parameters();
        let simulator = Simulator::new(&parameters);
        let table = flat_table(400.0, 0.0, 24);
        let worst = simulator.simulate_forward(&table, 1, 5, WattHours::ZERO, Percent(50.0));
        assert_eq!(worst, WattHours::ZERO);
    }

    #[test]
    fn flat_projection_holds_the_level() {
        let parameters = parameters();
        let simulator = Simulator::new(&parameters);
        let table = flat_table(0.0, 0.0, 24);
        let projection =
            simulator.project_soc(&table, &clock_at(0), 24, Percent(50.0), false);
        assert!(projection.iter().all(|entry| entry.soc == Percent(50.0)));
    }

    #[test]
    fn projection_declines_towards_the_cutoff() {
        let parameters = parameters();
        let simulator = Simulator::new(&parameters);
        let table = flat_table(400.0, 0.0, 24);
        let projection =
            simulator.project_soc(&table, &clock_at(0), 24, Percent(50.0), false);

        assert!(projection.windows(2).all(|pair| pair[1].soc <= pair[0].soc));
        assert_eq!(projection.last().unwrap().soc, parameters.discharge_cutoff);
        // Once the floor is reached, the demand falls back to the grid:
        assert!(projection.last().unwrap().grid > WattHours::ZERO);
    }

    #[test]
    fn buffer_mode_sinks_below_the_floor() {
        let parameters = parameters();
        let simulator = Simulator::new(&parameters);
        let table = flat_table(1000.0, 0.0, 24);
        let projection =
            simulator.project_soc(&table, &clock_at(0), 24, Percent(20.0), true);
        let smallest = projection.iter().map(|entry| entry.soc).min().unwrap();
        assert!(smallest < Percent::ZERO);
        // Nothing is imported in this mode:
        assert!(projection.iter().all(|entry| entry.grid <= WattHours::ZERO));
    }

    #[test]
    fn past_slots_are_not_simulated() {
        let parameters = parameters();
        let simulator = Simulator::new(&parameters);
        let table = flat_table(400.0, 0.0, 24);
        let projection =
            simulator.project_soc(&table, &clock_at(6), 24, Percent(50.0), false);
        assert!(projection[..6].iter().all(|entry| entry.soc == Percent::ZERO));
        assert!(projection[6].soc > Percent::ZERO);
    }

    #[test]
    fn the_first_slot_is_scaled_to_its_remainder() {
        let parameters = parameters();
        let simulator = Simulator::new(&parameters);
        let table = flat_table(1000.0, 0.0, 2);
        let clock = Clock::new(Local.with_ymd_and_hms(2026, 1, 15, 0, 45, 0).unwrap());
        let projection = simulator.project_soc(&table, &clock, 2, Percent(50.0), false);
        // Only a quarter of the slot is still ahead:
        assert_eq!(projection[0].consumption, WattHours(250.0));
        assert_eq!(projection[0].level, WattHours(4750.0));
    }
}
