use crate::{
    core::{battery::simulator::SocEntry, scheduler::Scheduler, table::LoadTable},
    prelude::*,
    quantity::{Zero, energy::WattHours, percent::Percent},
};

/// Feed-in expectation below which nothing is deferred.
const SURPLUS_ACTIVATION: WattHours = WattHours(2000.0);

/// Morning ends at this slot; deferral only considers the slots before it.
const NOON_INDEX: usize = 12;

/// Outcome of the surplus buffer forecast.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ChargeBuffer {
    /// Floor for surplus handling, never below the discharge cut-off.
    pub min_soc: Percent,

    /// The level the battery should not be charged below before surplus may
    /// be consumed or exported.
    pub buffer_soc: Percent,
}

/// The current day's remaining PV surplus and expected feed-in.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SurplusToday {
    pub index: usize,
    pub surplus: WattHours,
    pub feed_in: WattHours,
}

impl Scheduler<'_> {
    /// How far the minimum state of charge can be raised without the battery
    /// later running into the grid, bounded by the cut-off capacities.
    pub fn forecast_charge_buffer(
        &self,
        table: &LoadTable,
        soc: Percent,
        surplus_min_soc: Percent,
    ) -> ChargeBuffer {
        let projection =
            self.simulator().project_soc(table, self.clock(), table.len(), soc, true);
        let smallest = projection
            .iter()
            .skip(self.clock().index())
            .map(|entry| entry.soc)
            .min()
            .unwrap_or(soc);

        let min_soc = surplus_min_soc.max(self.parameters().discharge_cutoff);
        let headroom = (smallest - min_soc).round();
        let mut buffer_soc = min_soc;
        if soc - headroom > buffer_soc {
            buffer_soc = soc - headroom;
        }
        buffer_soc = buffer_soc.min(self.parameters().charging_cutoff);

        debug!(%smallest, %buffer_soc, "forecast the charge buffer");
        ChargeBuffer { min_soc, buffer_soc }
    }

    /// The current day's surplus and feed-in from `start_index` on, with the
    /// current slot scaled to its unelapsed part.
    pub fn surplus_today(
        &self,
        table: &LoadTable,
        projection: &[SocEntry],
        start_index: usize,
    ) -> SurplusToday {
        let to_index = if self.clock().index() > 23 { 47 } else { 23 };
        let mut surplus = WattHours::ZERO;
        let mut feed_in = WattHours::ZERO;
        for index in start_index..=to_index.min(table.len().saturating_sub(1)) {
            let slot = &table[index];
            let factor = if index == self.clock().index() {
                self.clock().remaining_fraction()
            } else {
                1.0
            };
            let excess = slot.pv - slot.consumption;
            if excess > WattHours::ZERO {
                surplus += excess * factor;
            }
            if let Some(entry) = projection.get(index) {
                if entry.grid < WattHours::ZERO {
                    feed_in -= entry.grid * factor;
                }
            }
        }
        SurplusToday { index: start_index, surplus: surplus.round(), feed_in: feed_in.round() }
    }

    /// Reserve morning PV production for later feed-in on strong surplus
    /// days: the reserved slots hold their energy back instead of charging.
    pub fn defer_surplus_charging(
        &self,
        table: &mut LoadTable,
        soc: Percent,
        surplus_min_soc: Percent,
    ) {
        let projection =
            self.simulator().project_soc(table, self.clock(), table.len(), soc, false);
        let start_index = self.clock().index().max(NOON_INDEX);
        let today = self.surplus_today(table, &projection, start_index);
        debug!(surplus = ?today.surplus, feed_in = ?today.feed_in, "surplus today");

        let mut budget = today.feed_in * self.surplus_reserve_factor();
        if budget < SURPLUS_ACTIVATION {
            return;
        }

        for index in self.clock().index()..NOON_INDEX.min(table.len()) {
            let slot = &table[index];
            if slot.pv <= WattHours::ZERO || slot.charged_energy != WattHours::ZERO {
                continue;
            }
            let healthy = projection
                .get(index)
                .is_some_and(|entry| entry.soc > surplus_min_soc + Percent(5.0));
            if !healthy {
                continue;
            }
            let excess = (slot.pv - slot.consumption).max(WattHours::ZERO);
            if excess > WattHours::ZERO && excess < budget {
                debug!(index, held_back = ?excess, "deferring surplus");
                table[index].charged_energy = -excess;
                table[index].lock_charging = true;
                budget -= excess;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scheduler::tests::{clock_at, flat_table, parameters, rates_from};

    #[test]
    fn buffer_is_bounded_by_the_cutoffs() {
        let parameters = parameters();
        let clock = clock_at(0, 0);
        let rates = rates_from(&[0.25; 24]);
        let scheduler = Scheduler::builder()
            .parameters(&parameters)
            .rates(&rates)
            .clock(&clock)
            .build();
        let table = flat_table(1000.0, 0.0, 24);

        // A draining day: everything the battery holds will be needed, so
        // the buffer pins at the charging cut-off.
        let buffer = scheduler.forecast_charge_buffer(&table, Percent(50.0), Percent(20.0));
        assert!(buffer.min_soc >= parameters.discharge_cutoff);
        assert_eq!(buffer.buffer_soc, parameters.charging_cutoff);
        assert!(buffer.buffer_soc >= buffer.min_soc);
    }

    #[test]
    fn a_sunny_day_frees_the_surplus() {
        let parameters = parameters();
        let clock = clock_at(0, 0);
        let rates = rates_from(&[0.25; 24]);
        let scheduler = Scheduler::builder()
            .parameters(&parameters)
            .rates(&rates)
            .clock(&clock)
            .build();
        // Permanent surplus: none of the stored energy is needed later, so
        // the buffer relaxes down to the configured floor.
        let table = flat_table(100.0, 1500.0, 24);
        let buffer = scheduler.forecast_charge_buffer(&table, Percent(60.0), Percent(20.0));
        assert_eq!(buffer.buffer_soc, buffer.min_soc);
        assert_eq!(buffer.min_soc, Percent(20.0));
    }

    #[test]
    fn surplus_today_collects_excess_and_feed_in() {
        let parameters = parameters();
        let clock = clock_at(12, 0);
        let rates = rates_from(&[0.25; 24]);
        let scheduler = Scheduler::builder()
            .parameters(&parameters)
            .rates(&rates)
            .clock(&clock)
            .build();
        // A full battery turns all afternoon surplus into feed-in:
        let table = flat_table(100.0, 1100.0, 24);
        let projection =
            scheduler.simulator().project_soc(&table, &clock, 24, Percent(90.0), false);
        let today = scheduler.surplus_today(&table, &projection, 12);

        assert_eq!(today.index, 12);
        // Twelve afternoon slots with 1000 Wh of excess each:
        assert_eq!(today.surplus, WattHours(12000.0));
        assert_eq!(today.feed_in, WattHours(12000.0));
    }

    #[test]
    fn a_weak_day_defers_nothing() {
        let parameters = parameters();
        let clock = clock_at(6, 0);
        let rates = rates_from(&[0.25; 24]);
        let scheduler = Scheduler::builder()
            .parameters(&parameters)
            .rates(&rates)
            .clock(&clock)
            .build();
        let mut table = flat_table(400.0, 500.0, 24);
        scheduler.defer_surplus_charging(&mut table, Percent(50.0), Percent(20.0));
        assert!(table.slots().iter().all(|slot| !slot.lock_charging));
    }

    #[test]
    fn a_strong_day_holds_back_morning_production() {
        let parameters = parameters();
        let clock = clock_at(6, 0);
        let rates = rates_from(&[0.25; 24]);
        let scheduler = Scheduler::builder()
            .parameters(&parameters)
            .rates(&rates)
            .clock(&clock)
            .build();
        // Strong production all day on a healthy battery:
        let mut table = flat_table(100.0, 2000.0, 24);
        scheduler.defer_surplus_charging(&mut table, Percent(60.0), Percent(20.0));

        let deferred: Vec<_> = table
            .slots()
            .iter()
            .filter(|slot| slot.lock_charging)
            .map(|slot| slot.index)
            .collect();
        assert!(!deferred.is_empty());
        assert!(deferred.iter().all(|&index| (6..12).contains(&index)));
        assert!(
            table
                .slots()
                .iter()
                .filter(|slot| slot.lock_charging)
                .all(|slot| slot.charged_energy < WattHours::ZERO)
        );
    }
}
