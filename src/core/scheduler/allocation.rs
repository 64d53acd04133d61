use itertools::Itertools;

use crate::{
    core::{
        point::ChargePoint,
        scheduler::{HighPriceWindow, Scheduler},
        table::LoadTable,
    },
    prelude::*,
    quantity::{Zero, energy::WattHours, percent::Percent, time::Hours},
};

/// Share of the maximum charge power a single slot may be planned at,
/// leaving room for the household load on the same connection.
const SLOT_POWER_SHARE: f64 = 0.8;

impl Scheduler<'_> {
    /// Greedily pack each window's shifted energy into the cheapest slots
    /// ahead of it, checking every assignment against the simulated overload.
    pub fn allocate_charge_shifts(
        &self,
        table: &mut LoadTable,
        windows: &[HighPriceWindow],
        soc: Percent,
    ) -> Vec<ChargePoint> {
        let slot_budget = self.parameters().max_charge_power * Hours(1.0) * SLOT_POWER_SHARE;
        let mut points: Vec<ChargePoint> = Vec::new();

        for window in windows {
            let candidates = self
                .rates()
                .iter()
                .filter(|entry| {
                    entry.index > self.clock().index() && entry.index < window.index
                })
                .filter(|entry| entry.rate < window.threshold)
                .sorted_by_key(|entry| entry.rate)
                .collect_vec();

            let mut rest = window.energy;
            for entry in candidates {
                if rest <= WattHours::ZERO {
                    break;
                }
                if table.get(entry.index).is_none() {
                    continue;
                }
                let committed = points
                    .iter()
                    .find(|point| point.index == entry.index)
                    .map_or(WattHours::ZERO, |point| point.energy);
                let energy = rest.min(slot_budget - committed);
                if energy <= WattHours::ZERO {
                    continue;
                }

                let overload = self.simulator().simulate_forward(
                    table,
                    self.clock().index() + 1,
                    entry.index,
                    energy,
                    soc,
                );
                let energy = (energy - overload).round();
                if energy <= WattHours::ZERO {
                    continue;
                }

                if let Some(point) =
                    points.iter_mut().find(|point| point.index == entry.index)
                {
                    point.energy += energy;
                    point.power = point.energy / Hours(1.0);
                    // Keep the earliest window the slot protects:
                    point.covers_index = point.covers_index.min(window.index);
                } else {
                    points.push(ChargePoint {
                        index: entry.index,
                        start: table[entry.index].start,
                        energy,
                        power: energy / Hours(1.0),
                        rate: entry.rate,
                        covers_index: window.index,
                        target_soc: Percent::ZERO,
                    });
                }
                table[entry.index].charged_energy += energy;
                rest -= energy;
            }
        }

        // Drop the noise, returning the committed energy to the slots:
        points.retain(|point| {
            if point.energy >= self.min_point_energy() {
                return true;
            }
            debug!(index = point.index, energy = ?point.energy, "dropping a small shift");
            let slot = &mut table[point.index];
            slot.charged_energy = (slot.charged_energy - point.energy).max(WattHours::ZERO);
            false
        });

        points.sort_by_key(|point| point.index);
        points
    }
}
