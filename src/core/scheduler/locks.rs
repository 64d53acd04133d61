use itertools::Itertools;

use crate::{
    core::{scheduler::{HighPriceWindow, Scheduler}, table::LoadTable},
    prelude::*,
    quantity::{Zero, energy::WattHours, percent::Percent, rate::KilowattHourRate},
};

impl Scheduler<'_> {
    /// Suppress battery discharge in slots cheaper than the windows'
    /// break-even rate, so the stored energy survives until the expensive
    /// slots. Cheapest slots are locked first; a slot may end up locked for
    /// a fraction of its duration.
    pub fn lock_cheap_discharge(
        &self,
        table: &mut LoadTable,
        windows: &[HighPriceWindow],
        soc: Percent,
    ) {
        let Some(latest_index) = windows.iter().map(|window| window.index).max() else {
            return;
        };
        let threshold = windows
            .iter()
            .map(|window| window.threshold)
            .max()
            .unwrap_or(KilowattHourRate::ZERO);
        let required: WattHours = windows.iter().map(|window| window.energy).sum();

        let candidates = self
            .rates()
            .iter()
            .filter(|entry| {
                entry.index >= self.clock().index() && entry.index < latest_index
            })
            .filter(|entry| entry.rate < threshold)
            .sorted_by_key(|entry| entry.rate)
            .collect_vec();

        let mut covered = WattHours::ZERO;
        let mut floor = self.projected_floor(table, soc, latest_index);
        for entry in candidates {
            if covered >= required {
                break;
            }
            let Some(slot) = table.get(entry.index) else { continue };
            let deficit = slot.deficit();
            if deficit <= WattHours::ZERO || slot.is_discharge_locked() {
                continue;
            }
            let fraction = ((required - covered) / deficit)
                .min(1.0 - slot.lock_discharge_fraction);
            if fraction <= 0.0 {
                continue;
            }

            let previous = slot.lock_discharge_fraction;
            table[entry.index].add_discharge_lock(fraction);
            let with_lock = self.projected_floor(table, soc, latest_index);
            if with_lock < floor {
                // The lock made things worse, back out and stop.
                table[entry.index].lock_discharge_fraction = previous;
                break;
            }

            debug!(index = entry.index, fraction, "locked discharge");
            floor = with_lock;
            covered += deficit * fraction;
        }
    }

    /// Lowest projected state of charge before the given slot.
    fn projected_floor(&self, table: &LoadTable, soc: Percent, to_index: usize) -> Percent {
        self.simulator()
            .project_soc(table, self.clock(), to_index, soc, false)
            .iter()
            .skip(self.clock().index())
            .map(|entry| entry.soc)
            .min()
            .unwrap_or(soc)
    }
}
