use std::cmp::Reverse;

use crate::{
    core::{scheduler::Scheduler, table::LoadTable},
    quantity::{
        Zero,
        cost::Cost,
        energy::WattHours,
        percent::Percent,
        rate::KilowattHourRate,
    },
};

/// A future slot whose expected grid import is priced above the best earlier
/// alternative.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HighPriceWindow {
    /// Index of the expensive slot.
    pub index: usize,

    /// Break-even rate: the cheapest rate seen so far, marked up by the
    /// round-trip loss.
    pub threshold: KilowattHourRate,

    /// Energy to shift forward, marked up by the loss.
    pub energy: WattHours,

    /// What the import would cost unshifted.
    pub cost: Cost,
}

impl Scheduler<'_> {
    /// Walk the future slots, tracking the running price minimum, and emit a
    /// window wherever grid import meets a price above the break-even
    /// threshold. Most expensive first.
    pub fn find_high_price_windows(
        &self,
        table: &LoadTable,
        soc: Percent,
    ) -> Vec<HighPriceWindow> {
        let to_index = self.horizon().min(table.len());
        let projection =
            self.simulator().project_soc(table, self.clock(), to_index, soc, false);

        let mut windows = Vec::new();
        let mut smallest = KilowattHourRate(f64::INFINITY);
        for entry in self.rates().iter().take(to_index) {
            if entry.index <= self.clock().index() {
                continue;
            }
            smallest = smallest.min(entry.rate);
            let threshold = (smallest * self.parameters().uplift_factor()).rounded();
            let Some(projected) = projection.get(entry.index) else { continue };
            if projected.grid > WattHours::ZERO && entry.rate > threshold {
                let energy = (projected.grid * self.parameters().uplift_factor()).round();
                windows.push(HighPriceWindow {
                    index: entry.index,
                    threshold,
                    energy,
                    cost: energy * entry.rate,
                });
            }
        }
        windows.sort_by_key(|window| Reverse(window.cost));
        windows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scheduler::tests::{clock_at, flat_table, parameters, rates_from};

    #[test]
    fn windows_are_sorted_most_expensive_first() {
        let parameters = parameters();
        let clock = clock_at(0, 0);
        let rates = rates_from(&[0.10, 0.10, 0.30, 0.10, 0.45, 0.35]);
        let scheduler = Scheduler::builder()
            .parameters(&parameters)
            .rates(&rates)
            .clock(&clock)
            .build();
        // An empty battery imports everything:
        let table = flat_table(1000.0, 0.0, 6);
        let windows = scheduler.find_high_price_windows(&table, Percent(10.0));

        assert_eq!(windows.len(), 3);
        assert!(windows.windows(2).all(|pair| pair[0].cost >= pair[1].cost));
        assert_eq!(windows[0].index, 4);
    }

    #[test]
    fn threshold_follows_the_running_minimum() {
        let parameters = parameters();
        let clock = clock_at(0, 0);
        let rates = rates_from(&[0.20, 0.20, 0.08, 0.40, 0.40]);
        let scheduler = Scheduler::builder()
            .parameters(&parameters)
            .rates(&rates)
            .clock(&clock)
            .build();
        let table = flat_table(1000.0, 0.0, 5);
        let windows = scheduler.find_high_price_windows(&table, Percent(10.0));

        for window in &windows {
            // 0.08 is the cheapest rate ahead of both windows:
            assert_eq!(window.threshold, (KilowattHourRate(0.08) * 1.17).rounded());
        }
    }

    #[test]
    fn covered_demand_opens_no_window() {
        let parameters = parameters();
        let clock = clock_at(0, 0);
        let rates = rates_from(&[0.10, 0.10, 0.40]);
        let scheduler = Scheduler::builder()
            .parameters(&parameters)
            .rates(&rates)
            .clock(&clock)
            .build();
        // A full battery covers the demand, nothing is imported:
        let table = flat_table(400.0, 0.0, 3);
        let windows = scheduler.find_high_price_windows(&table, Percent(90.0));
        assert!(windows.is_empty());
    }

    #[test]
    fn shifted_energy_carries_the_loss_markup() {
        let parameters = parameters();
        let clock = clock_at(0, 0);
        let rates = rates_from(&[0.10, 0.10, 0.40]);
        let scheduler = Scheduler::builder()
            .parameters(&parameters)
            .rates(&rates)
            .clock(&clock)
            .build();
        let table = flat_table(1000.0, 0.0, 3);
        let windows = scheduler.find_high_price_windows(&table, Percent(10.0));
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].energy, WattHours(1170.0));
    }
}
