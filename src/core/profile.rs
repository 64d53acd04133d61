use std::path::Path;

use chrono::{DateTime, Local, NaiveTime, TimeDelta};
use serde::Deserialize;

use crate::{
    core::{point::EnergyPoint, slot::Slot, table::LoadTable},
    prelude::*,
    quantity::{Zero, energy::WattHours},
};

/// Today and tomorrow, hourly.
pub const HORIZON_SLOTS: usize = 48;

/// One bucket of the configured consumption profile.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
pub struct ProfileRule {
    pub from: NaiveTime,
    pub consumption: WattHours,
}

/// The configured household consumption profile: for a given time of day,
/// the nearest rule at or before it applies.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ConsumptionProfile {
    rules: Vec<ProfileRule>,
}

impl Default for ConsumptionProfile {
    /// Simple day/night split.
    fn default() -> Self {
        let rules = vec![
            ProfileRule { from: NaiveTime::MIN, consumption: WattHours(100.0) },
            ProfileRule {
                from: NaiveTime::from_hms_opt(7, 0, 0).unwrap_or(NaiveTime::MIN),
                consumption: WattHours(650.0),
            },
            ProfileRule {
                from: NaiveTime::from_hms_opt(23, 0, 0).unwrap_or(NaiveTime::MIN),
                consumption: WattHours(100.0),
            },
        ];
        Self { rules }
    }
}

impl ConsumptionProfile {
    pub fn try_new(mut rules: Vec<ProfileRule>) -> Result<Self> {
        ensure!(!rules.is_empty(), "the consumption profile needs at least one rule");
        ensure!(
            rules.iter().all(|rule| rule.consumption >= WattHours::ZERO),
            "profile consumption cannot be negative",
        );
        rules.sort_by_key(|rule| rule.from);
        Ok(Self { rules })
    }

    pub fn from_toml(source: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct File {
            rules: Vec<ProfileRule>,
        }

        let file: File =
            toml::from_str(source).context("failed to parse the consumption profile")?;
        Self::try_new(file.rules)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        Self::from_toml(&source)
    }

    /// The nearest rule at or before the given time of day; wraps around to
    /// the latest rule overnight.
    #[must_use]
    pub fn consumption_at(&self, time: NaiveTime) -> WattHours {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.from <= time)
            .or_else(|| self.rules.last())
            .map_or(WattHours::ZERO, |rule| rule.consumption)
    }
}

/// Combine the consumption profile with the PV estimate into the load table.
#[bon::builder]
pub fn build_load_table(
    profile: &ConsumptionProfile,
    pv_estimate: &[EnergyPoint],
    horizon_start: DateTime<Local>,
) -> Result<LoadTable> {
    let mut slots = Vec::with_capacity(HORIZON_SLOTS);
    let mut start = horizon_start;
    for index in 0..HORIZON_SLOTS {
        slots.push(Slot::new(index, start, profile.consumption_at(start.time())));
        start += TimeDelta::hours(1);
    }

    for point in pv_estimate {
        let offset = (point.time - horizon_start).num_hours();
        if let Ok(index) = usize::try_from(offset) {
            if let Some(slot) = slots.get_mut(index) {
                slot.pv += point.energy;
            }
        }
    }

    let mut balance = WattHours::ZERO;
    for slot in &mut slots {
        balance += slot.pv - slot.consumption;
        slot.balance = balance;
    }

    LoadTable::new(slots)
}
