use std::sync::Mutex;

use async_trait::async_trait;
use chrono::TimeDelta;

use crate::{
    api::inverter::Inverter,
    prelude::*,
    quantity::{Zero, percent::Percent, power::Watts},
};

/// Scriptable inverter double for unit tests.
pub struct MockInverter {
    pub soc: Mutex<Percent>,
    pub running: bool,
    pub wake_succeeds: bool,
    pub start_succeeds: bool,
    pub consumption: Mutex<Watts>,
    pub charge_discharge_power: Mutex<Watts>,
    pub meter_power: Mutex<Watts>,
    pub discharge_cutoff: Mutex<Percent>,
    pub surplus_min_soc: Percent,

    pub started: Mutex<Vec<(Watts, TimeDelta)>>,
    pub power_commands: Mutex<Vec<Watts>>,
    pub stop_count: Mutex<usize>,
    pub charge_enabled: Mutex<Option<bool>>,
    pub discharge_enabled: Mutex<Option<bool>>,
    pub charge_from_grid: Mutex<Option<bool>>,
    pub surplus_buffer: Mutex<Option<Percent>>,
}

impl Default for MockInverter {
    fn default() -> Self {
        Self {
            soc: Mutex::new(Percent(50.0)),
            running: true,
            wake_succeeds: true,
            start_succeeds: true,
            consumption: Mutex::new(Watts::ZERO),
            charge_discharge_power: Mutex::new(Watts::ZERO),
            meter_power: Mutex::new(Watts::ZERO),
            discharge_cutoff: Mutex::new(Percent(10.0)),
            surplus_min_soc: Percent(20.0),
            started: Mutex::new(Vec::new()),
            power_commands: Mutex::new(Vec::new()),
            stop_count: Mutex::new(0),
            charge_enabled: Mutex::new(None),
            discharge_enabled: Mutex::new(None),
            charge_from_grid: Mutex::new(None),
            surplus_buffer: Mutex::new(None),
        }
    }
}

impl MockInverter {
    pub fn set_soc(&self, soc: Percent) {
        *self.soc.lock().unwrap() = soc;
    }

    pub fn set_readings(&self, consumption: Watts, charge_discharge: Watts, meter: Watts) {
        *self.consumption.lock().unwrap() = consumption;
        *self.charge_discharge_power.lock().unwrap() = charge_discharge;
        *self.meter_power.lock().unwrap() = meter;
    }
}

#[async_trait]
impl Inverter for MockInverter {
    async fn get_soc(&self) -> Result<Percent> {
        Ok(*self.soc.lock().unwrap())
    }

    async fn is_running(&self) -> Result<bool> {
        Ok(self.running)
    }

    async fn wake_up(&self) -> Result<bool> {
        Ok(self.wake_succeeds)
    }

    async fn start_charging(&self, power: Watts, duration: TimeDelta) -> Result<bool> {
        self.started.lock().unwrap().push((power, duration));
        Ok(self.start_succeeds)
    }

    async fn set_charge_power(&self, power: Watts) -> Result<bool> {
        self.power_commands.lock().unwrap().push(power);
        Ok(true)
    }

    async fn stop_charging(&self) -> Result<bool> {
        *self.stop_count.lock().unwrap() += 1;
        Ok(true)
    }

    async fn get_charge_discharge_power(&self) -> Result<Watts> {
        Ok(*self.charge_discharge_power.lock().unwrap())
    }

    async fn get_consumption(&self) -> Result<Watts> {
        Ok(*self.consumption.lock().unwrap())
    }

    async fn get_meter_power(&self) -> Result<Watts> {
        Ok(*self.meter_power.lock().unwrap())
    }

    async fn get_discharge_cutoff(&self) -> Result<Percent> {
        Ok(*self.discharge_cutoff.lock().unwrap())
    }

    async fn set_discharge_cutoff(&self, cutoff: Percent) -> Result<bool> {
        *self.discharge_cutoff.lock().unwrap() = cutoff;
        Ok(true)
    }

    async fn set_charge_enabled(&self, enabled: bool) -> Result<bool> {
        *self.charge_enabled.lock().unwrap() = Some(enabled);
        Ok(true)
    }

    async fn set_discharge_enabled(&self, enabled: bool) -> Result<bool> {
        *self.discharge_enabled.lock().unwrap() = Some(enabled);
        Ok(true)
    }

    async fn set_charge_from_grid_enabled(&self, enabled: bool) -> Result<bool> {
        *self.charge_from_grid.lock().unwrap() = Some(enabled);
        Ok(true)
    }

    async fn get_surplus_min_soc(&self) -> Result<Percent> {
        Ok(self.surplus_min_soc)
    }

    async fn set_surplus_min_soc(&self, _soc: Percent) -> Result<bool> {
        Ok(true)
    }

    async fn set_surplus_buffer_soc(&self, soc: Percent) -> Result<bool> {
        *self.surplus_buffer.lock().unwrap() = Some(soc);
        Ok(true)
    }
}
