use std::sync::Mutex;

use async_trait::async_trait;
use chrono::TimeDelta;

use crate::{
    api::inverter::Inverter,
    prelude::*,
    quantity::{Zero, percent::Percent, power::Watts},
};

/// An inverter stand-in that only logs the commands and tracks what they
/// would have done. Used by the one-shot planning command.
pub struct DryRunInverter {
    state: Mutex<DryRunState>,
}

#[derive(Clone, Debug)]
pub struct DryRunState {
    pub soc: Percent,
    pub running: bool,
    pub charging: bool,
    pub charge_power: Watts,
    pub discharge_cutoff: Percent,
    pub charge_enabled: bool,
    pub discharge_enabled: bool,
    pub charge_from_grid: bool,
    pub surplus_min_soc: Percent,
    pub surplus_buffer_soc: Percent,
}

impl DryRunInverter {
    #[must_use]
    pub fn new(soc: Percent) -> Self {
        let state = DryRunState {
            soc,
            running: true,
            charging: false,
            charge_power: Watts::ZERO,
            discharge_cutoff: Percent(10.0),
            charge_enabled: true,
            discharge_enabled: true,
            charge_from_grid: false,
            surplus_min_soc: Percent(20.0),
            surplus_buffer_soc: Percent(20.0),
        };
        Self { state: Mutex::new(state) }
    }

    #[must_use]
    pub fn state(&self) -> DryRunState {
        self.state.lock().unwrap().clone()
    }

    fn update(&self, mutate: impl FnOnce(&mut DryRunState)) -> Result<bool> {
        mutate(&mut self.state.lock().unwrap());
        Ok(true)
    }
}

#[async_trait]
impl Inverter for DryRunInverter {
    async fn get_soc(&self) -> Result<Percent> {
        Ok(self.state().soc)
    }

    async fn is_running(&self) -> Result<bool> {
        Ok(self.state().running)
    }

    async fn wake_up(&self) -> Result<bool> {
        debug!("dry run: wake up");
        Ok(true)
    }

    async fn start_charging(&self, power: Watts, duration: TimeDelta) -> Result<bool> {
        info!(%power, ?duration, "dry run: start charging");
        self.update(|state| {
            state.charging = true;
            state.charge_power = power;
        })
    }

    async fn set_charge_power(&self, power: Watts) -> Result<bool> {
        info!(%power, "dry run: set the charge power");
        self.update(|state| state.charge_power = power)
    }

    async fn stop_charging(&self) -> Result<bool> {
        info!("dry run: stop charging");
        self.update(|state| {
            state.charging = false;
            state.charge_power = Watts::ZERO;
        })
    }

    async fn get_charge_discharge_power(&self) -> Result<Watts> {
        Ok(self.state().charge_power)
    }

    async fn get_consumption(&self) -> Result<Watts> {
        Ok(Watts::ZERO)
    }

    async fn get_meter_power(&self) -> Result<Watts> {
        Ok(Watts::ZERO)
    }

    async fn get_discharge_cutoff(&self) -> Result<Percent> {
        Ok(self.state().discharge_cutoff)
    }

    async fn set_discharge_cutoff(&self, cutoff: Percent) -> Result<bool> {
        debug!(%cutoff, "dry run: set the discharge cut-off");
        self.update(|state| state.discharge_cutoff = cutoff)
    }

    async fn set_charge_enabled(&self, enabled: bool) -> Result<bool> {
        debug!(enabled, "dry run: set charging");
        self.update(|state| state.charge_enabled = enabled)
    }

    async fn set_discharge_enabled(&self, enabled: bool) -> Result<bool> {
        debug!(enabled, "dry run: set discharging");
        self.update(|state| state.discharge_enabled = enabled)
    }

    async fn set_charge_from_grid_enabled(&self, enabled: bool) -> Result<bool> {
        debug!(enabled, "dry run: set charging from the grid");
        self.update(|state| state.charge_from_grid = enabled)
    }

    async fn get_surplus_min_soc(&self) -> Result<Percent> {
        Ok(self.state().surplus_min_soc)
    }

    async fn set_surplus_min_soc(&self, soc: Percent) -> Result<bool> {
        debug!(%soc, "dry run: set the surplus minimum");
        self.update(|state| state.surplus_min_soc = soc)
    }

    async fn set_surplus_buffer_soc(&self, soc: Percent) -> Result<bool> {
        debug!(%soc, "dry run: set the surplus buffer");
        self.update(|state| state.surplus_buffer_soc = soc)
    }
}
