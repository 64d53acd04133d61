use std::future::Future;

use async_trait::async_trait;
use chrono::TimeDelta;

use crate::{
    prelude::*,
    quantity::{percent::Percent, power::Watts},
};

/// The battery actuator capability set.
///
/// Any operation may fail; failures are reported through the result, never
/// by crashing the caller.
#[async_trait]
pub trait Inverter: Send + Sync {
    async fn get_soc(&self) -> Result<Percent>;

    async fn is_running(&self) -> Result<bool>;

    async fn wake_up(&self) -> Result<bool>;

    async fn start_charging(&self, power: Watts, duration: TimeDelta) -> Result<bool>;

    async fn set_charge_power(&self, power: Watts) -> Result<bool>;

    async fn stop_charging(&self) -> Result<bool>;

    /// Battery charge (positive) or discharge (negative) power.
    async fn get_charge_discharge_power(&self) -> Result<Watts>;

    /// Momentary household consumption.
    async fn get_consumption(&self) -> Result<Watts>;

    /// Momentary power at the grid meter; positive means surplus.
    async fn get_meter_power(&self) -> Result<Watts>;

    async fn get_discharge_cutoff(&self) -> Result<Percent>;

    async fn set_discharge_cutoff(&self, cutoff: Percent) -> Result<bool>;

    async fn set_charge_enabled(&self, enabled: bool) -> Result<bool>;

    async fn set_discharge_enabled(&self, enabled: bool) -> Result<bool>;

    async fn set_charge_from_grid_enabled(&self, enabled: bool) -> Result<bool>;

    async fn get_surplus_min_soc(&self) -> Result<Percent>;

    async fn set_surplus_min_soc(&self, soc: Percent) -> Result<bool>;

    async fn set_surplus_buffer_soc(&self, soc: Percent) -> Result<bool>;
}

/// Run an actuator command, absorbing a failure into a warning. The caller
/// retries on its next tick.
pub(crate) async fn call(command: impl Future<Output = Result<bool>>, what: &str) -> bool {
    match command.await {
        Ok(done) => done,
        Err(error) => {
            warn!("{what} failed: {error:#}");
            false
        }
    }
}

/// Run an actuator read, absorbing a failure into a warning.
pub(crate) async fn read<T>(query: impl Future<Output = Result<T>>, what: &str) -> Option<T> {
    match query.await {
        Ok(value) => Some(value),
        Err(error) => {
            warn!("failed to read the {what}: {error:#}");
            None
        }
    }
}
