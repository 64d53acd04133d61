pub mod dry_run;
pub mod forecast;
pub mod heartbeat;
pub mod inverter;
pub mod sun2000;
#[cfg(test)]
pub mod testing;
pub mod tibber;

use async_trait::async_trait;

pub use self::inverter::Inverter;
use crate::{
    core::{point::EnergyPoint, rates::RateEntry},
    prelude::*,
};

/// Dynamic price feed covering today and, when published, tomorrow.
#[async_trait]
pub trait PriceFeed {
    async fn get_rates(&self) -> Result<Vec<RateEntry>>;
}

/// PV production estimate as hourly energies.
#[async_trait]
pub trait PvForecast {
    async fn get_estimate(&self) -> Result<Vec<EnergyPoint>>;
}
