use std::time::Duration;

use async_trait::async_trait;
use chrono::TimeDelta;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

use crate::{
    api::inverter::Inverter,
    prelude::*,
    quantity::{percent::Percent, power::Watts},
};

const BATTERY: &str = "sun2000.0.inverter.0.battery";
const CONTROL: &str = "sun2000.0.inverter.0.control.battery";
const COLLECTED: &str = "sun2000.0.collected";
const SURPLUS: &str = "sun2000.0.control.usableSurplus";

/// SUN2000 battery control through the ioBroker `simple-api` endpoint of the
/// `sun2000` adapter.
pub struct Sun2000 {
    client: Client,
    base_url: Url,
}

impl Sun2000 {
    pub fn new(base_url: Url) -> Result<Self> {
        let client = Client::builder()
            .user_agent("hamster")
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, base_url })
    }

    async fn get<T: DeserializeOwned>(&self, id: &str) -> Result<T> {
        #[derive(serde::Deserialize)]
        struct State<T> {
            val: T,
        }

        let url = self.base_url.join(&format!("get/{id}"))?;
        let state: State<T> = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("failed to read `{id}`"))?;
        Ok(state.val)
    }

    async fn set<T: std::fmt::Display + Send>(&self, id: &str, value: T) -> Result<bool> {
        let url = self.base_url.join(&format!("set/{id}"))?;
        self.client
            .get(url)
            .query(&[("value", value.to_string())])
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("failed to write `{id}`"))?;
        Ok(true)
    }
}

#[async_trait]
impl Inverter for Sun2000 {
    async fn get_soc(&self) -> Result<Percent> {
        Ok(Percent(self.get(&format!("{BATTERY}.SOC")).await?))
    }

    async fn is_running(&self) -> Result<bool> {
        let status: String = self.get(&format!("{BATTERY}.derived.runningStatus")).await?;
        Ok(matches!(status.as_str(), "RUNNING" | "STANDBY"))
    }

    /// Enabling grid charging brings the battery out of hibernation; it
    /// reports awake once the running status confirms it.
    async fn wake_up(&self) -> Result<bool> {
        self.set(&format!("{CONTROL}.chargeFromGridFunction"), true).await?;
        self.is_running().await
    }

    async fn start_charging(&self, power: Watts, duration: TimeDelta) -> Result<bool> {
        self.set(&format!("{CONTROL}.forcibleChargePower"), power.0.round()).await?;
        self.set(&format!("{CONTROL}.forcibleChargeOrDischargeSettingMode"), 0).await?;
        self.set(&format!("{CONTROL}.forcedChargingAndDischargingPeriod"), duration.num_minutes())
            .await?;
        self.set(&format!("{CONTROL}.forcibleChargeOrDischarge"), 1).await
    }

    async fn set_charge_power(&self, power: Watts) -> Result<bool> {
        self.set(&format!("{CONTROL}.forcibleChargePower"), power.0.round()).await
    }

    async fn stop_charging(&self) -> Result<bool> {
        self.set(&format!("{CONTROL}.forcibleChargeOrDischarge"), 0).await
    }

    async fn get_charge_discharge_power(&self) -> Result<Watts> {
        let kilowatts: f64 = self.get(&format!("{COLLECTED}.chargeDischargePower")).await?;
        Ok(Watts(kilowatts * 1000.0))
    }

    async fn get_consumption(&self) -> Result<Watts> {
        let kilowatts: f64 = self.get(&format!("{COLLECTED}.houseConsumption")).await?;
        Ok(Watts(kilowatts * 1000.0))
    }

    async fn get_meter_power(&self) -> Result<Watts> {
        let kilowatts: f64 = self.get("sun2000.0.meter.activePower").await?;
        Ok(Watts(kilowatts * 1000.0))
    }

    async fn get_discharge_cutoff(&self) -> Result<Percent> {
        Ok(Percent(self.get(&format!("{BATTERY}.dischargeCutoffCapacity")).await?))
    }

    async fn set_discharge_cutoff(&self, cutoff: Percent) -> Result<bool> {
        self.set(&format!("{CONTROL}.dischargeCutoffCapacity"), cutoff.0).await
    }

    async fn set_charge_enabled(&self, enabled: bool) -> Result<bool> {
        let power: f64 = if enabled {
            self.get(&format!("{BATTERY}.maximumChargePower")).await?
        } else {
            0.0
        };
        self.set(&format!("{CONTROL}.maximumChargingPower"), power).await
    }

    async fn set_discharge_enabled(&self, enabled: bool) -> Result<bool> {
        let power: f64 = if enabled {
            self.get(&format!("{BATTERY}.maximumDischargePower")).await?
        } else {
            0.0
        };
        self.set(&format!("{CONTROL}.maximumDischargingPower"), power).await
    }

    async fn set_charge_from_grid_enabled(&self, enabled: bool) -> Result<bool> {
        self.set(&format!("{CONTROL}.chargeFromGridFunction"), enabled).await
    }

    async fn get_surplus_min_soc(&self) -> Result<Percent> {
        // The state may be missing on older adapter set-ups:
        Ok(self.get(&format!("{SURPLUS}.minSoc")).await.map_or(Percent(20.0), Percent))
    }

    async fn set_surplus_min_soc(&self, soc: Percent) -> Result<bool> {
        self.set(&format!("{SURPLUS}.minSoc"), soc.0).await
    }

    async fn set_surplus_buffer_soc(&self, soc: Percent) -> Result<bool> {
        self.set(&format!("{SURPLUS}.bufferSoc"), soc.0).await
    }
}
