use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, DurationRound, Local, NaiveDateTime, TimeDelta, TimeZone};
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::{
    api::PvForecast,
    core::point::EnergyPoint,
    prelude::*,
    quantity::{Zero, energy::WattHours},
};

/// PV production estimate from the public forecast.solar API.
pub struct ForecastSolar {
    client: Client,
    url: Url,
}

impl ForecastSolar {
    pub fn new(
        latitude: f64,
        longitude: f64,
        declination: f64,
        azimuth: f64,
        kilowatt_peak: f64,
    ) -> Result<Self> {
        let url = Url::parse(&format!(
            "https://api.forecast.solar/estimate/{latitude}/{longitude}/{declination}/{azimuth}/{kilowatt_peak}"
        ))?;
        let client = Client::builder()
            .user_agent("hamster")
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl PvForecast for ForecastSolar {
    #[instrument(skip_all)]
    async fn get_estimate(&self) -> Result<Vec<EnergyPoint>> {
        info!("fetching the production estimate…");
        let response: Response = self
            .client
            .get(self.url.clone())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("failed to deserialize the estimate")?;
        let points = bucket_hourly(response.result.watt_hours_period)?;
        info!(n_points = points.len(), "fetched");
        Ok(points)
    }
}

#[derive(Deserialize)]
struct Response {
    result: Estimate,
}

#[derive(Deserialize)]
struct Estimate {
    /// Produced energy per reporting period, keyed by the period end.
    watt_hours_period: BTreeMap<String, f64>,
}

/// Sum the reported periods into hourly points.
fn bucket_hourly(periods: BTreeMap<String, f64>) -> Result<Vec<EnergyPoint>> {
    let mut buckets: BTreeMap<DateTime<Local>, WattHours> = BTreeMap::new();
    for (timestamp, watt_hours) in periods {
        let naive = NaiveDateTime::parse_from_str(&timestamp, "%Y-%m-%d %H:%M:%S")
            .with_context(|| format!("failed to parse `{timestamp}`"))?;
        let naive = naive.duration_trunc(TimeDelta::hours(1))?;
        let time = Local
            .from_local_datetime(&naive)
            .earliest()
            .with_context(|| format!("`{timestamp}` is not a valid local time"))?;
        *buckets.entry(time).or_insert(WattHours::ZERO) += WattHours(watt_hours);
    }
    Ok(buckets
        .into_iter()
        .map(|(time, energy)| EnergyPoint { time, energy: energy.round() })
        .collect())
}
