use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use http::{HeaderMap, HeaderValue, header::AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;

use crate::{
    api::PriceFeed,
    core::rates::RateEntry,
    prelude::*,
    quantity::rate::KilowattHourRate,
};

const ENDPOINT: &str = "https://api.tibber.com/v1-beta/gql";

const QUERY: &str = "{ viewer { homes { currentSubscription { priceInfo { \
                     today { total startsAt } tomorrow { total startsAt } } } } } }";

/// Tibber GraphQL price feed.
pub struct Tibber {
    client: Client,
}

impl Tibber {
    pub fn new(access_token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut authorization = HeaderValue::from_str(&format!("Bearer {access_token}"))?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);
        let client = Client::builder()
            .user_agent("hamster")
            .timeout(Duration::from_secs(15))
            .default_headers(headers)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PriceFeed for Tibber {
    #[instrument(skip_all)]
    async fn get_rates(&self) -> Result<Vec<RateEntry>> {
        info!("fetching the prices…");
        let response: Response = self
            .client
            .post(ENDPOINT)
            .json(&serde_json::json!({ "query": QUERY }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("failed to deserialize the price response")?;
        let price_info = response
            .data
            .viewer
            .homes
            .into_iter()
            .next()
            .and_then(|home| home.current_subscription)
            .map(|subscription| subscription.price_info)
            .context("no home with an active subscription")?;
        let entries = RateEntry::index_merged(vec![
            price_info.today.into_iter().map(PriceItem::into_pair).collect(),
            price_info.tomorrow.into_iter().map(PriceItem::into_pair).collect(),
        ]);
        info!(n_rates = entries.len(), "fetched");
        Ok(entries)
    }
}

#[derive(Deserialize)]
struct Response {
    data: Data,
}

#[derive(Deserialize)]
struct Data {
    viewer: Viewer,
}

#[derive(Deserialize)]
struct Viewer {
    homes: Vec<Home>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Home {
    current_subscription: Option<Subscription>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Subscription {
    price_info: PriceInfo,
}

#[derive(Deserialize)]
struct PriceInfo {
    today: Vec<PriceItem>,
    tomorrow: Vec<PriceItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceItem {
    total: f64,
    starts_at: DateTime<Local>,
}

impl PriceItem {
    fn into_pair(self) -> (DateTime<Local>, KilowattHourRate) {
        (self.starts_at, KilowattHourRate(self.total))
    }
}
