use std::time::Duration;

use reqwest::{Client, Url};

use crate::prelude::*;

/// Liveness ping after a successful cycle.
#[instrument(skip_all)]
pub async fn send(url: &Url) -> Result {
    info!("sending a heartbeat…");
    Client::builder().timeout(Duration::from_secs(3)).build()?.post(url.clone()).send().await?;
    Ok(())
}
