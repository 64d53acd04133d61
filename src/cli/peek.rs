use crate::{
    api::{PriceFeed, PvForecast},
    cli::{SolarArgs, TibberArgs},
    prelude::*,
};

#[instrument(skip_all)]
pub async fn prices(args: &TibberArgs) -> Result {
    let rates = args.client()?.get_rates().await?;
    ensure!(!rates.is_empty(), "the feed returned no prices");
    for entry in &rates {
        info!(index = entry.index, starts_at = %entry.starts_at, rate = %entry.rate, "rate");
    }
    Ok(())
}

#[instrument(skip_all)]
pub async fn forecast(args: &SolarArgs) -> Result {
    let points = args.client()?.get_estimate().await?;
    ensure!(!points.is_empty(), "the feed returned no estimate");
    for point in &points {
        info!(time = %point.time, energy = %point.energy, "estimate");
    }
    Ok(())
}
