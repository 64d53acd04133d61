use std::time::Duration;

use chrono::{Local, Timelike};
use reqwest::Url;
use tokio::time::MissedTickBehavior;

use crate::{
    api::{Inverter, heartbeat, inverter::call, sun2000::Sun2000},
    cli::SteerArgs,
    core::engine::Engine,
    prelude::*,
};

/// The long-running loop: refresh the plan at the end of every hour, apply
/// the slot locks at the top, and run the fine control pass every 5 minutes.
#[instrument(skip_all)]
pub async fn steer(args: &SteerArgs, heartbeat_url: Option<&Url>) -> Result {
    let inverter = Sun2000::new(args.iobroker_url.clone())?;
    let tibber = args.feeds.tibber.client()?;
    let solar = args.feeds.solar.client()?;
    let mut engine = Engine::new(
        args.battery.parameters()?,
        args.tuning.settings(),
        args.feeds.profile()?,
        Local::now(),
    )?;

    call(
        inverter.set_surplus_min_soc(args.tuning.surplus_min_soc),
        "push the surplus minimum",
    )
    .await;

    // The first cycle runs right away, the timers take over afterwards:
    if let Err(error) = engine.refresh_plan(Local::now(), &tibber, &solar, &inverter).await {
        warn!("initial plan refresh failed: {error:#}");
    }
    engine.apply_discharge_lock(Local::now(), &inverter).await;
    fine_pass(&mut engine, &inverter).await;

    let mut timer = tokio::time::interval(Duration::from_secs(60));
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = timer.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down…");
                break;
            }
        }

        let now = Local::now();
        match now.minute() {
            59 => {
                if let Err(error) = engine.refresh_plan(now, &tibber, &solar, &inverter).await {
                    warn!("plan refresh failed: {error:#}");
                } else if let Some(url) = heartbeat_url {
                    if let Err(error) = heartbeat::send(url).await {
                        warn!("heartbeat failed: {error:#}");
                    }
                }
            }
            0 => {
                engine.advance(now);
                engine.apply_discharge_lock(now, &inverter).await;
            }
            minute if minute % 5 == 0 => {
                fine_pass(&mut engine, &inverter).await;
            }
            _ => {}
        }
    }

    Ok(())
}

/// One fine-cadence pass: averages, the charge process, surplus control,
/// and, outside charge sessions, the protective behaviours.
async fn fine_pass(engine: &mut Engine, inverter: &dyn Inverter) {
    let now = Local::now();
    engine.advance(now);
    engine.update_averages(inverter).await;
    engine.tick(now, inverter).await;
    engine.surplus_control(inverter).await;
    if engine.has_active_process() {
        return;
    }
    engine.apply_protections(now, inverter).await;
    engine.apply_discharge_lock(now, inverter).await;
}
