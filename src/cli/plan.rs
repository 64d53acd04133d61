use chrono::Local;

use crate::{
    api::dry_run::DryRunInverter,
    cli::PlanArgs,
    core::engine::Engine,
    prelude::*,
    tables::{build_plan_table, build_projection_table},
};

/// One dry planning pass against the live feeds.
#[instrument(skip_all)]
pub async fn plan(args: &PlanArgs) -> Result {
    let tibber = args.feeds.tibber.client()?;
    let solar = args.feeds.solar.client()?;
    let inverter = DryRunInverter::new(args.soc);
    let mut engine = Engine::new(
        args.battery.parameters()?,
        args.tuning.settings(),
        args.feeds.profile()?,
        Local::now(),
    )?;

    engine.refresh_plan(Local::now(), &tibber, &solar, &inverter).await?;

    println!("{}", build_projection_table(engine.projection()));
    if engine.current_plan().is_empty() {
        info!("nothing worth shifting");
    } else {
        println!("{}", build_plan_table(engine.current_plan()));
    }
    Ok(())
}
