mod api;
mod cli;
mod core;
mod prelude;
mod quantity;
mod tables;

use clap::{Parser, crate_version};

use crate::{
    cli::{Args, Command, PeekCommand},
    prelude::*,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().without_time().compact().init();
    info!(version = crate_version!(), "starting…");

    let args = Args::parse();
    match args.command {
        Command::Steer(steer_args) => {
            cli::steer::steer(&steer_args, args.heartbeat_url.as_ref()).await?;
        }
        Command::Plan(plan_args) => {
            cli::plan::plan(&plan_args).await?;
            if let Some(url) = &args.heartbeat_url {
                api::heartbeat::send(url).await?;
            }
        }
        Command::Peek(peek_args) => match peek_args.command {
            PeekCommand::Prices(tibber_args) => cli::peek::prices(&tibber_args).await?,
            PeekCommand::Forecast(solar_args) => cli::peek::forecast(&solar_args).await?,
        },
    }

    info!("done!");
    Ok(())
}
