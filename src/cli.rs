pub mod peek;
pub mod plan;
pub mod steer;

use std::path::PathBuf;

use chrono::NaiveTime;
use clap::{Parser, Subcommand};
use reqwest::Url;

use crate::{
    api::{forecast::ForecastSolar, tibber::Tibber},
    core::{
        battery::BatteryParameters,
        engine::{EngineSettings, Protection},
        profile::ConsumptionProfile,
    },
    prelude::*,
    quantity::{energy::WattHours, percent::Percent, power::Watts},
};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    /// Heartbeat URL called after every successful plan refresh.
    #[clap(long = "heartbeat-url", env = "HEARTBEAT_URL")]
    pub heartbeat_url: Option<Url>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Main command: keep refreshing the plan and steering the battery.
    #[clap(name = "steer")]
    Steer(Box<SteerArgs>),

    /// Fetch the feeds, run one planning pass, and print it (dry run).
    #[clap(name = "plan")]
    Plan(Box<PlanArgs>),

    /// Feed debugging tools.
    #[clap(name = "peek")]
    Peek(PeekArgs),
}

#[derive(Parser)]
pub struct SteerArgs {
    /// ioBroker `simple-api` base URL, for example: `http://iobroker:8087/`.
    #[clap(long = "iobroker-url", env = "IOBROKER_URL")]
    pub iobroker_url: Url,

    #[clap(flatten)]
    pub battery: BatteryArgs,

    #[clap(flatten)]
    pub tuning: TuningArgs,

    #[clap(flatten)]
    pub feeds: FeedArgs,
}

#[derive(Parser)]
pub struct PlanArgs {
    /// Assumed current state of charge.
    #[clap(long, default_value = "50", env = "ASSUMED_SOC_PERCENT")]
    pub soc: Percent,

    #[clap(flatten)]
    pub battery: BatteryArgs,

    #[clap(flatten)]
    pub tuning: TuningArgs,

    #[clap(flatten)]
    pub feeds: FeedArgs,
}

#[derive(Parser)]
pub struct PeekArgs {
    #[command(subcommand)]
    pub command: PeekCommand,
}

#[derive(Subcommand)]
pub enum PeekCommand {
    /// Print the upcoming price series.
    Prices(TibberArgs),

    /// Print the PV production estimate.
    Forecast(SolarArgs),
}

#[derive(Parser)]
pub struct BatteryArgs {
    /// Rated battery capacity in watt-hours.
    #[clap(long = "battery-capacity", env = "BATTERY_CAPACITY_WATT_HOURS")]
    pub capacity: WattHours,

    /// Maximum charging power in watts.
    #[clap(long = "max-charge-power", env = "MAX_CHARGE_POWER_WATTS")]
    pub max_charge_power: Watts,

    /// State of charge below which the battery must not discharge.
    #[clap(long = "discharge-cutoff", default_value = "10", env = "DISCHARGE_CUTOFF_PERCENT")]
    pub discharge_cutoff: Percent,

    /// State of charge above which the battery must not charge.
    #[clap(long = "charging-cutoff", default_value = "95", env = "CHARGING_CUTOFF_PERCENT")]
    pub charging_cutoff: Percent,

    /// Round-trip loss fraction.
    #[clap(long = "loss-fraction", default_value = "0.17", env = "LOSS_FRACTION")]
    pub loss_fraction: f64,

    /// Stand-by losses per hour in watt-hours.
    #[clap(long = "stand-by-load", default_value = "64", env = "STAND_BY_LOAD_WATT_HOURS")]
    pub stand_by_load: WattHours,
}

impl BatteryArgs {
    pub fn parameters(&self) -> Result<BatteryParameters> {
        BatteryParameters::builder()
            .capacity(self.capacity)
            .max_charge_power(self.max_charge_power)
            .discharge_cutoff(self.discharge_cutoff)
            .charging_cutoff(self.charging_cutoff)
            .loss_fraction(self.loss_fraction)
            .stand_by_load(self.stand_by_load)
            .build()
            .validated()
    }
}

#[derive(Parser)]
pub struct TuningArgs {
    /// Fraction of the forecast surplus counted on when deciding to stop
    /// charging early.
    #[clap(long = "surplus-reserve-factor", default_value = "0.75", env = "SURPLUS_RESERVE_FACTOR")]
    pub surplus_reserve_factor: f64,

    /// Minimum change before a new charge power is pushed.
    #[clap(long = "power-hysteresis", default_value = "50", env = "POWER_HYSTERESIS_WATTS")]
    pub hysteresis: Watts,

    /// Planned shifts smaller than this are dropped.
    #[clap(long = "min-point-energy", default_value = "200", env = "MIN_POINT_ENERGY_WATT_HOURS")]
    pub min_point_energy: WattHours,

    #[clap(long, default_value = "07:00:00", env = "SUNRISE")]
    pub sunrise: NaiveTime,

    #[clap(long, default_value = "21:30:00", env = "SUNSET")]
    pub sunset: NaiveTime,

    /// Enabled protective behaviours.
    #[clap(
        long = "protections",
        env = "PROTECTIONS",
        value_delimiter = ',',
        num_args = 0..,
        default_value = "battery-guard,grid-charge",
    )]
    pub protections: Vec<Protection>,

    /// Surplus minimum state of charge pushed to the inverter at start-up.
    #[clap(long = "surplus-min-soc", default_value = "20", env = "SURPLUS_MIN_SOC_PERCENT")]
    pub surplus_min_soc: Percent,
}

impl TuningArgs {
    #[must_use]
    pub fn settings(&self) -> EngineSettings {
        EngineSettings::builder()
            .surplus_reserve_factor(self.surplus_reserve_factor)
            .hysteresis(self.hysteresis)
            .min_point_energy(self.min_point_energy)
            .sunrise(self.sunrise)
            .sunset(self.sunset)
            .protections(self.protections.iter().copied().collect())
            .build()
    }
}

#[derive(Parser)]
pub struct TibberArgs {
    /// Tibber API access token.
    #[clap(long = "tibber-token", env = "TIBBER_ACCESS_TOKEN")]
    pub access_token: String,
}

impl TibberArgs {
    pub fn client(&self) -> Result<Tibber> {
        Tibber::new(&self.access_token)
    }
}

#[derive(Parser)]
pub struct SolarArgs {
    #[clap(long, env = "SITE_LATITUDE")]
    pub latitude: f64,

    #[clap(long, env = "SITE_LONGITUDE")]
    pub longitude: f64,

    /// Panel declination in degrees, 0 is horizontal.
    #[clap(long, default_value = "30", env = "PANEL_DECLINATION")]
    pub declination: f64,

    /// Panel azimuth in degrees, 0 is south.
    #[clap(long, default_value = "0", env = "PANEL_AZIMUTH")]
    pub azimuth: f64,

    /// Installed PV power in kilowatt-peak.
    #[clap(long = "kilowatt-peak", env = "PANEL_KILOWATT_PEAK")]
    pub kilowatt_peak: f64,
}

impl SolarArgs {
    pub fn client(&self) -> Result<ForecastSolar> {
        ForecastSolar::new(
            self.latitude,
            self.longitude,
            self.declination,
            self.azimuth,
            self.kilowatt_peak,
        )
    }
}

#[derive(Parser)]
pub struct FeedArgs {
    #[clap(flatten)]
    pub tibber: TibberArgs,

    #[clap(flatten)]
    pub solar: SolarArgs,

    /// Consumption profile TOML; falls back to the built-in day/night split.
    #[clap(long = "profile", env = "CONSUMPTION_PROFILE")]
    pub profile_path: Option<PathBuf>,
}

impl FeedArgs {
    pub fn profile(&self) -> Result<ConsumptionProfile> {
        match &self.profile_path {
            Some(path) => ConsumptionProfile::load(path),
            None => Ok(ConsumptionProfile::default()),
        }
    }
}
