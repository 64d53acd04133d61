use chrono::{DateTime, Local, NaiveTime, Timelike};
use enumset::{EnumSet, EnumSetType};

use crate::{
    api::{
        Inverter,
        PriceFeed,
        PvForecast,
        inverter::{call, read},
    },
    core::{
        average::RollingAverage,
        battery::{BatteryParameters, simulator::SocEntry},
        clock::{Clock, start_of_day},
        point::ChargePoint,
        process::{ChargeProcess, ProcessController},
        profile::{ConsumptionProfile, build_load_table},
        rates::RateEntry,
        scheduler::Scheduler,
        table::LoadTable,
    },
    prelude::*,
    quantity::{Zero, energy::WattHours, percent::Percent, power::Watts},
};

/// Protective behaviours of the fine control loop.
#[derive(Debug, clap::ValueEnum, EnumSetType)]
pub enum Protection {
    /// Lock battery discharge under a sudden heavy household load.
    BatteryGuard,

    /// Switch grid charging with the time of day and the metered surplus.
    GridCharge,

    /// Raise the discharge cut-off overnight to reduce stand-by drain.
    StandbyCutoff,
}

#[derive(Clone, Debug, bon::Builder)]
pub struct EngineSettings {
    /// Fraction of the forecast surplus counted on when deciding to stop
    /// charging early.
    #[builder(default = 0.75)]
    pub surplus_reserve_factor: f64,

    /// Minimum change before a new charge power is pushed.
    #[builder(default = Watts(50.0))]
    pub hysteresis: Watts,

    /// Planned shifts smaller than this are dropped.
    #[builder(default = WattHours(200.0))]
    pub min_point_energy: WattHours,

    pub sunrise: NaiveTime,

    pub sunset: NaiveTime,

    #[builder(default = Protection::BatteryGuard | Protection::GridCharge)]
    pub protections: EnumSet<Protection>,
}

/// The engine façade: owns the plan, the running charge session, and the
/// rolling averages; collaborators are passed into every call.
pub struct Engine {
    parameters: BatteryParameters,
    settings: EngineSettings,
    profile: ConsumptionProfile,
    clock: Clock,
    table: LoadTable,
    rates: Vec<RateEntry>,
    projection: Vec<SocEntry>,
    soc: Percent,
    discharge_cutoff: Percent,
    plan: Vec<ChargePoint>,
    controller: ProcessController,
    average_consumption: RollingAverage,
    average_charge_power: RollingAverage,
    average_meter_power: RollingAverage,
}

impl Engine {
    pub fn new(
        parameters: BatteryParameters,
        settings: EngineSettings,
        profile: ConsumptionProfile,
        now: DateTime<Local>,
    ) -> Result<Self> {
        let parameters = parameters.validated()?;
        Ok(Self {
            clock: Clock::new(now),
            table: LoadTable::default(),
            rates: Vec::new(),
            projection: Vec::new(),
            soc: Percent::ZERO,
            discharge_cutoff: parameters.discharge_cutoff,
            plan: Vec::new(),
            controller: ProcessController::new(settings.hysteresis),
            average_consumption: RollingAverage::new(2),
            average_charge_power: RollingAverage::new(2),
            average_meter_power: RollingAverage::new(10),
            parameters,
            settings,
            profile,
        })
    }

    pub fn advance(&mut self, now: DateTime<Local>) {
        self.clock.set_now(now);
    }

    #[must_use]
    pub fn current_plan(&self) -> &[ChargePoint] {
        &self.plan
    }

    #[must_use]
    pub fn current_process(&self) -> Option<&ChargeProcess> {
        self.controller.process()
    }

    #[must_use]
    pub fn has_active_process(&self) -> bool {
        self.controller.process().is_some()
    }

    #[must_use]
    pub fn projection(&self) -> &[SocEntry] {
        &self.projection
    }

    #[must_use]
    pub const fn state_of_charge(&self) -> Percent {
        self.soc
    }

    fn scheduler(&self) -> Scheduler<'_> {
        Scheduler::builder()
            .parameters(&self.parameters)
            .rates(&self.rates)
            .clock(&self.clock)
            .min_point_energy(self.settings.min_point_energy)
            .surplus_reserve_factor(self.settings.surplus_reserve_factor)
            .build()
    }

    /// The coarse cycle: refresh the feeds, rebuild the load table, and
    /// replace the charge plan.
    #[instrument(skip_all)]
    pub async fn refresh_plan(
        &mut self,
        now: DateTime<Local>,
        prices: &dyn PriceFeed,
        pv: &dyn PvForecast,
        inverter: &dyn Inverter,
    ) -> Result {
        self.soc = inverter.get_soc().await.context("failed to read the state of charge")?;

        let rates = match prices.get_rates().await {
            Ok(rates) => rates,
            Err(error) => {
                warn!("failed to fetch the prices: {error:#}");
                Vec::new()
            }
        };
        let estimate = match pv.get_estimate().await {
            Ok(points) => points,
            Err(error) => {
                warn!("failed to fetch the production estimate: {error:#}");
                Vec::new()
            }
        };

        let horizon_start = start_of_day(now);
        let mut table = build_load_table()
            .profile(&self.profile)
            .pv_estimate(&estimate)
            .horizon_start(horizon_start)
            .call()?;
        self.clock.renew(horizon_start, now);
        self.rates = rates;

        let scheduler = self.scheduler();
        let plan = scheduler.plan(&mut table, self.soc);

        let surplus_min = read(inverter.get_surplus_min_soc(), "surplus minimum")
            .await
            .unwrap_or(self.parameters.discharge_cutoff);
        scheduler.defer_surplus_charging(&mut table, self.soc, surplus_min);

        let to_index =
            if self.rates.is_empty() { table.len() } else { self.rates.len().min(table.len()) };
        let mut projection =
            scheduler.simulator().project_soc(&table, &self.clock, to_index, self.soc, false);
        for entry in &mut projection {
            if let Some(rate) = self.rates.get(entry.index) {
                entry.rate = rate.rate;
            }
        }

        self.table = table;
        self.plan = plan;
        self.projection = projection;
        info!(n_points = self.plan.len(), soc = %self.soc, "plan refreshed");
        Ok(())
    }

    /// One state-machine step of the charge process.
    pub async fn tick(&mut self, now: DateTime<Local>, inverter: &dyn Inverter) {
        self.clock.set_now(now);
        self.controller.tick(&self.clock, &self.plan, &self.parameters, inverter).await;
    }

    /// Refresh the rolling averages and cached settings from live readings.
    pub async fn update_averages(&mut self, inverter: &dyn Inverter) {
        if let Some(cutoff) = read(inverter.get_discharge_cutoff(), "discharge cut-off").await {
            self.discharge_cutoff = cutoff;
        }
        if let Some(soc) = read(inverter.get_soc(), "state of charge").await {
            self.soc = soc;
        }
        if let Some(power) = read(inverter.get_charge_discharge_power(), "charge power").await {
            self.average_charge_power.push(power);
        }
        if let Some(consumption) = read(inverter.get_consumption(), "consumption").await {
            self.average_consumption.push(consumption);
        }
        if let Some(meter) = read(inverter.get_meter_power(), "meter power").await {
            self.average_meter_power.push(meter);
        }
    }

    /// Push the surplus buffer and gate charging around heavy surplus days.
    pub async fn surplus_control(&mut self, inverter: &dyn Inverter) {
        if self.table.is_empty() {
            return;
        }
        let Some(surplus_min) = read(inverter.get_surplus_min_soc(), "surplus minimum").await
        else {
            return;
        };
        let buffer = self.scheduler().forecast_charge_buffer(&self.table, self.soc, surplus_min);
        call(inverter.set_surplus_buffer_soc(buffer.buffer_soc), "set the surplus buffer").await;

        let lock_charging =
            self.table.get(self.clock.index()).is_some_and(|slot| slot.lock_charging);
        let charge = if lock_charging {
            // A reserved slot only charges while the buffer is not reached:
            self.soc < buffer.buffer_soc
        } else if self.soc >= Percent(85.0) && self.soc < self.parameters.charging_cutoff {
            // Near the top, only keep charging when the remaining headroom
            // outweighs the expected surplus:
            let energy_to_full = self.parameters.level_for(self.parameters.charging_cutoff)
                - self.parameters.level_for(self.soc);
            let today = {
                let scheduler = self.scheduler();
                let projection = scheduler.simulator().project_soc(
                    &self.table,
                    &self.clock,
                    self.table.len(),
                    self.soc,
                    false,
                );
                scheduler.surplus_today(&self.table, &projection, self.clock.index())
            };
            energy_to_full >= today.surplus * self.settings.surplus_reserve_factor
        } else {
            true
        };
        call(inverter.set_charge_enabled(charge), "set charging").await;
    }

    /// Protective behaviours of the fine loop; skipped while a charge
    /// session is running.
    pub async fn apply_protections(&mut self, now: DateTime<Local>, inverter: &dyn Inverter) {
        if self.settings.protections.contains(Protection::BatteryGuard) {
            self.battery_guard(inverter).await;
        }
        if self.settings.protections.contains(Protection::StandbyCutoff) {
            self.standby_cutoff(now, inverter).await;
        }
        if self.settings.protections.contains(Protection::GridCharge) {
            self.grid_charge(now, inverter).await;
        }
    }

    /// Lock discharging under a heavy load (such as an EV charger), so the
    /// car does not empty the house battery.
    async fn battery_guard(&self, inverter: &dyn Inverter) {
        let heavy = self.average_charge_power.value()
            > self.parameters.max_charge_power - Watts(500.0)
            && self.average_consumption.value() > self.parameters.max_charge_power;
        if heavy {
            info!(
                average = %self.average_charge_power.value(),
                "heavy battery discharge, locking",
            );
            call(inverter.set_discharge_enabled(false), "lock discharging").await;
        } else if !self.discharge_lock_active(self.clock.now()) {
            call(inverter.set_discharge_enabled(true), "unlock discharging").await;
        }
    }

    /// Switch grid charging with the time of day and the metered surplus.
    async fn grid_charge(&self, now: DateTime<Local>, inverter: &dyn Inverter) {
        let time = now.time();
        let night = time < self.settings.sunrise || time > self.settings.sunset;
        let mut desired = None;
        if night && self.soc <= self.discharge_cutoff {
            // Let the inverter go to sleep on an empty battery:
            desired = Some(false);
        }
        if self.average_meter_power.value() > Watts(100.0)
            && self.soc < self.parameters.charging_cutoff
        {
            // Surplus at the meter, e.g. from a balcony plant:
            desired = Some(true);
        }
        if let Some(enabled) = desired {
            call(inverter.set_charge_from_grid_enabled(enabled), "switch grid charging").await;
        }
    }

    /// Raise the discharge cut-off for the quiet night hours and lower it
    /// back in the morning.
    async fn standby_cutoff(&mut self, now: DateTime<Local>, inverter: &dyn Inverter) {
        let hour = now.hour();
        if hour >= 22 {
            if self.average_consumption.value() < Watts(150.0)
                && self.discharge_cutoff < Percent(20.0)
                && self.discharge_cutoff < self.soc
                && read(inverter.is_running(), "running state").await.unwrap_or(false)
            {
                let cutoff = self.soc.min(Percent(20.0));
                info!(%cutoff, "raising the discharge cut-off for the night");
                if call(inverter.set_discharge_cutoff(cutoff), "set the discharge cut-off").await
                {
                    self.discharge_cutoff = cutoff;
                }
            }
        } else if hour >= 4
            && self.average_consumption.value() > Watts(200.0)
            && self.discharge_cutoff > Percent(5.0)
            && call(inverter.wake_up(), "wake up").await
        {
            info!("restoring the discharge cut-off");
            if call(inverter.set_discharge_cutoff(Percent(5.0)), "set the discharge cut-off")
                .await
            {
                self.discharge_cutoff = Percent(5.0);
            }
        }
    }

    /// Whether the current slot's discharge lock covers this instant;
    /// partial locks cover the leading fraction of the slot.
    fn discharge_lock_active(&self, now: DateTime<Local>) -> bool {
        self.table.get(self.clock.index()).is_some_and(|slot| {
            let elapsed = f64::from(now.minute()) / 60.0;
            slot.lock_discharge_fraction > 0.0 && elapsed < slot.lock_discharge_fraction
        })
    }

    /// Push the current slot's discharge lock to the inverter.
    pub async fn apply_discharge_lock(&self, now: DateTime<Local>, inverter: &dyn Inverter) {
        if self.table.is_empty() {
            return;
        }
        let locked = self.discharge_lock_active(now);
        call(inverter.set_discharge_enabled(!locked), "apply the discharge lock").await;
    }
}
