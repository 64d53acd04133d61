use chrono::{DateTime, Local, TimeDelta};

use crate::{
    api::{
        Inverter,
        inverter::{call, read},
    },
    core::{battery::BatteryParameters, clock::Clock, point::ChargePoint},
    prelude::*,
    quantity::{Zero, percent::Percent, power::Watts, time::Hours},
};

/// Phase of a running charge session.
#[derive(Clone, Debug, PartialEq)]
pub enum Phase {
    /// The battery is being woken up ahead of the slot.
    WakeUp,

    /// Waiting for the nominal start to issue the charge command.
    StartCharge,

    /// The charge is running; the power is periodically readjusted.
    ChargeControl {
        last_power: Option<Watts>,
        last_adjusted: Option<DateTime<Local>>,
    },
}

/// A charge session bound to one planned point.
///
/// The point is snapshotted at activation: later plan refreshes do not touch
/// a running session.
#[derive(Clone, Debug, PartialEq)]
pub struct ChargeProcess {
    pub point: ChargePoint,

    /// Number of consecutive points merged into this session.
    pub hours: usize,

    pub phase: Phase,
}

impl ChargeProcess {
    /// End of the whole merged session.
    fn until(&self) -> DateTime<Local> {
        self.point.start + TimeDelta::hours(i64::try_from(self.hours).unwrap_or(1))
    }
}

/// Drives the charge plan against wall-clock time.
pub struct ProcessController {
    /// Snapshot of the plan taken when no session is active.
    active_points: Vec<ChargePoint>,

    process: Option<ChargeProcess>,

    /// A window just ended; the follow-up scan keeps the snapshot and skips
    /// the wake-up for a back-to-back point.
    resume_pending: bool,

    /// A controlled session ended and the stop command is still owed.
    stop_pending: bool,

    hysteresis: Watts,
}

impl ProcessController {
    #[must_use]
    pub const fn new(hysteresis: Watts) -> Self {
        Self {
            active_points: Vec::new(),
            process: None,
            resume_pending: false,
            stop_pending: false,
            hysteresis,
        }
    }

    #[must_use]
    pub const fn process(&self) -> Option<&ChargeProcess> {
        self.process.as_ref()
    }

    /// One control tick.
    #[instrument(skip_all)]
    pub async fn tick(
        &mut self,
        clock: &Clock,
        plan: &[ChargePoint],
        parameters: &BatteryParameters,
        inverter: &dyn Inverter,
    ) {
        self.expire(clock);
        if self.process.is_none() {
            self.scan(clock, plan, inverter).await;
        }
        self.drive(clock, parameters, inverter).await;
    }

    /// Abandon the session once its window has passed.
    fn expire(&mut self, clock: &Clock) {
        let Some(process) = &self.process else { return };
        if clock.now() >= process.point.wake_window().end {
            info!(index = process.point.index, "charge window passed");
            self.stop_pending = matches!(process.phase, Phase::ChargeControl { .. });
            self.resume_pending = true;
            self.process = None;
        }
    }

    /// Look for a point whose window contains "now" and activate it; with no
    /// successor after an ended session, stop the charge.
    async fn scan(&mut self, clock: &Clock, plan: &[ChargePoint], inverter: &dyn Inverter) {
        if !self.resume_pending {
            self.active_points = plan.to_vec();
        }
        let found = self
            .active_points
            .iter()
            .position(|point| point.wake_window().contains(clock.now()));

        if let Some(position) = found {
            let first = self.active_points[position];
            let hours = 1 + self.active_points[position + 1..]
                .iter()
                .enumerate()
                .take_while(|(offset, point)| point.index == first.index + offset + 1)
                .count();
            let phase = if self.resume_pending {
                // No gap after the previous window, the charge keeps running:
                Phase::ChargeControl { last_power: None, last_adjusted: None }
            } else {
                Phase::WakeUp
            };
            info!(index = first.index, hours, ?phase, "entering a charge window");
            self.process = Some(ChargeProcess { point: first, hours, phase });
            self.resume_pending = false;
            self.stop_pending = false;
        } else if self.stop_pending {
            if call(inverter.stop_charging(), "stop charging").await {
                info!("charging stopped");
                self.stop_pending = false;
                self.resume_pending = false;
            }
        } else {
            self.resume_pending = false;
        }
    }

    /// Advance the active session's phase.
    async fn drive(
        &mut self,
        clock: &Clock,
        parameters: &BatteryParameters,
        inverter: &dyn Inverter,
    ) {
        let hysteresis = self.hysteresis;
        let Some(process) = self.process.as_mut() else { return };
        let now = clock.now();

        match &mut process.phase {
            Phase::WakeUp => {
                if call(inverter.wake_up(), "wake up").await {
                    info!("battery is awake");
                    process.phase = Phase::StartCharge;
                } else if now > process.point.start {
                    warn!("battery cannot be woken up");
                }
            }

            Phase::StartCharge => {
                if now >= process.point.start - TimeDelta::minutes(1) {
                    let duration = process.until() - now;
                    let Some(soc) = read(inverter.get_soc(), "state of charge").await else {
                        return;
                    };
                    let power = adjust_power(parameters, process.point.target_soc, soc, duration);
                    info!(%power, ?duration, "starting to charge…");
                    if call(inverter.start_charging(power, duration), "start charging").await {
                        process.phase = Phase::ChargeControl {
                            last_power: Some(power),
                            last_adjusted: None,
                        };
                    }
                }
            }

            Phase::ChargeControl { last_power, last_adjusted } => {
                let Some(last) = *last_adjusted else {
                    *last_adjusted = Some(now);
                    return;
                };
                if now - last < TimeDelta::minutes(5) {
                    return;
                }
                let Some(soc) = read(inverter.get_soc(), "state of charge").await else {
                    return;
                };
                if soc < process.point.target_soc {
                    match read(inverter.get_charge_discharge_power(), "charge power").await {
                        Some(power) if power <= Watts::ZERO => warn!("battery is not charging"),
                        _ => {}
                    }
                }
                let remaining = process.point.charge_window().end - now;
                let power = adjust_power(parameters, process.point.target_soc, soc, remaining);
                let off_band =
                    last_power.is_none_or(|last| (last - power).abs() > hysteresis);
                if off_band && call(inverter.set_charge_power(power), "set the charge power").await
                {
                    info!(%power, "adjusted the charge power");
                    *last_power = Some(power);
                }
                *last_adjusted = Some(now);
            }
        }
    }
}

/// Charging power needed to reach the target state of charge within the
/// remaining time, uplifted by the charge-leg loss.
pub fn adjust_power(
    parameters: &BatteryParameters,
    target_soc: Percent,
    soc: Percent,
    remaining: TimeDelta,
) -> Watts {
    let hours = Hours::from(remaining);
    if hours <= Hours::ZERO {
        return Watts::ZERO;
    }
    let rest_energy = parameters.level_for(target_soc) - parameters.level_for(soc);
    let power = rest_energy / hours * (1.0 + parameters.loss_fraction / 2.0);
    power.clamp(Watts::ZERO, parameters.max_charge_power).round()
}
