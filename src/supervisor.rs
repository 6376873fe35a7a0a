//! Main-loop side of the supervisor.
//!
//! Each `poll` samples telemetry and digital inputs when the sampling
//! interval has elapsed, applies whatever the bus handler has staged, runs
//! one tick of the state machine, and publishes the results for the bus
//! handler to read back.

use embedded_storage::Storage;
use portable_atomic::Ordering;

use crate::config::{
    HOST_OFF_TIME_LIMIT_MS, SAMPLE_INTERVAL_MS, VIN_POWER_THRESHOLD_CODE,
};
use crate::config_manager::{ConfigManager, Thresholds, is_valid_threshold};
use crate::host_watchdog::HostWatchdog;
use crate::io::{HostInputs, InputLevels, PowerOutputs};
use crate::shared::SharedState;
use crate::state_machine::{PowerState, StateMachine};
use crate::telemetry::{AcquisitionError, Converter, TelemetryAcquisition, TelemetrySnapshot};
use crate::timer::Stopwatch;

/// Everything the state machine reads and mutates during a tick.
pub struct SupervisorContext<'a> {
    pub shared: &'a SharedState,
    pub now_ms: u32,
    pub telemetry: TelemetrySnapshot,
    pub thresholds: Thresholds,
    pub watchdog: HostWatchdog,
    /// Restarted whenever the host-off line reads high.
    pub host_off: Stopwatch,
    pub rtc_wake: bool,
    pub ext_wake: bool,
}

impl<'a> SupervisorContext<'a> {
    pub fn new(shared: &'a SharedState, thresholds: Thresholds, now_ms: u32) -> Self {
        Self {
            shared,
            now_ms,
            telemetry: TelemetrySnapshot::new(),
            thresholds,
            watchdog: HostWatchdog::new(now_ms),
            host_off: Stopwatch::started_at(now_ms),
            rtc_wake: false,
            ext_wake: false,
        }
    }

    pub fn vin_present(&self) -> bool {
        self.telemetry.input_voltage >= VIN_POWER_THRESHOLD_CODE
    }

    pub fn host_off_expired(&self) -> bool {
        self.host_off.elapsed_ms(self.now_ms) > HOST_OFF_TIME_LIMIT_MS
    }

    pub fn watchdog_expired(&self) -> bool {
        self.watchdog.is_expired(self.now_ms)
    }

    /// Drive the rail and publish its new level.
    pub fn set_rail<O: PowerOutputs>(&self, out: &mut O, enabled: bool) {
        out.set_rail(enabled);
        self.shared.rail_enabled.store(enabled, Ordering::Relaxed);
    }
}

/// Periodic diagnostic record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusLine {
    pub state: PowerState,
    pub supercap: u16,
    pub input_voltage: u16,
    pub input_current: u16,
    pub temperature: u16,
    pub selected_register: u8,
    pub rail_enabled: bool,
    pub inputs: InputLevels,
}

pub struct Supervisor<'a, C, S, I> {
    ctx: SupervisorContext<'a>,
    machine: StateMachine,
    acquisition: TelemetryAcquisition<C>,
    config: ConfigManager<S>,
    inputs: I,
    levels: InputLevels,
    last_sample: Option<Stopwatch>,
    state: PowerState,
}

impl<'a, C, S, I> Supervisor<'a, C, S, I>
where
    C: Converter,
    S: Storage,
    I: HostInputs,
{
    /// Load persisted thresholds and publish them.
    pub fn new(
        shared: &'a SharedState,
        acquisition: TelemetryAcquisition<C>,
        mut config: ConfigManager<S>,
        inputs: I,
        now_ms: u32,
    ) -> Self {
        let thresholds = config.load();
        shared.publish_thresholds(&thresholds);
        shared
            .state_id
            .store(PowerState::Begin.id(), Ordering::Relaxed);

        Self {
            ctx: SupervisorContext::new(shared, thresholds, now_ms),
            machine: StateMachine::new(now_ms),
            acquisition,
            config,
            inputs,
            levels: InputLevels::default(),
            last_sample: None,
            state: PowerState::Begin,
        }
    }

    pub fn poll<O: PowerOutputs>(&mut self, now_ms: u32, out: &mut O) -> PowerState {
        self.ctx.now_ms = now_ms;

        let due = match self.last_sample {
            None => true,
            Some(since) => since.elapsed_ms(now_ms) > SAMPLE_INTERVAL_MS,
        };
        if due {
            self.last_sample = Some(Stopwatch::started_at(now_ms));
            self.sample();
            self.read_inputs();
        }

        self.ctx.watchdog.service(self.ctx.shared, now_ms);
        self.apply_pending(out);

        self.state = self.machine.run(&mut self.ctx, out);
        self.publish();
        self.state
    }

    fn sample(&mut self) {
        match self.acquisition.sample() {
            Ok(snapshot) => {
                if snapshot.alarm.changed {
                    if snapshot.alarm.triggered {
                        warn!("Supercap voltage above alarm level: {}", snapshot.supercap);
                    } else {
                        info!("Supercap voltage back below alarm level: {}", snapshot.supercap);
                    }
                    self.acquisition.acknowledge_alarm();
                }
                self.ctx.telemetry = snapshot;
                self.ctx.shared.publish_telemetry(snapshot);
            }
            Err(AcquisitionError::Busy) => {
                debug!("ADC busy, keeping previous telemetry");
            }
            Err(AcquisitionError::Timeout) => {
                warn!("ADC conversion timed out, keeping previous telemetry");
            }
        }
    }

    fn read_inputs(&mut self) {
        let now = self.ctx.now_ms;
        let levels = self.inputs.read();
        let shared = self.ctx.shared;

        if levels.host_running {
            self.ctx.host_off.reset(now);
        }
        self.ctx.rtc_wake = levels.rtc_alarm;
        self.ctx.ext_wake = levels.ext_wake;

        if levels.power_toggle_pressed && !self.levels.power_toggle_pressed {
            info!("Power toggle pressed, requesting shutdown");
            shared.shutdown_requested.raise();
        }
        if levels.ext_wake && shared.shutdown_requested.is_raised() {
            shared.reset_requested.raise();
        }

        self.levels = levels;
    }

    fn apply_pending<O: PowerOutputs>(&mut self, out: &mut O) {
        let shared = self.ctx.shared;

        if let Some(code) = shared.pending_power_on_threshold.take() {
            if !is_valid_threshold(i32::from(code)) {
                warn!("Rejecting power-on threshold {}", code);
            } else if code != self.ctx.thresholds.power_on {
                info!("Power-on threshold set to {}", code);
                self.ctx.thresholds.power_on = code;
                if self.config.store_power_on_threshold(code).is_err() {
                    error!("Failed to persist power-on threshold");
                }
            }
        }

        if let Some(code) = shared.pending_power_off_threshold.take() {
            if !is_valid_threshold(i32::from(code)) {
                warn!("Rejecting power-off threshold {}", code);
            } else if code != self.ctx.thresholds.power_off {
                info!("Power-off threshold set to {}", code);
                self.ctx.thresholds.power_off = code;
                if self.config.store_power_off_threshold(code).is_err() {
                    error!("Failed to persist power-off threshold");
                }
            }
        }

        if let Some(value) = shared.pending_led_brightness.take() {
            match u8::try_from(value) {
                Ok(brightness) if brightness != self.ctx.thresholds.led_brightness => {
                    info!("LED brightness set to {}", brightness);
                    self.ctx.thresholds.led_brightness = brightness;
                    if self.config.store_led_brightness(brightness).is_err() {
                        error!("Failed to persist LED brightness");
                    }
                }
                Ok(_) => {}
                Err(_) => warn!("Rejecting LED brightness {}", value),
            }
        }

        shared.publish_thresholds(&self.ctx.thresholds);

        if let Some(rail) = shared.pending_rail.take() {
            let enabled = rail != 0;
            info!("Rail override: {}", enabled);
            self.ctx.set_rail(out, enabled);
        }
    }

    fn publish(&self) {
        let shared = self.ctx.shared;
        let now = self.ctx.now_ms;
        shared.state_id.store(self.machine.state_id(), Ordering::Relaxed);
        shared
            .watchdog_limit
            .store(self.ctx.watchdog.limit_ms(), Ordering::Relaxed);
        shared
            .watchdog_elapsed_ms
            .store(self.ctx.watchdog.elapsed_ms(now), Ordering::Relaxed);
    }

    pub fn status(&self) -> StatusLine {
        let shared = self.ctx.shared;
        StatusLine {
            state: self.state,
            supercap: self.ctx.telemetry.supercap,
            input_voltage: self.ctx.telemetry.input_voltage,
            input_current: self.ctx.telemetry.input_current,
            temperature: self.ctx.telemetry.temperature,
            selected_register: shared.selected_register.load(Ordering::Relaxed),
            rail_enabled: shared.rail_enabled.load(Ordering::Relaxed),
            inputs: self.levels,
        }
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    pub fn thresholds(&self) -> Thresholds {
        self.ctx.thresholds
    }

    pub fn context(&self) -> &SupervisorContext<'a> {
        &self.ctx
    }

    pub fn machine_mut(&mut self) -> &mut StateMachine {
        &mut self.machine
    }

    pub fn config(&self) -> &ConfigManager<S> {
        &self.config
    }

    pub fn acquisition_mut(&mut self) -> &mut TelemetryAcquisition<C> {
        &mut self.acquisition
    }

    pub fn inputs_mut(&mut self) -> &mut I {
        &mut self.inputs
    }
}
