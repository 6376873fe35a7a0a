//! Power sequencing state machine.
//!
//! `ENT_*` states perform an entry action and advance to their steady state
//! on the same tick. Steady states are polled every tick; their exit
//! conditions are evaluated in priority order and the first match wins.

use crate::config::{
    OFF_STATE_DURATION_MS, SHUTDOWN_WAIT_DURATION_MS, WATCHDOG_REBOOT_DURATION_MS,
};
use crate::io::PowerOutputs;
use crate::led_patterns::IndicatorPattern;
use crate::supervisor::SupervisorContext;
use crate::timer::Stopwatch;
use portable_atomic::Ordering;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    Begin = 0,
    WaitVinOn,
    EntCharging,
    Charging,
    EntOn,
    On,
    EntDepleting,
    Depleting,
    EntShutdown,
    Shutdown,
    EntWatchdogReboot,
    WatchdogReboot,
    EntOff,
    Off,
    EntSleepShutdown,
    SleepShutdown,
    EntSleep,
    Sleep,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidStateId(pub u8);

impl PowerState {
    /// All states in id order.
    pub const ALL: [PowerState; 18] = [
        PowerState::Begin,
        PowerState::WaitVinOn,
        PowerState::EntCharging,
        PowerState::Charging,
        PowerState::EntOn,
        PowerState::On,
        PowerState::EntDepleting,
        PowerState::Depleting,
        PowerState::EntShutdown,
        PowerState::Shutdown,
        PowerState::EntWatchdogReboot,
        PowerState::WatchdogReboot,
        PowerState::EntOff,
        PowerState::Off,
        PowerState::EntSleepShutdown,
        PowerState::SleepShutdown,
        PowerState::EntSleep,
        PowerState::Sleep,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            PowerState::Begin => "BEGIN",
            PowerState::WaitVinOn => "WAIT_VIN_ON",
            PowerState::EntCharging => "ENT_CHARGING",
            PowerState::Charging => "CHARGING",
            PowerState::EntOn => "ENT_ON",
            PowerState::On => "ON",
            PowerState::EntDepleting => "ENT_DEPLETING",
            PowerState::Depleting => "DEPLETING",
            PowerState::EntShutdown => "ENT_SHUTDOWN",
            PowerState::Shutdown => "SHUTDOWN",
            PowerState::EntWatchdogReboot => "ENT_WATCHDOG_REBOOT",
            PowerState::WatchdogReboot => "WATCHDOG_REBOOT",
            PowerState::EntOff => "ENT_OFF",
            PowerState::Off => "OFF",
            PowerState::EntSleepShutdown => "ENT_SLEEP_SHUTDOWN",
            PowerState::SleepShutdown => "SLEEP_SHUTDOWN",
            PowerState::EntSleep => "ENT_SLEEP",
            PowerState::Sleep => "SLEEP",
        }
    }
}

impl TryFrom<u8> for PowerState {
    type Error = InvalidStateId;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        PowerState::ALL
            .get(usize::from(id))
            .copied()
            .ok_or(InvalidStateId(id))
    }
}

pub struct StateMachine {
    // Kept as a raw id so a corrupted value is caught on decode instead of
    // being trusted.
    state_id: u8,
    shutdown_timer: Stopwatch,
    reboot_timer: Stopwatch,
    off_timer: Stopwatch,
}

impl StateMachine {
    pub const fn new(now_ms: u32) -> Self {
        Self {
            state_id: PowerState::Begin as u8,
            shutdown_timer: Stopwatch::started_at(now_ms),
            reboot_timer: Stopwatch::started_at(now_ms),
            off_timer: Stopwatch::started_at(now_ms),
        }
    }

    pub fn state_id(&self) -> u8 {
        self.state_id
    }

    pub fn state(&self) -> Result<PowerState, InvalidStateId> {
        PowerState::try_from(self.state_id)
    }

    /// Overwrite the raw state id, e.g. with a value recovered from retained
    /// memory. Out-of-range ids are accepted here and caught by `run`.
    pub fn restore_state_id(&mut self, id: u8) {
        self.state_id = id;
    }

    /// Execute one tick and return the state the machine is left in.
    pub fn run<O: PowerOutputs>(
        &mut self,
        ctx: &mut SupervisorContext<'_>,
        out: &mut O,
    ) -> PowerState {
        let state = match self.state() {
            Ok(state) => state,
            Err(InvalidStateId(id)) => {
                error!("Invalid state id {}, restarting from BEGIN", id);
                self.state_id = PowerState::Begin.id();
                return PowerState::Begin;
            }
        };

        let next = self.step(state, ctx, out);
        if next != state {
            info!("Transitioning from {} to {}", state.name(), next.name());
            self.state_id = next.id();
        }
        next
    }

    fn step<O: PowerOutputs>(
        &mut self,
        state: PowerState,
        ctx: &mut SupervisorContext<'_>,
        out: &mut O,
    ) -> PowerState {
        let now = ctx.now_ms;
        match state {
            PowerState::Begin => {
                ctx.set_rail(out, false);
                ctx.shared.selected_register.store(0xff, Ordering::Relaxed);
                ctx.watchdog.disable();
                ctx.host_off.reset(now);
                // Requests left over from the previous power cycle are void.
                ctx.shared.shutdown_requested.clear();
                ctx.shared.sleep_requested.clear();
                ctx.shared.reset_requested.clear();
                out.select_pattern(IndicatorPattern::Off);
                out.start_bus_slave();
                PowerState::WaitVinOn
            }
            PowerState::WaitVinOn => {
                if ctx.vin_present() {
                    PowerState::EntCharging
                } else {
                    state
                }
            }
            PowerState::EntCharging => {
                out.select_pattern(IndicatorPattern::Charging);
                PowerState::Charging
            }
            PowerState::Charging => {
                if ctx.telemetry.supercap >= ctx.thresholds.power_on {
                    PowerState::EntOn
                } else if !ctx.vin_present() {
                    // input lost before the supercap could carry the host
                    PowerState::EntOff
                } else {
                    state
                }
            }
            PowerState::EntOn => {
                ctx.set_rail(out, true);
                out.select_pattern(IndicatorPattern::Steady);
                ctx.host_off.reset(now);
                PowerState::On
            }
            PowerState::On => {
                if ctx.watchdog.limit_changed() {
                    out.select_pattern(if ctx.watchdog.is_armed() {
                        IndicatorPattern::WatchdogEnabled
                    } else {
                        IndicatorPattern::Steady
                    });
                    ctx.watchdog.clear_limit_changed();
                }

                if ctx.watchdog_expired() {
                    PowerState::EntWatchdogReboot
                } else if self.take_reset_request(ctx) {
                    PowerState::EntWatchdogReboot
                } else if ctx.shared.shutdown_requested.take() {
                    PowerState::EntShutdown
                } else if ctx.shared.sleep_requested.take() {
                    PowerState::EntSleepShutdown
                } else if ctx.host_off_expired() {
                    PowerState::EntOff
                } else if !ctx.vin_present() {
                    PowerState::EntDepleting
                } else {
                    state
                }
            }
            PowerState::EntDepleting => {
                out.select_pattern(IndicatorPattern::Depleting);
                PowerState::Depleting
            }
            PowerState::Depleting => {
                if ctx.watchdog_expired() {
                    PowerState::EntWatchdogReboot
                } else if self.take_reset_request(ctx) {
                    PowerState::EntWatchdogReboot
                } else if ctx.shared.shutdown_requested.take() {
                    PowerState::EntShutdown
                } else if ctx.vin_present() {
                    PowerState::EntOn
                } else if ctx.telemetry.supercap < ctx.thresholds.power_off {
                    PowerState::EntOff
                } else if ctx.host_off_expired() {
                    PowerState::EntOff
                } else {
                    state
                }
            }
            PowerState::EntShutdown => {
                out.select_pattern(IndicatorPattern::Shutdown);
                ctx.watchdog.disable();
                self.shutdown_timer.reset(now);
                PowerState::Shutdown
            }
            PowerState::Shutdown => {
                if self.shutdown_complete(ctx) {
                    PowerState::EntOff
                } else {
                    state
                }
            }
            PowerState::EntWatchdogReboot => {
                self.reboot_timer.reset(now);
                ctx.watchdog.disable();
                out.stop_bus_slave();
                ctx.set_rail(out, false);
                out.select_pattern(IndicatorPattern::Fault);
                PowerState::WatchdogReboot
            }
            PowerState::WatchdogReboot => {
                if self.reboot_timer.elapsed_ms(now) > WATCHDOG_REBOOT_DURATION_MS {
                    PowerState::Begin
                } else {
                    state
                }
            }
            PowerState::EntOff => {
                out.stop_bus_slave();
                ctx.set_rail(out, false);
                self.off_timer.reset(now);
                out.select_pattern(IndicatorPattern::Off);
                PowerState::Off
            }
            PowerState::Off => {
                if self.off_timer.elapsed_ms(now) > OFF_STATE_DURATION_MS {
                    PowerState::Begin
                } else {
                    state
                }
            }
            PowerState::EntSleepShutdown => {
                out.select_pattern(IndicatorPattern::Shutdown);
                ctx.watchdog.disable();
                self.shutdown_timer.reset(now);
                PowerState::SleepShutdown
            }
            PowerState::SleepShutdown => {
                if self.shutdown_complete(ctx) {
                    PowerState::EntSleep
                } else {
                    state
                }
            }
            PowerState::EntSleep => {
                out.stop_bus_slave();
                ctx.set_rail(out, false);
                out.select_pattern(IndicatorPattern::Sleep);
                PowerState::Sleep
            }
            PowerState::Sleep => {
                if ctx.rtc_wake || ctx.ext_wake {
                    PowerState::Begin
                } else {
                    state
                }
            }
        }
    }

    fn shutdown_complete(&self, ctx: &SupervisorContext<'_>) -> bool {
        ctx.host_off_expired()
            || self.shutdown_timer.elapsed_ms(ctx.now_ms) > SHUTDOWN_WAIT_DURATION_MS
    }

    // A reset is requested by holding the external wake line while a
    // shutdown is pending; it supersedes that shutdown.
    fn take_reset_request(&self, ctx: &SupervisorContext<'_>) -> bool {
        if ctx.shared.reset_requested.take() {
            ctx.shared.shutdown_requested.clear();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_match_declaration_order() {
        for (i, state) in PowerState::ALL.iter().enumerate() {
            assert_eq!(usize::from(state.id()), i);
            assert_eq!(PowerState::try_from(i as u8), Ok(*state));
        }
    }

    #[test]
    fn out_of_range_id_is_rejected() {
        assert_eq!(PowerState::try_from(18), Err(InvalidStateId(18)));
        assert_eq!(PowerState::try_from(0xff), Err(InvalidStateId(0xff)));
    }

    #[test]
    fn names_are_upper_snake_case() {
        assert_eq!(PowerState::WaitVinOn.name(), "WAIT_VIN_ON");
        assert_eq!(PowerState::EntWatchdogReboot.name(), "ENT_WATCHDOG_REBOOT");
    }
}
