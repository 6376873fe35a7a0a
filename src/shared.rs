//! State shared between the bus handler and the supervisor loop.
//!
//! Every field has exactly one writer. The bus handler only deposits
//! requests (pending slots and flags); the supervisor applies them and
//! publishes the values the bus handler reads back.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use portable_atomic::{AtomicBool, AtomicU8, AtomicU16, AtomicU32, Ordering};

use crate::config::{
    DEFAULT_LED_BRIGHTNESS, DEFAULT_POWER_OFF_THRESHOLD_CODE, DEFAULT_POWER_ON_THRESHOLD_CODE,
};
use crate::config_manager::Thresholds;
use crate::telemetry::TelemetrySnapshot;

const NOTHING_PENDING: u32 = u32::MAX;

/// Single-slot mailbox for a 16-bit value.
pub struct Pending(AtomicU32);

impl Pending {
    pub const fn new() -> Self {
        Self(AtomicU32::new(NOTHING_PENDING))
    }

    /// Replace whatever is pending. The latest write wins.
    pub fn post(&self, value: u16) {
        self.0.store(u32::from(value), Ordering::Release);
    }

    pub fn take(&self) -> Option<u16> {
        match self.0.swap(NOTHING_PENDING, Ordering::AcqRel) {
            NOTHING_PENDING => None,
            value => Some(value as u16),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.0.load(Ordering::Acquire) != NOTHING_PENDING
    }
}

impl Default for Pending {
    fn default() -> Self {
        Self::new()
    }
}

/// Edge-triggered request, cleared by whoever consumes it.
pub struct RequestFlag(AtomicBool);

impl RequestFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for RequestFlag {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SharedState {
    // Written by the bus handler
    /// Heartbeat: set on every bus transaction.
    pub watchdog_reset: RequestFlag,
    pub pending_watchdog_limit: Pending,
    pub pending_power_on_threshold: Pending,
    pub pending_power_off_threshold: Pending,
    pub pending_led_brightness: Pending,
    pub pending_rail: Pending,
    pub shutdown_requested: RequestFlag,
    pub sleep_requested: RequestFlag,
    pub reset_requested: RequestFlag,
    /// Register addressed by the most recent transaction. The supervisor
    /// resets it to 0xFF when it restarts.
    pub selected_register: AtomicU8,

    // Published by the supervisor
    telemetry: Mutex<CriticalSectionRawMutex, Cell<TelemetrySnapshot>>,
    pub state_id: AtomicU8,
    pub rail_enabled: AtomicBool,
    pub watchdog_limit: AtomicU16,
    pub watchdog_elapsed_ms: AtomicU32,
    pub power_on_threshold: AtomicU16,
    pub power_off_threshold: AtomicU16,
    pub led_brightness: AtomicU8,
}

impl SharedState {
    pub const fn new() -> Self {
        Self {
            watchdog_reset: RequestFlag::new(),
            pending_watchdog_limit: Pending::new(),
            pending_power_on_threshold: Pending::new(),
            pending_power_off_threshold: Pending::new(),
            pending_led_brightness: Pending::new(),
            pending_rail: Pending::new(),
            shutdown_requested: RequestFlag::new(),
            sleep_requested: RequestFlag::new(),
            reset_requested: RequestFlag::new(),
            selected_register: AtomicU8::new(0xff),

            telemetry: Mutex::new(Cell::new(TelemetrySnapshot::new())),
            state_id: AtomicU8::new(0),
            rail_enabled: AtomicBool::new(false),
            watchdog_limit: AtomicU16::new(0),
            watchdog_elapsed_ms: AtomicU32::new(0),
            power_on_threshold: AtomicU16::new(DEFAULT_POWER_ON_THRESHOLD_CODE),
            power_off_threshold: AtomicU16::new(DEFAULT_POWER_OFF_THRESHOLD_CODE),
            led_brightness: AtomicU8::new(DEFAULT_LED_BRIGHTNESS),
        }
    }

    /// Replace the published snapshot as a whole.
    pub fn publish_telemetry(&self, snapshot: TelemetrySnapshot) {
        self.telemetry.lock(|cell| cell.set(snapshot));
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.lock(|cell| cell.get())
    }

    pub fn publish_thresholds(&self, thresholds: &Thresholds) {
        self.power_on_threshold
            .store(thresholds.power_on, Ordering::Relaxed);
        self.power_off_threshold
            .store(thresholds.power_off, Ordering::Relaxed);
        self.led_brightness
            .store(thresholds.led_brightness, Ordering::Relaxed);
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            power_on: self.power_on_threshold.load(Ordering::Relaxed),
            power_off: self.power_off_threshold.load(Ordering::Relaxed),
            led_brightness: self.led_brightness.load(Ordering::Relaxed),
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_slot_is_consumed_once() {
        let slot = Pending::new();
        assert_eq!(slot.take(), None);

        slot.post(0);
        assert!(slot.is_pending());
        assert_eq!(slot.take(), Some(0));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn latest_post_wins() {
        let slot = Pending::new();
        slot.post(100);
        slot.post(u16::MAX);
        assert_eq!(slot.take(), Some(u16::MAX));
    }

    #[test]
    fn request_flag_take_clears() {
        let flag = RequestFlag::new();
        assert!(!flag.take());
        flag.raise();
        flag.raise();
        assert!(flag.is_raised());
        assert!(flag.take());
        assert!(!flag.is_raised());
    }

    #[test]
    fn telemetry_is_published_whole() {
        let shared = SharedState::new();
        let mut snapshot = TelemetrySnapshot::new();
        snapshot.supercap = 800;
        snapshot.input_voltage = 300;
        shared.publish_telemetry(snapshot);
        assert_eq!(shared.telemetry(), snapshot);
    }

    #[test]
    fn defaults_are_published_before_load() {
        let shared = SharedState::new();
        assert_eq!(shared.thresholds(), Thresholds::default());
        assert_eq!(shared.selected_register.load(Ordering::Relaxed), 0xff);
    }
}
