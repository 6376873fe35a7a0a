//! Register protocol engine.
//!
//! Runs in the bus handler's context. A transaction that carries only an
//! address byte selects the register served by the following read; a
//! transaction with payload is a write. Writes never touch active values:
//! they are staged in the shared mailbox for the supervisor loop to apply.
//!
//! | Addr | Access | Width | Content |
//! |------|--------|-------|---------|
//! | 0x01 | R   | 1 | legacy hardware version (0xFF: use 0x03) |
//! | 0x02 | R   | 1 | legacy firmware version |
//! | 0x03 | R   | 4 | hardware version |
//! | 0x04 | R   | 4 | firmware version |
//! | 0x10 | R/W | 1 | rail enabled |
//! | 0x11 | R/W | 1 | legacy, reads 1 |
//! | 0x12 | R/W | 2 | watchdog limit, ms |
//! | 0x13 | R/W | 2 | power-on threshold, packed 10-bit code |
//! | 0x14 | R/W | 2 | power-off threshold, packed 10-bit code |
//! | 0x15 | R   | 1 | state id |
//! | 0x16 | R   | 1 | watchdog elapsed, 0.1 s |
//! | 0x17 | R/W | 1 | LED brightness |
//! | 0x20 | R   | 2 | input voltage, packed 10-bit code |
//! | 0x21 | R   | 2 | supercap voltage, packed 10-bit code |
//! | 0x22 | R   | 2 | input current, packed 10-bit code |
//! | 0x23 | R   | 2 | temperature |
//! | 0x30 | W   | 1 | request shutdown |
//! | 0x31 | W   | 1 | request sleep |
//!
//! Multi-byte values are big-endian. Unlisted addresses read 0xFF and
//! discard writes.

use portable_atomic::Ordering;

use crate::config::{FW_VERSION, HW_VERSION, LEGACY_FW_VERSION, LEGACY_HW_VERSION, WATCHDOG_ELAPSED_UNIT_MS};
use crate::shared::SharedState;

pub const UNKNOWN_REGISTER_VALUE: u8 = 0xff;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    LegacyHardwareVersion,
    LegacyFirmwareVersion,
    HardwareVersion,
    FirmwareVersion,
    RailEnable,
    Legacy11,
    WatchdogLimit,
    PowerOnThreshold,
    PowerOffThreshold,
    State,
    WatchdogElapsed,
    LedBrightness,
    InputVoltage,
    SupercapVoltage,
    InputCurrent,
    Temperature,
    Shutdown,
    Sleep,
    Unknown(u8),
}

impl Register {
    pub fn from_address(addr: u8) -> Self {
        match addr {
            0x01 => Register::LegacyHardwareVersion,
            0x02 => Register::LegacyFirmwareVersion,
            0x03 => Register::HardwareVersion,
            0x04 => Register::FirmwareVersion,
            0x10 => Register::RailEnable,
            0x11 => Register::Legacy11,
            0x12 => Register::WatchdogLimit,
            0x13 => Register::PowerOnThreshold,
            0x14 => Register::PowerOffThreshold,
            0x15 => Register::State,
            0x16 => Register::WatchdogElapsed,
            0x17 => Register::LedBrightness,
            0x20 => Register::InputVoltage,
            0x21 => Register::SupercapVoltage,
            0x22 => Register::InputCurrent,
            0x23 => Register::Temperature,
            0x30 => Register::Shutdown,
            0x31 => Register::Sleep,
            other => Register::Unknown(other),
        }
    }

    pub fn address(self) -> u8 {
        match self {
            Register::LegacyHardwareVersion => 0x01,
            Register::LegacyFirmwareVersion => 0x02,
            Register::HardwareVersion => 0x03,
            Register::FirmwareVersion => 0x04,
            Register::RailEnable => 0x10,
            Register::Legacy11 => 0x11,
            Register::WatchdogLimit => 0x12,
            Register::PowerOnThreshold => 0x13,
            Register::PowerOffThreshold => 0x14,
            Register::State => 0x15,
            Register::WatchdogElapsed => 0x16,
            Register::LedBrightness => 0x17,
            Register::InputVoltage => 0x20,
            Register::SupercapVoltage => 0x21,
            Register::InputCurrent => 0x22,
            Register::Temperature => 0x23,
            Register::Shutdown => 0x30,
            Register::Sleep => 0x31,
            Register::Unknown(addr) => addr,
        }
    }

    /// Number of bytes served on read or expected on write.
    pub fn width(self) -> usize {
        match self {
            Register::HardwareVersion | Register::FirmwareVersion => 4,
            Register::WatchdogLimit
            | Register::PowerOnThreshold
            | Register::PowerOffThreshold
            | Register::InputVoltage
            | Register::SupercapVoltage
            | Register::InputCurrent
            | Register::Temperature => 2,
            _ => 1,
        }
    }
}

/// Bytes to clock out for a read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Response {
    bytes: [u8; 4],
    len: usize,
}

impl Response {
    fn byte(value: u8) -> Self {
        Self {
            bytes: [value, 0, 0, 0],
            len: 1,
        }
    }

    fn word(bytes: [u8; 2]) -> Self {
        Self {
            bytes: [bytes[0], bytes[1], 0, 0],
            len: 2,
        }
    }

    fn quad(bytes: [u8; 4]) -> Self {
        Self { bytes, len: 4 }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// Left-pack a 10-bit code into two bytes.
pub fn pack_code(code: u16) -> [u8; 2] {
    [(code >> 2) as u8, ((code << 6) & 0xff) as u8]
}

/// Recover a 10-bit code from its left-packed form. The low six bits of
/// the second byte are ignored.
pub fn unpack_code(bytes: [u8; 2]) -> u16 {
    (u16::from(bytes[0]) << 2) | (u16::from(bytes[1]) >> 6)
}

pub struct RegisterEngine<'a> {
    shared: &'a SharedState,
}

impl<'a> RegisterEngine<'a> {
    pub fn new(shared: &'a SharedState) -> Self {
        Self { shared }
    }

    pub fn selected(&self) -> Register {
        Register::from_address(self.shared.selected_register.load(Ordering::Relaxed))
    }

    /// Handle bytes written by the master: an address byte, optionally
    /// followed by a payload.
    pub fn on_receive(&mut self, data: &[u8]) {
        if let Some((&addr, payload)) = data.split_first() {
            self.shared.selected_register.store(addr, Ordering::Relaxed);
            if !payload.is_empty() {
                self.write(Register::from_address(addr), payload);
            }
        }
        self.shared.watchdog_reset.raise();
    }

    /// Produce the bytes for a read of the selected register.
    pub fn on_request(&mut self) -> Response {
        let response = self.read(self.selected());
        self.shared.watchdog_reset.raise();
        response
    }

    fn read(&self, register: Register) -> Response {
        let shared = self.shared;
        match register {
            Register::LegacyHardwareVersion => Response::byte(LEGACY_HW_VERSION),
            Register::LegacyFirmwareVersion => Response::byte(LEGACY_FW_VERSION),
            Register::HardwareVersion => Response::quad(HW_VERSION),
            Register::FirmwareVersion => Response::quad(FW_VERSION),
            Register::RailEnable => {
                Response::byte(u8::from(shared.rail_enabled.load(Ordering::Relaxed)))
            }
            Register::Legacy11 => Response::byte(1),
            Register::WatchdogLimit => {
                Response::word(shared.watchdog_limit.load(Ordering::Relaxed).to_be_bytes())
            }
            Register::PowerOnThreshold => {
                Response::word(pack_code(shared.power_on_threshold.load(Ordering::Relaxed)))
            }
            Register::PowerOffThreshold => {
                Response::word(pack_code(shared.power_off_threshold.load(Ordering::Relaxed)))
            }
            Register::State => Response::byte(shared.state_id.load(Ordering::Relaxed)),
            Register::WatchdogElapsed => {
                let elapsed = shared.watchdog_elapsed_ms.load(Ordering::Relaxed);
                let units = (elapsed / WATCHDOG_ELAPSED_UNIT_MS).min(u32::from(u8::MAX));
                Response::byte(units as u8)
            }
            Register::LedBrightness => Response::byte(shared.led_brightness.load(Ordering::Relaxed)),
            Register::InputVoltage => Response::word(pack_code(shared.telemetry().input_voltage)),
            Register::SupercapVoltage => Response::word(pack_code(shared.telemetry().supercap)),
            Register::InputCurrent => Response::word(pack_code(shared.telemetry().input_current)),
            Register::Temperature => Response::word(shared.telemetry().temperature.to_be_bytes()),
            Register::Shutdown | Register::Sleep | Register::Unknown(_) => {
                debug!("Read of unreadable register 0x{:02x}", register.address());
                Response::byte(UNKNOWN_REGISTER_VALUE)
            }
        }
    }

    fn write(&mut self, register: Register, payload: &[u8]) {
        let shared = self.shared;
        if payload.len() < register.width() {
            warn!(
                "Short write to register 0x{:02x}: {} bytes",
                register.address(),
                payload.len()
            );
            return;
        }
        match register {
            Register::RailEnable => shared.pending_rail.post(u16::from(payload[0])),
            Register::WatchdogLimit => shared
                .pending_watchdog_limit
                .post(u16::from_be_bytes([payload[0], payload[1]])),
            Register::PowerOnThreshold => shared
                .pending_power_on_threshold
                .post(unpack_code([payload[0], payload[1]])),
            Register::PowerOffThreshold => shared
                .pending_power_off_threshold
                .post(unpack_code([payload[0], payload[1]])),
            Register::LedBrightness => shared.pending_led_brightness.post(u16::from(payload[0])),
            Register::Shutdown => shared.shutdown_requested.raise(),
            Register::Sleep => shared.sleep_requested.raise(),
            Register::Legacy11 => {}
            _ => debug!("Write to read-only register 0x{:02x} discarded", register.address()),
        }
    }
}
