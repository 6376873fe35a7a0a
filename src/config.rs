// Compiled-in defaults and fixed timing for the supervisor.

pub const I2C_ADDR: u8 = 0x6d; // I2C address for the host-facing register interface

// Value served by the legacy hardware version register. 0xFF tells the host
// to query the 4-byte hardware version register instead.
pub const LEGACY_HW_VERSION: u8 = 0xff;
pub const LEGACY_FW_VERSION: u8 = 0xff;

pub const HW_VERSION_STR: &str = "2.0.0";
pub const FW_VERSION_STR: &str = "2.0.5";

// Analog codes are 10-bit regardless of the converter's native resolution.
pub const ADC_SCALE: u16 = 1024;
pub const THRESHOLD_SCALE_MAX: u16 = ADC_SCALE - 1;

pub const VSCAP_MAX_VALUE: f32 = 9.35; // V; full-scale supercap reading
pub const VSCAP_MAX_ALARM: f32 = 9.0; // V; Voltage should never exceed this value
pub const DEFAULT_VSCAP_POWER_ON_THRESHOLD: f32 = 8.0; // V
pub const DEFAULT_VSCAP_POWER_OFF_THRESHOLD: f32 = 5.0; // V

pub const VIN_MAX_VALUE: f32 = 32.1; // V; full-scale input voltage reading
pub const VIN_POWER_THRESHOLD: f32 = 9.0; // V; below this the input is considered lost

pub const fn volts_to_code(volts: f32, full_scale: f32) -> u16 {
    (volts / full_scale * ADC_SCALE as f32) as u16
}

pub const DEFAULT_POWER_ON_THRESHOLD_CODE: u16 =
    volts_to_code(DEFAULT_VSCAP_POWER_ON_THRESHOLD, VSCAP_MAX_VALUE);
pub const DEFAULT_POWER_OFF_THRESHOLD_CODE: u16 =
    volts_to_code(DEFAULT_VSCAP_POWER_OFF_THRESHOLD, VSCAP_MAX_VALUE);
pub const VSCAP_ALARM_CODE: u16 = volts_to_code(VSCAP_MAX_ALARM, VSCAP_MAX_VALUE);
pub const VIN_POWER_THRESHOLD_CODE: u16 = volts_to_code(VIN_POWER_THRESHOLD, VIN_MAX_VALUE);

// The unset EEPROM value 0xFF doubles as full brightness.
pub const DEFAULT_LED_BRIGHTNESS: u8 = 0xff;

// Persisted layout, byte offsets into the non-volatile store
pub const POWER_ON_THRESHOLD_ADDR: u32 = 0; // 2 bytes
pub const POWER_OFF_THRESHOLD_ADDR: u32 = 2; // 2 bytes
pub const LED_BRIGHTNESS_ADDR: u32 = 4; // 1 byte

// Telemetry is sampled once more than this many ms have passed since the
// previous sample. 23 ms keeps it out of step with the other periodic work.
pub const SAMPLE_INTERVAL_MS: u32 = 23;

// Upper bound on ready-flag polls for a single conversion.
pub const ADC_READY_MAX_POLLS: u32 = 10_000;

// If the host-off pin stays low for longer than this, the host is off.
pub const HOST_OFF_TIME_LIMIT_MS: u32 = 1000;

// Time to wait for the host to shut down gracefully.
// Once this time is reached, the rail is cut regardless.
pub const SHUTDOWN_WAIT_DURATION_MS: u32 = 60_000;

// how long to stay in off state until restarting
pub const OFF_STATE_DURATION_MS: u32 = 5000;

// how long to keep the rail low in the event of watchdog reboot
pub const WATCHDOG_REBOOT_DURATION_MS: u32 = 2000;

// Resolution of the coarse watchdog elapsed register.
pub const WATCHDOG_ELAPSED_UNIT_MS: u32 = 100;

// Parse version strings into byte arrays
// The version format is [major, minor, patch, alpha], where alpha is 0xff
// for stable releases and a running number for alpha releases.
pub const fn parse_version(ver: &str) -> [u8; 4] {
    let bytes = ver.as_bytes();
    let mut fields = [0u8, 0, 0, 0xff];
    let mut field = 0;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'.' {
            field += 1;
        } else if b == b'-' {
            // only "-aN" suffixes are recognized
            field = 3;
            fields[3] = 0;
            if i + 1 < bytes.len() && bytes[i + 1] == b'a' {
                i += 1;
            }
        } else if field < 4 {
            fields[field] = fields[field] * 10 + (b - b'0');
        }
        i += 1;
    }
    fields
}

pub const HW_VERSION: [u8; 4] = parse_version(HW_VERSION_STR);
pub const FW_VERSION: [u8; 4] = parse_version(FW_VERSION_STR);
