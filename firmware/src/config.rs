// Board-level constants. Supervisor thresholds, timings and register layout
// live in `shrpi_supervisor::config`.

pub const FLASH_SIZE: usize = 2 * 1024 * 1024;

// The persisted thresholds occupy the last erase sector of the flash.
pub const FLASH_ERASE_BLOCK_SIZE: usize = 4096;
pub const CONFIG_FLASH_OFFSET: u32 = (FLASH_SIZE - FLASH_ERASE_BLOCK_SIZE) as u32;

// How often the supervisor loop runs. Sampling is paced separately by the
// supervisor's own sampling interval.
pub const SUPERVISOR_TICK_MS: u64 = 5;

// Status line logging and MCU watchdog feeding.
pub const STATUS_INTERVAL_MS: u64 = 500;
pub const MCU_WATCHDOG_TIMEOUT_MS: u64 = 8000;

pub const LED_FRAME_MS: u64 = 10;
pub const NUM_LEDS: usize = 5;

// The RP2040 has no factory temperature calibration; the raw code is
// halved with rounding.
pub const TEMPERATURE_OFFSET: i8 = 0;
pub const TEMPERATURE_GAIN: u8 = 1;

// Supercap range spanned by the LED charge bar, in volts.
pub const BAR_EMPTY_VOLTAGE: f32 = 4.5;
pub const BAR_FULL_VOLTAGE: f32 = 9.0;
