//! Power supervisor for the SH-RPi supercapacitor UPS.
//!
//! Hardware-independent core: telemetry acquisition, the power sequencing
//! state machine, the host register protocol and threshold persistence.
//! Peripherals are reached through the traits in [`io`], [`telemetry`] and
//! `embedded_storage`, so everything here runs on the host as well as on
//! the microcontroller.

#![no_std]

#[cfg(test)]
extern crate std;

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod config;
pub mod config_manager;
pub mod host_watchdog;
pub mod io;
pub mod led_patterns;
pub mod registers;
pub mod shared;
pub mod state_machine;
pub mod supervisor;
pub mod telemetry;
pub mod timer;
