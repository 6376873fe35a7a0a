#![allow(dead_code)]

use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType, InputPin};
use embedded_storage::{ReadStorage, Storage};

use shrpi_supervisor::config::SAMPLE_INTERVAL_MS;
use shrpi_supervisor::config_manager::ConfigManager;
use shrpi_supervisor::io::{HostSignals, PowerOutputs};
use shrpi_supervisor::led_patterns::IndicatorPattern;
use shrpi_supervisor::shared::SharedState;
use shrpi_supervisor::state_machine::PowerState;
use shrpi_supervisor::supervisor::Supervisor;
use shrpi_supervisor::telemetry::{AnalogChannel, Converter, TelemetryAcquisition, TemperatureCalibration};

// Smallest step after which a fresh sample is always due.
pub const TICK_MS: u32 = SAMPLE_INTERVAL_MS + 1;

pub const VIN_PRESENT: u16 = 600;
pub const VIN_ABSENT: u16 = 100;

/// ADC that returns the previous channel's code on the first conversion
/// after a channel switch, like the real multiplexer.
pub struct FakeAdc {
    pub supercap: u16,
    pub input_voltage: u16,
    pub input_current: u16,
    pub temperature: u16,
    /// Report a conversion in flight from before the supervisor looked.
    pub busy: bool,
    /// Never raise the ready flag.
    pub stuck: bool,
    selected: AnalogChannel,
    last_converted: Option<AnalogChannel>,
    in_flight: bool,
}

impl FakeAdc {
    pub fn new() -> Self {
        Self {
            supercap: 0,
            input_voltage: 0,
            input_current: 0,
            temperature: 0,
            busy: false,
            stuck: false,
            selected: AnalogChannel::Supercap,
            last_converted: None,
            in_flight: false,
        }
    }

    fn code(&self, channel: AnalogChannel) -> u16 {
        match channel {
            AnalogChannel::Supercap => self.supercap,
            AnalogChannel::InputVoltage => self.input_voltage,
            AnalogChannel::InputCurrent => self.input_current,
            AnalogChannel::Temperature => self.temperature,
        }
    }
}

impl Converter for FakeAdc {
    fn is_busy(&mut self) -> bool {
        self.busy || self.in_flight
    }

    fn select(&mut self, channel: AnalogChannel) {
        self.selected = channel;
    }

    fn start(&mut self) {
        self.in_flight = true;
    }

    fn is_ready(&mut self) -> bool {
        !self.stuck
    }

    fn result(&mut self) -> u16 {
        self.in_flight = false;
        let source = match self.last_converted {
            Some(prev) if prev != self.selected => prev,
            _ => self.selected,
        };
        self.last_converted = Some(self.selected);
        self.code(source)
    }
}

/// Byte-addressed store that starts out erased.
pub struct MemStorage {
    pub cells: [u8; 64],
    pub fail_writes: bool,
    pub writes: usize,
}

impl MemStorage {
    pub fn erased() -> Self {
        Self {
            cells: [0xff; 64],
            fail_writes: false,
            writes: 0,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct StorageFault;

impl ReadStorage for MemStorage {
    type Error = StorageFault;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), StorageFault> {
        let start = offset as usize;
        let end = start + bytes.len();
        if end > self.cells.len() {
            return Err(StorageFault);
        }
        bytes.copy_from_slice(&self.cells[start..end]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.cells.len()
    }
}

impl Storage for MemStorage {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), StorageFault> {
        if self.fail_writes {
            return Err(StorageFault);
        }
        let start = offset as usize;
        let end = start + bytes.len();
        if end > self.cells.len() {
            return Err(StorageFault);
        }
        self.cells[start..end].copy_from_slice(bytes);
        self.writes += 1;
        Ok(())
    }
}

/// Input pin whose level the test sets through a shared handle.
#[derive(Clone)]
pub struct FakePin(Rc<Cell<bool>>);

impl FakePin {
    pub fn new(high: bool) -> Self {
        Self(Rc::new(Cell::new(high)))
    }

    pub fn set_high(&self) {
        self.0.set(true);
    }

    pub fn set_low(&self) {
        self.0.set(false);
    }
}

impl ErrorType for FakePin {
    type Error = Infallible;
}

impl InputPin for FakePin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.get())
    }
}

/// Records every side effect the supervisor produces.
#[derive(Default)]
pub struct RecordingOutputs {
    pub rail: bool,
    pub rail_writes: Vec<bool>,
    pub bus_running: bool,
    pub bus_stops: usize,
    pub patterns: Vec<IndicatorPattern>,
}

impl RecordingOutputs {
    pub fn pattern(&self) -> Option<IndicatorPattern> {
        self.patterns.last().copied()
    }
}

impl PowerOutputs for RecordingOutputs {
    fn set_rail(&mut self, enabled: bool) {
        self.rail = enabled;
        self.rail_writes.push(enabled);
    }

    fn start_bus_slave(&mut self) {
        self.bus_running = true;
    }

    fn stop_bus_slave(&mut self) {
        self.bus_running = false;
        self.bus_stops += 1;
    }

    fn select_pattern(&mut self, pattern: IndicatorPattern) {
        self.patterns.push(pattern);
    }
}

pub type Inputs = HostSignals<FakePin, FakePin, FakePin, FakePin>;
pub type TestSupervisor<'a> = Supervisor<'a, FakeAdc, MemStorage, Inputs>;

/// Handles to the digital inputs, all idle: host running, nothing pressed.
#[derive(Clone)]
pub struct Pins {
    pub host_off: FakePin,
    pub power_toggle: FakePin,
    pub ext_wake: FakePin,
    pub rtc_alarm: FakePin,
}

pub struct Rig<'a> {
    pub supervisor: TestSupervisor<'a>,
    pub outputs: RecordingOutputs,
    pub pins: Pins,
    pub now: u32,
}

impl<'a> Rig<'a> {
    pub fn new(shared: &'a SharedState) -> Self {
        Self::with_storage(shared, MemStorage::erased())
    }

    pub fn with_storage(shared: &'a SharedState, storage: MemStorage) -> Self {
        let pins = Pins {
            host_off: FakePin::new(true),
            power_toggle: FakePin::new(true),
            ext_wake: FakePin::new(true),
            rtc_alarm: FakePin::new(true),
        };
        let inputs = HostSignals::new(
            pins.host_off.clone(),
            pins.power_toggle.clone(),
            pins.ext_wake.clone(),
            pins.rtc_alarm.clone(),
        );
        let acquisition = TelemetryAcquisition::new(FakeAdc::new(), TemperatureCalibration::new(0, 1));
        let supervisor = Supervisor::new(shared, acquisition, ConfigManager::new(storage), inputs, 0);

        Self {
            supervisor,
            outputs: RecordingOutputs::default(),
            pins,
            now: 0,
        }
    }

    pub fn adc(&mut self) -> &mut FakeAdc {
        self.supervisor.acquisition_mut().converter_mut()
    }

    /// Advance the clock far enough for a fresh sample and run one pass.
    pub fn tick(&mut self) -> PowerState {
        self.step(TICK_MS)
    }

    /// Advance the clock by `ms` and run one pass.
    pub fn step(&mut self, ms: u32) -> PowerState {
        self.now += ms;
        self.supervisor.poll(self.now, &mut self.outputs)
    }

    /// Tick until `state` is reached, giving up after `max_ticks`.
    pub fn tick_until(&mut self, state: PowerState, max_ticks: usize) -> bool {
        for _ in 0..max_ticks {
            if self.tick() == state {
                return true;
            }
        }
        false
    }

    /// Drive from power-up to ON with a charged supercap.
    pub fn power_up(&mut self) {
        self.adc().input_voltage = VIN_PRESENT;
        self.adc().supercap = 950;
        assert!(self.tick_until(PowerState::On, 10));
        assert!(self.outputs.rail);
    }
}
