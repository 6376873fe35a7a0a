//! Telemetry acquisition.
//!
//! Every analog channel is converted twice and only the second result is
//! kept: the first conversion after a multiplexer switch still carries charge
//! from the previous channel. Conversions are polled with a bounded number of
//! ready-flag reads, and a converter that is already busy is reported rather
//! than waited on.

use crate::config::{ADC_READY_MAX_POLLS, VSCAP_ALARM_CODE};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AnalogChannel {
    Supercap,
    InputVoltage,
    InputCurrent,
    Temperature,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcquisitionError {
    /// A conversion was already in flight when a new one was requested.
    Busy,
    /// The ready flag did not come up within the poll budget.
    Timeout,
}

/// Single-conversion analog front end.
///
/// Results are 10-bit codes; converters with more resolution scale down
/// before returning them.
pub trait Converter {
    fn is_busy(&mut self) -> bool;
    fn select(&mut self, channel: AnalogChannel);
    fn start(&mut self);
    fn is_ready(&mut self) -> bool;
    fn result(&mut self) -> u16;
}

/// Run one conversion on `channel`, polling the ready flag at most
/// `max_polls` times.
pub fn convert<C: Converter>(
    adc: &mut C,
    channel: AnalogChannel,
    max_polls: u32,
) -> Result<u16, AcquisitionError> {
    if adc.is_busy() {
        return Err(AcquisitionError::Busy);
    }
    adc.select(channel);
    adc.start();
    for _ in 0..max_polls {
        if adc.is_ready() {
            return Ok(adc.result());
        }
    }
    Err(AcquisitionError::Timeout)
}

/// Factory calibration of the die temperature sensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TemperatureCalibration {
    pub offset: i8,
    pub gain: u8,
}

impl TemperatureCalibration {
    pub const fn new(offset: i8, gain: u8) -> Self {
        Self { offset, gain }
    }

    /// `((raw - offset) * gain + 0x80) >> 1`, clamped to 16 bits.
    pub fn apply(&self, raw: u16) -> u16 {
        let t = (i32::from(raw) - i32::from(self.offset)) * i32::from(self.gain);
        let t = (t + 0x80) >> 1;
        t.clamp(0, i32::from(u16::MAX)) as u16
    }
}

/// Edge-triggered over-voltage latch for the supercap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmLatch {
    pub triggered: bool,
    /// One-shot notification, cleared by whoever handles it.
    pub changed: bool,
}

impl AlarmLatch {
    pub const fn new() -> Self {
        Self {
            triggered: false,
            changed: false,
        }
    }

    pub fn update(&mut self, supercap: u16, threshold: u16) {
        let above = supercap > threshold;
        if above != self.triggered {
            self.triggered = above;
            self.changed = true;
        }
    }

    pub fn acknowledge(&mut self) {
        self.changed = false;
    }
}

/// One complete set of readings. Replaced as a whole, never field by field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetrySnapshot {
    pub supercap: u16,
    pub input_voltage: u16,
    pub input_current: u16,
    pub temperature: u16,
    pub alarm: AlarmLatch,
}

impl TelemetrySnapshot {
    pub const fn new() -> Self {
        Self {
            supercap: 0,
            input_voltage: 0,
            input_current: 0,
            temperature: 0,
            alarm: AlarmLatch::new(),
        }
    }
}

pub struct TelemetryAcquisition<C> {
    adc: C,
    calibration: TemperatureCalibration,
    alarm: AlarmLatch,
    alarm_threshold: u16,
    max_polls: u32,
}

impl<C: Converter> TelemetryAcquisition<C> {
    pub fn new(adc: C, calibration: TemperatureCalibration) -> Self {
        Self {
            adc,
            calibration,
            alarm: AlarmLatch::new(),
            alarm_threshold: VSCAP_ALARM_CODE,
            max_polls: ADC_READY_MAX_POLLS,
        }
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }

    fn settled_read(&mut self, channel: AnalogChannel) -> Result<u16, AcquisitionError> {
        convert(&mut self.adc, channel, self.max_polls)?;
        convert(&mut self.adc, channel, self.max_polls)
    }

    /// Read all channels and produce a new snapshot.
    ///
    /// On error nothing is published and the alarm latch is left untouched;
    /// the caller keeps its previous snapshot and retries on the next tick.
    pub fn sample(&mut self) -> Result<TelemetrySnapshot, AcquisitionError> {
        let supercap = self.settled_read(AnalogChannel::Supercap)?;
        let input_voltage = self.settled_read(AnalogChannel::InputVoltage)?;
        let input_current = self.settled_read(AnalogChannel::InputCurrent)?;
        let raw_temperature = self.settled_read(AnalogChannel::Temperature)?;

        self.alarm.update(supercap, self.alarm_threshold);

        Ok(TelemetrySnapshot {
            supercap,
            input_voltage,
            input_current,
            temperature: self.calibration.apply(raw_temperature),
            alarm: self.alarm,
        })
    }

    pub fn acknowledge_alarm(&mut self) {
        self.alarm.acknowledge();
    }

    pub fn converter_mut(&mut self) -> &mut C {
        &mut self.adc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    /// Converter whose first read after a channel switch returns the code
    /// of the previously converted channel.
    struct ScriptedAdc {
        codes: [u16; 4],
        selected: AnalogChannel,
        last_converted: Option<AnalogChannel>,
        in_flight: bool,
        polls_before_ready: u32,
        polls: u32,
        stuck: bool,
        conversions: Vec<AnalogChannel>,
    }

    impl ScriptedAdc {
        fn new(codes: [u16; 4]) -> Self {
            Self {
                codes,
                selected: AnalogChannel::Supercap,
                last_converted: None,
                in_flight: false,
                polls_before_ready: 2,
                polls: 0,
                stuck: false,
                conversions: Vec::new(),
            }
        }

        fn index(channel: AnalogChannel) -> usize {
            match channel {
                AnalogChannel::Supercap => 0,
                AnalogChannel::InputVoltage => 1,
                AnalogChannel::InputCurrent => 2,
                AnalogChannel::Temperature => 3,
            }
        }
    }

    impl Converter for ScriptedAdc {
        fn is_busy(&mut self) -> bool {
            self.in_flight
        }

        fn select(&mut self, channel: AnalogChannel) {
            self.selected = channel;
        }

        fn start(&mut self) {
            self.in_flight = true;
            self.polls = 0;
        }

        fn is_ready(&mut self) -> bool {
            if self.stuck {
                return false;
            }
            self.polls += 1;
            self.polls > self.polls_before_ready
        }

        fn result(&mut self) -> u16 {
            self.in_flight = false;
            self.conversions.push(self.selected);
            let code = match self.last_converted {
                Some(prev) if prev != self.selected => self.codes[Self::index(prev)],
                _ => self.codes[Self::index(self.selected)],
            };
            self.last_converted = Some(self.selected);
            code
        }
    }

    #[test]
    fn first_conversion_after_switch_is_discarded() {
        let adc = ScriptedAdc::new([900, 400, 120, 300]);
        let mut acq = TelemetryAcquisition::new(adc, TemperatureCalibration::new(0, 1));

        let snapshot = acq.sample().unwrap();

        assert_eq!(snapshot.supercap, 900);
        assert_eq!(snapshot.input_voltage, 400);
        assert_eq!(snapshot.input_current, 120);
        assert_eq!(snapshot.temperature, (300 + 0x80) >> 1);
        assert_eq!(acq.converter_mut().conversions.len(), 8);
    }

    #[test]
    fn busy_converter_is_reported_not_waited_on() {
        let mut adc = ScriptedAdc::new([0; 4]);
        adc.in_flight = true;
        let mut acq = TelemetryAcquisition::new(adc, TemperatureCalibration::new(0, 1));

        assert_eq!(acq.sample(), Err(AcquisitionError::Busy));
        assert!(acq.converter_mut().conversions.is_empty());
    }

    #[test]
    fn stuck_ready_flag_times_out_and_leaves_converter_busy() {
        let mut adc = ScriptedAdc::new([0; 4]);
        adc.stuck = true;
        let mut acq =
            TelemetryAcquisition::new(adc, TemperatureCalibration::new(0, 1)).with_max_polls(5);

        assert_eq!(acq.sample(), Err(AcquisitionError::Timeout));
        // the abandoned conversion is still in flight on the next attempt
        assert_eq!(acq.sample(), Err(AcquisitionError::Busy));
    }

    #[test]
    fn temperature_calibration_rounds_and_halves() {
        let cal = TemperatureCalibration::new(-3, 200);
        // (300 + 3) * 200 = 60600, + 0x80 = 60728, >> 1 = 30364
        assert_eq!(cal.apply(300), 30364);
        // results below zero clamp instead of wrapping
        assert_eq!(TemperatureCalibration::new(100, 255).apply(0), 0);
    }

    #[test]
    fn alarm_latch_reports_each_edge_once() {
        let mut latch = AlarmLatch::new();

        latch.update(990, 985);
        assert!(latch.triggered && latch.changed);
        latch.acknowledge();

        latch.update(995, 985);
        assert!(latch.triggered);
        assert!(!latch.changed);

        latch.update(985, 985);
        assert!(!latch.triggered);
        assert!(latch.changed);
    }

    #[test]
    fn snapshot_carries_alarm_state() {
        let adc = ScriptedAdc::new([1000, 400, 0, 0]);
        let mut acq = TelemetryAcquisition::new(adc, TemperatureCalibration::new(0, 1));

        let snapshot = acq.sample().unwrap();
        assert!(snapshot.alarm.triggered);
        assert!(snapshot.alarm.changed);

        acq.acknowledge_alarm();
        let snapshot = acq.sample().unwrap();
        assert!(snapshot.alarm.triggered);
        assert!(!snapshot.alarm.changed);
    }
}
