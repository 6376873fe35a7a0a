//! Narrow interfaces to the board: the outputs the supervisor drives and the
//! digital inputs it samples.

use embedded_hal::digital::InputPin;

use crate::led_patterns::IndicatorPattern;

/// Side effects of the power state machine.
pub trait PowerOutputs {
    fn set_rail(&mut self, enabled: bool);
    fn start_bus_slave(&mut self);
    /// Must be called before the rail is cut so no transaction is left
    /// dangling across the power transition.
    fn stop_bus_slave(&mut self);
    fn select_pattern(&mut self, pattern: IndicatorPattern);
}

/// Logical levels of the host-facing digital inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputLevels {
    /// Host-off indicator is high while the host is running.
    pub host_running: bool,
    pub power_toggle_pressed: bool,
    pub ext_wake: bool,
    pub rtc_alarm: bool,
}

impl Default for InputLevels {
    fn default() -> Self {
        Self {
            host_running: true,
            power_toggle_pressed: false,
            ext_wake: false,
            rtc_alarm: false,
        }
    }
}

pub trait HostInputs {
    fn read(&mut self) -> InputLevels;
}

/// Host inputs on plain GPIO pins. The toggle and both wake lines are
/// pulled up and active low.
pub struct HostSignals<HO, PT, EW, RA> {
    pub host_off: HO,
    pub power_toggle: PT,
    pub ext_wake: EW,
    pub rtc_alarm: RA,
}

impl<HO, PT, EW, RA> HostSignals<HO, PT, EW, RA>
where
    HO: InputPin,
    PT: InputPin,
    EW: InputPin,
    RA: InputPin,
{
    pub fn new(host_off: HO, power_toggle: PT, ext_wake: EW, rtc_alarm: RA) -> Self {
        Self {
            host_off,
            power_toggle,
            ext_wake,
            rtc_alarm,
        }
    }
}

// A pin that fails to read is taken as idle: pulled-up lines read high.
fn read_high<P: InputPin>(pin: &mut P) -> bool {
    pin.is_high().unwrap_or(true)
}

impl<HO, PT, EW, RA> HostInputs for HostSignals<HO, PT, EW, RA>
where
    HO: InputPin,
    PT: InputPin,
    EW: InputPin,
    RA: InputPin,
{
    fn read(&mut self) -> InputLevels {
        InputLevels {
            host_running: read_high(&mut self.host_off),
            power_toggle_pressed: !read_high(&mut self.power_toggle),
            ext_wake: !read_high(&mut self.ext_wake),
            rtc_alarm: !read_high(&mut self.rtc_alarm),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;

    struct Level(bool);

    impl ErrorType for Level {
        type Error = Infallible;
    }

    impl InputPin for Level {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.0)
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.0)
        }
    }

    #[test]
    fn idle_lines_read_as_running_and_released() {
        let mut signals = HostSignals::new(Level(true), Level(true), Level(true), Level(true));
        assert_eq!(signals.read(), InputLevels::default());
    }

    #[test]
    fn active_low_inputs_are_inverted() {
        let mut signals = HostSignals::new(Level(false), Level(false), Level(false), Level(false));
        assert_eq!(
            signals.read(),
            InputLevels {
                host_running: false,
                power_toggle_pressed: true,
                ext_wake: true,
                rtc_alarm: true,
            }
        );
    }
}
