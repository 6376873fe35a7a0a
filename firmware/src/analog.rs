use embassy_rp::adc::{Adc, Blocking, Channel, Config};
use embassy_rp::gpio::Pull;
use embassy_rp::pac;
use shrpi_supervisor::telemetry::{AnalogChannel, Converter};

use crate::config_resources::AnalogInputResources;

/// Single-shot converter driven through the ADC control registers.
///
/// The driver and channels are held only to keep the ADC powered, the pins
/// in analog mode and the temperature sensor enabled.
pub struct BoardAdc<'d> {
    _adc: Adc<'d, Blocking>,
    _channels: [Channel<'d>; 4],
}

impl BoardAdc<'static> {
    pub fn new(r: AnalogInputResources) -> Self {
        let adc = Adc::new_blocking(r.adc, Config::default());
        let channels = [
            Channel::new_pin(r.vin_s, Pull::None),
            Channel::new_pin(r.vscap_s, Pull::None),
            Channel::new_pin(r.iin, Pull::None),
            Channel::new_temp_sensor(r.temp_sensor),
        ];
        Self {
            _adc: adc,
            _channels: channels,
        }
    }
}

fn ainsel(channel: AnalogChannel) -> u8 {
    match channel {
        AnalogChannel::InputVoltage => 0,
        AnalogChannel::Supercap => 1,
        AnalogChannel::InputCurrent => 2,
        AnalogChannel::Temperature => 4,
    }
}

impl Converter for BoardAdc<'_> {
    fn is_busy(&mut self) -> bool {
        !pac::ADC.cs().read().ready()
    }

    fn select(&mut self, channel: AnalogChannel) {
        pac::ADC.cs().modify(|w| w.set_ainsel(ainsel(channel)));
    }

    fn start(&mut self) {
        pac::ADC.cs().modify(|w| w.set_start_once(true));
    }

    fn is_ready(&mut self) -> bool {
        pac::ADC.cs().read().ready()
    }

    fn result(&mut self) -> u16 {
        // 12-bit result, reported as a 10-bit code
        pac::ADC.result().read().result() >> 2
    }
}
