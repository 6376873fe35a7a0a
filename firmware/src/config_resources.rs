// Provide a mapping for the controller GPIO pins

//
//| GPIO # | Name        | Description                                                    |
//| ------ | ----------- | -------------------------------------------------------------- |
//| 0      | RGBLED      | Data output for the five SK6805 (WS2812 style) RGB LEDs.       |
//| 2      | PWR_TOGGLE  | Input from the physical power toggle button. Active low.       |
//| 3      | EXT_WAKE    | External wake-up input. Active low.                            |
//| 4      | RTC_ALARM   | Interrupt output of the host RTC. Active low.                  |
//| 13     | HOST_OFF    | Host running indicator. High while the host is running.       |
//| 14     | I2C1_SDA    | I2C1 data line. The host is primary, the controller secondary. |
//| 15     | I2C1_SCL    | I2C1 clock line. The host is primary, the controller secondary.|
//| 19     | EN_5V       | Enable output for the host 5V rail. Active high.               |
//| 26     | VinS        | Analog: Scaled input voltage level.                            |
//| 27     | VscapS      | Analog: Scaled supercap voltage level.                         |
//| 28     | Iin         | Analog: Input current level.                                   |

use assign_resources::assign_resources;
use embassy_rp::peripherals;

assign_resources! {
  rgb_led: RGBLEDResources {
    dma_ch: DMA_CH0,
    pin: PIN_0,
    pio: PIO0,
  },
  i2cs: I2CSecondaryResources {
    sda: PIN_14,
    scl: PIN_15,
    i2c: I2C1,
  },
  host_inputs: HostInputResources {
    power_toggle: PIN_2,
    ext_wake: PIN_3,
    rtc_alarm: PIN_4,
    host_off: PIN_13,
  },
  analog_inputs: AnalogInputResources {
    adc: ADC,
    vin_s: PIN_26,
    vscap_s: PIN_27,
    iin: PIN_28,
    temp_sensor: ADC_TEMP_SENSOR,
  },
  rail: RailResources {
    en_5v: PIN_19,
  },
}
