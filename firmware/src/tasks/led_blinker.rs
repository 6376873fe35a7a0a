use defmt::{debug, info};
use embassy_executor::task;
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::PIO0;
use embassy_rp::pio::{Instance, InterruptHandler, Pio};
use embassy_rp::pio_programs::ws2812::{PioWs2812, PioWs2812Program};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel;
use embassy_time::{Duration, Instant, Ticker};
use portable_atomic::Ordering;
use shrpi_supervisor::led_patterns::IndicatorPattern;
use smart_leds::{RGB8, brightness, gamma};

use crate::SHARED;
use crate::config::{LED_FRAME_MS, NUM_LEDS};
use crate::config_resources::RGBLEDResources;
use crate::led_patterns::render;

pub enum LEDBlinkerEvents {
    SetPattern(IndicatorPattern),
}

pub type LEDBlinkerChannelType = channel::Channel<CriticalSectionRawMutex, LEDBlinkerEvents, 8>;
pub static LED_BLINKER_EVENT_CHANNEL: LEDBlinkerChannelType = channel::Channel::new();

struct LEDBlinker<'d, P: Instance, const S: usize> {
    ws2812: PioWs2812<'d, P, S, NUM_LEDS>,
    data: [RGB8; NUM_LEDS],
    pattern: IndicatorPattern,
    pattern_start: Instant,
}

impl<'d, P: Instance, const S: usize> LEDBlinker<'d, P, S> {
    fn new(ws2812: PioWs2812<'d, P, S, NUM_LEDS>) -> Self {
        Self {
            ws2812,
            data: [RGB8::default(); NUM_LEDS],
            pattern: IndicatorPattern::Off,
            pattern_start: Instant::now(),
        }
    }

    fn set_pattern(&mut self, pattern: IndicatorPattern) {
        if pattern != self.pattern {
            debug!("LED pattern: {}", pattern);
        }
        // Reselecting restarts the pattern from its first segment.
        self.pattern = pattern;
        self.pattern_start = Instant::now();
    }

    async fn update(&mut self) {
        let t = self.pattern_start.elapsed().as_millis() as u32;
        let supercap = SHARED.telemetry().supercap;
        render(self.pattern, t, supercap, &mut self.data);

        let level = SHARED.led_brightness.load(Ordering::Relaxed);
        let mut output_data = [RGB8::default(); NUM_LEDS];
        for (out, color) in output_data
            .iter_mut()
            .zip(brightness(gamma(self.data.iter().cloned()), level))
        {
            *out = color;
        }

        self.ws2812.write(&output_data).await;
    }
}

#[task]
pub async fn led_blinker_task(r: RGBLEDResources) {
    info!("Initializing LED blinker task");
    let Pio {
        mut common, sm0, ..
    } = Pio::new(r.pio, Irqs);

    bind_interrupts!(struct Irqs {
        PIO0_IRQ_0 => InterruptHandler<PIO0>;
    });

    let program = PioWs2812Program::new(&mut common);
    let ws2812 = PioWs2812::new(&mut common, sm0, r.dma_ch, r.pin, &program);

    let mut led_blinker = LEDBlinker::new(ws2812);
    let mut ticker = Ticker::every(Duration::from_millis(LED_FRAME_MS));
    let receiver = LED_BLINKER_EVENT_CHANNEL.receiver();

    info!("LED blinker task initialized");

    loop {
        while let Ok(event) = receiver.try_receive() {
            match event {
                LEDBlinkerEvents::SetPattern(pattern) => led_blinker.set_pattern(pattern),
            }
        }

        ticker.next().await;
        led_blinker.update().await;
    }
}
