use defmt::{info, warn};
use embassy_executor::task;
use embassy_rp::gpio::{Input, Output};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Ticker};
use shrpi_supervisor::io::{HostSignals, PowerOutputs};
use shrpi_supervisor::led_patterns::IndicatorPattern;
use shrpi_supervisor::supervisor::{StatusLine, Supervisor};

use crate::analog::BoardAdc;
use crate::config::SUPERVISOR_TICK_MS;
use crate::flash_store::FlashStore;
use crate::tasks::i2c_secondary::{BUS_CONTROL, BusControl};
use crate::tasks::led_blinker::{LED_BLINKER_EVENT_CHANNEL, LEDBlinkerEvents};

pub type BoardInputs = HostSignals<Input<'static>, Input<'static>, Input<'static>, Input<'static>>;
pub type BoardSupervisor = Supervisor<'static, BoardAdc<'static>, FlashStore<'static>, BoardInputs>;

/// Latest status line, taken by the main loop.
pub static STATUS: Signal<CriticalSectionRawMutex, StatusLine> = Signal::new();

pub struct BoardOutputs {
    rail: Output<'static>,
}

impl BoardOutputs {
    pub fn new(rail: Output<'static>) -> Self {
        Self { rail }
    }
}

impl PowerOutputs for BoardOutputs {
    fn set_rail(&mut self, enabled: bool) {
        if enabled {
            self.rail.set_high();
        } else {
            self.rail.set_low();
        }
    }

    fn start_bus_slave(&mut self) {
        BUS_CONTROL.signal(BusControl::Start);
    }

    fn stop_bus_slave(&mut self) {
        BUS_CONTROL.signal(BusControl::Stop);
    }

    fn select_pattern(&mut self, pattern: IndicatorPattern) {
        if LED_BLINKER_EVENT_CHANNEL
            .try_send(LEDBlinkerEvents::SetPattern(pattern))
            .is_err()
        {
            warn!("LED event queue full, dropping pattern {}", pattern);
        }
    }
}

#[task]
pub async fn supervisor_task(mut supervisor: BoardSupervisor, mut outputs: BoardOutputs) {
    info!("Supervisor task started");
    let mut ticker = Ticker::every(Duration::from_millis(SUPERVISOR_TICK_MS));

    loop {
        let now = Instant::now().as_millis() as u32;
        supervisor.poll(now, &mut outputs);
        STATUS.signal(supervisor.status());
        ticker.next().await;
    }
}
