#![no_std]
#![no_main]

use defmt::{debug, info};
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_rp::flash::Flash;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_rp::watchdog::Watchdog;
use embassy_time::{Duration, Instant, Timer};
use shrpi_supervisor::config_manager::ConfigManager;
use shrpi_supervisor::io::HostSignals;
use shrpi_supervisor::shared::SharedState;
use shrpi_supervisor::supervisor::Supervisor;
use shrpi_supervisor::telemetry::{TelemetryAcquisition, TemperatureCalibration};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

mod analog;
mod config;
mod config_resources;
mod flash_store;
mod led_patterns;
mod tasks;

use crate::analog::BoardAdc;
use crate::config::{
    FLASH_ERASE_BLOCK_SIZE, MCU_WATCHDOG_TIMEOUT_MS, STATUS_INTERVAL_MS, TEMPERATURE_GAIN,
    TEMPERATURE_OFFSET,
};
use crate::config_resources::{
    AnalogInputResources, AssignedResources, HostInputResources, I2CSecondaryResources,
    RGBLEDResources, RailResources,
};
use crate::flash_store::FlashStore;
use crate::tasks::supervisor::{BoardOutputs, STATUS};

/// Mailbox between the bus handler and the supervisor loop.
pub static SHARED: SharedState = SharedState::new();

static EXECUTOR_BUS: InterruptExecutor = InterruptExecutor::new();
static MERGE_BUFFER: StaticCell<[u8; FLASH_ERASE_BLOCK_SIZE]> = StaticCell::new();

#[interrupt]
unsafe fn SWI_IRQ_1() {
    unsafe { EXECUTOR_BUS.on_interrupt() }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Default::default());
    let r = split_resources!(p);

    info!("Starting up...");

    let mut watchdog = Watchdog::new(p.WATCHDOG);
    watchdog.start(Duration::from_millis(MCU_WATCHDOG_TIMEOUT_MS));

    // The rail stays off until the state machine decides otherwise.
    let rail = Output::new(r.rail.en_5v, Level::Low);

    let inputs = HostSignals::new(
        Input::new(r.host_inputs.host_off, Pull::Down),
        Input::new(r.host_inputs.power_toggle, Pull::Up),
        Input::new(r.host_inputs.ext_wake, Pull::Up),
        Input::new(r.host_inputs.rtc_alarm, Pull::Up),
    );

    let acquisition = TelemetryAcquisition::new(
        BoardAdc::new(r.analog_inputs),
        TemperatureCalibration::new(TEMPERATURE_OFFSET, TEMPERATURE_GAIN),
    );

    info!("Initializing config store...");
    let flash = Flash::new_blocking(p.FLASH);
    let store = FlashStore::new(flash, MERGE_BUFFER.init([0; FLASH_ERASE_BLOCK_SIZE]));

    let now = Instant::now().as_millis() as u32;
    let supervisor = Supervisor::new(&SHARED, acquisition, ConfigManager::new(store), inputs, now);

    // The bus handler preempts the supervisor loop.
    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let bus_spawner = EXECUTOR_BUS.start(interrupt::SWI_IRQ_1);
    bus_spawner
        .spawn(tasks::i2c_secondary::i2c_secondary_task(r.i2cs))
        .unwrap();

    spawner
        .spawn(tasks::led_blinker::led_blinker_task(r.rgb_led))
        .unwrap();

    spawner
        .spawn(tasks::supervisor::supervisor_task(
            supervisor,
            BoardOutputs::new(rail),
        ))
        .unwrap();

    // Feed the MCU watchdog only while the supervisor loop keeps reporting.
    loop {
        Timer::after(Duration::from_millis(STATUS_INTERVAL_MS)).await;

        if let Some(status) = STATUS.try_take() {
            watchdog.feed();
            debug!("{}", status);
        }
    }
}
