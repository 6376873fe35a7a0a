use defmt::{debug, error, info};
use embassy_executor::task;
use embassy_futures::select::{Either, select};
use embassy_rp::peripherals::I2C1;
use embassy_rp::{bind_interrupts, i2c, i2c_slave};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use shrpi_supervisor::config::I2C_ADDR;
use shrpi_supervisor::registers::{RegisterEngine, Response, UNKNOWN_REGISTER_VALUE};

use crate::SHARED;
use crate::config_resources::I2CSecondaryResources;

// Longest transaction: address byte plus a two-byte register payload. Extra
// bytes a primary clocks in are dropped by the peripheral.
const BUF_SIZE: usize = 8;

bind_interrupts!(struct Irqs {
    I2C1_IRQ => i2c::InterruptHandler<I2C1>;
});

#[derive(Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum BusControl {
    Start,
    Stop,
}

pub static BUS_CONTROL: Signal<CriticalSectionRawMutex, BusControl> = Signal::new();

async fn respond(device: &mut i2c_slave::I2cSlave<'_, I2C1>, response: Response) {
    match device
        .respond_and_fill(response.as_slice(), UNKNOWN_REGISTER_VALUE)
        .await
    {
        Ok(i2c_slave::ReadStatus::LeftoverBytes(x)) => debug!("Left over bytes: {}", x),
        Ok(_) => {}
        Err(e) => error!("error while responding {}", e),
    }
}

#[task]
pub async fn i2c_secondary_task(r: I2CSecondaryResources) {
    info!("Starting I2C secondary task");
    let mut i2c = r.i2c;
    let mut scl = r.scl;
    let mut sda = r.sda;
    let mut engine = RegisterEngine::new(&SHARED);

    loop {
        // The supervisor starts the bus from BEGIN.
        while BUS_CONTROL.wait().await != BusControl::Start {}

        let mut config = i2c_slave::Config::default();
        config.addr = I2C_ADDR as u16;
        let mut device = i2c_slave::I2cSlave::new(
            i2c.reborrow(),
            scl.reborrow(),
            sda.reborrow(),
            Irqs,
            config,
        );
        info!("I2C secondary listening on 0x{:02x}", I2C_ADDR);

        loop {
            let mut buf = [0u8; BUF_SIZE];
            let command = match select(device.listen(&mut buf), BUS_CONTROL.wait()).await {
                Either::First(command) => command,
                Either::Second(BusControl::Stop) => break,
                Either::Second(BusControl::Start) => continue,
            };

            match command {
                Ok(i2c_slave::Command::GeneralCall(len)) => {
                    debug!("General call write ignored: {}", buf[..len]);
                }
                Ok(i2c_slave::Command::Read) => {
                    let response = engine.on_request();
                    respond(&mut device, response).await;
                }
                Ok(i2c_slave::Command::Write(len)) => {
                    engine.on_receive(&buf[..len]);
                }
                Ok(i2c_slave::Command::WriteRead(len)) => {
                    engine.on_receive(&buf[..len]);
                    let response = engine.on_request();
                    respond(&mut device, response).await;
                }
                Err(e) => error!("I2C secondary error: {}", e),
            }
        }

        info!("I2C secondary stopped");
    }
}
