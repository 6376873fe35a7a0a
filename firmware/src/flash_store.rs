use embassy_rp::flash::{Blocking, Error, Flash};
use embassy_rp::peripherals::FLASH;
use embedded_storage::nor_flash::RmwNorFlashStorage;
use embedded_storage::{ReadStorage, Storage};

use crate::config::{CONFIG_FLASH_OFFSET, FLASH_ERASE_BLOCK_SIZE, FLASH_SIZE};

pub type BoardFlash<'d> = Flash<'d, FLASH, Blocking, FLASH_SIZE>;

/// Byte-addressed store in the reserved config sector. Offsets are relative
/// to the start of that sector; writes read-modify-write the whole sector.
pub struct FlashStore<'d> {
    inner: RmwNorFlashStorage<'d, BoardFlash<'d>>,
}

impl<'d> FlashStore<'d> {
    pub fn new(flash: BoardFlash<'d>, merge_buffer: &'d mut [u8; FLASH_ERASE_BLOCK_SIZE]) -> Self {
        Self {
            inner: RmwNorFlashStorage::new(flash, merge_buffer),
        }
    }
}

impl ReadStorage for FlashStore<'_> {
    type Error = Error;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Error> {
        self.inner.read(CONFIG_FLASH_OFFSET + offset, bytes)
    }

    fn capacity(&self) -> usize {
        FLASH_ERASE_BLOCK_SIZE
    }
}

impl Storage for FlashStore<'_> {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Error> {
        if offset as usize + bytes.len() > FLASH_ERASE_BLOCK_SIZE {
            return Err(Error::OutOfBounds);
        }
        self.inner.write(CONFIG_FLASH_OFFSET + offset, bytes)
    }
}
