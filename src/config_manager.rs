use embedded_storage::Storage;

use crate::config::*;

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError<E> {
    // Errors from the underlying byte store
    Storage(E),
}

impl<E> From<E> for ConfigError<E> {
    fn from(error: E) -> Self {
        ConfigError::Storage(error)
    }
}

/// User-tunable values that survive a power cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Thresholds {
    pub power_on: u16,
    pub power_off: u16,
    pub led_brightness: u8,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            power_on: DEFAULT_POWER_ON_THRESHOLD_CODE,
            power_off: DEFAULT_POWER_OFF_THRESHOLD_CODE,
            led_brightness: DEFAULT_LED_BRIGHTNESS,
        }
    }
}

pub fn is_valid_threshold(code: i32) -> bool {
    (0..=i32::from(THRESHOLD_SCALE_MAX)).contains(&code)
}

// Threshold store on top of a byte-addressed non-volatile memory.
// Thresholds are little-endian i16 at fixed offsets; erased cells read back
// as -1 and are treated like any other out-of-range value.
pub struct ConfigManager<S> {
    storage: S,
}

impl<S: Storage> ConfigManager<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn load_bytes(&mut self, addr: u32, bytes: &mut [u8]) -> Result<(), ConfigError<S::Error>> {
        debug!("Loading {} bytes at offset {}", bytes.len(), addr);
        self.storage.read(addr, bytes)?;
        Ok(())
    }

    pub fn store_bytes(&mut self, addr: u32, bytes: &[u8]) -> Result<(), ConfigError<S::Error>> {
        debug!("Storing {} bytes at offset {}", bytes.len(), addr);
        self.storage.write(addr, bytes)?;
        Ok(())
    }

    fn load_threshold(&mut self, addr: u32, default: u16) -> u16 {
        let mut buf = [0u8; 2];
        match self.load_bytes(addr, &mut buf) {
            Ok(()) => {
                let code = i32::from(i16::from_le_bytes(buf));
                if is_valid_threshold(code) {
                    code as u16
                } else {
                    warn!(
                        "Stored threshold at offset {} is unset or corrupt ({}), using {}",
                        addr, code, default
                    );
                    default
                }
            }
            Err(_) => {
                warn!("Failed to read threshold at offset {}, using {}", addr, default);
                default
            }
        }
    }

    /// Load every persisted value, substituting defaults for anything out of
    /// range or unreadable. Never fails.
    pub fn load(&mut self) -> Thresholds {
        let power_on = self.load_threshold(POWER_ON_THRESHOLD_ADDR, DEFAULT_POWER_ON_THRESHOLD_CODE);
        let power_off =
            self.load_threshold(POWER_OFF_THRESHOLD_ADDR, DEFAULT_POWER_OFF_THRESHOLD_CODE);

        let mut brightness = [DEFAULT_LED_BRIGHTNESS];
        if self.load_bytes(LED_BRIGHTNESS_ADDR, &mut brightness).is_err() {
            warn!("Failed to read LED brightness, using default");
            brightness[0] = DEFAULT_LED_BRIGHTNESS;
        }

        let thresholds = Thresholds {
            power_on,
            power_off,
            led_brightness: brightness[0],
        };
        info!(
            "Loaded thresholds: power on {}, power off {}, brightness {}",
            thresholds.power_on, thresholds.power_off, thresholds.led_brightness
        );
        thresholds
    }

    pub fn store_power_on_threshold(&mut self, code: u16) -> Result<(), ConfigError<S::Error>> {
        self.store_bytes(POWER_ON_THRESHOLD_ADDR, &(code as i16).to_le_bytes())
    }

    pub fn store_power_off_threshold(&mut self, code: u16) -> Result<(), ConfigError<S::Error>> {
        self.store_bytes(POWER_OFF_THRESHOLD_ADDR, &(code as i16).to_le_bytes())
    }

    pub fn store_led_brightness(&mut self, brightness: u8) -> Result<(), ConfigError<S::Error>> {
        self.store_bytes(LED_BRIGHTNESS_ADDR, &[brightness])
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_storage::ReadStorage;

    struct Eeprom {
        cells: [u8; 16],
        fail: bool,
    }

    impl Eeprom {
        fn erased() -> Self {
            Self {
                cells: [0xff; 16],
                fail: false,
            }
        }
    }

    impl ReadStorage for Eeprom {
        type Error = ();

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), ()> {
            if self.fail {
                return Err(());
            }
            let start = offset as usize;
            bytes.copy_from_slice(&self.cells[start..start + bytes.len()]);
            Ok(())
        }

        fn capacity(&self) -> usize {
            self.cells.len()
        }
    }

    impl Storage for Eeprom {
        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), ()> {
            if self.fail {
                return Err(());
            }
            let start = offset as usize;
            self.cells[start..start + bytes.len()].copy_from_slice(bytes);
            Ok(())
        }
    }

    #[test]
    fn erased_store_loads_defaults() {
        let mut manager = ConfigManager::new(Eeprom::erased());
        assert_eq!(manager.load(), Thresholds::default());
    }

    #[test]
    fn thresholds_are_little_endian_at_fixed_offsets() {
        let mut manager = ConfigManager::new(Eeprom::erased());
        manager.store_power_on_threshold(0x0312).unwrap();
        manager.store_power_off_threshold(0x0201).unwrap();
        manager.store_led_brightness(0x40).unwrap();

        assert_eq!(&manager.storage().cells[..5], &[0x12, 0x03, 0x01, 0x02, 0x40]);
        assert_eq!(
            manager.load(),
            Thresholds {
                power_on: 0x0312,
                power_off: 0x0201,
                led_brightness: 0x40,
            }
        );
    }

    #[test]
    fn out_of_range_value_is_replaced_by_default() {
        let mut manager = ConfigManager::new(Eeprom::erased());
        manager
            .store_bytes(POWER_OFF_THRESHOLD_ADDR, &1024i16.to_le_bytes())
            .unwrap();
        assert_eq!(manager.load().power_off, DEFAULT_POWER_OFF_THRESHOLD_CODE);
    }

    #[test]
    fn read_failure_falls_back_to_defaults() {
        let mut manager = ConfigManager::new(Eeprom::erased());
        manager.storage_mut().fail = true;
        assert_eq!(manager.load(), Thresholds::default());
        assert_eq!(
            manager.store_power_on_threshold(500),
            Err(ConfigError::Storage(()))
        );
    }

    #[test]
    fn threshold_range_is_ten_bits() {
        assert!(is_valid_threshold(0));
        assert!(is_valid_threshold(1023));
        assert!(!is_valid_threshold(1024));
        assert!(!is_valid_threshold(-1));
    }
}
