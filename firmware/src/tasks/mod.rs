pub mod i2c_secondary;
pub mod led_blinker;
pub mod supervisor;
