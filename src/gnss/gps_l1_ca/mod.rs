
pub mod signal_modulation;
pub mod synthetic;

pub const CHIP_RATE_HZ:f64 = 1.023e6;
pub const CODE_LENGTH:usize = 1023;
pub const CODE_PERIOD_SEC:f64 = 1.0e-3;
