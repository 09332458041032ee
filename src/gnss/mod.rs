
/// Signal definitions and reference sources for GPS L1 C/A
pub mod gps_l1_ca;

/// Carrier and code tracking of an acquired signal
pub mod tracking;
