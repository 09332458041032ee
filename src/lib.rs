
//! Baseband tracking channel for a software GPS L1 C/A receiver.
//!
//! One `TrackingChannel` owns the carrier and code NCOs, the C/A code generator, the correlators,
//! the integrate-and-dump accumulators, the time keeper, and the DLL and Costas loops for a single
//! satellite that has already been acquired.

use thiserror::Error;

pub mod block;

pub mod filters;
pub mod io;
pub mod gnss;
pub mod nco;

/// Problems found while validating a channel configuration, before any sample is processed
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigErr {
	#[error("{name} NCO width {width} is outside 1..=48 bits")]
	InvalidWidth{ name: &'static str, width: u32 },

	#[error("{name} frequency word {word} does not fit in {width} bits")]
	WordOutOfRange{ name: &'static str, word: i64, width: u32 },

	#[error("unknown satellite identifier {0}")]
	UnknownSatellite(usize),

	#[error("unknown {name} discriminator index {index}")]
	UnknownDiscriminator{ name: &'static str, index: u8 },

	#[error("unknown Costas mode index {0}")]
	UnknownMode(u8),

	#[error("chip offset {0} is outside (0, 0.5]")]
	InvalidChipOffset(f64),

	#[error("carrier quantization of {0} bits is outside 1..=16")]
	InvalidCarrierBits(u32),

	#[error("integration length must be at least one sample")]
	InvalidIntegrationLength,

	#[error("{name} must be finite and positive, got {value}")]
	NotPositive{ name: &'static str, value: f64 },

	#[error("{name} must be finite, got {value}")]
	NotFinite{ name: &'static str, value: f64 },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrackingErr {
	#[error("configuration error: {0}")]
	Config(#[from] ConfigErr),

	#[error("sample source exhausted after {processed} of {requested} cycles")]
	DataExhausted{ processed: u64, requested: u64 },

	#[error("{stage} produced a non-finite value ({value}) at cycle {cycle}")]
	Numeric{ stage: &'static str, value: f64, cycle: u64 },

	/// The task running a channel failed outside the tracking pipeline
	#[error("block failure: {0}")]
	Block(&'static str),
}
