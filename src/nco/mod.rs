
//! Numerically controlled oscillators built on a fixed-width phase accumulator.
//!
//! A frequency word is the per-sample phase increment, where `2^W` is one full cycle.  The same
//! accumulator drives two kinds of output: a quantized `(cos, -sin)` pair used to wipe off the
//! carrier, and a chip clock used to step the spreading-code generator.

use std::f64::consts;

use crate::ConfigErr;

pub const MAX_WIDTH:u32 = 48;

/// Number of phase bits used to index the carrier lookup table
pub const LUT_BITS:u32 = 12;

pub fn check_width(name:&'static str, width:u32) -> Result<u32, ConfigErr> {
	if width >= 1 && width <= MAX_WIDTH { Ok(width) }
	else { Err(ConfigErr::InvalidWidth{ name, width }) }
}

/// Largest representable phase, `2^W - 1`
pub fn count_max(width:u32) -> u64 { (1u64 << width) - 1 }

/// Converts a physical frequency into a frequency word, `round(freq / fs * (2^W - 1))`
pub fn frequency_word(freq_hz:f64, fs:f64, width:u32) -> i64 {
	(freq_hz / fs * (count_max(width) as f64)).round() as i64
}

/// Effective frequency represented by a frequency word
pub fn word_to_hz(word:u64, fs:f64, width:u32) -> f64 {
	(word as f64) / (count_max(width) as f64) * fs
}

/// Rejects words that are not representable in `width` bits.  Used on configured words only.
pub fn check_word(name:&'static str, word:i64, width:u32) -> Result<u64, ConfigErr> {
	if word >= 0 && (word as u64) <= count_max(width) { Ok(word as u64) }
	else { Err(ConfigErr::WordOutOfRange{ name, word, width }) }
}

/// Reduces a loop-corrected word modulo `2^W`; a negative word is a negative frequency
pub fn wrap_word(word:i64, width:u32) -> u64 {
	word.rem_euclid(1i64 << width) as u64
}

/// Nominal word plus a loop correction given in the oscillator's own units per second
pub fn corrected_word(nominal:u64, correction_hz:f64, fs:f64, width:u32) -> u64 {
	wrap_word((nominal as i64).wrapping_add(frequency_word(correction_hz, fs, width)), width)
}

pub trait Waveform {
	type Output;

	fn emit(&self, phase:u64, width:u32, edge:bool) -> Self::Output;
}

/// Quantized quadrature carrier read from a lookup table
#[derive(Debug, Clone)]
pub struct CarrierWave {
	lut: Vec<(i32, i32)>,
	shift: u32,
}

impl CarrierWave {

	pub fn new(width:u32, bits:u32) -> Self {
		let lut_bits:u32 = width.min(LUT_BITS);
		let len:usize = 1 << lut_bits;
		let lut = (0..len).map(|i| {
			let theta:f64 = 2.0 * consts::PI * (i as f64) / (len as f64);
			(quantize(theta.cos(), bits), quantize(-theta.sin(), bits))
		}).collect();

		Self { lut, shift: width - lut_bits }
	}

	pub fn amplitude(bits:u32) -> i32 { if bits <= 1 { 1 } else { (1 << (bits - 1)) - 1 } }

}

fn quantize(x:f64, bits:u32) -> i32 {
	if bits <= 1 {
		if x >= 0.0 { 1 } else { -1 }
	} else {
		(x * (CarrierWave::amplitude(bits) as f64)).round() as i32
	}
}

impl Waveform for CarrierWave {
	type Output = (i32, i32);

	fn emit(&self, phase:u64, _width:u32, _edge:bool) -> (i32, i32) {
		self.lut[(phase >> self.shift) as usize]
	}
}

/// Chip clock: the fractional chip position plus a flag for a crossed chip boundary
#[derive(Debug, Clone, Copy)]
pub struct ChipClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeClock {
	pub phase: u64,
	pub width: u32,
	pub edge: bool,
}

impl CodeClock {

	/// Fraction of the current chip that has elapsed, in `[0, 1)`
	pub fn chip_fraction(&self) -> f64 { (self.phase as f64) / ((1u64 << self.width) as f64) }

}

impl Waveform for ChipClock {
	type Output = CodeClock;

	fn emit(&self, phase:u64, width:u32, edge:bool) -> CodeClock { CodeClock{ phase, width, edge } }
}

#[derive(Debug, Clone)]
pub struct Nco<W: Waveform> {
	width: u32,
	mask: u64,
	phase: u64,
	offset: u64,
	waveform: W,
}

impl Nco<CarrierWave> {

	pub fn carrier(width:u32, init_phase_rad:f64, bits:u32) -> Result<Self, ConfigErr> {
		let width = check_width("carrier", width)?;
		if bits < 1 || bits > 16 { return Err(ConfigErr::InvalidCarrierBits(bits)); }
		Self::with_waveform(width, init_phase_rad, CarrierWave::new(width, bits))
	}

}

impl Nco<ChipClock> {

	pub fn code_clock(width:u32, init_phase_rad:f64) -> Result<Self, ConfigErr> {
		let width = check_width("code", width)?;
		Self::with_waveform(width, init_phase_rad, ChipClock)
	}

}

impl<W: Waveform> Nco<W> {

	fn with_waveform(width:u32, init_phase_rad:f64, waveform:W) -> Result<Self, ConfigErr> {
		if !init_phase_rad.is_finite() {
			return Err(ConfigErr::NotFinite{ name: "initial phase", value: init_phase_rad });
		}
		let mask = count_max(width);
		let cycles:f64 = (init_phase_rad / (2.0 * consts::PI)).rem_euclid(1.0);
		let offset:u64 = ((cycles * ((1u64 << width) as f64)).round() as u64) & mask;
		Ok(Self{ width, mask, phase: 0, offset, waveform })
	}

	pub fn width(&self) -> u32 { self.width }

	/// Raw accumulator phase, always in `[0, 2^W)`
	pub fn phase(&self) -> u64 { self.phase }

	/// Accumulator phase plus the static initial-phase offset
	pub fn output_phase(&self) -> u64 { (self.phase + self.offset) & self.mask }

	pub fn reset(&mut self) { self.phase = 0; }

	/// Adds `word` to the phase modulo `2^W`, then emits the output for the updated phase
	pub fn advance(&mut self, word:u64) -> W::Output {
		debug_assert!(word <= self.mask, "frequency word {} exceeds {} bits", word, self.width);
		let word = word & self.mask;

		// Carry out of the offset phase marks a completed cycle of the output
		let edge:bool = self.output_phase() + word > self.mask;
		self.phase = (self.phase + word) & self.mask;

		self.waveform.emit(self.output_phase(), self.width, edge)
	}

}
