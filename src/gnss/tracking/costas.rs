
//! Costas loop for carrier phase, optionally aided by a frequency discriminator.
//!
//! The loop filter runs on five coefficients `[phase_p, phase_i, phase_ii, freq_i, freq_ii]`
//! applied to the phase error `phi` [rad] and the frequency error `f` [Hz] once per update period
//! `T`:
//!
//! ```text
//! rate += T (phase_ii * phi + freq_ii * f)
//! freq += T (phase_i * phi + freq_i * f + rate)
//! out   = freq + phase_p * phi
//! ```
//!
//! `out` is a carrier frequency correction in Hz.

use std::f64::consts;

use log::{trace, warn};
use serde::{Serialize, Deserialize};

use crate::{ConfigErr, TrackingErr};
use crate::filters::{self, natural_freq};
use crate::gnss::tracking::LoopUpdate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseDiscriminator {
	/// `atan(Q / I)` [rad]
	Atan,
	/// `sign(I) Q / sqrt(I^2 + Q^2)`
	SignProduct,
	/// `I Q / (I^2 + Q^2)`
	Product,
}

impl PhaseDiscriminator {

	pub fn from_index(index:u8) -> Result<Self, ConfigErr> {
		match index {
			1 => Ok(PhaseDiscriminator::Atan),
			2 => Ok(PhaseDiscriminator::SignProduct),
			3 => Ok(PhaseDiscriminator::Product),
			_ => Err(ConfigErr::UnknownDiscriminator{ name: "Costas", index }),
		}
	}

	/// Phase of the incoming carrier relative to the replica, insensitive to a half-cycle flip.
	/// `None` when the prompt carries no energy the discriminator can use.
	pub fn evaluate(&self, i:f64, q:f64) -> Option<f64> {
		match self {
			PhaseDiscriminator::Atan => {
				if i == 0.0 && q == 0.0 { None }
				else if i == 0.0 { Some(q.signum() * consts::FRAC_PI_2) }
				else { Some((q / i).atan()) }
			},
			PhaseDiscriminator::SignProduct => {
				let mag = (i*i + q*q).sqrt();
				if mag == 0.0 { None } else { Some(i.signum() * q / mag) }
			},
			PhaseDiscriminator::Product => {
				let pwr = i*i + q*q;
				if pwr == 0.0 { None } else { Some(i * q / pwr) }
			},
		}
	}

}

/// Frequency error [Hz] between two consecutive prompts `t` seconds apart, zero when undefined
pub fn frequency_discriminator(prev:(f64, f64), cur:(f64, f64), t:f64) -> f64 {
	let dot   = prev.0 * cur.0 + prev.1 * cur.1;
	let cross = prev.0 * cur.1 - cur.0 * prev.1;
	if dot == 0.0 { 0.0 } else { (cross / dot).atan() / (2.0 * consts::PI * t) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopMode {
	Pll,
	FllAssistedPll,
}

impl LoopMode {

	pub fn from_index(index:u8) -> Result<Self, ConfigErr> {
		match index {
			0 => Ok(LoopMode::Pll),
			1 => Ok(LoopMode::FllAssistedPll),
			_ => Err(ConfigErr::UnknownMode(index)),
		}
	}

}

/// Whether the carrier NCO follows the loop or is held at a fixed word.  The loop keeps running in
/// both cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostasMode {
	Full,
	Bypass{ forced_word: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostasCoeffs {
	pub phase_p: f64,
	pub phase_i: f64,
	pub phase_ii: f64,
	pub freq_i: f64,
	pub freq_ii: f64,
}

impl CostasCoeffs {

	pub fn from_array(c:[f64; 5]) -> Self {
		Self{ phase_p: c[0], phase_i: c[1], phase_ii: c[2], freq_i: c[3], freq_ii: c[4] }
	}

	pub fn to_array(&self) -> [f64; 5] { [self.phase_p, self.phase_i, self.phase_ii, self.freq_i, self.freq_ii] }

	/// Second-order PLL with noise bandwidth `bn_hz`
	pub fn second_order(bn_hz:f64) -> Self {
		let zeta = filters::DEFAULT_DAMPING;
		let wn = natural_freq(bn_hz, zeta);
		Self::from_array([2.0 * zeta * wn / (2.0 * consts::PI), wn * wn / (2.0 * consts::PI), 0.0, 0.0, 0.0])
	}

	/// Third-order PLL with noise bandwidth `bn_hz`
	pub fn third_order(bn_hz:f64) -> Self {
		let w0 = bn_hz / 0.7845;
		let (a3, b3) = (1.1, 2.4);
		Self::from_array([b3 * w0 / (2.0 * consts::PI), a3 * w0 * w0 / (2.0 * consts::PI), w0.powi(3) / (2.0 * consts::PI), 0.0, 0.0])
	}

	/// Adds a first-order frequency-locked path with noise bandwidth `bn_hz`
	pub fn with_fll(self, bn_hz:f64) -> Self {
		Self{ freq_i: bn_hz / 0.25, ..self }
	}

	pub fn is_finite(&self) -> bool { self.to_array().iter().all(|c| c.is_finite()) }

}

#[derive(Debug, Clone)]
pub struct Costas {
	coeffs: CostasCoeffs,
	discriminator: PhaseDiscriminator,
	loop_mode: LoopMode,
	mode: CostasMode,
	t: f64,
	rate: f64,
	freq: f64,
	out: f64,
	d_out: f64,
	phase_err: f64,
	freq_err: f64,
	last_prompt: Option<(f64, f64)>,
	holds: u64,
}

impl Costas {

	/// `t` is the time between updates [s]
	pub fn new(coeffs:CostasCoeffs, discriminator:PhaseDiscriminator, loop_mode:LoopMode, mode:CostasMode, t:f64) -> Self {
		Self { coeffs, discriminator, loop_mode, mode, t,
			rate: 0.0, freq: 0.0, out: 0.0, d_out: 0.0, phase_err: 0.0, freq_err: 0.0,
			last_prompt: None, holds: 0 }
	}

	/// Runs one loop update from a dumped prompt correlation.  Nothing changes on a hold or on an
	/// error.
	pub fn update(&mut self, prompt_i:f64, prompt_q:f64, cycle:u64) -> Result<LoopUpdate, TrackingErr> {
		let phi = match self.discriminator.evaluate(prompt_i, prompt_q) {
			Some(phi) => phi,
			None => {
				self.holds += 1;
				warn!("Costas loop holding at cycle {}: no prompt energy", cycle);
				return Ok(LoopUpdate::Held);
			}
		};

		let freq_err = match self.last_prompt {
			Some(prev) => frequency_discriminator(prev, (prompt_i, prompt_q), self.t),
			None => 0.0,
		};
		let f = match self.loop_mode {
			LoopMode::Pll => 0.0,
			LoopMode::FllAssistedPll => freq_err,
		};

		let c = &self.coeffs;
		let rate = self.rate + self.t * (c.phase_ii * phi + c.freq_ii * f);
		let freq = self.freq + self.t * (c.phase_i * phi + c.freq_i * f + rate);
		let out  = freq + c.phase_p * phi;
		if !out.is_finite() {
			return Err(TrackingErr::Numeric{ stage: "Costas loop filter", value: out, cycle });
		}

		self.d_out = out - self.out;
		self.rate = rate;
		self.freq = freq;
		self.out = out;
		self.phase_err = phi;
		self.freq_err = freq_err;
		self.last_prompt = Some((prompt_i, prompt_q));
		trace!("Costas cycle {}: phi={:.4} [rad], f={:.3} [Hz], out={:.3} [Hz]", cycle, phi, freq_err, out);
		Ok(LoopUpdate::Updated)
	}

	pub fn coeffs(&self) -> CostasCoeffs { self.coeffs }
	pub fn mode(&self) -> CostasMode { self.mode }
	pub fn loop_mode(&self) -> LoopMode { self.loop_mode }

	/// Raw phase discriminator output [rad]
	pub fn phase_err(&self) -> f64 { self.phase_err }

	/// Frequency discriminator output [Hz], reported in both loop modes
	pub fn freq_err(&self) -> f64 { self.freq_err }

	/// Filtered carrier frequency correction [Hz]
	pub fn output(&self) -> f64 { self.out }

	/// Change in the correction made by the last update [Hz]
	pub fn d_output(&self) -> f64 { self.d_out }

	pub fn holds(&self) -> u64 { self.holds }

}
