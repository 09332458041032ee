
//! Reference signal built from the same oscillators and code generator the tracking channel uses,
//! so a channel configured with matching words and phases starts perfectly aligned.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Serialize, Deserialize};

use crate::ConfigErr;
use crate::gnss::gps_l1_ca::signal_modulation::{ChipOffset, CodeGenerator, SatelliteId};
use crate::nco::{self, CarrierWave, ChipClock, Nco};

const CARRIER_BITS:u32 = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
	pub prn: usize,
	pub carrier_width: u32,
	pub carrier_word: i64,
	#[serde(default)]
	pub carrier_init_phase_rad: f64,
	pub code_width: u32,
	pub code_word: i64,
	/// 2*pi is one chip; a positive phase puts the signal's code ahead of a zero-phase replica
	#[serde(default)]
	pub code_init_phase_rad: f64,
	pub amplitude: f64,
	#[serde(default)]
	pub noise_std: f64,
	#[serde(default)]
	pub seed: u64,
}

pub struct SyntheticSource {
	carrier: Nco<CarrierWave>,
	carrier_word: u64,
	code_nco: Nco<ChipClock>,
	code_word: u64,
	code_gen: CodeGenerator,
	sat: SatelliteId,
	spacing: ChipOffset,
	scale: f64,
	noise: Option<(StdRng, Normal<f64>)>,
}

impl SyntheticSource {

	pub fn new(cfg:&SyntheticConfig) -> Result<Self, ConfigErr> {
		let carrier = Nco::carrier(cfg.carrier_width, cfg.carrier_init_phase_rad, CARRIER_BITS)?;
		let carrier_word = nco::check_word("synthetic carrier", cfg.carrier_word, cfg.carrier_width)?;
		let code_nco = Nco::code_clock(cfg.code_width, cfg.code_init_phase_rad)?;
		let code_word = nco::check_word("synthetic code", cfg.code_word, cfg.code_width)?;

		let code_gen = CodeGenerator::gps_l1_ca();
		let sat = code_gen.satellite(cfg.prn)?;

		if !(cfg.amplitude.is_finite() && cfg.amplitude > 0.0) {
			return Err(ConfigErr::NotPositive{ name: "synthetic amplitude", value: cfg.amplitude });
		}
		let noise = if cfg.noise_std > 0.0 {
			let normal = Normal::new(0.0, cfg.noise_std)
				.map_err(|_| ConfigErr::NotPositive{ name: "synthetic noise", value: cfg.noise_std })?;
			Some((StdRng::seed_from_u64(cfg.seed), normal))
		} else { None };

		// Only the prompt chip is transmitted, the spacing is never observed
		let spacing = ChipOffset::new(0.5)?;
		let scale = cfg.amplitude / (CarrierWave::amplitude(CARRIER_BITS) as f64);

		Ok(Self { carrier, carrier_word, code_nco, code_word, code_gen, sat, spacing, scale, noise })
	}

}

impl Iterator for SyntheticSource {
	type Item = i8;

	fn next(&mut self) -> Option<i8> {
		let (cos, _) = self.carrier.advance(self.carrier_word);
		let clock = self.code_nco.advance(self.code_word);
		let chip = self.code_gen.tap(&clock, self.sat, self.spacing).prompt;

		let mut x:f64 = self.scale * (cos as f64) * (chip as f64);
		if let Some((rng, normal)) = self.noise.as_mut() {
			x += normal.sample(rng);
		}

		// Saturate like the front end's ADC
		Some(x.round().max(-128.0).min(127.0) as i8)
	}
}

#[cfg(test)]
mod tests {

	use super::*;

	fn config() -> SyntheticConfig {
		SyntheticConfig {
			prn: 3, carrier_width: 24, carrier_word: nco::frequency_word(1.02e6, 4.0e6, 24), carrier_init_phase_rad: 0.0,
			code_width: 24, code_word: nco::frequency_word(1.023e6, 4.0e6, 24), code_init_phase_rad: 0.0,
			amplitude: 100.0, noise_std: 0.0, seed: 0,
		}
	}

	#[test]
	fn noiseless_samples_stay_within_amplitude() {
		let src = SyntheticSource::new(&config()).unwrap();
		let peak = src.take(8000).map(|s| (s as i32).abs()).max().unwrap();
		assert!(peak <= 100 && peak >= 95, "peak {}", peak);
	}

	#[test]
	fn noise_is_reproducible_from_seed() {
		let mut cfg = config();
		cfg.noise_std = 20.0;
		cfg.seed = 42;
		let a:Vec<i8> = SyntheticSource::new(&cfg).unwrap().take(1000).collect();
		let b:Vec<i8> = SyntheticSource::new(&cfg).unwrap().take(1000).collect();
		let clean:Vec<i8> = SyntheticSource::new(&config()).unwrap().take(1000).collect();
		assert_eq!(a, b);
		assert_ne!(a, clean);
	}

	#[test]
	fn bad_configuration_is_rejected() {
		let mut cfg = config();
		cfg.prn = 40;
		assert_eq!(SyntheticSource::new(&cfg).err(), Some(ConfigErr::UnknownSatellite(40)));

		let mut cfg = config();
		cfg.amplitude = 0.0;
		assert!(SyntheticSource::new(&cfg).is_err());
	}

}
