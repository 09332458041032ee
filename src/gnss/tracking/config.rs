
use std::f64::consts;

use serde::{Serialize, Deserialize};

use crate::ConfigErr;
use crate::gnss::gps_l1_ca::{self, signal_modulation::{ChipOffset, CodeGenerator, SatelliteId}};
use crate::gnss::tracking::costas::{CostasCoeffs, CostasMode, LoopMode, PhaseDiscriminator};
use crate::gnss::tracking::dll::DllDiscriminator;
use crate::nco;

fn default_carrier_init_phase() -> f64 { -consts::FRAC_PI_2 }
fn default_carrier_bits() -> u32 { 8 }
fn default_chip_offset() -> f64 { 0.5 }
fn default_lock_window() -> usize { 20 }
fn default_discriminator() -> u8 { 1 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DllConfig {
	pub dc_gain: f64,
	pub bandwidth_hz: f64,
	pub update_rate_hz: f64,
	#[serde(default = "default_discriminator")]
	pub discriminator: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostasConfig {
	/// `[phase_p, phase_i, phase_ii, freq_i, freq_ii]`
	pub coeffs: [f64; 5],
	#[serde(default = "default_discriminator")]
	pub discriminator: u8,
	/// 0 for a plain PLL, 1 for an FLL-assisted PLL
	#[serde(default)]
	pub loop_mode: u8,
	#[serde(default)]
	pub bypass: bool,
	/// Carrier word held while bypassed; the nominal carrier word when absent
	#[serde(default)]
	pub forced_word: Option<i64>,
}

/// Everything needed to start one tracking channel, in the units a configuration file uses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
	pub fs: f64,
	pub prn: usize,
	pub carrier_width: u32,
	pub code_width: u32,
	/// Nominal carrier (IF plus Doppler) frequency word
	pub carrier_word: i64,
	/// Nominal chip rate word, where one cycle of the code NCO is one chip
	pub code_word: i64,
	#[serde(default = "default_carrier_init_phase")]
	pub carrier_init_phase_rad: f64,
	#[serde(default)]
	pub code_init_phase_rad: f64,
	#[serde(default = "default_carrier_bits")]
	pub carrier_bits: u32,
	#[serde(default)]
	pub code_bias: u64,
	pub int_num: u64,
	#[serde(default = "default_chip_offset")]
	pub chip_offset: f64,
	pub dll: DllConfig,
	pub costas: CostasConfig,
	#[serde(default = "default_lock_window")]
	pub lock_window: usize,
}

#[derive(Debug, Clone)]
pub struct ValidatedConfig {
	pub fs: f64,
	pub code_gen: CodeGenerator,
	pub sat: SatelliteId,
	pub carrier_width: u32,
	pub code_width: u32,
	pub carrier_word: u64,
	pub code_word: u64,
	pub carrier_init_phase_rad: f64,
	pub code_init_phase_rad: f64,
	pub carrier_bits: u32,
	pub code_bias: u64,
	pub int_num: u64,
	pub spacing: ChipOffset,
	pub dll_gain: f64,
	pub dll_bandwidth_hz: f64,
	pub dll_update_rate_hz: f64,
	pub dll_discriminator: DllDiscriminator,
	pub costas_coeffs: CostasCoeffs,
	pub costas_discriminator: PhaseDiscriminator,
	pub loop_mode: LoopMode,
	pub costas_mode: CostasMode,
	pub lock_window: usize,
}

impl ValidatedConfig {

	/// Coherent integration time [s]
	pub fn integration_time(&self) -> f64 { (self.int_num as f64) / self.fs }

}

fn positive(name:&'static str, value:f64) -> Result<f64, ConfigErr> {
	if value.is_finite() && value > 0.0 { Ok(value) }
	else { Err(ConfigErr::NotPositive{ name, value }) }
}

fn finite(name:&'static str, value:f64) -> Result<f64, ConfigErr> {
	if value.is_finite() { Ok(value) }
	else { Err(ConfigErr::NotFinite{ name, value }) }
}

impl ChannelConfig {

	/// Starting point for a GPS L1 C/A channel at intermediate frequency `if_hz`, with one code
	/// period of coherent integration, a 25 Hz second-order PLL, and a 2 Hz DLL
	pub fn gps_l1_ca(fs:f64, if_hz:f64, prn:usize) -> Self {
		let width:u32 = 32;
		let int_num:u64 = (gps_l1_ca::CODE_PERIOD_SEC * fs).round() as u64;
		let update_rate_hz:f64 = fs / (int_num.max(1) as f64);
		Self {
			fs, prn,
			carrier_width: width,
			code_width: width,
			carrier_word: nco::frequency_word(if_hz, fs, width),
			code_word: nco::frequency_word(gps_l1_ca::CHIP_RATE_HZ, fs, width),
			carrier_init_phase_rad: default_carrier_init_phase(),
			code_init_phase_rad: 0.0,
			carrier_bits: default_carrier_bits(),
			code_bias: 0,
			int_num,
			chip_offset: default_chip_offset(),
			dll: DllConfig{ dc_gain: 1.0, bandwidth_hz: 2.0, update_rate_hz, discriminator: 1 },
			costas: CostasConfig{ coeffs: CostasCoeffs::second_order(25.0).to_array(), discriminator: 1,
				loop_mode: 0, bypass: false, forced_word: None },
			lock_window: default_lock_window(),
		}
	}

	pub fn validate(&self) -> Result<ValidatedConfig, ConfigErr> {
		let fs = positive("sample rate", self.fs)?;

		let carrier_width = nco::check_width("carrier", self.carrier_width)?;
		let code_width = nco::check_width("code", self.code_width)?;
		let carrier_word = nco::check_word("carrier", self.carrier_word, carrier_width)?;
		let code_word = nco::check_word("code", self.code_word, code_width)?;
		let carrier_init_phase_rad = finite("carrier initial phase", self.carrier_init_phase_rad)?;
		let code_init_phase_rad = finite("code initial phase", self.code_init_phase_rad)?;
		if self.carrier_bits < 1 || self.carrier_bits > 16 {
			return Err(ConfigErr::InvalidCarrierBits(self.carrier_bits));
		}

		let code_gen = CodeGenerator::gps_l1_ca();
		let sat = code_gen.satellite(self.prn)?;

		if self.int_num == 0 { return Err(ConfigErr::InvalidIntegrationLength); }
		let spacing = ChipOffset::new(self.chip_offset)?;

		let dll_gain = positive("DLL gain", self.dll.dc_gain)?;
		let dll_bandwidth_hz = positive("DLL bandwidth", self.dll.bandwidth_hz)?;
		let dll_update_rate_hz = positive("DLL update rate", self.dll.update_rate_hz)?;
		let dll_discriminator = DllDiscriminator::from_index(self.dll.discriminator)?;

		for c in self.costas.coeffs.iter() {
			finite("Costas coefficient", *c)?;
		}
		let costas_coeffs = CostasCoeffs::from_array(self.costas.coeffs);
		let costas_discriminator = PhaseDiscriminator::from_index(self.costas.discriminator)?;
		let loop_mode = LoopMode::from_index(self.costas.loop_mode)?;
		let costas_mode = if self.costas.bypass {
			let forced_word = match self.costas.forced_word {
				Some(w) => nco::check_word("forced carrier", w, carrier_width)?,
				None => carrier_word,
			};
			CostasMode::Bypass{ forced_word }
		} else { CostasMode::Full };

		if self.lock_window == 0 {
			return Err(ConfigErr::NotPositive{ name: "lock detector window", value: 0.0 });
		}

		Ok(ValidatedConfig {
			fs, code_gen, sat,
			carrier_width, code_width, carrier_word, code_word,
			carrier_init_phase_rad, code_init_phase_rad,
			carrier_bits: self.carrier_bits,
			code_bias: self.code_bias,
			int_num: self.int_num,
			spacing,
			dll_gain, dll_bandwidth_hz, dll_update_rate_hz, dll_discriminator,
			costas_coeffs, costas_discriminator, loop_mode, costas_mode,
			lock_window: self.lock_window,
		})
	}

}

#[cfg(test)]
mod tests {

	use super::*;

	#[test]
	fn defaults_are_valid() {
		let cfg = ChannelConfig::gps_l1_ca(4.0e6, 1.02e6, 3).validate().unwrap();
		assert_eq!(cfg.int_num, 4000);
		assert_eq!(cfg.sat.prn(), 3);
		assert_eq!(cfg.costas_mode, CostasMode::Full);
		assert!((cfg.integration_time() - 1.0e-3).abs() < 1.0e-15);
		assert!((nco::word_to_hz(cfg.code_word, cfg.fs, cfg.code_width) - 1.023e6).abs() < 1.0e-3);
	}

	#[test]
	fn json_fills_in_defaults() {
		let json = r#"{
			"fs": 4.0e6, "prn": 12,
			"carrier_width": 20, "code_width": 20,
			"carrier_word": 267387, "code_word": 268173,
			"int_num": 8000,
			"dll": { "dc_gain": 12.0, "bandwidth_hz": 10.0, "update_rate_hz": 500.0 },
			"costas": { "coeffs": [40.0, 800.0, 0.0, 0.0, 0.0], "bypass": true }
		}"#;
		let cfg:ChannelConfig = serde_json::from_str(json).unwrap();
		assert_eq!(cfg.chip_offset, 0.5);
		assert_eq!(cfg.lock_window, 20);
		assert_eq!(cfg.dll.discriminator, 1);

		let v = cfg.validate().unwrap();
		assert_eq!(v.costas_mode, CostasMode::Bypass{ forced_word: 267387 });
		assert_eq!(v.loop_mode, LoopMode::Pll);
		assert_eq!(v.dll_discriminator, DllDiscriminator::EnvelopeNormalized);
	}

	#[test]
	fn each_bad_field_is_reported() {
		let good = ChannelConfig::gps_l1_ca(4.0e6, 1.02e6, 3);

		let mut cfg = good.clone();
		cfg.carrier_width = 49;
		assert_eq!(cfg.validate().unwrap_err(), ConfigErr::InvalidWidth{ name: "carrier", width: 49 });

		let mut cfg = good.clone();
		cfg.code_word = 1 << 32;
		assert!(matches!(cfg.validate(), Err(ConfigErr::WordOutOfRange{ name: "code", .. })));

		let mut cfg = good.clone();
		cfg.prn = 0;
		assert_eq!(cfg.validate().unwrap_err(), ConfigErr::UnknownSatellite(0));

		let mut cfg = good.clone();
		cfg.int_num = 0;
		assert_eq!(cfg.validate().unwrap_err(), ConfigErr::InvalidIntegrationLength);

		let mut cfg = good.clone();
		cfg.chip_offset = 0.6;
		assert_eq!(cfg.validate().unwrap_err(), ConfigErr::InvalidChipOffset(0.6));

		let mut cfg = good.clone();
		cfg.dll.discriminator = 9;
		assert_eq!(cfg.validate().unwrap_err(), ConfigErr::UnknownDiscriminator{ name: "DLL", index: 9 });

		let mut cfg = good.clone();
		cfg.costas.loop_mode = 2;
		assert_eq!(cfg.validate().unwrap_err(), ConfigErr::UnknownMode(2));

		let mut cfg = good.clone();
		cfg.dll.bandwidth_hz = -1.0;
		assert!(matches!(cfg.validate(), Err(ConfigErr::NotPositive{ name: "DLL bandwidth", .. })));

		let mut cfg = good.clone();
		cfg.costas.coeffs[1] = std::f64::NAN;
		assert!(matches!(cfg.validate(), Err(ConfigErr::NotFinite{ .. })));

		let mut cfg = good.clone();
		cfg.carrier_bits = 17;
		assert_eq!(cfg.validate().unwrap_err(), ConfigErr::InvalidCarrierBits(17));

		let mut cfg = good;
		cfg.costas.bypass = true;
		cfg.costas.forced_word = Some(-5);
		assert!(cfg.validate().is_err());
	}

}
