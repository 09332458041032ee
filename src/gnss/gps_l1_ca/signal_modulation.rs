
use serde::{Serialize, Deserialize};

use crate::ConfigErr;
use crate::nco::CodeClock;

// Given in IS-GPS-200K, Table 3-Ia; G2 stages combined to form the code phase of each PRN
const L1_CA_G2_SELECTORS:[(usize, usize); 32] = [
	(2, 6), (3, 7), (4, 8), (5, 9), (1, 9), (2, 10), (1, 8), (2, 9),		// PRN 01-08
	(3, 10), (2, 3), (3, 4), (5, 6), (6, 7), (7, 8), (8, 9), (9, 10),		// PRN 09-16
	(1, 4), (2, 5), (3, 6), (4, 7), (5, 8), (6, 9), (1, 3), (4, 6),			// PRN 17-24
	(5, 7), (6, 8), (7, 9), (8, 10), (1, 6), (2, 7), (3, 8), (4, 9),		// PRN 25-32
	];

/// A family of Gold codes built from two maximal-length shift registers.  Stage numbers are
/// 1-based; stage `register_len` is the register output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldCodeDesign {
	pub register_len: usize,
	pub g1_feedback: Vec<usize>,
	pub g2_feedback: Vec<usize>,
	pub g2_selectors: Vec<(usize, usize)>,
}

impl GoldCodeDesign {

	/// GPS L1 C/A: G1 = 1 + x^3 + x^10, G2 = 1 + x^2 + x^3 + x^6 + x^8 + x^9 + x^10
	pub fn gps_l1_ca() -> Self {
		Self {
			register_len: 10,
			g1_feedback: vec![3, 10],
			g2_feedback: vec![2, 3, 6, 8, 9, 10],
			g2_selectors: L1_CA_G2_SELECTORS.to_vec(),
		}
	}

	pub fn code_length(&self) -> usize { (1 << self.register_len) - 1 }
	pub fn num_satellites(&self) -> usize { self.g2_selectors.len() }

	/// Chips for one period as +1/-1, with a 0 bit mapped to +1
	pub fn generate(&self, sat:SatelliteId) -> Vec<i8> {
		let n = self.register_len;
		let (sel_a, sel_b) = self.g2_selectors[sat.index()];
		let mut g1:Vec<bool> = vec![true; n];
		let mut g2:Vec<bool> = vec![true; n];

		let feedback = |reg:&[bool], taps:&[usize]| taps.iter().fold(false, |acc, t| acc ^ reg[t-1]);

		(0..self.code_length()).map(|_| {
			let bit:bool = g1[n-1] ^ g2[sel_a-1] ^ g2[sel_b-1];

			let f1 = feedback(&g1, &self.g1_feedback);
			let f2 = feedback(&g2, &self.g2_feedback);
			g1.rotate_right(1);
			g2.rotate_right(1);
			g1[0] = f1;
			g2[0] = f2;

			if bit { -1 } else { 1 }
		}).collect()
	}

}

/// Satellite whose code is held by a `CodeGenerator`.  Only the generator hands these out, so
/// an existing id always has a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SatelliteId(usize);

impl SatelliteId {

	pub fn prn(&self) -> usize { self.0 }
	fn index(&self) -> usize { self.0 - 1 }

}

/// Early/late spacing from the prompt point, in chips
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChipOffset(f64);

impl ChipOffset {

	pub fn new(chips:f64) -> Result<Self, ConfigErr> {
		if chips > 0.0 && chips <= 0.5 { Ok(ChipOffset(chips)) }
		else { Err(ConfigErr::InvalidChipOffset(chips)) }
	}

	pub fn chips(&self) -> f64 { self.0 }

	fn phase_units(&self, width:u32) -> i64 { (self.0 * ((1u64 << width) as f64)).round() as i64 }

}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Taps {
	pub early: i8,
	pub prompt: i8,
	pub late: i8,
	/// A full code period finished on this cycle
	pub dump: bool,
}

#[derive(Debug, Clone)]
pub struct CodeGenerator {
	codes: Vec<Vec<i8>>,
	code_idx: usize,
}

impl CodeGenerator {

	pub fn new(design:&GoldCodeDesign) -> Self {
		let codes = (1..=design.num_satellites()).map(|prn| design.generate(SatelliteId(prn))).collect();
		Self { codes, code_idx: 0 }
	}

	pub fn gps_l1_ca() -> Self { Self::new(&GoldCodeDesign::gps_l1_ca()) }

	pub fn satellite(&self, prn:usize) -> Result<SatelliteId, ConfigErr> {
		if prn >= 1 && prn <= self.codes.len() { Ok(SatelliteId(prn)) }
		else { Err(ConfigErr::UnknownSatellite(prn)) }
	}

	pub fn code_length(&self) -> usize { self.codes[0].len() }
	pub fn code_index(&self) -> usize { self.code_idx }
	pub fn code(&self, sat:SatelliteId) -> &[i8] { &self.codes[sat.index()] }
	pub fn reset(&mut self) { self.code_idx = 0; }

	/// Steps the chip index on a clock edge and samples the code at the prompt point and at
	/// `offset` chips to either side of it
	pub fn tap(&mut self, clock:&CodeClock, sat:SatelliteId, offset:ChipOffset) -> Taps {
		let len = self.code_length();

		let mut dump = false;
		if clock.edge {
			self.code_idx += 1;
			if self.code_idx == len {
				self.code_idx = 0;
				dump = true;
			}
		}

		// floor((phase +/- offset) / 2^W) is the whole-chip shift of each tap, -1, 0, or +1
		let d = offset.phase_units(clock.width);
		let early_shift:i64 = (clock.phase as i64 + d) >> clock.width;
		let late_shift:i64  = (clock.phase as i64 - d) >> clock.width;

		let code = &self.codes[sat.index()];
		let idx = self.code_idx as i64;
		let at = |shift:i64| code[(idx + shift).rem_euclid(len as i64) as usize];

		Taps { early: at(early_shift), prompt: code[self.code_idx], late: at(late_shift), dump }
	}

}

#[cfg(test)]
mod tests {

	use super::*;
	use crate::nco::Nco;

	fn first_ten_octal(code:&[i8]) -> u32 {
		code[..10].iter().fold(0u32, |acc, c| (acc << 1) | if *c < 0 { 1 } else { 0 })
	}

	#[test]
	fn first_chips_match_icd() {
		let gen = CodeGenerator::gps_l1_ca();
		for (prn, octal) in &[(1, 0o1440), (2, 0o1620), (3, 0o1710), (4, 0o1744), (22, 0o1763)] {
			let sat = gen.satellite(*prn).unwrap();
			assert_eq!(first_ten_octal(gen.code(sat)), *octal, "PRN {}", prn);
		}
	}

	#[test]
	fn codes_are_balanced_gold_codes() {
		let gen = CodeGenerator::gps_l1_ca();
		let a = gen.code(gen.satellite(1).unwrap());
		let b = gen.code(gen.satellite(2).unwrap());
		assert_eq!(a.len(), 1023);
		assert_eq!(a.iter().map(|c| *c as i32).sum::<i32>(), -1);

		for lag in 0..1023 {
			let auto:i32  = (0..1023).map(|i| (a[i] * a[(i + lag) % 1023]) as i32).sum();
			let cross:i32 = (0..1023).map(|i| (a[i] * b[(i + lag) % 1023]) as i32).sum();
			if lag == 0 { assert_eq!(auto, 1023); }
			else        { assert!(auto == -65 || auto == -1 || auto == 63, "lag {} auto {}", lag, auto); }
			assert!(cross == -65 || cross == -1 || cross == 63, "lag {} cross {}", lag, cross);
		}
	}

	#[test]
	fn unknown_satellites_are_rejected() {
		let gen = CodeGenerator::gps_l1_ca();
		assert_eq!(gen.satellite(0), Err(ConfigErr::UnknownSatellite(0)));
		assert_eq!(gen.satellite(33), Err(ConfigErr::UnknownSatellite(33)));
		assert!(ChipOffset::new(0.0).is_err());
		assert!(ChipOffset::new(0.75).is_err());
	}

	#[test]
	fn prompt_sequence_repeats_every_code_period() {
		let mut gen = CodeGenerator::gps_l1_ca();
		let sat = gen.satellite(7).unwrap();
		let offset = ChipOffset::new(0.5).unwrap();
		let mut nco = Nco::code_clock(16, 0.0).unwrap();

		// Four samples per chip
		let word:u64 = 1 << 14;
		let period:usize = 4 * 1023;
		let taps:Vec<Taps> = (0..3*period).map(|_| gen.tap(&nco.advance(word), sat, offset)).collect();

		for i in 0..2*period {
			assert_eq!(taps[i].prompt, taps[i + period].prompt);
		}
		let dumps:Vec<usize> = taps.iter().enumerate().filter(|(_, t)| t.dump).map(|(i, _)| i).collect();
		assert_eq!(dumps, vec![period - 1, 2*period - 1, 3*period - 1]);

		// The prompt tap walks through the code one chip per four samples
		let code = gen.code(sat).to_vec();
		for chip in 0..1023 {
			assert_eq!(taps[4*chip].prompt, code[chip]);
		}
	}

	#[test]
	fn early_and_late_straddle_the_prompt() {
		let mut gen = CodeGenerator::gps_l1_ca();
		let sat = gen.satellite(1).unwrap();
		let offset = ChipOffset::new(0.5).unwrap();
		let code = gen.code(sat).to_vec();
		let width = 8;

		// Inside chip 5, a quarter of the way in: early still sees chip 5, late sees chip 4
		for _ in 0..5 { gen.tap(&CodeClock{ phase: 0, width, edge: true }, sat, offset); }
		let t = gen.tap(&CodeClock{ phase: 64, width, edge: false }, sat, offset);
		assert_eq!((t.early, t.prompt, t.late), (code[5], code[5], code[4]));

		// Three quarters in: early sees chip 6, late sees chip 5
		let t = gen.tap(&CodeClock{ phase: 192, width, edge: false }, sat, offset);
		assert_eq!((t.early, t.prompt, t.late), (code[6], code[5], code[5]));
	}

}
