
use std::ops::Mul;

use crate::gnss::gps_l1_ca::signal_modulation::Taps;
use crate::gnss::tracking::integrate_dump::Epl;

/// Two carrier mixers plus I and Q times early, prompt, and late
pub const MULTIPLIERS_PER_CHANNEL:usize = 8;

pub fn multiply<T: Mul<Output = T>>(a:T, b:T) -> T { a * b }

/// Routes every product in a channel through one place so the multiplier budget can be checked
#[derive(Debug, Clone, Default)]
pub struct MultiplierBank {
	count: u64,
}

impl MultiplierBank {

	pub fn new() -> Self { Self{ count: 0 } }

	pub fn mul(&mut self, a:i64, b:i64) -> i64 {
		self.count += 1;
		multiply(a, b)
	}

	/// Total products formed since construction
	pub fn count(&self) -> u64 { self.count }

	/// Wipes off the carrier: `(x * cos, x * -sin)`
	pub fn mix_carrier(&mut self, sample:i8, carrier:(i32, i32)) -> (i64, i64) {
		let x = sample as i64;
		(self.mul(x, carrier.0 as i64), self.mul(x, carrier.1 as i64))
	}

	pub fn despread(&mut self, x:i64, taps:&Taps) -> Epl<i64> {
		Epl {
			early:  self.mul(x, taps.early as i64),
			prompt: self.mul(x, taps.prompt as i64),
			late:   self.mul(x, taps.late as i64),
		}
	}

}
