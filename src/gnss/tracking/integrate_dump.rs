
use std::ops::Add;

use num_traits::Zero;
use serde::{Serialize, Deserialize};

/// One value per correlator tap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epl<T> {
	pub early: T,
	pub prompt: T,
	pub late: T,
}

impl<T: Copy + Zero> Epl<T> {

	pub fn zero() -> Self { Self{ early: T::zero(), prompt: T::zero(), late: T::zero() } }

}

impl<T: Add<Output = T>> Add for Epl<T> {
	type Output = Self;

	fn add(self, other:Self) -> Self {
		Self{ early: self.early + other.early, prompt: self.prompt + other.prompt, late: self.late + other.late }
	}
}

/// Accumulates early/prompt/late products and publishes the sums when told to dump
#[derive(Debug, Clone)]
pub struct IntegrateDump<T> {
	sum: Epl<T>,
	dumped: Epl<T>,
	count: u64,
	last_dump_len: u64,
}

impl<T: Copy + Zero> IntegrateDump<T> {

	pub fn new() -> Self {
		Self{ sum: Epl::zero(), dumped: Epl::zero(), count: 0, last_dump_len: 0 }
	}

	/// Adds `x` into the running sums.  On a dump the sums, including `x`, are published and the
	/// running sums restart from zero; otherwise the previously published sums come back with
	/// `is_valid = false`.
	pub fn accumulate(&mut self, x:Epl<T>, dump:bool) -> (Epl<T>, bool) {
		self.sum = self.sum + x;
		self.count += 1;

		if dump {
			self.dumped = self.sum;
			self.last_dump_len = self.count;
			self.sum = Epl::zero();
			self.count = 0;
		}

		(self.dumped, dump)
	}

	/// Throws away the partial window without touching the published sums
	pub fn discard_partial(&mut self) {
		self.sum = Epl::zero();
		self.count = 0;
	}

	pub fn dumped(&self) -> Epl<T> { self.dumped }
	pub fn running(&self) -> Epl<T> { self.sum }

	/// Number of samples folded into the most recent dump
	pub fn last_dump_len(&self) -> u64 { self.last_dump_len }

}

impl<T: Copy + Zero> Default for IntegrateDump<T> {
	fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {

	use rand::{Rng, SeedableRng};
	use rand::rngs::StdRng;

	use super::*;

	fn epl(e:i64, p:i64, l:i64) -> Epl<i64> { Epl{ early: e, prompt: p, late: l } }

	#[test]
	fn sums_are_exact_and_restart_after_dump() {
		let mut rng = StdRng::seed_from_u64(7);
		let mut integ:IntegrateDump<i64> = IntegrateDump::new();

		let mut expected = epl(0, 0, 0);
		for n in 1..=3000 {
			let x = epl(rng.gen_range(-128, 128), rng.gen_range(-128, 128), rng.gen_range(-128, 128));
			expected = expected + x;
			let dump = n % 1000 == 0;
			let (out, valid) = integ.accumulate(x, dump);

			assert_eq!(valid, dump);
			if dump {
				assert_eq!(out, expected);
				assert_eq!(integ.running(), epl(0, 0, 0));
				assert_eq!(integ.last_dump_len(), 1000);
				expected = epl(0, 0, 0);
			} else {
				assert_eq!(integ.running(), expected);
			}
		}
	}

	#[test]
	fn dumped_values_hold_between_dumps() {
		let mut integ:IntegrateDump<i64> = IntegrateDump::new();
		assert_eq!(integ.accumulate(epl(1, 2, 3), false), (epl(0, 0, 0), false));
		assert_eq!(integ.accumulate(epl(1, 2, 3), true), (epl(2, 4, 6), true));
		assert_eq!(integ.accumulate(epl(5, 5, 5), false), (epl(2, 4, 6), false));
		assert_eq!(integ.accumulate(epl(5, 5, 5), false), (epl(2, 4, 6), false));
		assert_eq!(integ.accumulate(epl(-1, 0, 1), true), (epl(9, 10, 11), true));
		assert_eq!(integ.last_dump_len(), 3);
	}

	#[test]
	fn discarding_keeps_the_published_sums() {
		let mut integ:IntegrateDump<f64> = IntegrateDump::new();
		integ.accumulate(Epl{ early: 0.5, prompt: 1.0, late: 0.5 }, true);
		integ.accumulate(Epl{ early: 2.0, prompt: 2.0, late: 2.0 }, false);
		integ.discard_partial();

		assert_eq!(integ.running(), Epl::zero());
		assert_eq!(integ.dumped(), Epl{ early: 0.5, prompt: 1.0, late: 0.5 });
	}

}
