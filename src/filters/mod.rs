
/// Damping ratio used for every second-order loop unless a design says otherwise
pub const DEFAULT_DAMPING:f64 = 0.707;

/// Natural frequency [rad/s] of a second-order loop with noise bandwidth `bn_hz`
pub fn natural_freq(bn_hz:f64, zeta:f64) -> f64 { 8.0 * zeta * bn_hz / (4.0 * zeta * zeta + 1.0) }

pub trait ScalarFilter {

	fn apply(&mut self, x:f64) -> f64;
	fn initialize(&mut self);
	fn scale_coeffs(&mut self, new_scale:f64);

}

#[derive(Debug, Clone)]
pub struct FirstOrderFIR { pub b0: f64, pub b1: f64,
						   pub x0: f64, pub x1: f64,
						   pub scale: f64 }

impl FirstOrderFIR {

	pub fn new(b0: f64, b1: f64) -> Self { Self { b0, b1, x0: 0.0, x1: 0.0, scale: 1.0} }

	/// Proportional-integral loop filter written as increments.  Summing the outputs gives
	/// `2*zeta*wn*x + wn^2 * integral(x)`, with the integral taken by the trapezoid rule at period `t`.
	pub fn pi_increment(bn_hz:f64, zeta:f64, t:f64) -> Self {
		let wn:f64 = natural_freq(bn_hz, zeta);
		let prop:f64 = 2.0 * zeta * wn;
		let integ:f64 = wn * wn * t / 2.0;
		Self::new(integ - prop, integ + prop)
	}

	/// Most recent input
	pub fn last_input(&self) -> f64 { self.x1 }

}

impl ScalarFilter for FirstOrderFIR {

	fn apply(&mut self, x:f64) -> f64 {
		self.x0 = self.x1;
		self.x1 = x;
		(self.b0*self.x0 + self.b1*self.x1)*self.scale
	}

	fn initialize(&mut self) {
		self.x0 = 0.0;
		self.x1 = 0.0;
		self.scale = 1.0;
	}

	fn scale_coeffs(&mut self, new_scale:f64) {
		self.scale = new_scale;
	}

}

#[cfg(test)]
mod tests {

	use super::*;

	#[test]
	fn pi_increments_sum_to_a_ramp() {
		let t = 1.0e-3;
		let wn = natural_freq(10.0, DEFAULT_DAMPING);
		let mut filter = FirstOrderFIR::pi_increment(10.0, DEFAULT_DAMPING, t);

		let n = 50;
		let total:f64 = (0..n).map(|_| filter.apply(1.0)).sum();
		let expected:f64 = 2.0 * DEFAULT_DAMPING * wn + wn * wn * t / 2.0 + ((n - 1) as f64) * wn * wn * t;
		assert!((total - expected).abs() < 1.0e-9, "{} vs {}", total, expected);
	}

	#[test]
	fn scale_and_initialize() {
		let mut filter = FirstOrderFIR::new(-1.0, 2.0);
		filter.scale_coeffs(3.0);
		assert_eq!(filter.apply(1.0), 6.0);
		assert_eq!(filter.apply(1.0), 3.0);
		assert_eq!(filter.last_input(), 1.0);

		filter.initialize();
		assert_eq!(filter.apply(1.0), 2.0);
	}

	#[test]
	fn natural_frequency_of_critically_damped_design() {
		// zeta = 0.5 gives wn = 2 * Bn
		assert!((natural_freq(25.0, 0.5) - 50.0).abs() < 1.0e-12);
	}

}
