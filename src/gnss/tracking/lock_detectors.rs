
use std::collections::VecDeque;

use num_complex::Complex;
use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LockMetrics {
	pub cn0_dbhz: Option<f64>,
	pub carrier_lock: Option<f64>,
}

impl LockMetrics {

	pub fn from_prompts(prompt_buffer:&VecDeque<Complex<f64>>, coh_integration_time_s:f64) -> Self {
		Self {
			cn0_dbhz: cn0_svn_estimator(prompt_buffer, coh_integration_time_s),
			carrier_lock: carrier_lock_detector(prompt_buffer),
		}
	}

}

/// Signal-to-noise-variance C/N0 estimate [dB-Hz] over a window of coherent prompts.  `None` when
/// the window is empty or shows no noise at all.
pub fn cn0_svn_estimator(prompt_buffer:&VecDeque<Complex<f64>>, coh_integration_time_s:f64) -> Option<f64> {
	if prompt_buffer.is_empty() { return None; }

	let n:f64 = prompt_buffer.len() as f64;
	let p_sig:f64 = {
		let sum:f64 = prompt_buffer.iter().map(|c| c.re.abs() ).sum();
		(sum / n).powi(2)
	};
	let p_tot:f64 = {
		let sum:f64 = prompt_buffer.iter().map(|c| c.norm_sqr()).sum();
		sum / n
	};

	if p_tot <= p_sig { return None; }
	let snr = p_sig / (p_tot - p_sig);
	Some(10.0 * snr.log10() - 10.0 * coh_integration_time_s.log10())
}

/// Cosine of twice the mean carrier phase error: near 1 in phase lock, near -1 when the loop sits
/// on Q
pub fn carrier_lock_detector(prompt_buffer:&VecDeque<Complex<f64>>) -> Option<f64> {
	let tmp_sum_i:f64 = prompt_buffer.iter().map(|c| c.re).sum();
	let tmp_sum_q:f64 = prompt_buffer.iter().map(|c| c.im).sum();
	let nbp:f64 = tmp_sum_i * tmp_sum_i + tmp_sum_q * tmp_sum_q;
	let nbd:f64 = tmp_sum_i * tmp_sum_i - tmp_sum_q * tmp_sum_q;
	if nbp == 0.0 { None } else { Some(nbd / nbp) }
}

#[cfg(test)]
mod tests {

	use std::f64::consts;

	use rand::SeedableRng;
	use rand::rngs::StdRng;
	use rand_distr::{Distribution, Normal};

	use super::*;

	fn prompts(amp:f64, phase:f64, sigma:f64, n:usize) -> VecDeque<Complex<f64>> {
		let mut rng = StdRng::seed_from_u64(1234);
		let normal = Normal::new(0.0, sigma).unwrap();
		(0..n).map(|k| {
			// Data bits flip every 20 prompts
			let bit = if (k / 20) % 2 == 0 { 1.0 } else { -1.0 };
			Complex::from_polar(&(amp * bit), &phase) + Complex{ re: normal.sample(&mut rng), im: normal.sample(&mut rng) }
		}).collect()
	}

	#[test]
	fn cn0_matches_prompt_snr() {
		// SNR of 50 over 1 ms is 47 dB-Hz
		let buffer = prompts(10.0, 0.0, 1.0, 1000);
		let cn0 = cn0_svn_estimator(&buffer, 1.0e-3).unwrap();
		assert!((cn0 - 46.99).abs() < 0.5, "{}", cn0);
	}

	#[test]
	fn carrier_lock_follows_phase_error() {
		let locked = carrier_lock_detector(&prompts(10.0, 0.0, 0.5, 20)).unwrap();
		let quarter = carrier_lock_detector(&prompts(10.0, consts::PI / 4.0, 0.5, 20)).unwrap();
		let on_q = carrier_lock_detector(&prompts(10.0, consts::PI / 2.0, 0.5, 20)).unwrap();
		assert!(locked > 0.95, "{}", locked);
		assert!(quarter.abs() < 0.2, "{}", quarter);
		assert!(on_q < -0.95, "{}", on_q);
	}

	#[test]
	fn degenerate_windows() {
		let empty:VecDeque<Complex<f64>> = VecDeque::new();
		assert_eq!(cn0_svn_estimator(&empty, 1.0e-3), None);
		assert_eq!(carrier_lock_detector(&empty), None);

		let clean:VecDeque<Complex<f64>> = (0..20).map(|_| Complex{ re: 5.0, im: 0.0 }).collect();
		assert_eq!(cn0_svn_estimator(&clean, 1.0e-3), None);
		assert_eq!(carrier_lock_detector(&clean), Some(1.0));
	}

}
