
use log::{trace, warn};
use serde::{Serialize, Deserialize};

use crate::{ConfigErr, TrackingErr};
use crate::filters::{self, ScalarFilter, FirstOrderFIR};
use crate::gnss::gps_l1_ca::signal_modulation::ChipOffset;
use crate::gnss::tracking::LoopUpdate;
use crate::gnss::tracking::integrate_dump::Epl;

/// Code phase discriminators, each scaled to read one chip per chip of error near lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DllDiscriminator {
	/// `(1 - d) (|E| - |L|) / (|E| + |L|)`
	EnvelopeNormalized,
	/// `((1 - d) / 2) (|E|^2 - |L|^2) / (|E|^2 + |L|^2)`
	PowerNormalized,
	/// `((IE - IL) IP + (QE - QL) QP) / (2 (IP^2 + QP^2))`
	DotProduct,
}

impl DllDiscriminator {

	pub fn from_index(index:u8) -> Result<Self, ConfigErr> {
		match index {
			1 => Ok(DllDiscriminator::EnvelopeNormalized),
			2 => Ok(DllDiscriminator::PowerNormalized),
			3 => Ok(DllDiscriminator::DotProduct),
			_ => Err(ConfigErr::UnknownDiscriminator{ name: "DLL", index }),
		}
	}

	/// Code phase error in chips, positive when the incoming code is ahead of the replica.
	/// `None` when the normalizing energy is zero.
	pub fn evaluate(&self, i:&Epl<i64>, q:&Epl<i64>, spacing:ChipOffset) -> Option<f64> {
		let d = spacing.chips();
		let power = |x:i64, y:i64| (x as f64).powi(2) + (y as f64).powi(2);
		let e2 = power(i.early, q.early);
		let l2 = power(i.late, q.late);

		let (num, den) = match self {
			DllDiscriminator::EnvelopeNormalized => {
				let (e, l) = (e2.sqrt(), l2.sqrt());
				((1.0 - d) * (e - l), e + l)
			},
			DllDiscriminator::PowerNormalized => (0.5 * (1.0 - d) * (e2 - l2), e2 + l2),
			DllDiscriminator::DotProduct => {
				let num = ((i.early - i.late) as f64) * (i.prompt as f64) + ((q.early - q.late) as f64) * (q.prompt as f64);
				(num, 2.0 * power(i.prompt, q.prompt))
			},
		};

		if den == 0.0 { None } else { Some(num / den) }
	}

}

/// Delay-lock loop: a code discriminator followed by a PI filter whose output is a code rate
/// correction in chips per second
#[derive(Debug, Clone)]
pub struct Dll {
	discriminator: DllDiscriminator,
	spacing: ChipOffset,
	filter: FirstOrderFIR,
	out: f64,
	err: f64,
	holds: u64,
}

impl Dll {

	pub fn new(dc_gain:f64, bandwidth_hz:f64, update_rate_hz:f64, discriminator:DllDiscriminator, spacing:ChipOffset) -> Self {
		let mut filter = FirstOrderFIR::pi_increment(bandwidth_hz, filters::DEFAULT_DAMPING, 1.0 / update_rate_hz);
		filter.scale_coeffs(dc_gain);
		Self{ discriminator, spacing, filter, out: 0.0, err: 0.0, holds: 0 }
	}

	/// Runs one loop update from a pair of dumped correlations.  Nothing changes on a hold or on
	/// an error.
	pub fn update(&mut self, i:&Epl<i64>, q:&Epl<i64>, cycle:u64) -> Result<LoopUpdate, TrackingErr> {
		let err = match self.discriminator.evaluate(i, q, self.spacing) {
			Some(err) => err,
			None => {
				self.holds += 1;
				warn!("DLL holding at cycle {}: no early/late energy", cycle);
				return Ok(LoopUpdate::Held);
			}
		};

		let mut filter = self.filter.clone();
		let out = self.out + filter.apply(err);
		if !out.is_finite() {
			return Err(TrackingErr::Numeric{ stage: "DLL loop filter", value: out, cycle });
		}

		self.filter = filter;
		self.err = err;
		self.out = out;
		trace!("DLL cycle {}: err={:.5} [chips], out={:.4} [chips/s]", cycle, err, out);
		Ok(LoopUpdate::Updated)
	}

	pub fn discriminator(&self) -> DllDiscriminator { self.discriminator }
	pub fn spacing(&self) -> ChipOffset { self.spacing }

	/// Last discriminator output [chips]
	pub fn err(&self) -> f64 { self.err }

	/// Filtered code rate correction [chips/s]
	pub fn output(&self) -> f64 { self.out }

	pub fn holds(&self) -> u64 { self.holds }

}
