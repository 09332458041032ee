
//! Carrier and code tracking for one acquired satellite.
//!
//! Every input sample passes through the carrier NCO and two carrier mixers, then the code NCO and
//! code generator, then six code mixers into the I and Q integrate-and-dump stages.  When the time
//! keeper ends a window, the DLL and Costas loops update from the window before it, and their
//! corrections set the NCO words for the next sample.

use std::collections::VecDeque;

use log::{debug, trace, warn};
use num_complex::Complex;
use serde::{Serialize, Deserialize};

use crate::TrackingErr;
use crate::block::{BlockFunctionality, BlockResult};
use crate::gnss::gps_l1_ca::signal_modulation::{ChipOffset, CodeGenerator, SatelliteId};
use crate::nco::{self, CarrierWave, ChipClock, Nco};

pub mod config;
pub mod correlator;
pub mod costas;
pub mod dll;
pub mod integrate_dump;
pub mod lock_detectors;
pub mod time_keeper;


pub use self::config::{ChannelConfig, ValidatedConfig};

use self::correlator::MultiplierBank;
use self::costas::{Costas, CostasMode};
use self::dll::Dll;
use self::integrate_dump::{Epl, IntegrateDump};
use self::lock_detectors::LockMetrics;
use self::time_keeper::TimeKeeper;

/// Outcome of a loop update on a dump cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopUpdate {
	Updated,
	/// The discriminator had nothing to normalize by, so the loop kept its previous state
	Held,
}

/// Channel state after one cycle.  Words and frequencies are the ones the oscillators use on the
/// next cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSnapshot {
	pub prn: usize,
	pub cycle: u64,
	/// This cycle ended an integration window
	pub enable: bool,
	/// The local code finished a period on this cycle
	pub code_epoch: bool,
	/// Most recently dumped correlations
	pub i: Epl<i64>,
	pub q: Epl<i64>,
	pub dll_err: f64,
	pub dll_out: f64,
	pub costas_err: f64,
	pub freq_err: f64,
	pub lf_out: f64,
	pub d_lf_out: f64,
	pub carrier_word: u64,
	pub code_word: u64,
	pub carrier_freq_hz: f64,
	pub code_rate_hz: f64,
	/// Chip index plus the fraction of the current chip, at the prompt tap
	pub code_phase_chips: f64,
	pub numeric_holds: u64,
	pub lock: LockMetrics,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelControl {
	/// Restart the dump schedule at the next sample
	Resync{ code_bias: u64 },
	/// Shift the dump schedule without restarting it
	SetCodeBias(u64),
}

pub struct TrackingChannel {
	fs: f64,
	sat: SatelliteId,
	spacing: ChipOffset,

	// Oscillators and code
	carrier: Nco<CarrierWave>,
	code_nco: Nco<ChipClock>,
	code_gen: CodeGenerator,
	nominal_carrier_word: u64,
	nominal_code_word: u64,
	carrier_word: u64,
	code_word: u64,

	// Correlation
	mults: MultiplierBank,
	integ_i: IntegrateDump<i64>,
	integ_q: IntegrateDump<i64>,
	time_keeper: TimeKeeper,
	code_bias: u64,
	pending_reset: bool,

	// Loops close on the window before the one just dumped
	dll: Dll,
	costas: Costas,
	prev_i: Epl<i64>,
	prev_q: Epl<i64>,

	prompt_buffer: VecDeque<Complex<f64>>,
	lock_window: usize,
	lock: LockMetrics,
	integration_time: f64,

	cycle: u64,
	snapshot: TrackingSnapshot,
}

impl TrackingChannel {

	pub fn new(config:&ChannelConfig) -> Result<Self, TrackingErr> {
		let v = config.validate()?;
		Self::from_validated(v)
	}

	pub fn from_validated(v:ValidatedConfig) -> Result<Self, TrackingErr> {
		let carrier = Nco::carrier(v.carrier_width, v.carrier_init_phase_rad, v.carrier_bits)?;
		let code_nco = Nco::code_clock(v.code_width, v.code_init_phase_rad)?;
		let integration_time = v.integration_time();

		let dll = Dll::new(v.dll_gain, v.dll_bandwidth_hz, v.dll_update_rate_hz, v.dll_discriminator, v.spacing);
		let costas = Costas::new(v.costas_coeffs, v.costas_discriminator, v.loop_mode, v.costas_mode, integration_time);

		let carrier_word = match v.costas_mode {
			CostasMode::Full => v.carrier_word,
			CostasMode::Bypass{ forced_word } => forced_word,
		};

		debug!("PRN {:02} channel: carrier {:.3} [Hz], code {:.3} [chips/s], {} samples per dump, code bias {}",
			v.sat.prn(), nco::word_to_hz(carrier_word, v.fs, v.carrier_width),
			nco::word_to_hz(v.code_word, v.fs, v.code_width), v.int_num, v.code_bias);

		let mut chan = Self {
			fs: v.fs, sat: v.sat, spacing: v.spacing,
			carrier, code_nco, code_gen: v.code_gen,
			nominal_carrier_word: v.carrier_word, nominal_code_word: v.code_word,
			carrier_word, code_word: v.code_word,
			mults: MultiplierBank::new(),
			integ_i: IntegrateDump::new(), integ_q: IntegrateDump::new(),
			time_keeper: TimeKeeper::new(v.int_num),
			code_bias: v.code_bias,
			pending_reset: false,
			dll, costas,
			prev_i: Epl::zero(), prev_q: Epl::zero(),
			prompt_buffer: VecDeque::with_capacity(v.lock_window + 1),
			lock_window: v.lock_window,
			lock: LockMetrics::default(),
			integration_time,
			cycle: 0,
			snapshot: TrackingSnapshot {
				prn: v.sat.prn(), cycle: 0, enable: false, code_epoch: false,
				i: Epl::zero(), q: Epl::zero(),
				dll_err: 0.0, dll_out: 0.0, costas_err: 0.0, freq_err: 0.0, lf_out: 0.0, d_lf_out: 0.0,
				carrier_word: 0, code_word: 0, carrier_freq_hz: 0.0, code_rate_hz: 0.0,
				code_phase_chips: 0.0, numeric_holds: 0, lock: LockMetrics::default(),
			},
		};
		chan.snapshot.carrier_word = chan.carrier_word;
		chan.snapshot.code_word = chan.code_word;
		chan.snapshot.carrier_freq_hz = chan.carrier_freq_hz();
		chan.snapshot.code_rate_hz = chan.code_rate_hz();
		Ok(chan)
	}

	/// Processes one sample
	pub fn tick(&mut self, sample:i8) -> Result<&TrackingSnapshot, TrackingErr> {
		let cycle = self.cycle;

		// Carrier wipe-off
		let carrier = self.carrier.advance(self.carrier_word);
		let (x_i, x_q) = self.mults.mix_carrier(sample, carrier);

		// Code wipe-off
		let clock = self.code_nco.advance(self.code_word);
		let taps = self.code_gen.tap(&clock, self.sat, self.spacing);
		let corr_i = self.mults.despread(x_i, &taps);
		let corr_q = self.mults.despread(x_q, &taps);

		let enable = self.time_keeper.tick(self.pending_reset, self.code_bias);
		self.pending_reset = false;
		let (dumped_i, _) = self.integ_i.accumulate(corr_i, enable);
		let (dumped_q, _) = self.integ_q.accumulate(corr_q, enable);

		if enable {
			self.close_loops(cycle)?;

			self.prev_i = dumped_i;
			self.prev_q = dumped_q;

			self.prompt_buffer.push_back(Complex{ re: dumped_i.prompt as f64, im: dumped_q.prompt as f64 });
			while self.prompt_buffer.len() > self.lock_window { self.prompt_buffer.pop_front(); }
			if self.prompt_buffer.len() == self.lock_window {
				self.lock = LockMetrics::from_prompts(&self.prompt_buffer, self.integration_time);
			}

			trace!("PRN {:02} dump at cycle {}: {} samples, IP={}, QP={}",
				self.sat.prn(), cycle, self.integ_i.last_dump_len(), dumped_i.prompt, dumped_q.prompt);
		}

		self.snapshot = TrackingSnapshot {
			prn: self.sat.prn(),
			cycle,
			enable,
			code_epoch: taps.dump,
			i: dumped_i,
			q: dumped_q,
			dll_err: self.dll.err(),
			dll_out: self.dll.output(),
			costas_err: self.costas.phase_err(),
			freq_err: self.costas.freq_err(),
			lf_out: self.costas.output(),
			d_lf_out: self.costas.d_output(),
			carrier_word: self.carrier_word,
			code_word: self.code_word,
			carrier_freq_hz: self.carrier_freq_hz(),
			code_rate_hz: self.code_rate_hz(),
			code_phase_chips: (self.code_gen.code_index() as f64) + clock.chip_fraction(),
			numeric_holds: self.numeric_holds(),
			lock: self.lock,
		};
		self.cycle += 1;

		Ok(&self.snapshot)
	}

	// Both loops update together or not at all
	fn close_loops(&mut self, cycle:u64) -> Result<(), TrackingErr> {
		let (prev_i, prev_q) = (self.prev_i, self.prev_q);

		let mut dll = self.dll.clone();
		let mut costas = self.costas.clone();
		dll.update(&prev_i, &prev_q, cycle)?;
		costas.update(prev_i.prompt as f64, prev_q.prompt as f64, cycle)?;
		self.dll = dll;
		self.costas = costas;

		self.carrier_word = match self.costas.mode() {
			CostasMode::Full => nco::corrected_word(self.nominal_carrier_word, self.costas.output(), self.fs, self.carrier.width()),
			CostasMode::Bypass{ forced_word } => forced_word,
		};
		self.code_word = nco::corrected_word(self.nominal_code_word, self.dll.output(), self.fs, self.code_nco.width());
		Ok(())
	}

	/// Feeds up to `num_cycles` samples from `samples`, handing each snapshot to `observer`
	pub fn run<I, F>(&mut self, samples:I, num_cycles:u64, mut observer:F) -> Result<(), TrackingErr>
		where I: IntoIterator<Item = i8>, F: FnMut(&TrackingSnapshot) {
		let mut src = samples.into_iter();
		for processed in 0..num_cycles {
			match src.next() {
				Some(x) => observer(self.tick(x)?),
				None => {
					warn!("PRN {:02} ran out of samples after {} of {} cycles", self.sat.prn(), processed, num_cycles);
					return Err(TrackingErr::DataExhausted{ processed, requested: num_cycles });
				}
			}
		}
		Ok(())
	}

	/// Restarts the dump schedule against a new code bias, dropping the partial window
	pub fn resync(&mut self, code_bias:u64) {
		debug!("PRN {:02} resync at cycle {} with code bias {}", self.sat.prn(), self.cycle, code_bias);
		self.code_bias = code_bias;
		self.pending_reset = true;
		self.integ_i.discard_partial();
		self.integ_q.discard_partial();
	}

	pub fn set_code_bias(&mut self, code_bias:u64) { self.code_bias = code_bias; }

	pub fn snapshot(&self) -> &TrackingSnapshot { &self.snapshot }
	pub fn satellite(&self) -> SatelliteId { self.sat }
	pub fn cycle(&self) -> u64 { self.cycle }
	pub fn code_bias(&self) -> u64 { self.code_bias }
	pub fn multiply_count(&self) -> u64 { self.mults.count() }
	pub fn numeric_holds(&self) -> u64 { self.dll.holds() + self.costas.holds() }
	pub fn last_dump_len(&self) -> u64 { self.integ_i.last_dump_len() }
	pub fn dll(&self) -> &Dll { &self.dll }
	pub fn costas(&self) -> &Costas { &self.costas }

	pub fn carrier_freq_hz(&self) -> f64 { nco::word_to_hz(self.carrier_word, self.fs, self.carrier.width()) }

	/// Local code rate [chips/s]
	pub fn code_rate_hz(&self) -> f64 { nco::word_to_hz(self.code_word, self.fs, self.code_nco.width()) }

}

impl BlockFunctionality<ChannelControl, (), Vec<i8>, Vec<TrackingSnapshot>> for TrackingChannel {

	fn control(&mut self, control:&ChannelControl) -> Result<(), &'static str> {
		match control {
			ChannelControl::Resync{ code_bias } => self.resync(*code_bias),
			ChannelControl::SetCodeBias(code_bias) => self.set_code_bias(*code_bias),
		}
		Ok(())
	}

	/// Produces the snapshots at the dumps inside this batch
	fn apply(&mut self, input:&Vec<i8>) -> BlockResult<Vec<TrackingSnapshot>> {
		let mut dumps:Vec<TrackingSnapshot> = vec![];
		for x in input {
			match self.tick(*x) {
				Ok(s) => if s.enable { dumps.push(s.clone()); },
				Err(e) => return BlockResult::Err(e),
			}
		}

		if dumps.is_empty() { BlockResult::NotReady } else { BlockResult::Ready(dumps) }
	}

}
