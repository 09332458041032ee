
/// Decides which cycles end an integration window.
///
/// A cycle `t` (counted from the last reset) dumps when `(t + 1 - code_bias) = 0 (mod int_num)`,
/// so the first window holds the code-bias residual and every later one exactly `int_num` samples.
#[derive(Debug, Clone)]
pub struct TimeKeeper {
	int_num: u64,
	t: u64,
	code_bias: u64,
}

impl TimeKeeper {

	/// `int_num` must be nonzero; the channel configuration checks this
	pub fn new(int_num:u64) -> Self {
		debug_assert!(int_num > 0);
		Self{ int_num: int_num.max(1), t: 0, code_bias: 0 }
	}

	pub fn int_num(&self) -> u64 { self.int_num }
	pub fn code_bias(&self) -> u64 { self.code_bias }
	pub fn cycles_since_reset(&self) -> u64 { self.t }

	/// Advances one cycle and returns whether this cycle ends a window
	pub fn tick(&mut self, reset:bool, code_bias:u64) -> bool {
		if reset { self.t = 0; }
		self.code_bias = code_bias;

		let enable:bool = self.phase(self.t) == 0;
		self.t += 1;
		enable
	}

	/// Samples left in the current window, counting the next cycle
	pub fn samples_to_dump(&self) -> u64 {
		match self.phase(self.t) {
			0 => 1,
			p => self.int_num - p + 1,
		}
	}

	fn phase(&self, t:u64) -> u64 {
		let n = self.int_num;
		((t + 1) % n + n - self.code_bias % n) % n
	}

}
