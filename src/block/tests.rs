
use crate::TrackingErr;
use crate::block::{Block, BlockFunctionality, BlockResult};
use crate::gnss::gps_l1_ca::synthetic::{SyntheticConfig, SyntheticSource};
use crate::gnss::tracking::{ChannelConfig, ChannelControl, TrackingChannel, TrackingSnapshot};

struct Countdown {
	left: u32
}

impl BlockFunctionality<(), (), u32, u32> for Countdown {

	fn control(&mut self, _:&()) -> Result<(), &'static str> { Ok(()) }

	fn apply(&mut self, input:&u32) -> BlockResult<u32> {
		if self.left == 0 {
			return BlockResult::Err(TrackingErr::DataExhausted{ processed: 0, requested: 1 });
		}
		self.left -= 1;
		if input % 2 == 0 { BlockResult::Ready(*input) } else { BlockResult::NotReady }
	}

}

#[tokio::test(threaded_scheduler)]
async fn block_stops_on_error() {
	let mut blk = Block::from(Countdown{ left: 4 });

	// The block may already be gone by the last send
	for x in 0..6 {
		let _ = blk.tx_input.send(x).await;
	}

	let mut results:Vec<u32> = vec![];
	while let Some(x) = blk.rx_output.recv().await {
		results.push(x);
	}
	assert_eq!(results, vec![0, 2]);
	assert_eq!(blk.shutdown().await, Err(TrackingErr::DataExhausted{ processed: 0, requested: 1 }));
}

#[tokio::test(threaded_scheduler)]
async fn channel_block_returns_numeric_error() {
	let mut cfg = ChannelConfig::gps_l1_ca(4.0e6, 1.02e6, 5);
	cfg.costas.coeffs = [std::f64::MAX, 0.0, 0.0, 0.0, 0.0];
	let signal = SyntheticConfig {
		prn: 5,
		carrier_width: cfg.carrier_width, carrier_word: cfg.carrier_word, carrier_init_phase_rad: cfg.carrier_init_phase_rad + 1.2,
		code_width: cfg.code_width, code_word: cfg.code_word, code_init_phase_rad: 0.0,
		amplitude: 60.0, noise_std: 0.0, seed: 0,
	};
	let mut src = SyntheticSource::new(&signal).unwrap();
	let mut blk = Block::from(TrackingChannel::new(&cfg).unwrap());

	// The second window's update overflows the Costas filter
	for _ in 0..3 {
		let batch:Vec<i8> = src.by_ref().take(4000).collect();
		let _ = blk.tx_input.send(batch).await;
	}

	let mut dumps:Vec<TrackingSnapshot> = vec![];
	while let Some(batch) = blk.rx_output.recv().await {
		dumps.extend(batch);
	}
	assert_eq!(dumps.iter().map(|s| s.cycle).collect::<Vec<u64>>(), vec![3999]);

	match blk.shutdown().await {
		Err(TrackingErr::Numeric{ stage, cycle, value }) => {
			assert_eq!((stage, cycle), ("Costas loop filter", 7999));
			assert!(!value.is_finite());
		},
		other => panic!("expected a numeric error, got {:?}", other),
	}
}

#[tokio::test(threaded_scheduler)]
async fn channel_block_reports_each_dump() {
	let cfg = ChannelConfig::gps_l1_ca(4.0e6, 1.02e6, 5);
	let signal = SyntheticConfig {
		prn: 5,
		carrier_width: cfg.carrier_width, carrier_word: cfg.carrier_word, carrier_init_phase_rad: cfg.carrier_init_phase_rad,
		code_width: cfg.code_width, code_word: cfg.code_word, code_init_phase_rad: 0.0,
		amplitude: 60.0, noise_std: 0.0, seed: 0,
	};
	let mut src = SyntheticSource::new(&signal).unwrap();
	let mut blk = Block::from(TrackingChannel::new(&cfg).unwrap());

	let mut dumps:Vec<TrackingSnapshot> = vec![];
	for _ in 0..3 {
		let batch:Vec<i8> = src.by_ref().take(4000).collect();
		blk.tx_input.send(batch).await.unwrap();
		dumps.extend(blk.rx_output.recv().await.unwrap());
	}

	// Control messages take effect with the next batch
	blk.tx_control.send(ChannelControl::Resync{ code_bias: 1000 }).await.unwrap();
	let batch:Vec<i8> = src.by_ref().take(4000).collect();
	blk.tx_input.send(batch).await.unwrap();
	dumps.extend(blk.rx_output.recv().await.unwrap());

	assert_eq!(dumps.iter().map(|s| s.cycle).collect::<Vec<u64>>(), vec![3999, 7999, 11999, 12999]);
	assert!(dumps.iter().all(|s| s.prn == 5));
	assert!(dumps[2].i.prompt.abs() > 100 * dumps[2].q.prompt.abs());

	blk.shutdown().await.unwrap();
}
