
extern crate clap;
extern crate colored;
extern crate l1_track;
extern crate serde;

use std::error::Error;
use std::fs::File;

use clap::{Arg, App, ArgMatches};
use colored::*;
use l1_track::TrackingErr;
use l1_track::block::Block;
use l1_track::io::{self, BufferedSource};
use l1_track::gnss::gps_l1_ca::synthetic::{SyntheticConfig, SyntheticSource};
use l1_track::gnss::tracking::{ChannelConfig, TrackingChannel, TrackingSnapshot};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// Samples handed to every channel block per message
const BATCH_LEN:usize = 4096;

#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigFile {
	One(ChannelConfig),
	Many(Vec<ChannelConfig>),
}

fn channel_configs(matches:&ArgMatches) -> Result<Vec<ChannelConfig>, Box<dyn Error>> {
	if let Some(path) = matches.value_of("config") {
		let cfg:ConfigFile = serde_json::from_reader(File::open(path)?)?;
		return Ok(match cfg {
			ConfigFile::One(c)   => vec![c],
			ConfigFile::Many(cs) => cs,
		});
	}

	let fs:f64    = matches.value_of("sample_rate_sps").ok_or("--sample_rate_sps is required without --config")?.parse()?;
	let if_hz:f64 = matches.value_of("if_hz").ok_or("--if_hz is required without --config")?.parse()?;
	let prns = matches.values_of("prn").ok_or("--prn is required without --config")?;

	let mut ans = vec![];
	for p in prns {
		ans.push(ChannelConfig::gps_l1_ca(fs, if_hz, p.parse()?));
	}
	Ok(ans)
}

fn sample_source(matches:&ArgMatches) -> Result<Box<dyn Iterator<Item=i8>>, Box<dyn Error>> {
	if let Some(path) = matches.value_of("synthetic") {
		let cfg:SyntheticConfig = serde_json::from_reader(File::open(path)?)?;
		return Ok(Box::new(SyntheticSource::new(&cfg)?));
	}

	let fname = matches.value_of("filename").ok_or("either --filename or --synthetic is required")?;
	let shift:u32 = matches.value_of("shift").unwrap_or("0").parse()?;
	let f = File::open(fname)?;
	match matches.value_of("input_type").unwrap_or("i8") {
		"i16" => Ok(Box::new(BufferedSource::<_, i16>::new(f).map(move |(x, _)| io::requantize(x, shift)))),
		_     => Ok(Box::new(BufferedSource::<_, i8>::new(f).map(|(x, _)| x))),
	}
}

#[tokio::main]
async fn main() {

	env_logger::init();

	let matches = App::new("GPS L1 C/A Tracking Channel")
		.version("0.1.0")
		.about("Tracks already-acquired L1 C/A satellites in real IF samples and reports every integrate-and-dump as a JSON line")
		.arg(Arg::with_name("config")
			.short("c").long("config")
			.help("JSON file holding one channel configuration or a list of them")
			.takes_value(true))
		.arg(Arg::with_name("filename")
			.short("f").long("filename")
			.help("Input filename")
			.takes_value(true))
		.arg(Arg::with_name("input_type")
			.short("t").long("type")
			.takes_value(true)
			.possible_values(&["i8", "i16"]))
		.arg(Arg::with_name("shift")
			.long("shift")
			.help("Right shift applied to i16 samples before tracking")
			.takes_value(true))
		.arg(Arg::with_name("synthetic")
			.long("synthetic")
			.help("JSON file describing a synthetic signal to track instead of a file")
			.takes_value(true)
			.conflicts_with("filename"))
		.arg(Arg::with_name("sample_rate_sps")
			.short("s").long("sample_rate_sps")
			.takes_value(true))
		.arg(Arg::with_name("if_hz")
			.short("i").long("if_hz")
			.takes_value(true))
		.arg(Arg::with_name("prn")
			.short("p").long("prn")
			.takes_value(true).multiple(true))
		.arg(Arg::with_name("cycles")
			.short("n").long("cycles")
			.help("Number of samples to process; defaults to the whole file")
			.takes_value(true))
		.get_matches();

	if let Err(e) = run(&matches).await {
		eprintln!("{}", format!("Error: {}", e).red());
		std::process::exit(1);
	}

}

async fn run(matches:&ArgMatches<'_>) -> Result<(), Box<dyn Error>> {

	let configs = channel_configs(matches)?;
	let samples = sample_source(matches)?;
	let opt_cycles:Option<u64> = match matches.value_of("cycles") {
		Some(s) => Some(s.parse()?),
		None    => None,
	};
	if opt_cycles.is_none() && matches.is_present("synthetic") {
		return Err("--cycles is required with a synthetic source".into());
	}

	// Every configuration is validated before any sample is read
	let mut channels:Vec<TrackingChannel> = vec![];
	for cfg in &configs {
		let chn = TrackingChannel::new(cfg)?;
		eprintln!("{}", format!("PRN {:02}: {:9.2} [Hz] carrier, {:11.2} [chips/sec] code, {} samples per dump",
			cfg.prn, chn.carrier_freq_hz(), chn.code_rate_hz(), cfg.int_num).green());
		channels.push(chn);
	}

	let mut inputs:Vec<(usize, Option<mpsc::Sender<Vec<i8>>>)> = vec![];
	let mut tasks:Vec<(usize, JoinHandle<Result<(), TrackingErr>>)> = vec![];
	let mut printers:Vec<JoinHandle<usize>> = vec![];
	for chn in channels {
		let prn = chn.satellite().prn();
		let Block{ tx_control:_, tx_input, mut rx_output, handles } = Block::from(chn);
		inputs.push((prn, Some(tx_input)));
		tasks.extend(handles.into_iter().map(|h| (prn, h)));
		printers.push(tokio::spawn(async move {
			let mut count:usize = 0;
			while let Some(batch) = rx_output.recv().await {
				for snapshot in batch {
					print_snapshot(&snapshot);
					count += 1;
				}
			}
			count
		}));
	}

	let mut samples = samples.take(opt_cycles.map(|n| n as usize).unwrap_or(usize::MAX));
	let mut processed:u64 = 0;
	loop {
		let batch:Vec<i8> = samples.by_ref().take(BATCH_LEN).collect();
		if batch.is_empty() { break; }
		processed += batch.len() as u64;

		for (prn, opt_tx) in inputs.iter_mut() {
			if let Some(tx) = opt_tx {
				if tx.send(batch.clone()).await.is_err() {
					eprintln!("{}", format!("PRN {:02}: channel stopped after {} samples", prn, processed).red());
					*opt_tx = None;
				}
			}
		}
	}
	drop(inputs);

	// Every channel is joined before the first failure is returned
	let mut first_err:Option<TrackingErr> = None;
	for (prn, task) in tasks {
		let result = task.await.map_err(|_| TrackingErr::Block("channel task did not run to completion"))?;
		if let Err(e) = result {
			eprintln!("{}", format!("PRN {:02}: {}", prn, e).red());
			first_err = first_err.or(Some(e));
		}
	}
	for (printer, cfg) in printers.into_iter().zip(&configs) {
		let count = printer.await?;
		eprintln!("{}", format!("PRN {:02}: {} dumps", cfg.prn, count).blue());
	}

	if let Some(e) = first_err {
		return Err(e.into());
	}
	check_sample_count(processed, opt_cycles)?;

	Ok(())
}

// Running short of an explicit `--cycles` request is a failure
fn check_sample_count(processed:u64, opt_cycles:Option<u64>) -> Result<(), TrackingErr> {
	match opt_cycles {
		Some(requested) if processed < requested => Err(TrackingErr::DataExhausted{ processed, requested }),
		_ => Ok(()),
	}
}

fn print_snapshot(snapshot:&TrackingSnapshot) {
	match serde_json::to_string(snapshot) {
		Ok(s)  => println!("{}", s),
		Err(e) => eprintln!("{}", format!("PRN {:02}: unable to serialize cycle {}: {}", snapshot.prn, snapshot.cycle, e).red()),
	}
}
