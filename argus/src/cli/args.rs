use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "argus")]
pub struct Cli {
	#[arg(long, help = "Run duration (e.g., 20s, 5m). Runs until Ctrl-C when omitted")]
	pub time: Option<humantime::Duration>,

	#[arg(long, default_value_t = 256, help = "Capture ring capacity per probe")]
	pub ring_capacity: usize,

	#[arg(long, default_value_t = 50, help = "Synthetic events per second per probe kind")]
	pub rate: u32,

	#[arg(long, default_value = "1s", help = "Snapshot polling cadence")]
	pub poll_every: humantime::Duration,
}
