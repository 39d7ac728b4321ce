// region:    --- Modules

mod agent;
mod cli;
mod error;
mod event;
mod supervisor;
mod trx;
mod workers;

// endregion: --- Modules

use crate::{
	cli::args::Cli,
	event::AppEvent,
	supervisor::Supervisor,
	trx::new_channel,
	workers::{DriverWorker, SnapshotWorker},
};

pub use self::error::{Error, Result};
use agent::run_sink;
use argus_core::{ExecutionBackend, ProbeKind, ProbeManager, SimBackend};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
	let args = Cli::parse();
	tracing_subscriber::fmt()
		.with_target(false)
		.with_env_filter(EnvFilter::from_default_env())
		.init();

	let backend = Arc::new(SimBackend::new());
	let manager = Arc::new(ProbeManager::new(Arc::clone(&backend) as Arc<dyn ExecutionBackend>));

	let syscall_id = manager.register_probe(ProbeKind::RawEvent, args.ring_capacity)?;
	let packet_id = manager.register_probe(ProbeKind::PacketHook, args.ring_capacity)?;
	info!("probes attached: syscall={syscall_id} packet={packet_id}");

	let (app_tx, app_rx) = new_channel::<AppEvent>("app_event");

	let mut supervisor = Supervisor::new();

	let driver = DriverWorker::start(Arc::clone(&backend), args.rate, supervisor.token())?;
	let snapshots = SnapshotWorker::start(Arc::clone(&manager), args.poll_every.into(), app_tx.clone(), supervisor.token())?;
	supervisor.spawn(driver.run());
	supervisor.spawn(snapshots.run());

	let sink_shutdown = supervisor.token();
	supervisor.spawn(run_sink(app_rx, sink_shutdown));

	match args.time {
		Some(duration) => tokio::time::sleep(duration.into()).await,
		None => tokio::signal::ctrl_c().await?,
	}

	let total = manager.total_events();
	let report = manager.shutdown();
	info!("detached {} probe(s), {} event(s) observed", report.detached.len(), total);

	supervisor.shutdown().await?;

	Ok(())
}
