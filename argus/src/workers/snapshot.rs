use std::sync::Arc;
use std::time::Duration;

use argus_core::ProbeManager;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::event::AppEvent;
use crate::trx::Tx;
use crate::Result;

/// Polls the manager for per-probe snapshots and forwards them to the sink.
/// The reporting model is pull-only; this worker is the puller.
pub struct SnapshotWorker {
	manager: Arc<ProbeManager>,
	every: Duration,
	tx: Tx<AppEvent>,
	shutdown: CancellationToken,
}

impl SnapshotWorker {
	pub fn start(
		manager: Arc<ProbeManager>,
		every: Duration,
		tx: Tx<AppEvent>,
		shutdown: CancellationToken,
	) -> Result<Self> {
		Ok(SnapshotWorker {
			manager,
			every,
			tx,
			shutdown,
		})
	}

	pub async fn run(self) -> Result<()> {
		let mut ticker = tokio::time::interval(self.every);

		loop {
			tokio::select! {
				_ = self.shutdown.cancelled() => break,

				_ = ticker.tick() => {
					for id in self.manager.probe_ids() {
						match self.manager.snapshot(id) {
							Ok(snap) => {
								// The sink dropping the channel means shutdown.
								if self.tx.send(snap).await.is_err() {
									return Ok(());
								}
							}
							// Raced with a detach; the id list is refreshed next tick.
							Err(err) => warn!("snapshot of probe {id} failed: {err}"),
						}
					}
				}
			}
		}

		Ok(())
	}
}
