use std::future::Future;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::Result;

/// Owns the worker tasks and the shutdown token they all watch.
pub struct Supervisor {
	shutdown: CancellationToken,
	tasks: JoinSet<Result<()>>,
}

impl Supervisor {
	pub fn new() -> Self {
		Self {
			shutdown: CancellationToken::new(),
			tasks: JoinSet::new(),
		}
	}

	pub fn token(&self) -> CancellationToken {
		self.shutdown.clone()
	}

	pub fn spawn<F>(&mut self, fut: F)
	where
		F: Future<Output = Result<()>> + Send + 'static,
	{
		self.tasks.spawn(fut);
	}

	/// Cancels the token and waits for every worker, surfacing the first
	/// worker error.
	pub async fn shutdown(mut self) -> Result<()> {
		self.shutdown.cancel();

		while let Some(res) = self.tasks.join_next().await {
			res??;
		}
		info!("all workers stopped");

		Ok(())
	}
}
