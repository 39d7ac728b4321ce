use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use crate::backend::{ExecutionBackend, ProbeKind};
use crate::error::{ManagerError, Result};
use crate::probe::{ProbeHandle, ProbeState};
use crate::ring::EventRecord;

struct ManagedProbe {
	handle: ProbeHandle,
	// Per-consumer drain cursor, advanced by `snapshot`.
	cursor: u64,
}

/// Point-in-time view of one probe, produced by [`ProbeManager::snapshot`].
#[derive(Debug, Clone)]
pub struct ProbeSnapshot {
	pub probe_id: u32,
	pub kind: ProbeKind,
	pub state: ProbeState,
	/// Total events this attachment epoch.
	pub count: u64,
	/// Records captured since the previous snapshot, oldest first.
	pub recent: Vec<EventRecord>,
	/// Records lost to ring overwrite since the previous snapshot.
	pub missed: u64,
	/// Per-key totals (uid for syscall probes, ifindex for packet hooks).
	pub key_counts: Vec<(u32, u64)>,
}

/// Teardown summary. Detach cannot currently fail, so `failures` is kept
/// for report completeness rather than ever being populated.
#[derive(Debug, Default)]
pub struct ShutdownReport {
	pub detached: Vec<u32>,
	pub failures: Vec<(u32, String)>,
}

/// Owns the set of probes (unique by id), their drain cursors, and the
/// backend they register with.
///
/// Lifecycle: created at process start, [`ProbeManager::shutdown`] at process
/// end detaches every live handle. Consumers poll [`ProbeManager::snapshot`]
/// from their own thread/task; the manager lock is never taken on the event
/// delivery path, so snapshots never block callbacks.
pub struct ProbeManager {
	backend: Arc<dyn ExecutionBackend>,
	probes: Mutex<HashMap<u32, ManagedProbe>>,
	next_id: AtomicU32,
}

impl ProbeManager {
	pub fn new(backend: Arc<dyn ExecutionBackend>) -> Self {
		Self {
			backend,
			probes: Mutex::new(HashMap::new()),
			next_id: AtomicU32::new(1),
		}
	}

	/// Creates and attaches a probe under a fresh auto-generated id.
	///
	/// Auto ids never collide. If the backend refuses the registration the
	/// handle is retained in `Failed` state and the error carries the id, so
	/// the caller can [`ProbeManager::retry_attach`] later.
	pub fn register_probe(&self, kind: ProbeKind, ring_capacity: usize) -> Result<u32> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		self.insert_and_attach(id, kind, ring_capacity)
	}

	/// Same as [`ProbeManager::register_probe`] with a caller-supplied id.
	/// Fails with `DuplicateId` when the id is taken; the existing handle is
	/// left untouched.
	pub fn register_probe_with_id(&self, id: u32, kind: ProbeKind, ring_capacity: usize) -> Result<u32> {
		if self.lock_probes().contains_key(&id) {
			return Err(ManagerError::DuplicateId(id));
		}

		// Keep auto-generated ids clear of this one.
		self.next_id.fetch_max(id.wrapping_add(1), Ordering::Relaxed);

		self.insert_and_attach(id, kind, ring_capacity)
	}

	fn insert_and_attach(&self, id: u32, kind: ProbeKind, ring_capacity: usize) -> Result<u32> {
		let mut handle = ProbeHandle::new(id, kind, ring_capacity);
		let attach_res = handle.attach(self.backend.as_ref());

		self.lock_probes().insert(id, ManagedProbe { handle, cursor: 0 });

		match attach_res {
			Ok(()) => {
				info!("probe {id} attached ({kind:?})");
				Ok(id)
			}
			Err(source) => {
				warn!("probe {id} failed to attach: {source}");
				Err(ManagerError::Attach { id, source })
			}
		}
	}

	/// Detaches and destroys the probe. `NotFound` for unknown ids,
	/// otherwise always succeeds.
	pub fn detach_probe(&self, id: u32) -> Result<()> {
		let mut probes = self.lock_probes();
		let mut managed = probes.remove(&id).ok_or(ManagerError::NotFound(id))?;
		managed.handle.detach(self.backend.as_ref());
		info!("probe {id} detached");
		Ok(())
	}

	/// Explicit retry for a probe left in `Failed` state (or re-attach of a
	/// detach-retained handle).
	pub fn retry_attach(&self, id: u32) -> Result<()> {
		let mut probes = self.lock_probes();
		let managed = probes.get_mut(&id).ok_or(ManagerError::NotFound(id))?;
		managed
			.handle
			.attach(self.backend.as_ref())
			.map_err(|source| ManagerError::Attach { id, source })
	}

	/// Aggregated view of one probe: counter reading plus a drain of records
	/// unseen by previous snapshots. Advances the per-consumer cursor; the
	/// counter itself is not mutated.
	pub fn snapshot(&self, id: u32) -> Result<ProbeSnapshot> {
		let mut probes = self.lock_probes();
		let managed = probes.get_mut(&id).ok_or(ManagerError::NotFound(id))?;
		let sink = Arc::clone(managed.handle.sink());

		let count = sink.counter().read();
		let mut drain = sink.ring().drain_since(managed.cursor);
		let recent: Vec<EventRecord> = drain.by_ref().collect();
		let missed = drain.missed();
		managed.cursor = drain.next_cursor();

		Ok(ProbeSnapshot {
			probe_id: id,
			kind: managed.handle.kind(),
			state: managed.handle.state(),
			count,
			recent,
			missed,
			key_counts: sink.keyed().snapshot(),
		})
	}

	/// Sum of the live probes' counters.
	pub fn total_events(&self) -> u64 {
		let probes = self.lock_probes();
		probes
			.values()
			.fold(0u64, |acc, managed| acc.wrapping_add(managed.handle.sink().counter().read()))
	}

	/// Registered probe ids, ascending.
	pub fn probe_ids(&self) -> Vec<u32> {
		let probes = self.lock_probes();
		let mut ids: Vec<u32> = probes.keys().copied().collect();
		ids.sort_unstable();
		ids
	}

	/// Detaches every live handle, collecting rather than raising per-handle
	/// issues.
	pub fn shutdown(&self) -> ShutdownReport {
		let mut probes = self.lock_probes();
		let mut report = ShutdownReport::default();

		for (id, mut managed) in probes.drain() {
			managed.handle.detach(self.backend.as_ref());
			report.detached.push(id);
		}
		report.detached.sort_unstable();

		info!("manager shutdown, {} probe(s) detached", report.detached.len());
		report
	}

	fn lock_probes(&self) -> MutexGuard<'_, HashMap<u32, ManagedProbe>> {
		// A panicked snapshot consumer must not wedge attach/detach.
		match self.probes.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		}
	}
}

// region:    --- Tests


// endregion: --- Tests
