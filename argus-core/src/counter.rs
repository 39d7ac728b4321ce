use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Upper bound on distinct keys a [`KeyedCounter`] tracks.
pub const DEFAULT_KEY_CAPACITY: usize = 1024;

/// Shared monotonic event counter.
///
/// Safe to increment from any number of concurrent dispatch contexts. The
/// value is monotonically non-decreasing for the lifetime of one attachment
/// epoch; [`EventCounter::reset`] starts a fresh epoch on reattach. Overflow
/// wraps per unsigned arithmetic and is not treated as a fault.
#[derive(Debug, Default)]
pub struct EventCounter {
	value: AtomicU64,
}

impl EventCounter {
	pub fn new() -> Self {
		Self { value: AtomicU64::new(0) }
	}

	/// Atomically increments and returns the new value.
	pub fn increment(&self) -> u64 {
		self.value.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
	}

	pub fn read(&self) -> u64 {
		self.value.load(Ordering::Relaxed)
	}

	/// Starts a new counting epoch. Only called on detach+reattach.
	pub fn reset(&self) {
		self.value.store(0, Ordering::Relaxed);
	}
}

/// Bounded per-key event totals (key = uid for syscall probes, ifindex for
/// packet hooks).
///
/// Mirrors a fixed-size map on the event-source side: once `max_entries`
/// distinct keys exist, events for unseen keys are dropped from the per-key
/// view. The scalar [`EventCounter`] still counts them.
#[derive(Debug)]
pub struct KeyedCounter {
	max_entries: usize,
	counts: Mutex<HashMap<u32, u64>>,
}

impl KeyedCounter {
	pub fn new(max_entries: usize) -> Self {
		Self {
			max_entries,
			counts: Mutex::new(HashMap::with_capacity(max_entries)),
		}
	}

	/// Bumps the total for `key`. Returns `false` when the key is unseen and
	/// the table is full, in which case the event is not tracked per-key.
	pub fn bump(&self, key: u32) -> bool {
		let mut counts = self.lock_counts();

		if let Some(total) = counts.get_mut(&key) {
			*total = total.wrapping_add(1);
			return true;
		}

		if counts.len() >= self.max_entries {
			return false;
		}

		counts.insert(key, 1);
		true
	}

	/// Current totals, sorted by key.
	pub fn snapshot(&self) -> Vec<(u32, u64)> {
		let counts = self.lock_counts();
		let mut entries: Vec<(u32, u64)> = counts.iter().map(|(k, v)| (*k, *v)).collect();
		entries.sort_unstable_by_key(|(k, _)| *k);
		entries
	}

	pub fn reset(&self) {
		self.lock_counts().clear();
	}

	fn lock_counts(&self) -> std::sync::MutexGuard<'_, HashMap<u32, u64>> {
		// A panicked holder must not wedge the delivery path.
		match self.counts.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		}
	}
}

// region:    --- Tests


// endregion: --- Tests
