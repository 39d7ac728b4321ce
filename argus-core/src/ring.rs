use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{fence, AtomicU64, Ordering};

// Retries per slot before the reader gives up and counts the record as
// overwritten. Each failed validation means the writer lapped the slot
// while we were copying it.
const SLOT_READ_RETRIES: usize = 4;

/// One captured event. Immutable once written; the slot holding it is
/// replaced wholesale when the ring wraps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventRecord {
	pub sequence: u64,
	pub timestamp: u64,
	pub opcode_or_verdict: i32,
	pub source_probe_id: u32,
}

struct Slot {
	// Seqlock version: odd while the writer is mid-slot, even otherwise.
	version: AtomicU64,
	record: UnsafeCell<EventRecord>,
}

/// Fixed-capacity circular buffer of captured events, overwrite-on-full.
///
/// Losing the oldest records under load is policy, not failure: bounded
/// memory and a never-blocking writer are favored over guaranteed delivery.
/// Consumers detect the loss through sequence discontinuities, surfaced as
/// [`Drain::missed`].
///
/// One writer at a time per ring (the owning probe's delivery path); readers
/// are lock-free and never block the writer. `write_cursor` counts every push
/// ever made, so `write_cursor % capacity` is the next write slot and the
/// visible range is `[write_cursor - capacity, write_cursor)`.
pub struct EventRingBuffer {
	capacity: u64,
	slots: Box<[Slot]>,
	write_cursor: AtomicU64,
}

// SAFETY: slot payloads are only accessed through the seqlock protocol in
// `push` / `read_slot`; readers copy out and validate, they never hold a
// reference into a slot.
unsafe impl Sync for EventRingBuffer {}

impl EventRingBuffer {
	pub fn new(capacity: usize) -> Self {
		assert!(capacity > 0, "ring capacity must be non-zero");

		let zeroed = EventRecord {
			sequence: 0,
			timestamp: 0,
			opcode_or_verdict: 0,
			source_probe_id: 0,
		};
		let slots: Vec<Slot> = (0..capacity)
			.map(|_| Slot {
				version: AtomicU64::new(0),
				record: UnsafeCell::new(zeroed),
			})
			.collect();

		Self {
			capacity: capacity as u64,
			slots: slots.into_boxed_slice(),
			write_cursor: AtomicU64::new(0),
		}
	}

	pub fn capacity(&self) -> usize {
		self.capacity as usize
	}

	/// Sequence the next pushed record will carry. Only meaningful to the
	/// single writer.
	pub fn next_sequence(&self) -> u64 {
		self.write_cursor.load(Ordering::Relaxed)
	}

	/// Stores `record`, overwriting the oldest live slot when full. Always
	/// succeeds, never allocates.
	///
	/// `record.sequence` must be the value of [`Self::next_sequence`]; the
	/// gap arithmetic in [`Self::drain_since`] relies on it.
	pub fn push(&self, record: EventRecord) {
		let cursor = self.write_cursor.load(Ordering::Relaxed);
		debug_assert_eq!(record.sequence, cursor);
		let slot = &self.slots[(cursor % self.capacity) as usize];

		// Seqlock write. The Release fence keeps the payload store from
		// moving above the odd version; the Release store publishes the
		// payload before the even version becomes visible.
		let version = slot.version.load(Ordering::Relaxed);
		slot.version.store(version.wrapping_add(1), Ordering::Relaxed);
		fence(Ordering::Release);
		unsafe { ptr::write(slot.record.get(), record) };
		slot.version.store(version.wrapping_add(2), Ordering::Release);

		self.write_cursor.store(cursor.wrapping_add(1), Ordering::Release);
	}

	/// Lazy, restartable drain of records with `sequence >= last_seen`,
	/// oldest first.
	///
	/// When `last_seen` has already been overwritten, iteration starts at the
	/// oldest still-live record and the difference is reported through
	/// [`Drain::missed`]: `missed = start - last_seen` with
	/// `start = max(last_seen, write_cursor - capacity)`, plus any records
	/// the writer lapped while the drain was copying them. Callers retain
	/// [`Drain::next_cursor`] as their cursor for the next call.
	pub fn drain_since(&self, last_seen: u64) -> Drain<'_> {
		let end = self.write_cursor.load(Ordering::Acquire);
		let start = last_seen.max(end.saturating_sub(self.capacity));

		Drain {
			ring: self,
			next: start,
			end,
			missed: start - last_seen,
		}
	}

	/// Copies the record at `sequence`, or `None` when the writer keeps
	/// lapping it.
	fn read_slot(&self, sequence: u64) -> Option<EventRecord> {
		let slot = &self.slots[(sequence % self.capacity) as usize];

		for _ in 0..SLOT_READ_RETRIES {
			let before = slot.version.load(Ordering::Acquire);
			if before & 1 != 0 {
				// Writer mid-slot; its critical section is a couple of stores.
				std::hint::spin_loop();
				continue;
			}

			let copy = unsafe { ptr::read_volatile(slot.record.get()) };

			// Keep the validation load from moving above the payload reads.
			fence(Ordering::Acquire);
			let after = slot.version.load(Ordering::Relaxed);
			if before == after {
				return Some(copy);
			}
		}

		None
	}
}

/// Iterator handed out by [`EventRingBuffer::drain_since`].
pub struct Drain<'a> {
	ring: &'a EventRingBuffer,
	next: u64,
	end: u64,
	missed: u64,
}

impl Drain<'_> {
	/// Records lost between the caller's cursor and what this drain could
	/// still observe. Final once the iterator is exhausted.
	pub fn missed(&self) -> u64 {
		self.missed
	}

	/// Cursor to retain for the next `drain_since` call.
	pub fn next_cursor(&self) -> u64 {
		self.end
	}
}

impl Iterator for Drain<'_> {
	type Item = EventRecord;

	fn next(&mut self) -> Option<EventRecord> {
		while self.next < self.end {
			let sequence = self.next;
			self.next += 1;

			match self.ring.read_slot(sequence) {
				// The slot still holds the sequence we asked for.
				Some(record) if record.sequence == sequence => return Some(record),
				// Overwritten (or kept busy) while draining.
				_ => self.missed += 1,
			}
		}

		None
	}
}

// region:    --- Tests


// endregion: --- Tests
