use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use argus_common::{EventHeader, PacketEvent, SyscallEvent, EVENT_KIND_PACKET, EVENT_KIND_SYSCALL};
use tracing::debug;
use zerocopy::FromBytes;

use crate::backend::{BackendToken, ExecutionBackend, ProbeKind};
use crate::counter::{EventCounter, KeyedCounter, DEFAULT_KEY_CAPACITY};
use crate::error::AttachError;
use crate::ring::{EventRecord, EventRingBuffer};
use crate::util::monotonic_ns;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
	Detached,
	Attached,
	/// Registration was refused. Terminal until an explicit retry-attach.
	Failed,
}

/// Everything the backend callback writes through: the probe's counters and
/// its ring. Shared between the [`ProbeHandle`] and the backend registration.
pub struct ProbeSink {
	probe_id: u32,
	counter: EventCounter,
	keyed: KeyedCounter,
	ring: EventRingBuffer,
	// Serializes ring writers. One delivery path per probe keeps this
	// uncontended; it exists so the single-writer contract survives a
	// backend that dispatches one probe's events in parallel.
	writer_lock: AtomicBool,
}

impl ProbeSink {
	fn new(probe_id: u32, ring_capacity: usize) -> Self {
		Self {
			probe_id,
			counter: EventCounter::new(),
			keyed: KeyedCounter::new(DEFAULT_KEY_CAPACITY),
			ring: EventRingBuffer::new(ring_capacity),
			writer_lock: AtomicBool::new(false),
		}
	}

	pub fn probe_id(&self) -> u32 {
		self.probe_id
	}

	pub fn counter(&self) -> &EventCounter {
		&self.counter
	}

	pub fn keyed(&self) -> &KeyedCounter {
		&self.keyed
	}

	pub fn ring(&self) -> &EventRingBuffer {
		&self.ring
	}

	/// Callback entry point, invoked by the backend per observed event.
	///
	/// Must never block and never allocate unboundedly: the ring is
	/// preallocated, the keyed counter is bounded, and the writer lock is a
	/// short spin over a couple of stores.
	pub fn deliver(&self, payload: &[u8]) {
		let Some((opcode_or_verdict, key)) = decode(payload) else {
			debug!("probe {}: dropping malformed {}-byte payload", self.probe_id, payload.len());
			return;
		};

		self.counter.increment();
		self.keyed.bump(key);

		while self
			.writer_lock
			.compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
			.is_err()
		{
			std::hint::spin_loop();
		}

		let record = EventRecord {
			sequence: self.ring.next_sequence(),
			timestamp: monotonic_ns(),
			opcode_or_verdict,
			source_probe_id: self.probe_id,
		};
		self.ring.push(record);

		self.writer_lock.store(false, Ordering::Release);
	}
}

/// Extracts `(opcode_or_verdict, key)` from a wire payload. Key is the uid
/// for syscall events, the ifindex for packet events.
fn decode(payload: &[u8]) -> Option<(i32, u32)> {
	let (header, _) = EventHeader::read_from_prefix(payload).ok()?;

	match header.kind {
		EVENT_KIND_SYSCALL => {
			let (evt, _) = SyscallEvent::read_from_prefix(payload).ok()?;
			Some((evt.opcode, evt.uid))
		}
		EVENT_KIND_PACKET => {
			let (evt, _) = PacketEvent::read_from_prefix(payload).ok()?;
			Some((evt.verdict, evt.ifindex))
		}
		_ => None,
	}
}

/// One attached observation point.
///
/// State machine: `Detached -> Attached` on successful registration,
/// `-> Detached` on detach, `-> Failed` on registration error (terminal
/// until an explicit retry-attach).
pub struct ProbeHandle {
	id: u32,
	kind: ProbeKind,
	state: ProbeState,
	sink: Arc<ProbeSink>,
	token: Option<BackendToken>,
}

impl ProbeHandle {
	pub fn new(id: u32, kind: ProbeKind, ring_capacity: usize) -> Self {
		Self {
			id,
			kind,
			state: ProbeState::Detached,
			sink: Arc::new(ProbeSink::new(id, ring_capacity)),
			token: None,
		}
	}

	pub fn id(&self) -> u32 {
		self.id
	}

	pub fn kind(&self) -> ProbeKind {
		self.kind
	}

	pub fn state(&self) -> ProbeState {
		self.state
	}

	pub fn sink(&self) -> &Arc<ProbeSink> {
		&self.sink
	}

	/// Registers with the backend and starts a fresh counting epoch.
	///
	/// The scalar and keyed counters reset; ring sequences keep increasing
	/// across epochs so retained drain cursors stay valid.
	pub fn attach(&mut self, backend: &dyn ExecutionBackend) -> core::result::Result<(), AttachError> {
		if self.state == ProbeState::Attached {
			return Err(AttachError::AlreadyAttached);
		}

		self.sink.counter().reset();
		self.sink.keyed().reset();

		match backend.register(self.kind, Arc::clone(&self.sink)) {
			Ok(token) => {
				self.token = Some(token);
				self.state = ProbeState::Attached;
				Ok(())
			}
			Err(rejection) => {
				self.state = ProbeState::Failed;
				Err(AttachError::BackendRejected(rejection))
			}
		}
	}

	/// Idempotent; always succeeds and leaves the handle `Detached`.
	///
	/// Does not wait for in-flight callbacks: the backend guarantees no
	/// delivery happens after `unregister` returns.
	pub fn detach(&mut self, backend: &dyn ExecutionBackend) {
		if let Some(token) = self.token.take() {
			backend.unregister(token);
		}
		self.state = ProbeState::Detached;
	}
}

// region:    --- Tests

#[cfg(test)]
mod tests {
	type Result<T> = core::result::Result<T, Box<dyn std::error::Error>>; // For tests.

	use super::*;
	use crate::backend::BackendRejection;
	use crate::sim::SimBackend;
	use zerocopy::IntoBytes;

	fn fx_syscall_payload(opcode: i32, uid: u32) -> Vec<u8> {
		let evt = SyscallEvent {
			header: EventHeader::new(EVENT_KIND_SYSCALL),
			opcode,
			pid: 4242,
			uid,
			comm: *b"test............",
		};
		evt.as_bytes().to_vec()
	}

	fn fx_packet_payload(verdict: i32, ifindex: u32) -> Vec<u8> {
		let evt = PacketEvent {
			header: EventHeader::new(EVENT_KIND_PACKET),
			verdict,
			ifindex,
			pkt_len: 128,
		};
		evt.as_bytes().to_vec()
	}

	#[test]
	fn attach_twice_fails_with_already_attached() -> Result<()> {
		// -- Setup & Fixtures
		let backend = SimBackend::new();
		let mut handle = ProbeHandle::new(1, ProbeKind::RawEvent, 8);

		// -- Exec
		handle.attach(&backend)?;
		let second = handle.attach(&backend);

		// -- Check
		assert_eq!(second, Err(AttachError::AlreadyAttached));
		assert_eq!(handle.state(), ProbeState::Attached);

		Ok(())
	}

	#[test]
	fn rejected_attach_marks_failed_until_retry() -> Result<()> {
		// -- Setup & Fixtures
		let backend = SimBackend::new();
		backend.reject_kind(ProbeKind::PacketHook, BackendRejection::PermissionDenied);
		let mut handle = ProbeHandle::new(2, ProbeKind::PacketHook, 8);

		// -- Exec
		let first = handle.attach(&backend);
		assert_eq!(
			first,
			Err(AttachError::BackendRejected(BackendRejection::PermissionDenied))
		);
		assert_eq!(handle.state(), ProbeState::Failed);

		backend.clear_rejection(ProbeKind::PacketHook);
		handle.attach(&backend)?;

		// -- Check
		assert_eq!(handle.state(), ProbeState::Attached);

		Ok(())
	}

	#[test]
	fn detach_is_idempotent() -> Result<()> {
		// -- Setup & Fixtures
		let backend = SimBackend::new();
		let mut handle = ProbeHandle::new(3, ProbeKind::RawEvent, 8);
		handle.attach(&backend)?;

		// -- Exec
		handle.detach(&backend);
		let state_once = handle.state();
		handle.detach(&backend);

		// -- Check
		assert_eq!(state_once, ProbeState::Detached);
		assert_eq!(handle.state(), ProbeState::Detached);
		assert_eq!(backend.registered_count(), 0);

		Ok(())
	}

	#[test]
	fn reattach_resets_counter_epoch() -> Result<()> {
		// -- Setup & Fixtures
		let backend = SimBackend::new();
		let mut handle = ProbeHandle::new(4, ProbeKind::RawEvent, 8);
		handle.attach(&backend)?;

		handle.sink().deliver(&fx_syscall_payload(59, 1000));
		handle.sink().deliver(&fx_syscall_payload(57, 1000));
		assert_eq!(handle.sink().counter().read(), 2);

		// -- Exec
		handle.detach(&backend);
		handle.attach(&backend)?;

		// -- Check: counters start fresh, ring sequences keep increasing.
		assert_eq!(handle.sink().counter().read(), 0);
		assert!(handle.sink().keyed().snapshot().is_empty());
		assert_eq!(handle.sink().ring().next_sequence(), 2);

		Ok(())
	}

	#[test]
	fn deliver_counts_and_captures_records() -> Result<()> {
		// -- Setup & Fixtures
		let handle = ProbeHandle::new(5, ProbeKind::RawEvent, 8);
		let sink = handle.sink();

		// -- Exec
		sink.deliver(&fx_syscall_payload(59, 0));
		sink.deliver(&fx_syscall_payload(257, 1000));

		// -- Check
		assert_eq!(sink.counter().read(), 2);
		assert_eq!(sink.keyed().snapshot(), vec![(0, 1), (1000, 1)]);

		let records: Vec<EventRecord> = sink.ring().drain_since(0).collect();
		assert_eq!(records.len(), 2);
		assert_eq!(records[0].opcode_or_verdict, 59);
		assert_eq!(records[1].opcode_or_verdict, 257);
		assert_eq!(records[0].source_probe_id, 5);
		assert!(records[1].timestamp >= records[0].timestamp);

		Ok(())
	}

	#[test]
	fn deliver_parses_packet_verdicts() -> Result<()> {
		// -- Setup & Fixtures
		let handle = ProbeHandle::new(6, ProbeKind::PacketHook, 8);
		let sink = handle.sink();

		// -- Exec
		sink.deliver(&fx_packet_payload(argus_common::VERDICT_PASS, 3));

		// -- Check
		assert_eq!(sink.counter().read(), 1);
		assert_eq!(sink.keyed().snapshot(), vec![(3, 1)]);
		let records: Vec<EventRecord> = sink.ring().drain_since(0).collect();
		assert_eq!(records[0].opcode_or_verdict, argus_common::VERDICT_PASS);

		Ok(())
	}

	#[test]
	fn deliver_ignores_malformed_payloads() -> Result<()> {
		// -- Setup & Fixtures
		let handle = ProbeHandle::new(7, ProbeKind::RawEvent, 8);
		let sink = handle.sink();

		// -- Exec: truncated header, unknown kind, truncated body.
		sink.deliver(&[]);
		sink.deliver(&[99, 0, 0, 0]);
		sink.deliver(&fx_syscall_payload(59, 0)[..8]);

		// -- Check
		assert_eq!(sink.counter().read(), 0);
		assert_eq!(sink.ring().next_sequence(), 0);

		Ok(())
	}
}

// endregion: --- Tests
