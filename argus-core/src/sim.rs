use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::backend::{BackendRejection, BackendToken, ExecutionBackend, ProbeKind};
use crate::probe::ProbeSink;

struct Registration {
	kind: ProbeKind,
	sink: Arc<ProbeSink>,
}

/// In-process execution backend for development and tests.
///
/// Events are driven by calling [`SimBackend::emit`] / [`SimBackend::emit_all`]
/// from any thread. Delivery happens under the registry lock, which is what
/// upholds the backend contract: `unregister` takes the same lock, so once it
/// returns no delivery for that token is running or can start.
#[derive(Default)]
pub struct SimBackend {
	next_token: AtomicU64,
	registry: Mutex<HashMap<u64, Registration>>,
	rejections: Mutex<HashMap<ProbeKind, BackendRejection>>,
}

impl SimBackend {
	pub fn new() -> Self {
		Self {
			next_token: AtomicU64::new(1),
			registry: Mutex::new(HashMap::new()),
			rejections: Mutex::new(HashMap::new()),
		}
	}

	/// Makes subsequent `register` calls for `kind` fail with `rejection`.
	pub fn reject_kind(&self, kind: ProbeKind, rejection: BackendRejection) {
		self.lock(&self.rejections).insert(kind, rejection);
	}

	pub fn clear_rejection(&self, kind: ProbeKind) {
		self.lock(&self.rejections).remove(&kind);
	}

	/// Delivers `payload` to the sink registered under `token`. Returns
	/// `false` when the token is unknown (never registered, or already
	/// unregistered).
	pub fn emit(&self, token: BackendToken, payload: &[u8]) -> bool {
		let registry = self.lock(&self.registry);
		match registry.get(&token.raw()) {
			Some(registration) => {
				registration.sink.deliver(payload);
				true
			}
			None => false,
		}
	}

	/// Delivers `payload` to every sink registered for `kind`. Returns the
	/// number of sinks reached.
	pub fn emit_all(&self, kind: ProbeKind, payload: &[u8]) -> usize {
		let registry = self.lock(&self.registry);
		let mut reached = 0;
		for registration in registry.values() {
			if registration.kind == kind {
				registration.sink.deliver(payload);
				reached += 1;
			}
		}
		reached
	}

	pub fn registered_count(&self) -> usize {
		self.lock(&self.registry).len()
	}

	fn lock<'a, T>(&self, mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
		// A panicked emitter must not wedge register/unregister.
		match mutex.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		}
	}
}

impl ExecutionBackend for SimBackend {
	fn register(&self, kind: ProbeKind, sink: Arc<ProbeSink>) -> core::result::Result<BackendToken, BackendRejection> {
		if let Some(rejection) = self.lock(&self.rejections).get(&kind) {
			return Err(*rejection);
		}

		let token = self.next_token.fetch_add(1, Ordering::Relaxed);
		self.lock(&self.registry).insert(token, Registration { kind, sink });
		debug!("sim backend registered token {token} ({kind:?})");
		Ok(BackendToken::from(token))
	}

	fn unregister(&self, token: BackendToken) {
		self.lock(&self.registry).remove(&token.raw());
		debug!("sim backend unregistered token {}", token.raw());
	}
}

// region:    --- Tests

#[cfg(test)]
mod tests {
	type Result<T> = core::result::Result<T, Box<dyn std::error::Error>>; // For tests.

	use super::*;
	use crate::probe::ProbeHandle;
	use argus_common::{EventHeader, SyscallEvent, EVENT_KIND_SYSCALL};
	use zerocopy::IntoBytes;

	fn fx_payload() -> Vec<u8> {
		let evt = SyscallEvent {
			header: EventHeader::new(EVENT_KIND_SYSCALL),
			opcode: 59,
			pid: 1,
			uid: 0,
			comm: *b"init............",
		};
		evt.as_bytes().to_vec()
	}

	#[test]
	fn register_emit_unregister_roundtrip() -> Result<()> {
		// -- Setup & Fixtures
		let backend = SimBackend::new();
		let handle = ProbeHandle::new(1, ProbeKind::RawEvent, 8);
		let token = backend
			.register(ProbeKind::RawEvent, Arc::clone(handle.sink()))
			.map_err(|e| e.to_string())?;

		// -- Exec
		let delivered = backend.emit(token, &fx_payload());

		// -- Check
		assert!(delivered);
		assert_eq!(handle.sink().counter().read(), 1);

		backend.unregister(token);
		assert_eq!(backend.registered_count(), 0);

		Ok(())
	}

	#[test]
	fn no_delivery_after_unregister() -> Result<()> {
		// -- Setup & Fixtures
		let backend = SimBackend::new();
		let handle = ProbeHandle::new(2, ProbeKind::RawEvent, 8);
		let token = backend
			.register(ProbeKind::RawEvent, Arc::clone(handle.sink()))
			.map_err(|e| e.to_string())?;
		backend.unregister(token);

		// -- Exec
		let delivered = backend.emit(token, &fx_payload());

		// -- Check
		assert!(!delivered);
		assert_eq!(handle.sink().counter().read(), 0);

		Ok(())
	}

	#[test]
	fn emit_all_reaches_only_matching_kind() -> Result<()> {
		// -- Setup & Fixtures
		let backend = SimBackend::new();
		let raw = ProbeHandle::new(3, ProbeKind::RawEvent, 8);
		let packet = ProbeHandle::new(4, ProbeKind::PacketHook, 8);
		backend
			.register(ProbeKind::RawEvent, Arc::clone(raw.sink()))
			.map_err(|e| e.to_string())?;
		backend
			.register(ProbeKind::PacketHook, Arc::clone(packet.sink()))
			.map_err(|e| e.to_string())?;

		// -- Exec
		let reached = backend.emit_all(ProbeKind::RawEvent, &fx_payload());

		// -- Check
		assert_eq!(reached, 1);
		assert_eq!(raw.sink().counter().read(), 1);
		assert_eq!(packet.sink().counter().read(), 0);

		Ok(())
	}
}

// endregion: --- Tests
