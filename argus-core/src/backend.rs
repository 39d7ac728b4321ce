use std::sync::Arc;

use derive_more::Display;

use crate::probe::ProbeSink;

/// The observation point flavors the core knows how to account for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
	/// Tracepoint-style hook, events carry a syscall opcode.
	RawEvent,
	/// Packet-hook, events carry a packet verdict.
	PacketHook,
}

/// Opaque handle to one backend registration. Minted by the backend on
/// `register`, spent on `unregister`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendToken(u64);

impl BackendToken {
	pub fn raw(&self) -> u64 {
		self.0
	}
}

impl From<u64> for BackendToken {
	fn from(raw: u64) -> Self {
		Self(raw)
	}
}

/// Why the backend refused a registration.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum BackendRejection {
	#[display("hook kind {_0:?} is not supported")]
	UnsupportedKind(ProbeKind),
	#[display("registration denied, insufficient privilege")]
	PermissionDenied,
	#[display("backend is at capacity")]
	CapacityExhausted,
}

/// The external collaborator that detects events and invokes the sink.
///
/// Contract: after a successful `register` the backend may call
/// [`ProbeSink::deliver`] zero or more times, from any number of dispatch
/// contexts in parallel. Once `unregister` returns, no further delivery
/// happens for that token.
pub trait ExecutionBackend: Send + Sync {
	fn register(&self, kind: ProbeKind, sink: Arc<ProbeSink>) -> core::result::Result<BackendToken, BackendRejection>;

	/// Always succeeds. Fire-and-forget from the caller's perspective.
	fn unregister(&self, token: BackendToken);
}

// region:    --- Error Boilerplate

impl std::error::Error for BackendRejection {}

// endregion: --- Error Boilerplate
