use std::sync::Arc;
use std::time::Duration;

use argus_common::{
	EventHeader, PacketEvent, SyscallEvent, EVENT_KIND_PACKET, EVENT_KIND_SYSCALL, VERDICT_DROP, VERDICT_PASS,
	VERDICT_REDIRECT, VERDICT_TX,
};
use argus_core::{ProbeKind, SimBackend};
use tokio_util::sync::CancellationToken;
use zerocopy::IntoBytes;

use crate::Result;

// Rotating synthetic workload: x86_64 syscall numbers with the command
// that would plausibly issue them, uids, and packet verdicts.
const SYSCALLS: &[(i32, &str)] = &[(59, "bash"), (257, "cat"), (1, "dd"), (62, "kill"), (0, "sshd")];
const UIDS: &[u32] = &[0, 1000, 1001];
const VERDICTS: &[i32] = &[VERDICT_PASS, VERDICT_PASS, VERDICT_DROP, VERDICT_TX, VERDICT_REDIRECT];

/// Feeds the simulated backend with synthetic syscall and packet events at a
/// fixed rate, standing in for a kernel-side event source.
pub struct DriverWorker {
	backend: Arc<SimBackend>,
	rate: u32,
	shutdown: CancellationToken,
}

impl DriverWorker {
	pub fn start(backend: Arc<SimBackend>, rate: u32, shutdown: CancellationToken) -> Result<Self> {
		Ok(DriverWorker { backend, rate, shutdown })
	}

	pub async fn run(self) -> Result<()> {
		let period = Duration::from_micros((1_000_000 / u64::from(self.rate.max(1))).max(1));
		let mut ticker = tokio::time::interval(period);
		let mut step = 0usize;

		loop {
			tokio::select! {
				_ = self.shutdown.cancelled() => break,

				_ = ticker.tick() => {
					self.emit_round(step);
					step = step.wrapping_add(1);
				}
			}
		}

		Ok(())
	}

	fn emit_round(&self, step: usize) {
		let (opcode, comm) = SYSCALLS[step % SYSCALLS.len()];
		let syscall = SyscallEvent {
			header: EventHeader::new(EVENT_KIND_SYSCALL),
			opcode,
			pid: 1000 + (step % 7) as u32,
			uid: UIDS[step % UIDS.len()],
			comm: comm_bytes(comm),
		};
		self.backend.emit_all(ProbeKind::RawEvent, syscall.as_bytes());

		let packet = PacketEvent {
			header: EventHeader::new(EVENT_KIND_PACKET),
			verdict: VERDICTS[step % VERDICTS.len()],
			ifindex: 1 + (step % 2) as u32,
			pkt_len: 64 + ((step * 13) % 1400) as u32,
		};
		self.backend.emit_all(ProbeKind::PacketHook, packet.as_bytes());
	}
}

fn comm_bytes(comm: &str) -> [u8; 16] {
	let mut out = [0u8; 16];
	let bytes = comm.as_bytes();
	let len = bytes.len().min(15); // NUL-terminated like a task comm
	out[..len].copy_from_slice(&bytes[..len]);
	out
}
