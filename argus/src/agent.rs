use argus_common::{VERDICT_ABORTED, VERDICT_DROP, VERDICT_PASS, VERDICT_REDIRECT, VERDICT_TX};
use argus_core::{ProbeKind, ProbeSnapshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::event::AppEvent;
use crate::trx::Rx;
use crate::Result;

/// Terminal sink for snapshot reports.
pub async fn run_sink(rx: Rx<AppEvent>, shutdown: CancellationToken) -> Result<()> {
	loop {
		tokio::select! {
			_ = shutdown.cancelled() => break,

			evt = rx.recv() => {
				match evt {
					Ok(AppEvent::Report(snap)) => print_report(&snap),
					Err(err) => {
						info!("report channel closed: {err:?}");
						break;
					}
				}
			}
		}
	}

	Ok(())
}

fn print_report(snap: &ProbeSnapshot) {
	let recent = snap
		.recent
		.iter()
		.map(|r| code_to_str(snap.kind, r.opcode_or_verdict))
		.collect::<Vec<_>>()
		.join(", ");

	info!(
		"[{}] probe {} | count {} | missed {} | recent [{}]",
		kind_to_str(snap.kind),
		snap.probe_id,
		snap.count,
		snap.missed,
		recent
	);

	if !snap.key_counts.is_empty() {
		debug!("probe {} per-key totals: {:?}", snap.probe_id, snap.key_counts);
	}
}

fn kind_to_str(kind: ProbeKind) -> &'static str {
	match kind {
		ProbeKind::RawEvent => "SYSCALL",
		ProbeKind::PacketHook => "PACKET",
	}
}

fn code_to_str(kind: ProbeKind, code: i32) -> &'static str {
	match kind {
		ProbeKind::RawEvent => syscall_to_str(code),
		ProbeKind::PacketHook => verdict_to_str(code),
	}
}

fn syscall_to_str(opcode: i32) -> &'static str {
	match opcode {
		0 => "read",
		1 => "write",
		59 => "execve",
		62 => "kill",
		257 => "openat",
		_ => "UNKNOWN",
	}
}

fn verdict_to_str(verdict: i32) -> &'static str {
	match verdict {
		VERDICT_ABORTED => "ABORTED",
		VERDICT_DROP => "DROP",
		VERDICT_PASS => "PASS",
		VERDICT_TX => "TX",
		VERDICT_REDIRECT => "REDIRECT",
		_ => "UNKNOWN",
	}
}
