use zerocopy_derive::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub const EVENT_KIND_SYSCALL: u8 = 1;
pub const EVENT_KIND_PACKET: u8 = 2;

// Packet verdicts, numbering follows the XDP action codes.
pub const VERDICT_ABORTED: i32 = 0;
pub const VERDICT_DROP: i32 = 1;
pub const VERDICT_PASS: i32 = 2;
pub const VERDICT_TX: i32 = 3;
pub const VERDICT_REDIRECT: i32 = 4;

#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct EventHeader {
	pub kind: u8, // 1 => SYSCALL, 2 => PACKET
	pub _padding: [u8; 3],
}

impl EventHeader {
	pub fn new(kind: u8) -> Self {
		Self { kind, _padding: [0; 3] }
	}
}

/// Payload produced per observed syscall entry.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct SyscallEvent {
	pub header: EventHeader,
	pub opcode: i32,
	pub pid: u32,
	pub uid: u32,
	pub comm: [u8; 16],
}

/// Payload produced per packet-hook decision.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct PacketEvent {
	pub header: EventHeader,
	pub verdict: i32,
	pub ifindex: u32,
	pub pkt_len: u32,
}
