/// Monotonic clock reading in nanoseconds, for event timestamps.
///
/// CLOCK_MONOTONIC keeps record ordering stable across wall-clock jumps.
pub fn monotonic_ns() -> u64 {
	let mut ts = libc::timespec { tv_sec: 0, tv_nsec: 0 };
	// SAFETY: `ts` is a valid, writable timespec; CLOCK_MONOTONIC cannot fail
	// on the platforms this runs on.
	unsafe {
		libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
	}
	(ts.tv_sec as u64) * 1_000_000_000 + ts.tv_nsec as u64
}

// region:    --- Tests


// endregion: --- Tests
