//! Time helpers. All timestamps used by the directory and cache are
//! milliseconds since the Unix epoch, stored as `u64`.
use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_msec() -> u64 {
	now_duration().as_millis() as u64
}

fn now_duration() -> std::time::Duration {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("clock went backwards before the Unix epoch")
}

pub fn msec_to_rfc3339(msec: u64) -> String {
	let secs = (msec / 1000) as i64;
	let nsecs = ((msec % 1000) * 1_000_000) as u32;
	match chrono::DateTime::<chrono::Utc>::from_timestamp(secs, nsecs) {
		Some(dt) => dt.to_rfc3339(),
		None => "invalid-timestamp".to_string(),
	}
}
