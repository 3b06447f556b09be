//! Wall-clock helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in seconds, or 0 if the system clock is before the epoch.
pub fn current_timestamp() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0)
}

/// Current unix time in milliseconds.
pub fn current_timestamp_millis() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or(0)
}
