//! Time source for validity and expiry decisions.

use authz_types::{current_timestamp, current_timestamp_millis};
use std::sync::atomic::{AtomicU64, Ordering};

/// Supplies the current unix time.
pub trait Clock: Send + Sync {
	/// Seconds since the unix epoch.
	fn now(&self) -> u64;

	/// Milliseconds since the unix epoch.
	fn now_millis(&self) -> u64 {
		self.now().saturating_mul(1000)
	}
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> u64 {
		current_timestamp()
	}

	fn now_millis(&self) -> u64 {
		current_timestamp_millis()
	}
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
	seconds: AtomicU64,
}

impl ManualClock {
	pub fn new(start: u64) -> Self {
		Self {
			seconds: AtomicU64::new(start),
		}
	}

	pub fn set(&self, seconds: u64) {
		self.seconds.store(seconds, Ordering::SeqCst);
	}

	pub fn advance(&self, seconds: u64) {
		self.seconds.fetch_add(seconds, Ordering::SeqCst);
	}
}

impl Clock for ManualClock {
	fn now(&self) -> u64 {
		self.seconds.load(Ordering::SeqCst)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_manual_clock_moves_only_when_told() {
		let clock = ManualClock::new(1_700_000_000);
		assert_eq!(clock.now(), 1_700_000_000);
		assert_eq!(clock.now_millis(), 1_700_000_000_000);

		clock.advance(3601);
		assert_eq!(clock.now(), 1_700_003_601);

		clock.set(5);
		assert_eq!(clock.now(), 5);
	}

	#[test]
	fn test_system_clock_is_current() {
		let clock = SystemClock;
		assert!(clock.now() > 1_600_000_000);
		assert!(clock.now_millis() / 1000 >= clock.now() - 1);
	}
}
