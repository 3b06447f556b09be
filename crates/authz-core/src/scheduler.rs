//! Periodic cache maintenance.

use crate::AuthorizationManager;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Runs [`AuthorizationManager::refresh`] on a fixed interval.
///
/// The first pass runs as soon as the scheduler starts. Dropping the
/// scheduler stops it.
pub struct MaintenanceScheduler {
	manager: Arc<AuthorizationManager>,
	interval: Duration,
	handle: Mutex<Option<JoinHandle<()>>>,
}

impl MaintenanceScheduler {
	pub fn new(manager: Arc<AuthorizationManager>, interval: Duration) -> Self {
		Self {
			manager,
			interval,
			handle: Mutex::new(None),
		}
	}

	/// Spawns the maintenance task. Does nothing if it is already running.
	pub fn start(&self) {
		let mut handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
		if handle.as_ref().is_some_and(|task| !task.is_finished()) {
			return;
		}

		let manager = self.manager.clone();
		let mut interval = tokio::time::interval(self.interval);
		interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
		*handle = Some(tokio::spawn(async move {
			loop {
				interval.tick().await;
				let report = manager.refresh().await;
				tracing::debug!(purged = report.total(), "Maintenance pass complete");
			}
		}));
		tracing::info!(interval_secs = self.interval.as_secs(), "Started maintenance scheduler");
	}

	pub fn stop(&self) {
		if let Some(task) = self
			.handle
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.take()
		{
			task.abort();
			tracing::info!("Stopped maintenance scheduler");
		}
	}

	pub fn is_running(&self) -> bool {
		self.handle
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.as_ref()
			.is_some_and(|task| !task.is_finished())
	}
}

impl Drop for MaintenanceScheduler {
	fn drop(&mut self) {
		self.stop();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{dev_wallet, manager, ChainState, FakeChain, FakeRelay, NOW};
	use crate::TransferRequest;
	use alloy_primitives::{Address, U256};

	#[tokio::test(start_paused = true)]
	async fn test_scheduler_purges_expired_entries() {
		let chain = FakeChain::new(ChainState::default());
		let relay = FakeRelay::default();
		let (manager, clock) = manager(&chain, &relay, dev_wallet());

		let auth = manager
			.sign_transfer(TransferRequest {
				to: Address::repeat_byte(0xb0),
				value: U256::from(1u64),
				valid_after: None,
				valid_before: Some(NOW + 60),
			})
			.await
			.unwrap();

		let scheduler = MaintenanceScheduler::new(manager.clone(), Duration::from_secs(30));
		scheduler.start();
		assert!(scheduler.is_running());

		// First pass: nothing has expired yet.
		tokio::time::sleep(Duration::from_secs(1)).await;
		assert!(manager.cached_transfer(auth.nonce).await.unwrap().is_some());

		clock.advance(61);
		tokio::time::sleep(Duration::from_secs(30)).await;
		assert!(manager.cached_transfer(auth.nonce).await.unwrap().is_none());

		scheduler.stop();
		assert!(!scheduler.is_running());
	}

	#[tokio::test(start_paused = true)]
	async fn test_start_is_idempotent() {
		let chain = FakeChain::new(ChainState::default());
		let relay = FakeRelay::default();
		let (manager, _) = manager(&chain, &relay, dev_wallet());

		let scheduler = MaintenanceScheduler::new(manager, Duration::from_secs(30));
		scheduler.start();
		scheduler.start();
		assert!(scheduler.is_running());
		scheduler.stop();
		scheduler.stop();
		assert!(!scheduler.is_running());
	}
}
