// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for login flow activity.
#[derive(Debug, Default)]
pub struct LoginMetrics {
	started: AtomicU64,
	completed: AtomicU64,
	failed: AtomicU64,
	retries: AtomicU64,
}
impl LoginMetrics {
	/// Returns the number of login rounds started.
	pub fn started(&self) -> u64 {
		self.started.load(Ordering::Relaxed)
	}

	/// Returns the number of logins that finished with a signed-in user.
	pub fn completed(&self) -> u64 {
		self.completed.load(Ordering::Relaxed)
	}

	/// Returns the number of logins that surfaced a terminal error.
	pub fn failed(&self) -> u64 {
		self.failed.load(Ordering::Relaxed)
	}

	/// Returns the number of fallback retries issued after stage failures.
	pub fn retries(&self) -> u64 {
		self.retries.load(Ordering::Relaxed)
	}

	pub(crate) fn record_started(&self) {
		self.started.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_completed(&self) {
		self.completed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failed(&self) {
		self.failed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_retry(&self) {
		self.retries.fetch_add(1, Ordering::Relaxed);
	}
}
