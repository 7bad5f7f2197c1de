//! Storage contracts and built-in session store implementations.
//!
//! The authorization redirect and its callback are separate HTTP requests
//! that may land on different server processes, so pending attempts must
//! live in a store shared across processes rather than in-process state.
//! [`SessionStore`] is that contract; [`MemoryStore`] serves tests and
//! single-process demos, [`FileStore`] is the minimal shared backend.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{AuthAttempt, SessionId, UserId},
};

/// Boxed future returned by session store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Cross-process session storage contract.
///
/// A session holds at most one pending [`AuthAttempt`]; storing a new one
/// overwrites any prior attempt. [`SessionStore::take_attempt`] is the
/// consume-once primitive: it removes the attempt atomically so a state
/// token can never be validated twice.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Stores the session's pending attempt, replacing any prior one.
	fn put_attempt<'a>(
		&'a self,
		session: &'a SessionId,
		attempt: AuthAttempt,
	) -> StoreFuture<'a, ()>;

	/// Atomically removes and returns the session's pending attempt.
	///
	/// Callbacks consume the attempt before inspecting the echoed state, so a
	/// forged state burns the in-flight login rather than leaving a token an
	/// attacker can keep probing. A peek-then-take variant would reopen the
	/// replay window between the two calls.
	fn take_attempt<'a>(&'a self, session: &'a SessionId) -> StoreFuture<'a, Option<AuthAttempt>>;

	/// Records the authenticated user for the session.
	fn put_signed_in<'a>(&'a self, session: &'a SessionId, user: &'a UserId)
	-> StoreFuture<'a, ()>;

	/// Returns the authenticated user for the session, if any.
	fn signed_in_user<'a>(&'a self, session: &'a SessionId) -> StoreFuture<'a, Option<UserId>>;

	/// Removes all state held for the session.
	fn clear<'a>(&'a self, session: &'a SessionId) -> StoreFuture<'a, ()>;
}

/// Per-session record persisted by the built-in stores.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionRecord {
	/// Pending login attempt, if one is in flight.
	pub attempt: Option<AuthAttempt>,
	/// Authenticated user established by a completed login.
	pub user: Option<UserId>,
}
impl SessionRecord {
	fn is_empty(&self) -> bool {
		self.attempt.is_none() && self.user.is_none()
	}
}

/// Error type produced by [`SessionStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;
	use crate::error::Error;

	#[test]
	fn store_error_converts_into_relay_error_with_source() {
		let store_error = StoreError::Backend { message: "session store unreachable".into() };
		let relay_error: Error = store_error.clone().into();

		assert!(matches!(relay_error, Error::Storage(_)));
		assert!(relay_error.to_string().contains("session store unreachable"));

		let source = StdError::source(&relay_error)
			.expect("Relay error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn empty_records_are_detected() {
		let mut record = SessionRecord::default();

		assert!(record.is_empty());

		record.user = Some(crate::auth::UserId::generate());

		assert!(!record.is_empty());
	}
}
