//! Thread-safe in-memory [`SessionStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{AuthAttempt, SessionId, UserId},
	store::{SessionRecord, SessionStore, StoreFuture},
};

type StoreMap = Arc<RwLock<HashMap<SessionId, SessionRecord>>>;

/// Thread-safe storage backend that keeps sessions in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	fn put_attempt_now(map: StoreMap, session: SessionId, attempt: AuthAttempt) {
		map.write().entry(session).or_default().attempt = Some(attempt);
	}

	fn take_attempt_now(map: StoreMap, session: SessionId) -> Option<AuthAttempt> {
		let mut guard = map.write();
		let record = guard.get_mut(&session)?;
		let attempt = record.attempt.take();

		if record.is_empty() {
			guard.remove(&session);
		}

		attempt
	}

	fn put_signed_in_now(map: StoreMap, session: SessionId, user: UserId) {
		map.write().entry(session).or_default().user = Some(user);
	}

	fn signed_in_now(map: StoreMap, session: SessionId) -> Option<UserId> {
		map.read().get(&session).and_then(|record| record.user.clone())
	}

	fn clear_now(map: StoreMap, session: SessionId) {
		map.write().remove(&session);
	}
}
impl SessionStore for MemoryStore {
	fn put_attempt<'a>(
		&'a self,
		session: &'a SessionId,
		attempt: AuthAttempt,
	) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let session = session.to_owned();

		Box::pin(async move {
			Self::put_attempt_now(map, session, attempt);

			Ok(())
		})
	}

	fn take_attempt<'a>(&'a self, session: &'a SessionId) -> StoreFuture<'a, Option<AuthAttempt>> {
		let map = self.0.clone();
		let session = session.to_owned();

		Box::pin(async move { Ok(Self::take_attempt_now(map, session)) })
	}

	fn put_signed_in<'a>(
		&'a self,
		session: &'a SessionId,
		user: &'a UserId,
	) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let session = session.to_owned();
		let user = user.to_owned();

		Box::pin(async move {
			Self::put_signed_in_now(map, session, user);

			Ok(())
		})
	}

	fn signed_in_user<'a>(&'a self, session: &'a SessionId) -> StoreFuture<'a, Option<UserId>> {
		let map = self.0.clone();
		let session = session.to_owned();

		Box::pin(async move { Ok(Self::signed_in_now(map, session)) })
	}

	fn clear<'a>(&'a self, session: &'a SessionId) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let session = session.to_owned();

		Box::pin(async move {
			Self::clear_now(map, session);

			Ok(())
		})
	}
}
