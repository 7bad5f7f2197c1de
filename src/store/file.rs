//! Simple file-backed [`SessionStore`] shared by co-located server processes.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{AuthAttempt, SessionId, UserId},
	store::{SessionRecord, SessionStore, StoreError, StoreFuture},
};

/// Persists session records to a JSON file after each mutation.
///
/// The snapshot is rewritten through a temp file + rename so concurrent
/// readers never observe a torn write.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<HashMap<SessionId, SessionRecord>>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = if path.exists() { Self::load_snapshot(&path)? } else { HashMap::new() };

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	fn load_snapshot(path: &Path) -> Result<HashMap<SessionId, SessionRecord>, StoreError> {
		if !path.exists() {
			return Ok(HashMap::new());
		}

		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		let entries: Vec<(SessionId, SessionRecord)> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(entries.into_iter().collect())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}
		Ok(())
	}

	fn persist_locked(&self, contents: &HashMap<SessionId, SessionRecord>) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let snapshot: Vec<_> = contents.iter().collect();
		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl SessionStore for FileStore {
	fn put_attempt<'a>(
		&'a self,
		session: &'a SessionId,
		attempt: AuthAttempt,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			guard.entry(session.to_owned()).or_default().attempt = Some(attempt);
			self.persist_locked(&guard)?;

			Ok(())
		})
	}

	fn take_attempt<'a>(&'a self, session: &'a SessionId) -> StoreFuture<'a, Option<AuthAttempt>> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let attempt = match guard.get_mut(session) {
				Some(record) => {
					let attempt = record.attempt.take();

					if record.attempt.is_none() && record.user.is_none() {
						guard.remove(session);
					}

					attempt
				},
				None => None,
			};

			if attempt.is_some() {
				self.persist_locked(&guard)?;
			}

			Ok(attempt)
		})
	}

	fn put_signed_in<'a>(
		&'a self,
		session: &'a SessionId,
		user: &'a UserId,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			guard.entry(session.to_owned()).or_default().user = Some(user.to_owned());
			self.persist_locked(&guard)?;

			Ok(())
		})
	}

	fn signed_in_user<'a>(&'a self, session: &'a SessionId) -> StoreFuture<'a, Option<UserId>> {
		Box::pin(async move {
			Ok(self.inner.read().get(session).and_then(|record| record.user.clone()))
		})
	}

	fn clear<'a>(&'a self, session: &'a SessionId) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			if guard.remove(session).is_some() {
				self.persist_locked(&guard)?;
			}

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use tokio::runtime::Runtime;
	// self
	use super::*;

	fn temp_path() -> PathBuf {
		let unique = format!(
			"oauth2_relay_file_store_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	fn build_attempt() -> AuthAttempt {
		let candidates = vec![
			Url::parse("https://app.example.com/auth/callback")
				.expect("Candidate fixture should parse successfully."),
		];

		AuthAttempt::begin(candidates, OffsetDateTime::now_utc())
			.expect("Attempt fixture should begin successfully.")
	}

	#[test]
	fn save_and_reload_round_trip() {
		let path = temp_path();
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let session = SessionId::new("session-file").expect("Session fixture should be valid.");
		let attempt = build_attempt();
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(store.put_attempt(&session, attempt.clone()))
			.expect("Failed to save fixture attempt to file store.");
		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");
		let fetched = rt
			.block_on(reopened.take_attempt(&session))
			.expect("Failed to take fixture attempt from file store.")
			.expect("File store lost attempt after reopen.");

		assert_eq!(fetched.state_token, attempt.state_token);
		assert_eq!(fetched.active_redirect_uri, attempt.active_redirect_uri);

		let replay = rt
			.block_on(reopened.take_attempt(&session))
			.expect("Second take should not fail at the store level.");

		assert!(replay.is_none(), "Attempts must be consumable exactly once.");

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}
}
