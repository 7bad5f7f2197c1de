//! Local user records and the directory contract that resolves external profiles.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, SubjectId, UserId},
	store::StoreFuture,
};

/// Transient identity snapshot fetched from the provider.
///
/// Only `subject_id` is required for identity resolution; the remaining
/// fields are enrichment and default to empty values on the stored record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalProfile {
	/// Provider-stable subject identifier.
	pub subject_id: SubjectId,
	/// Display name reported by the provider.
	pub display_name: String,
	/// Email address, when the provider exposed one.
	pub email: Option<String>,
	/// Avatar/picture URL, when the provider exposed one.
	pub picture_url: Option<String>,
	/// Public profile URL, when the provider exposed one.
	pub profile_url: Option<String>,
}

/// Durable user record keyed by the provider's subject identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
	/// Locally generated identifier.
	pub id: UserId,
	/// Provider-stable subject identifier (unique per user).
	pub external_subject_id: SubjectId,
	/// Display name copied from the most recent login.
	pub display_name: String,
	/// Email address, empty when never reported.
	pub email: String,
	/// Avatar/picture URL, empty when never reported.
	pub picture_url: String,
	/// Public profile URL, empty when never reported.
	pub profile_url: String,
	/// Most recent access token, kept for potential re-use.
	pub access_token: AccessToken,
	/// First-login instant.
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	/// Most-recent-login instant.
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
}
impl LocalUser {
	fn from_profile(profile: &ExternalProfile, token: &AccessToken, now: OffsetDateTime) -> Self {
		Self {
			id: UserId::generate(),
			external_subject_id: profile.subject_id.clone(),
			display_name: profile.display_name.clone(),
			email: profile.email.clone().unwrap_or_default(),
			picture_url: profile.picture_url.clone().unwrap_or_default(),
			profile_url: profile.profile_url.clone().unwrap_or_default(),
			access_token: token.clone(),
			created_at: now,
			updated_at: now,
		}
	}

	fn refresh_from(&mut self, profile: &ExternalProfile, token: &AccessToken, now: OffsetDateTime) {
		self.display_name = profile.display_name.clone();

		if let Some(email) = profile.email.as_deref() {
			self.email = email.to_owned();
		}
		if let Some(picture) = profile.picture_url.as_deref() {
			self.picture_url = picture.to_owned();
		}
		if let Some(url) = profile.profile_url.as_deref() {
			self.profile_url = url.to_owned();
		}

		self.access_token = token.clone();
		self.updated_at = now;
	}
}

/// Persistence contract for user records.
///
/// `upsert_profile` must be atomic per subject id: concurrent calls for the
/// same subject yield a single record, which requires a uniqueness guarantee
/// in the backend rather than an application-level check-then-insert.
pub trait UserDirectory
where
	Self: Send + Sync,
{
	/// Fetches the user keyed by the provider subject identifier, if present.
	fn find_by_subject<'a>(
		&'a self,
		subject: &'a SubjectId,
	) -> StoreFuture<'a, Option<LocalUser>>;

	/// Finds or creates the user for the profile, refreshing mutable fields.
	fn upsert_profile<'a>(
		&'a self,
		profile: &'a ExternalProfile,
		token: &'a AccessToken,
		now: OffsetDateTime,
	) -> StoreFuture<'a, LocalUser>;
}

type DirectoryMap = Arc<RwLock<HashMap<SubjectId, LocalUser>>>;

/// Thread-safe in-memory [`UserDirectory`] for tests and demos.
///
/// The subject-keyed map plus a single write lock gives the per-subject
/// atomicity the trait requires.
#[derive(Clone, Debug, Default)]
pub struct MemoryDirectory(DirectoryMap);
impl MemoryDirectory {
	fn upsert_now(
		map: DirectoryMap,
		profile: &ExternalProfile,
		token: &AccessToken,
		now: OffsetDateTime,
	) -> LocalUser {
		let mut guard = map.write();

		guard
			.entry(profile.subject_id.clone())
			.and_modify(|user| user.refresh_from(profile, token, now))
			.or_insert_with(|| LocalUser::from_profile(profile, token, now))
			.clone()
	}
}
impl UserDirectory for MemoryDirectory {
	fn find_by_subject<'a>(
		&'a self,
		subject: &'a SubjectId,
	) -> StoreFuture<'a, Option<LocalUser>> {
		let map = self.0.clone();
		let subject = subject.to_owned();

		Box::pin(async move { Ok(map.read().get(&subject).cloned()) })
	}

	fn upsert_profile<'a>(
		&'a self,
		profile: &'a ExternalProfile,
		token: &'a AccessToken,
		now: OffsetDateTime,
	) -> StoreFuture<'a, LocalUser> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::upsert_now(map, profile, token, now)) })
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use tokio::runtime::Runtime;
	// self
	use super::*;

	fn profile(subject: &str, name: &str, email: Option<&str>) -> ExternalProfile {
		ExternalProfile {
			subject_id: SubjectId::new(subject).expect("Subject fixture should be valid."),
			display_name: name.to_owned(),
			email: email.map(str::to_owned),
			picture_url: None,
			profile_url: None,
		}
	}

	#[test]
	fn upsert_is_idempotent_per_subject() {
		let directory = MemoryDirectory::default();
		let rt = Runtime::new().expect("Failed to build Tokio runtime for directory test.");
		let now = OffsetDateTime::now_utc();
		let first = rt
			.block_on(directory.upsert_profile(
				&profile("12345", "Ada", Some("ada@example.com")),
				&AccessToken::new("token-1"),
				now,
			))
			.expect("First upsert should succeed.");
		let later = now + Duration::minutes(5);
		let second = rt
			.block_on(directory.upsert_profile(
				&profile("12345", "Ada Lovelace", None),
				&AccessToken::new("token-2"),
				later,
			))
			.expect("Second upsert should succeed.");

		assert_eq!(second.id, first.id, "Resolution must not duplicate the user.");
		assert_eq!(second.display_name, "Ada Lovelace");
		assert_eq!(second.email, "ada@example.com", "Absent fields must not erase stored ones.");
		assert_eq!(second.access_token.expose(), "token-2");
		assert_eq!(second.created_at, now);
		assert_eq!(second.updated_at, later);
	}

	#[test]
	fn absent_optional_fields_default_to_empty() {
		let directory = MemoryDirectory::default();
		let rt = Runtime::new().expect("Failed to build Tokio runtime for directory test.");
		let user = rt
			.block_on(directory.upsert_profile(
				&profile("67890", "Grace", None),
				&AccessToken::new("token"),
				OffsetDateTime::now_utc(),
			))
			.expect("Upsert should succeed.");

		assert_eq!(user.email, "");
		assert_eq!(user.picture_url, "");
		assert_eq!(user.profile_url, "");
	}

	#[test]
	fn find_by_subject_sees_upserted_users() {
		let directory = MemoryDirectory::default();
		let rt = Runtime::new().expect("Failed to build Tokio runtime for directory test.");
		let subject = SubjectId::new("555").expect("Subject fixture should be valid.");

		assert!(
			rt.block_on(directory.find_by_subject(&subject))
				.expect("Lookup should not fail.")
				.is_none()
		);

		rt.block_on(directory.upsert_profile(
			&profile("555", "Lin", None),
			&AccessToken::new("token"),
			OffsetDateTime::now_utc(),
		))
		.expect("Upsert should succeed.");

		let found = rt
			.block_on(directory.find_by_subject(&subject))
			.expect("Lookup should not fail.")
			.expect("Upserted user should be found.");

		assert_eq!(found.external_subject_id, subject);
	}
}
