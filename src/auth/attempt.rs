//! Per-session login attempt state and the single-use anti-CSRF state token.

// std
use std::collections::VecDeque;
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
// self
use crate::{_prelude::*, error::ConfigError};

const STATE_TOKEN_BYTES: usize = 32;

/// Lifecycle of a login attempt.
///
/// `Pending` and `CallbackReceived` are the only non-terminal states; a
/// `Completed` or `Failed` attempt is discarded rather than stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
	/// Authorization redirect issued; waiting for the provider callback.
	Pending,
	/// Callback validated; exchange and profile fetch in flight.
	CallbackReceived,
	/// Login established a session.
	Completed,
	/// Retries exhausted or a terminal error occurred.
	Failed,
}

/// Ephemeral login attempt owned by a single browser session.
///
/// The attempt records which callback candidate the authorization redirect
/// was issued with so the token exchange can present a byte-identical
/// `redirect_uri`, plus the queue of untried candidates the fallback
/// coordinator walks on exchange failures.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthAttempt {
	/// Opaque single-use anti-CSRF token round-tripped via the provider.
	pub state_token: String,
	/// Callback candidate the current authorization redirect was issued with.
	pub active_redirect_uri: Url,
	/// Ordered queue of remaining untried candidates.
	pub fallback_redirect_uris: VecDeque<Url>,
	/// Number of fallback retries performed so far.
	pub attempt_count: u32,
	/// Creation instant, bounding the attempt's lifetime.
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	/// Lifecycle status.
	pub status: AttemptStatus,
}
impl AuthAttempt {
	/// Starts a fresh attempt over the provided candidate list.
	///
	/// The first candidate becomes active and the rest are queued in order.
	pub fn begin(candidates: Vec<Url>, now: OffsetDateTime) -> Result<Self, ConfigError> {
		let mut queue: VecDeque<Url> = candidates.into();
		let active = queue.pop_front().ok_or(ConfigError::NoCallbackCandidates)?;

		Ok(Self {
			state_token: mint_state_token(),
			active_redirect_uri: active,
			fallback_redirect_uris: queue,
			attempt_count: 0,
			created_at: now,
			status: AttemptStatus::Pending,
		})
	}

	/// Exact comparison against the state presented on the callback.
	pub fn matches_state(&self, presented: &str) -> bool {
		self.state_token == presented
	}

	/// Whether the attempt outlived the configured TTL.
	pub fn is_expired(&self, now: OffsetDateTime, ttl: Duration) -> bool {
		now - self.created_at > ttl
	}

	/// Marks the callback as received and validated.
	pub fn record_callback(&mut self) {
		self.status = AttemptStatus::CallbackReceived;
	}

	/// Whether the fallback coordinator may issue another authorization redirect.
	pub fn can_retry(&self, max_attempts: u32) -> bool {
		!self.fallback_redirect_uris.is_empty() && self.attempt_count < max_attempts
	}

	/// Advances to the next fallback candidate with a fresh state token.
	///
	/// A previously issued authorization code cannot be reused with a new
	/// redirect URI, so the caller must send the user back through the
	/// provider's consent screen with the returned attempt state.
	pub fn advance(&mut self) -> Result<(), ConfigError> {
		let next = self.fallback_redirect_uris.pop_front().ok_or(ConfigError::NoCallbackCandidates)?;

		self.active_redirect_uri = next;
		self.state_token = mint_state_token();
		self.attempt_count += 1;
		self.status = AttemptStatus::Pending;

		Ok(())
	}

	/// Marks the attempt as terminally successful.
	pub fn complete(&mut self) {
		self.status = AttemptStatus::Completed;
	}

	/// Marks the attempt as terminally failed.
	pub fn fail(&mut self) {
		self.status = AttemptStatus::Failed;
	}
}

fn mint_state_token() -> String {
	let mut bytes = [0_u8; STATE_TOKEN_BYTES];

	rand::rng().fill(&mut bytes[..]);

	URL_SAFE_NO_PAD.encode(bytes)
}
