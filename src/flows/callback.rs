//! Callback validation, token exchange, profile fetch, and fallback retries.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, AuthAttempt, SessionId},
	error::{Stage, StageError},
	flows::{LoginRedirect, Relay, common, login},
	http::TokenHttpClient,
	identity::{ExternalProfile, LocalUser},
	oauth::{CodeExchanger, TransportErrorMapper},
	obs::{self, StageOutcome, StageSpan},
	profile::ProfileFetcher,
};

/// Query parameters delivered by the provider's redirect back to the callback URL.
#[derive(Clone, Debug, Default)]
pub struct CallbackParams {
	/// Authorization code, present on success.
	pub code: Option<String>,
	/// Echoed state token.
	pub state: Option<String>,
	/// Provider error code, present on refusal.
	pub error: Option<String>,
	/// Optional human-readable refusal description.
	pub error_description: Option<String>,
}
impl CallbackParams {
	/// Parses the raw query string of a callback request.
	///
	/// Unknown parameters are ignored; repeated parameters keep the first
	/// occurrence.
	pub fn from_query(query: &str) -> Self {
		let mut params = Self::default();

		for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
			let slot = match &*key {
				"code" => &mut params.code,
				"state" => &mut params.state,
				"error" => &mut params.error,
				"error_description" => &mut params.error_description,
				_ => continue,
			};

			if slot.is_none() {
				*slot = Some(value.into_owned());
			}
		}

		params
	}
}

/// Result of a processed callback.
#[derive(Clone, Debug)]
pub enum CallbackOutcome {
	/// The login finished and the session is now signed in.
	SignedIn(LocalUser),
	/// A stage failed but a fallback candidate remains; the user must be
	/// sent back through the provider with this fresh redirect.
	RetryAuthorization(LoginRedirect),
}

impl<C, M> Relay<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Processes the provider's redirect back to the callback URL.
	///
	/// Validates the callback, exchanges the code, fetches the profile,
	/// resolves the local user, and marks the session signed in. When the
	/// exchange or profile stage fails and a fallback candidate remains
	/// within the attempt bound, the session is re-armed with the next
	/// candidate and a fresh authorization redirect is returned instead of
	/// the error.
	pub async fn handle_callback(
		&self,
		session: &SessionId,
		params: CallbackParams,
	) -> Result<CallbackOutcome> {
		const STAGE: Stage = Stage::Callback;

		let span = StageSpan::new(STAGE, "handle_callback");

		obs::record_stage_outcome(STAGE, StageOutcome::Attempt);

		let result = span.instrument(self.run_callback(session, params)).await;

		match &result {
			Ok(CallbackOutcome::SignedIn(_)) => {
				self.login_metrics.record_completed();
				obs::record_stage_outcome(STAGE, StageOutcome::Success);
			},
			Ok(CallbackOutcome::RetryAuthorization(_)) =>
				obs::record_stage_outcome(STAGE, StageOutcome::Success),
			Err(_) => {
				self.login_metrics.record_failed();
				obs::record_stage_outcome(STAGE, StageOutcome::Failure);
			},
		}

		result
	}

	async fn run_callback(
		&self,
		session: &SessionId,
		params: CallbackParams,
	) -> Result<CallbackOutcome> {
		let guard = common::session_guard(self, session);
		let _singleflight = guard.lock().await;

		// Validation order matters: a provider refusal and a missing code are
		// reported without consuming the pending attempt, so only an echoed
		// state reaches the consume-once path.
		if let Some(error) = &params.error {
			let message = match &params.error_description {
				Some(description) =>
					format!("Provider returned an error: {error} ({description})"),
				None => format!("Provider returned an error: {error}"),
			};

			return Err(StageError::new(Stage::Callback, message).into());
		}

		let code = params
			.code
			.as_deref()
			.filter(|value| !value.is_empty())
			.ok_or_else(|| StageError::new(Stage::Callback, "Missing authorization code"))?;
		let now = OffsetDateTime::now_utc();
		let mut attempt = self
			.store
			.take_attempt(session)
			.await?
			.filter(|pending| !pending.is_expired(now, self.attempt_ttl))
			.filter(|pending| {
				params.state.as_deref().is_some_and(|state| pending.matches_state(state))
			})
			.ok_or_else(|| StageError::new(Stage::Callback, "Invalid or expired state"))?;

		attempt.record_callback();

		match self.complete_login(session, &attempt, code, now).await {
			Ok(user) => {
				attempt.complete();

				Ok(CallbackOutcome::SignedIn(user))
			},
			Err(err) => self.retry_or_fail(session, attempt, err).await,
		}
	}

	async fn complete_login(
		&self,
		session: &SessionId,
		attempt: &AuthAttempt,
		code: &str,
		now: OffsetDateTime,
	) -> Result<LocalUser> {
		let token = self.exchange_code(attempt, code).await?;
		let profile = self.fetch_profile(&token).await?;
		let user = self.directory.upsert_profile(&profile, &token, now).await?;

		self.store.put_signed_in(session, &user.id).await?;

		Ok(user)
	}

	async fn exchange_code(&self, attempt: &AuthAttempt, code: &str) -> Result<AccessToken> {
		const STAGE: Stage = Stage::TokenExchange;

		let span = StageSpan::new(STAGE, "exchange_code");

		obs::record_stage_outcome(STAGE, StageOutcome::Attempt);

		let result = span
			.instrument(async move {
				let exchanger = <CodeExchanger<C, M>>::from_descriptor(
					&self.descriptor,
					&self.client_id,
					self.client_secret.as_deref(),
					&attempt.active_redirect_uri,
					self.http_client.clone(),
					self.transport_mapper.clone(),
				)?;

				exchanger.exchange(code).await
			})
			.await;

		match &result {
			Ok(_) => obs::record_stage_outcome(STAGE, StageOutcome::Success),
			Err(_) => obs::record_stage_outcome(STAGE, StageOutcome::Failure),
		}

		result
	}

	async fn fetch_profile(&self, token: &AccessToken) -> Result<ExternalProfile> {
		const STAGE: Stage = Stage::Profile;

		let span = StageSpan::new(STAGE, "fetch_profile");

		obs::record_stage_outcome(STAGE, StageOutcome::Attempt);

		let fetcher =
			<ProfileFetcher<C, M>>::new(self.http_client.clone(), self.transport_mapper.clone());
		let result = span.instrument(fetcher.fetch(&self.descriptor, token)).await;

		match &result {
			Ok(_) => obs::record_stage_outcome(STAGE, StageOutcome::Success),
			Err(_) => obs::record_stage_outcome(STAGE, StageOutcome::Failure),
		}

		result
	}

	async fn retry_or_fail(
		&self,
		session: &SessionId,
		mut attempt: AuthAttempt,
		err: Error,
	) -> Result<CallbackOutcome> {
		if !err.is_retryable() || !attempt.can_retry(self.max_attempts) {
			attempt.fail();

			return Err(err);
		}

		// The issued code is bound to the redirect URI it was authorized
		// with, so switching candidates requires a full new authorization
		// round, not a re-exchange.
		attempt.advance()?;

		let redirect = login::redirect_for_attempt(self, &attempt);

		self.store.put_attempt(session, attempt).await?;
		self.login_metrics.record_retry();

		Ok(CallbackOutcome::RetryAuthorization(redirect))
	}
}
