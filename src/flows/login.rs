//! Login initiation: candidate resolution, attempt persistence, authorize URL.

// self
use crate::{
	_prelude::*,
	auth::{AuthAttempt, SessionId},
	error::{ConfigError, Stage},
	flows::{Relay, common},
	host::RequestContext,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, StageOutcome, StageSpan},
	provider::ProviderDescriptor,
};

/// Authorization redirect handed back to the embedding application.
#[derive(Clone, Debug)]
pub struct LoginRedirect {
	/// Fully-formed authorize URL that callers should send the end-user to.
	pub authorize_url: Url,
	/// Callback URL the provider will redirect back to.
	pub redirect_uri: Url,
	/// Opaque state value that must round-trip via the callback.
	pub state: String,
}

impl<C, M> Relay<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Starts a login round for a session.
	///
	/// Resolves the callback-URL candidates from the incoming request,
	/// persists a fresh attempt (silently replacing any prior in-flight one
	/// for the same session), and returns the authorization redirect. The
	/// state token embedded in the URL is the one the callback must echo.
	pub async fn begin_login(
		&self,
		session: &SessionId,
		request: &RequestContext,
	) -> Result<LoginRedirect> {
		const STAGE: Stage = Stage::Authorization;

		let span = StageSpan::new(STAGE, "begin_login");

		obs::record_stage_outcome(STAGE, StageOutcome::Attempt);

		let result = span
			.instrument(async move {
				self.login_metrics.record_started();

				if self.client_secret.is_none() {
					return Err(ConfigError::MissingClientSecret.into());
				}

				let guard = common::session_guard(self, session);
				let _singleflight = guard.lock().await;
				let candidates = self.resolver.candidates(request);
				let attempt = AuthAttempt::begin(candidates, OffsetDateTime::now_utc())?;
				let redirect = redirect_for_attempt(self, &attempt);

				self.store.put_attempt(session, attempt).await?;

				Ok(redirect)
			})
			.await;

		match &result {
			Ok(_) => obs::record_stage_outcome(STAGE, StageOutcome::Success),
			Err(_) => {
				self.login_metrics.record_failed();
				obs::record_stage_outcome(STAGE, StageOutcome::Failure);
			},
		}

		result
	}
}

/// Builds the redirect payload for an attempt's active candidate.
pub(super) fn redirect_for_attempt<C, M>(relay: &Relay<C, M>, attempt: &AuthAttempt) -> LoginRedirect
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let authorize_url = build_authorize_url(
		&relay.descriptor,
		&relay.client_id,
		&attempt.active_redirect_uri,
		&relay.scope,
		&attempt.state_token,
	);

	LoginRedirect {
		authorize_url,
		redirect_uri: attempt.active_redirect_uri.clone(),
		state: attempt.state_token.clone(),
	}
}

pub(super) fn build_authorize_url(
	descriptor: &ProviderDescriptor,
	client_id: &str,
	redirect_uri: &Url,
	scope: &[String],
	state: &str,
) -> Url {
	let mut url = descriptor.endpoints.authorization.clone();
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", client_id);
	pairs.append_pair("redirect_uri", redirect_uri.as_str());

	if let Some(scope_value) = common::format_scope(scope, descriptor.scope_delimiter) {
		pairs.append_pair("scope", &scope_value);
	}

	pairs.append_pair("state", state);

	drop(pairs);

	url
}
