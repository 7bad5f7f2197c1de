//! High-level login orchestration over the relay's transport and stores.

pub mod common;
pub mod login;

mod callback;
mod metrics;

pub use callback::*;
pub use login::*;
pub use metrics::LoginMetrics;

// self
use crate::{
	_prelude::*,
	auth::{SessionId, UserId},
	host::HostDomainResolver,
	http::TokenHttpClient,
	identity::UserDirectory,
	oauth::TransportErrorMapper,
	provider::ProviderDescriptor,
	store::SessionStore,
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Relay specialized for the crate's default reqwest transport stack.
pub type ReqwestRelay = Relay<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Coordinates the authorization-code login flow against a single provider.
///
/// The relay owns the HTTP client, session store, user directory, provider
/// descriptor, and callback-host resolver so the login and callback
/// operations can focus on flow logic (candidate resolution, state
/// handling, exchanges, identity resolution). Client credentials are stored
/// alongside the descriptor so the configured client-auth method is applied
/// consistently at the token endpoint.
pub struct Relay<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound provider request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Session store that persists in-flight attempts and signed-in users.
	pub store: Arc<dyn SessionStore>,
	/// Directory that resolves external profiles into local users.
	pub directory: Arc<dyn UserDirectory>,
	/// Provider descriptor that defines OAuth endpoints and quirks.
	pub descriptor: ProviderDescriptor,
	/// Resolver that produces the ordered callback-URL candidate list.
	pub resolver: HostDomainResolver,
	/// OAuth 2.0 client identifier used in every request.
	pub client_id: String,
	/// Optional client secret for confidential authentication methods.
	pub client_secret: Option<String>,
	/// Scope values requested at the authorization endpoint.
	pub scope: Vec<String>,
	/// Upper bound on authorization rounds per login (initial round included).
	pub max_attempts: u32,
	/// Age past which a pending attempt is treated as not found.
	pub attempt_ttl: Duration,
	/// Shared metrics recorder for login flow outcomes.
	pub login_metrics: Arc<LoginMetrics>,
	session_guards: Arc<Mutex<HashMap<SessionId, Arc<AsyncMutex<()>>>>>,
}
impl<C, M> Relay<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	const DEFAULT_ATTEMPT_TTL: Duration = Duration::minutes(10);
	const DEFAULT_MAX_ATTEMPTS: u32 = 3;

	/// Creates a relay that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		store: Arc<dyn SessionStore>,
		directory: Arc<dyn UserDirectory>,
		descriptor: ProviderDescriptor,
		resolver: HostDomainResolver,
		client_id: impl Into<String>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			store,
			directory,
			descriptor,
			resolver,
			client_id: client_id.into(),
			client_secret: None,
			scope: Vec::new(),
			max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
			attempt_ttl: Self::DEFAULT_ATTEMPT_TTL,
			login_metrics: Default::default(),
			session_guards: Default::default(),
		}
	}

	/// Sets or replaces the client secret used for confidential client auth modes.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}

	/// Replaces the scope values requested during authorization.
	pub fn with_scope<I, S>(mut self, scope: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scope = scope.into_iter().map(Into::into).collect();

		self
	}

	/// Overrides the authorization-round bound (defaults to 3).
	pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
		self.max_attempts = max_attempts;

		self
	}

	/// Overrides the pending-attempt TTL (defaults to 10 minutes).
	pub fn with_attempt_ttl(mut self, ttl: Duration) -> Self {
		self.attempt_ttl = if ttl.is_negative() { Duration::ZERO } else { ttl };

		self
	}

	/// Returns the signed-in user for a session, if any.
	pub async fn signed_in_user(&self, session: &SessionId) -> Result<Option<UserId>> {
		Ok(self.store.signed_in_user(session).await?)
	}

	/// Clears all login state associated with a session.
	pub async fn sign_out(&self, session: &SessionId) -> Result<()> {
		Ok(self.store.clear(session).await?)
	}
}
#[cfg(feature = "reqwest")]
impl Relay<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a new relay for the provided descriptor and client identifier.
	///
	/// The relay provisions its own reqwest-backed transport so callers do not
	/// need to pass HTTP handles explicitly. Use [`Relay::with_client_secret`]
	/// to attach the confidential client secret the token exchange requires.
	pub fn new(
		store: Arc<dyn SessionStore>,
		directory: Arc<dyn UserDirectory>,
		descriptor: ProviderDescriptor,
		resolver: HostDomainResolver,
		client_id: impl Into<String>,
	) -> Self {
		Self::with_http_client(
			store,
			directory,
			descriptor,
			resolver,
			client_id,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}
}
impl<C, M> Clone for Relay<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			store: self.store.clone(),
			directory: self.directory.clone(),
			descriptor: self.descriptor.clone(),
			resolver: self.resolver.clone(),
			client_id: self.client_id.clone(),
			client_secret: self.client_secret.clone(),
			scope: self.scope.clone(),
			max_attempts: self.max_attempts,
			attempt_ttl: self.attempt_ttl,
			login_metrics: self.login_metrics.clone(),
			session_guards: self.session_guards.clone(),
		}
	}
}
impl<C, M> Debug for Relay<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Relay")
			.field("descriptor", &self.descriptor)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("scope", &self.scope)
			.field("max_attempts", &self.max_attempts)
			.finish()
	}
}
