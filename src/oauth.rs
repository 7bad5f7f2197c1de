//! Internal OAuth client facade for the authorization-code exchange.
//!
//! The facade is rebuilt for every exchange with the attempt's active
//! redirect URI threaded in as a parameter. The redirect URI is
//! attempt-scoped data, not client configuration, so nothing mutates a
//! shared client between requests; the URI presented to the token endpoint
//! is byte-identical to the one the matching authorization redirect carried.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, RedirectUrl, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	error::{ConfigError, Stage, StageError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	provider::{ClientAuthMethod, ProviderDescriptor},
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Maps HTTP transport failures into relay [`Error`] values.
///
/// Custom transports implement this so their error types classify into the
/// stage taxonomy; timeouts and other network failures at the exchange or
/// profile step stay retryable against fallback candidates.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a relay error.
	fn map_transport_error(
		&self,
		stage: Stage,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		stage: Stage,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(stage, meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) =>
				StageError::new(stage, format!("I/O error while calling the provider: {inner}"))
					.into(),
			HttpClientError::Other(message) =>
				StageError::new(stage, format!("HTTP client error: {message}")).into(),
			_ => StageError::new(stage, "HTTP client error while calling the provider").into(),
		}
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(stage: Stage, meta: Option<&ResponseMetadata>, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}

	let message = if err.is_timeout() {
		"Request timed out while calling the provider".to_owned()
	} else {
		format!("Network error while calling the provider: {err}")
	};
	let mut stage_error = StageError::new(stage, message);

	if let Some(status) = meta.and_then(|value| value.status).or_else(|| reqwest_status(&err)) {
		stage_error = stage_error.with_details(format!("http_status={status}"));
	}

	stage_error.into()
}

#[cfg(feature = "reqwest")]
fn reqwest_status(err: &ReqwestError) -> Option<u16> {
	err.status().map(|code| code.as_u16())
}

/// Per-exchange facade over the `oauth2` crate's typed client.
pub(crate) struct CodeExchanger<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> CodeExchanger<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds a configured client for one exchange against the descriptor's
	/// token endpoint, presenting the provided redirect URI.
	pub(crate) fn from_descriptor(
		descriptor: &ProviderDescriptor,
		client_id: &str,
		client_secret: Option<&str>,
		redirect_uri: &Url,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(descriptor.endpoints.authorization.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let token_url = TokenUrl::new(descriptor.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let redirect_url = RedirectUrl::new(redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		let secret = client_secret.ok_or(ConfigError::MissingClientSecret)?;
		let mut oauth_client = BasicClient::new(ClientId::new(client_id.to_owned()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_client_secret(ClientSecret::new(secret.to_owned()))
			.set_redirect_uri(redirect_url);

		if matches!(descriptor.preferred_client_auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self {
			oauth_client,
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		})
	}

	/// Exchanges an authorization code for an access token.
	///
	/// Any non-success response, and any success response missing the token
	/// field, maps to a `token_exchange` stage error carrying the provider's
	/// raw body in `details`.
	pub(crate) fn exchange<'a>(&'a self, code: &'a str) -> FacadeFuture<'a, AccessToken> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let request = self.oauth_client.exchange_code(AuthorizationCode::new(code.to_owned()));
			let response = request
				.request_async(&instrumented)
				.await
				.map_err(|err| map_request_error(meta.take(), err, self.error_mapper.as_ref()))?;

			Ok(AccessToken::new(response.access_token().secret().to_owned()))
		})
	}
}

fn map_request_error<E, M>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(response),
		RequestTokenError::Request(error) =>
			mapper.map_transport_error(Stage::TokenExchange, meta_ref, error),
		RequestTokenError::Parse(error, body) => StageError::new(
			Stage::TokenExchange,
			format!("Token endpoint returned a malformed response: {error}"),
		)
		.with_details(String::from_utf8_lossy(&body).into_owned())
		.into(),
		RequestTokenError::Other(message) => StageError::new(
			Stage::TokenExchange,
			format!("Token endpoint returned an unexpected response: {message}"),
		)
		.into(),
	}
}

fn map_server_response_error(response: BasicErrorResponse) -> Error {
	let message = match response.error_description() {
		Some(description) => format!("Token endpoint rejected the exchange: {description}"),
		None => format!(
			"Token endpoint rejected the exchange: {}",
			response.error().as_ref()
		),
	};
	let details =
		serde_json::to_string(&response).unwrap_or_else(|_| response.error().as_ref().to_owned());

	StageError::new(Stage::TokenExchange, message).with_details(details).into()
}
