//! Relay-level error types shared across flows, stores, and transports.

// self
use crate::_prelude::*;

/// Relay-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Pipeline position at which a login attempt failed.
///
/// The four stages mirror the flow itself: building the authorization
/// redirect, validating the provider callback, exchanging the code for a
/// token, and resolving the authenticated profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
	/// The authorization redirect could not be built or issued.
	Authorization,
	/// The provider callback was invalid (provider error, missing code, bad state).
	Callback,
	/// The code-for-token exchange was rejected.
	TokenExchange,
	/// The token was issued but the identity lookup failed.
	Profile,
}
impl Stage {
	/// Returns a stable snake_case label suitable for redirects, spans, and metrics.
	pub const fn as_str(self) -> &'static str {
		match self {
			Stage::Authorization => "authorization",
			Stage::Callback => "callback",
			Stage::TokenExchange => "token_exchange",
			Stage::Profile => "profile",
		}
	}
}
impl Display for Stage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Stage-tagged login failure, the only structured error surfaced outward.
///
/// `message` is safe to show to end users. `details` retains the provider's
/// raw response body for operator diagnosis and must never reach user-facing
/// output; [`crate::flows::common::error_redirect`] enforces that by omission.
#[derive(Clone, Debug, Serialize, ThisError)]
#[error("{stage} stage failed: {message}")]
pub struct StageError {
	/// Pipeline stage at which the failure occurred.
	pub stage: Stage,
	/// Human-readable failure summary.
	pub message: String,
	/// Raw provider response body, when one was captured.
	pub details: Option<String>,
	/// Instant at which the failure was recorded.
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
}
impl StageError {
	/// Creates a stage error stamped with the current instant.
	pub fn new(stage: Stage, message: impl Into<String>) -> Self {
		Self { stage, message: message.into(), details: None, timestamp: OffsetDateTime::now_utc() }
	}

	/// Attaches the provider's raw response body for diagnosis.
	pub fn with_details(mut self, details: impl Into<String>) -> Self {
		self.details = Some(details.into());

		self
	}
}

/// Canonical relay error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Stage-tagged login failure.
	#[error(transparent)]
	Stage(#[from] StageError),
}
impl Error {
	/// Returns the pipeline stage this error is reported under.
	///
	/// Configuration and storage failures prevent the flow from running at
	/// all; they surface as `authorization` and are never retried against
	/// fallback candidates.
	pub fn stage(&self) -> Stage {
		match self {
			Self::Stage(err) => err.stage,
			Self::Storage(_) | Self::Config(_) => Stage::Authorization,
		}
	}

	/// Whether the fallback coordinator may retry after this error.
	///
	/// Only `token_exchange` and `profile` failures qualify; `callback` and
	/// `authorization` failures require the user to re-initiate the login.
	pub fn is_retryable(&self) -> bool {
		matches!(self.stage(), Stage::TokenExchange | Stage::Profile)
	}
}

/// Configuration and validation failures raised by the relay.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Provider descriptor contains an invalid URL.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},

	/// Confidential client auth methods require a client secret.
	#[error("Client secret is required for the configured client auth method.")]
	MissingClientSecret,
	/// No callback candidate URL could be derived for the attempt.
	#[error("No callback candidate URL is available.")]
	NoCallbackCandidates,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for ConfigError {
	fn from(e: reqwest::Error) -> Self {
		Self::http_client_build(e)
	}
}
