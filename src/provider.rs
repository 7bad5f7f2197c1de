//! Provider descriptors consumed by the login flow.
//!
//! A descriptor carries the provider's endpoint set (authorization, token,
//! userinfo, optional split email lookup), the preferred client
//! authentication method for the token endpoint, and the scope delimiter the
//! provider expects in authorization requests.

/// Builder API for assembling provider descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::_prelude::*;

/// Preferred client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
}

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Authorization endpoint the user is redirected to.
	pub authorization: Url,
	/// Token endpoint used for the code exchange.
	pub token: Url,
	/// Identity endpoint queried with the bearer token.
	pub userinfo: Url,
	/// Secondary email endpoint, for providers that split the email lookup.
	pub email: Option<Url>,
}

/// Immutable provider descriptor consumed by the relay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Human-readable provider name used in spans and error messages.
	pub name: String,
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
	/// Preferred client authentication mechanism.
	pub preferred_client_auth_method: ClientAuthMethod,
	/// Delimiter joining scope values in authorization requests.
	pub scope_delimiter: char,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided name.
	pub fn builder(name: impl Into<String>) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(name)
	}
}
