// self
use crate::{
	_prelude::*,
	provider::{ClientAuthMethod, ProviderDescriptor, ProviderEndpoints},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ProviderDescriptorError {
	/// Authorization endpoint is required.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is required.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Userinfo endpoint is required for identity resolution.
	#[error("Missing userinfo endpoint.")]
	MissingUserinfoEndpoint,
	/// Endpoints must use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Reject scope delimiters that are control characters.
	#[error("Scope delimiter must be a printable character.")]
	InvalidScopeDelimiter {
		/// Invalid delimiter that was supplied.
		delimiter: char,
	},
}

/// Builder for [`ProviderDescriptor`] values.
#[derive(Debug)]
pub struct ProviderDescriptorBuilder {
	/// Provider name for the descriptor being constructed.
	pub name: String,
	/// Authorization endpoint the user is redirected to.
	pub authorization_endpoint: Option<Url>,
	/// Token endpoint used for the code exchange.
	pub token_endpoint: Option<Url>,
	/// Identity endpoint queried with the bearer token.
	pub userinfo_endpoint: Option<Url>,
	/// Secondary email endpoint, when the provider splits the email lookup.
	pub email_endpoint: Option<Url>,
	/// Preferred client authentication method for the token endpoint.
	pub preferred_client_auth_method: ClientAuthMethod,
	/// Delimiter joining scope values.
	pub scope_delimiter: char,
}
impl ProviderDescriptorBuilder {
	/// Creates a new builder seeded with the provided provider name.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			authorization_endpoint: None,
			token_endpoint: None,
			userinfo_endpoint: None,
			email_endpoint: None,
			preferred_client_auth_method: ClientAuthMethod::default(),
			scope_delimiter: ' ',
		}
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the userinfo endpoint.
	pub fn userinfo_endpoint(mut self, url: Url) -> Self {
		self.userinfo_endpoint = Some(url);

		self
	}

	/// Sets the optional secondary email endpoint.
	pub fn email_endpoint(mut self, url: Url) -> Self {
		self.email_endpoint = Some(url);

		self
	}

	/// Overrides the preferred client authentication method.
	pub fn preferred_client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.preferred_client_auth_method = method;

		self
	}

	/// Overrides the scope delimiter (defaults to a space).
	pub fn scope_delimiter(mut self, delimiter: char) -> Self {
		self.scope_delimiter = delimiter;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let authorization = self
			.authorization_endpoint
			.ok_or(ProviderDescriptorError::MissingAuthorizationEndpoint)?;
		let token = self.token_endpoint.ok_or(ProviderDescriptorError::MissingTokenEndpoint)?;
		let userinfo =
			self.userinfo_endpoint.ok_or(ProviderDescriptorError::MissingUserinfoEndpoint)?;
		let endpoints =
			ProviderEndpoints { authorization, token, userinfo, email: self.email_endpoint };
		let descriptor = ProviderDescriptor {
			name: self.name,
			endpoints,
			preferred_client_auth_method: self.preferred_client_auth_method,
			scope_delimiter: self.scope_delimiter,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ProviderDescriptor {
	/// Validates invariants for the descriptor.
	fn validate(&self) -> Result<(), ProviderDescriptorError> {
		validate_endpoint("authorization", &self.endpoints.authorization)?;
		validate_endpoint("token", &self.endpoints.token)?;
		validate_endpoint("userinfo", &self.endpoints.userinfo)?;

		if let Some(email) = self.endpoints.email.as_ref() {
			validate_endpoint("email", email)?;
		}

		validate_scope_delimiter(self.scope_delimiter)?;

		Ok(())
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	if url.scheme() != "https" {
		Err(ProviderDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	} else {
		Ok(())
	}
}

fn validate_scope_delimiter(delimiter: char) -> Result<(), ProviderDescriptorError> {
	if delimiter.is_control() {
		Err(ProviderDescriptorError::InvalidScopeDelimiter { delimiter })
	} else {
		Ok(())
	}
}
