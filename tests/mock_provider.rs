// self
use oauth2_relay::{
	_preludet::*,
	provider::{
		ClientAuthMethod, ProviderDescriptor, ProviderDescriptorBuilder, ProviderDescriptorError,
	},
};

fn url(value: &str) -> Url {
	Url::parse(value).expect("Failed to parse mock provider URL.")
}

fn builder(name: &str) -> ProviderDescriptorBuilder {
	ProviderDescriptor::builder(name)
}

#[test]
fn descriptor_requires_every_mandatory_endpoint() {
	let err = builder("mock-missing")
		.token_endpoint(url("https://example.com/token"))
		.userinfo_endpoint(url("https://example.com/userinfo"))
		.build()
		.expect_err("Descriptor builder should reject a missing authorization endpoint.");

	assert!(matches!(err, ProviderDescriptorError::MissingAuthorizationEndpoint));

	let err = builder("mock-missing")
		.authorization_endpoint(url("https://example.com/auth"))
		.userinfo_endpoint(url("https://example.com/userinfo"))
		.build()
		.expect_err("Descriptor builder should reject a missing token endpoint.");

	assert!(matches!(err, ProviderDescriptorError::MissingTokenEndpoint));

	let err = builder("mock-missing")
		.authorization_endpoint(url("https://example.com/auth"))
		.token_endpoint(url("https://example.com/token"))
		.build()
		.expect_err("Descriptor builder should reject a missing userinfo endpoint.");

	assert!(matches!(err, ProviderDescriptorError::MissingUserinfoEndpoint));
}

#[test]
fn descriptor_rejects_insecure_endpoints() {
	let err = builder("mock-insecure")
		.authorization_endpoint(url("http://example.com/auth"))
		.token_endpoint(url("https://example.com/token"))
		.userinfo_endpoint(url("https://example.com/userinfo"))
		.build()
		.expect_err("Descriptor builder should reject insecure authorization endpoints.");

	assert!(matches!(
		err,
		ProviderDescriptorError::InsecureEndpoint { endpoint: "authorization", .. }
	));

	let err = builder("mock-insecure")
		.authorization_endpoint(url("https://example.com/auth"))
		.token_endpoint(url("https://example.com/token"))
		.userinfo_endpoint(url("https://example.com/userinfo"))
		.email_endpoint(url("http://example.com/emails"))
		.build()
		.expect_err("Descriptor builder should reject insecure email endpoints.");

	assert!(matches!(err, ProviderDescriptorError::InsecureEndpoint { endpoint: "email", .. }));
}

#[test]
fn descriptor_rejects_unprintable_scope_delimiters() {
	let err = builder("mock-delimiter")
		.authorization_endpoint(url("https://example.com/auth"))
		.token_endpoint(url("https://example.com/token"))
		.userinfo_endpoint(url("https://example.com/userinfo"))
		.scope_delimiter('\n')
		.build()
		.expect_err("Descriptor builder should reject control-character delimiters.");

	assert!(matches!(err, ProviderDescriptorError::InvalidScopeDelimiter { delimiter: '\n' }));
}

#[test]
fn descriptor_defaults_cover_common_providers() {
	let descriptor = builder("mock")
		.authorization_endpoint(url("https://example.com/auth"))
		.token_endpoint(url("https://example.com/token"))
		.userinfo_endpoint(url("https://example.com/userinfo"))
		.email_endpoint(url("https://example.com/emails"))
		.preferred_client_auth_method(ClientAuthMethod::ClientSecretPost)
		.scope_delimiter(',')
		.build()
		.expect("Descriptor builder should succeed for secure endpoints.");

	assert_eq!(descriptor.name, "mock");
	assert_eq!(descriptor.endpoints.authorization.as_str(), "https://example.com/auth");
	assert_eq!(descriptor.endpoints.token.as_str(), "https://example.com/token");
	assert_eq!(descriptor.endpoints.userinfo.as_str(), "https://example.com/userinfo");
	assert_eq!(
		descriptor
			.endpoints
			.email
			.as_ref()
			.expect("Email endpoint should be populated when configured.")
			.as_str(),
		"https://example.com/emails",
	);
	assert_eq!(descriptor.preferred_client_auth_method, ClientAuthMethod::ClientSecretPost);
	assert_eq!(descriptor.scope_delimiter, ',');

	let plain = builder("mock-defaults")
		.authorization_endpoint(url("https://example.com/auth"))
		.token_endpoint(url("https://example.com/token"))
		.userinfo_endpoint(url("https://example.com/userinfo"))
		.build()
		.expect("Descriptor builder should succeed with defaults.");

	assert_eq!(plain.preferred_client_auth_method, ClientAuthMethod::ClientSecretBasic);
	assert_eq!(plain.scope_delimiter, ' ');
	assert!(plain.endpoints.email.is_none());
}
