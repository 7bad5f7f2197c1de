//! Profile retrieval from the provider's userinfo endpoint.
//!
//! Runs after a successful token exchange and reuses the same instrumented
//! transport handle, so transport failures here classify into the retryable
//! `profile` stage. The parser tolerates the field-name dialects of the
//! common providers (OIDC `sub`/`name`/`picture`, GitHub `id`/`login`/
//! `avatar_url`) and normalizes them into one [`ExternalProfile`].

// crates.io
use oauth2::{
	AsyncHttpClient,
	http::{
		Method, Request,
		header::{ACCEPT, AUTHORIZATION},
	},
};
use serde::Deserialize;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, SubjectId},
	error::{ConfigError, Stage, StageError},
	http::{ResponseMetadataSlot, TokenHttpClient},
	identity::ExternalProfile,
	oauth::TransportErrorMapper,
	provider::ProviderDescriptor,
};

/// Fetches and normalizes the external profile for a freshly issued token.
pub(crate) struct ProfileFetcher<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> ProfileFetcher<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(http_client: Arc<C>, error_mapper: Arc<M>) -> Self {
		Self { http_client, error_mapper }
	}

	/// Retrieves the profile from the descriptor's userinfo endpoint.
	///
	/// When the primary payload lacks an email address and the descriptor
	/// names a secondary email endpoint, that endpoint is queried as well.
	/// Failures on the secondary call degrade to a profile without an email
	/// instead of failing the whole login.
	pub(crate) async fn fetch(
		&self,
		descriptor: &ProviderDescriptor,
		token: &AccessToken,
	) -> Result<ExternalProfile> {
		let body = self.get_json(&descriptor.endpoints.userinfo, token).await?;
		let raw = parse_profile(&body)?;
		let mut profile = raw.into_external()?;

		if profile.email.is_none()
			&& let Some(email_endpoint) = &descriptor.endpoints.email
		{
			profile.email = self.fetch_email(email_endpoint, token).await;
		}

		Ok(profile)
	}

	async fn fetch_email(&self, endpoint: &Url, token: &AccessToken) -> Option<String> {
		let body = self.get_json(endpoint, token).await.ok()?;

		extract_email(&body)
	}

	async fn get_json(&self, endpoint: &Url, token: &AccessToken) -> Result<Vec<u8>> {
		let request = Request::builder()
			.method(Method::GET)
			.uri(endpoint.as_str())
			.header(AUTHORIZATION, format!("Bearer {}", token.expose()))
			.header(ACCEPT, "application/json")
			.body(Vec::new())
			.map_err(ConfigError::from)?;
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(meta.clone());
		let response = handle.call(request).await.map_err(|err| {
			self.error_mapper.map_transport_error(Stage::Profile, meta.take().as_ref(), err)
		})?;
		let status = response.status();

		if !status.is_success() {
			return Err(StageError::new(
				Stage::Profile,
				format!("Userinfo endpoint returned HTTP {}", status.as_u16()),
			)
			.with_details(String::from_utf8_lossy(response.body()).into_owned())
			.into());
		}

		Ok(response.into_body())
	}
}

/// Userinfo payload with aliases covering the common provider dialects.
#[derive(Debug, Deserialize)]
struct RawProfile {
	#[serde(alias = "sub", alias = "id", default)]
	subject: Option<SubjectValue>,
	#[serde(alias = "name", alias = "login", default)]
	display_name: Option<String>,
	#[serde(default)]
	email: Option<String>,
	#[serde(alias = "picture", alias = "avatar_url", default)]
	picture_url: Option<String>,
	#[serde(alias = "profile", alias = "html_url", default)]
	profile_url: Option<String>,
}
impl RawProfile {
	fn into_external(self) -> Result<ExternalProfile> {
		let subject = self
			.subject
			.ok_or_else(|| StageError::new(Stage::Profile, "Profile payload has no subject id"))?;
		let subject_id = SubjectId::new(subject.into_string()).map_err(|err| {
			StageError::new(Stage::Profile, format!("Profile subject id is unusable: {err}"))
		})?;

		Ok(ExternalProfile {
			subject_id,
			display_name: self.display_name.unwrap_or_default(),
			email: self.email.filter(|value| !value.is_empty()),
			picture_url: self.picture_url.filter(|value| !value.is_empty()),
			profile_url: self.profile_url.filter(|value| !value.is_empty()),
		})
	}
}

/// Subject ids arrive as strings from OIDC providers and as numbers from
/// GitHub-style APIs.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SubjectValue {
	Text(String),
	Number(i64),
}
impl SubjectValue {
	fn into_string(self) -> String {
		match self {
			Self::Text(value) => value,
			Self::Number(value) => value.to_string(),
		}
	}
}

fn parse_profile(body: &[u8]) -> Result<RawProfile> {
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
		StageError::new(
			Stage::Profile,
			format!("Userinfo endpoint returned malformed JSON: {err}"),
		)
		.with_details(String::from_utf8_lossy(body).into_owned())
		.into()
	})
}

/// Pulls an email address out of the secondary endpoint's payload.
///
/// Accepts a flat object with an `email` field, a GitHub-style list of email
/// records preferring primary then verified entries, and a LinkedIn-style
/// `elements` list with projected `handle~` objects.
fn extract_email(body: &[u8]) -> Option<String> {
	let value = serde_json::from_slice::<serde_json::Value>(body).ok()?;

	email_from_value(&value)
}

fn email_from_value(value: &serde_json::Value) -> Option<String> {
	if let Some(email) = non_empty_str(value.get("email")) {
		return Some(email);
	}
	if let Some(records) = value.as_array() {
		return email_from_records(records);
	}
	if let Some(elements) = value.get("elements").and_then(serde_json::Value::as_array) {
		return elements
			.iter()
			.find_map(|element| non_empty_str(element.get("handle~")?.get("emailAddress")));
	}

	None
}

fn email_from_records(records: &[serde_json::Value]) -> Option<String> {
	let flag = |record: &serde_json::Value, field: &str| {
		record.get(field).and_then(serde_json::Value::as_bool).unwrap_or(false)
	};

	records
		.iter()
		.find(|record| flag(record, "primary"))
		.or_else(|| records.iter().find(|record| flag(record, "verified")))
		.or_else(|| records.first())
		.and_then(|record| non_empty_str(record.get("email")))
}

fn non_empty_str(value: Option<&serde_json::Value>) -> Option<String> {
	value
		.and_then(serde_json::Value::as_str)
		.filter(|text| !text.is_empty())
		.map(str::to_owned)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn oidc_payload_normalizes() {
		let body = br#"{
			"sub": "subject-1",
			"name": "Ada Lovelace",
			"email": "ada@example.com",
			"picture": "https://example.com/ada.png",
			"profile": "https://example.com/ada"
		}"#;
		let profile = parse_profile(body)
			.expect("OIDC payload should parse.")
			.into_external()
			.expect("OIDC payload should normalize.");

		assert_eq!(profile.subject_id.as_ref(), "subject-1");
		assert_eq!(profile.display_name, "Ada Lovelace");
		assert_eq!(profile.email.as_deref(), Some("ada@example.com"));
		assert_eq!(profile.picture_url.as_deref(), Some("https://example.com/ada.png"));
	}

	#[test]
	fn github_payload_normalizes() {
		let body = br#"{
			"id": 583231,
			"login": "octocat",
			"avatar_url": "https://example.com/octocat.png",
			"html_url": "https://example.com/octocat",
			"email": null
		}"#;
		let profile = parse_profile(body)
			.expect("GitHub payload should parse.")
			.into_external()
			.expect("GitHub payload should normalize.");

		assert_eq!(profile.subject_id.as_ref(), "583231");
		assert_eq!(profile.display_name, "octocat");
		assert!(profile.email.is_none());
		assert_eq!(profile.profile_url.as_deref(), Some("https://example.com/octocat"));
	}

	#[test]
	fn missing_subject_is_a_hard_error() {
		let body = br#"{"name": "No Subject"}"#;
		let err = parse_profile(body)
			.expect("Payload should parse.")
			.into_external()
			.expect_err("Missing subject must fail the profile stage.");

		assert_eq!(err.stage(), Stage::Profile);
	}

	#[test]
	fn malformed_json_keeps_body_in_details() {
		let err = parse_profile(b"not json").expect_err("Malformed JSON must fail.");

		match err {
			Error::Stage(stage_error) => {
				assert_eq!(stage_error.stage, Stage::Profile);
				assert_eq!(stage_error.details.as_deref(), Some("not json"));
			},
			other => panic!("Expected a stage error, got {other:?}."),
		}
	}

	#[test]
	fn email_list_prefers_primary_then_verified() {
		let primary = br#"[
			{"email": "old@example.com", "verified": true},
			{"email": "main@example.com", "primary": true, "verified": true}
		]"#;
		let verified_only = br#"[
			{"email": "unverified@example.com"},
			{"email": "checked@example.com", "verified": true}
		]"#;

		assert_eq!(extract_email(primary).as_deref(), Some("main@example.com"));
		assert_eq!(extract_email(verified_only).as_deref(), Some("checked@example.com"));
	}

	#[test]
	fn email_shapes_flat_and_projected() {
		let flat = br#"{"email": "flat@example.com"}"#;
		let projected = br#"{
			"elements": [{"handle~": {"emailAddress": "projected@example.com"}}]
		}"#;

		assert_eq!(extract_email(flat).as_deref(), Some("flat@example.com"));
		assert_eq!(extract_email(projected).as_deref(), Some("projected@example.com"));
		assert!(extract_email(b"{}").is_none());
	}
}
