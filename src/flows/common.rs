//! Shared helpers for flow implementations (scope formatting, guards, failure redirects).

// self
use crate::{
	_prelude::*,
	auth::SessionId,
	flows::Relay,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
};

/// Joins the requested scope values with the provider's delimiter.
pub(crate) fn format_scope(scope: &[String], delimiter: char) -> Option<String> {
	if scope.is_empty() {
		return None;
	}

	let mut buf = String::new();

	for (idx, value) in scope.iter().enumerate() {
		if idx > 0 {
			buf.push(delimiter);
		}

		buf.push_str(value);
	}

	Some(buf)
}

/// Returns (and creates on demand) the singleflight guard for a session.
pub(crate) fn session_guard<C, M>(relay: &Relay<C, M>, session: &SessionId) -> Arc<AsyncMutex<()>>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let mut guards = relay.session_guards.lock();

	guards.entry(session.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
}

/// Builds the failure redirect for a login error.
///
/// Carries the human-readable message as `error` and the stage label as
/// `stage`. Raw provider bodies stay in [`StageError::details`] and are
/// never written into the redirect.
///
/// [`StageError::details`]: crate::error::StageError
pub fn error_redirect(login_route: &Url, err: &Error) -> Url {
	let mut url = login_route.clone();

	url.query_pairs_mut()
		.append_pair("error", &err.to_string())
		.append_pair("stage", err.stage().as_str());

	url
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::{Stage, StageError};

	#[test]
	fn scope_formatting_handles_custom_delimiters() {
		let scope = vec!["email".to_owned(), "profile".to_owned()];

		assert_eq!(format_scope(&scope, ' '), Some("email profile".into()));
		assert_eq!(format_scope(&scope, ','), Some("email,profile".into()));
		assert_eq!(format_scope(&[], ' '), None);
	}

	#[test]
	fn failure_redirect_exposes_message_and_stage_only() {
		let login_route =
			Url::parse("https://example.com/login").expect("Login route fixture should parse.");
		let err: Error = StageError::new(Stage::TokenExchange, "Token endpoint rejected the exchange")
			.with_details("{\"error\":\"invalid_grant\"}")
			.into();
		let redirect = error_redirect(&login_route, &err);
		let query = redirect.query().expect("Failure redirect should carry a query.");

		assert!(query.contains("stage=token_exchange"));
		assert!(!query.contains("invalid_grant"));
	}
}
