#![cfg(feature = "reqwest")]

// self
use oauth2_relay::{
	_preludet::*,
	auth::{AuthAttempt, SessionId, UserId},
	store::{MemoryStore, SessionStore},
};

fn session(value: &str) -> SessionId {
	SessionId::new(value).expect("Session identifier fixture should be valid.")
}

fn attempt(urls: &[&str]) -> AuthAttempt {
	let candidates = urls
		.iter()
		.map(|value| Url::parse(value).expect("Candidate URL fixture should parse."))
		.collect();

	AuthAttempt::begin(candidates, OffsetDateTime::now_utc())
		.expect("Attempt fixture should begin with at least one candidate.")
}

#[tokio::test]
async fn take_attempt_consumes_exactly_once() {
	let store = MemoryStore::default();
	let session = session("session-once");

	store
		.put_attempt(&session, attempt(&["https://app.example.com/cb"]))
		.await
		.expect("Storing an attempt should succeed.");

	let first = store.take_attempt(&session).await.expect("First take should succeed.");

	assert!(first.is_some());

	let second = store.take_attempt(&session).await.expect("Second take should succeed.");

	assert!(second.is_none(), "A consumed attempt must not be retrievable again.");
}

#[tokio::test]
async fn put_attempt_replaces_the_pending_one() {
	let store = MemoryStore::default();
	let session = session("session-replace");
	let first = attempt(&["https://first.example.com/cb"]);
	let second = attempt(&["https://second.example.com/cb"]);
	let second_state = second.state_token.clone();

	store.put_attempt(&session, first).await.expect("Storing the first attempt should succeed.");
	store.put_attempt(&session, second).await.expect("Storing the second attempt should succeed.");

	let stored = store
		.take_attempt(&session)
		.await
		.expect("Take should succeed.")
		.expect("The replacing attempt should be present.");

	assert_eq!(stored.state_token, second_state);
	assert_eq!(stored.active_redirect_uri.as_str(), "https://second.example.com/cb");
}

#[tokio::test]
async fn signed_in_state_survives_attempt_consumption() {
	let store = MemoryStore::default();
	let session = session("session-signed-in");
	let user = UserId::generate();

	store
		.put_attempt(&session, attempt(&["https://app.example.com/cb"]))
		.await
		.expect("Storing an attempt should succeed.");
	store.put_signed_in(&session, &user).await.expect("Recording the user should succeed.");

	let _ = store.take_attempt(&session).await.expect("Take should succeed.");
	let signed_in = store.signed_in_user(&session).await.expect("Lookup should succeed.");

	assert_eq!(signed_in.as_ref(), Some(&user));
}

#[tokio::test]
async fn clear_removes_attempts_and_users() {
	let store = MemoryStore::default();
	let session = session("session-clear");
	let user = UserId::generate();

	store
		.put_attempt(&session, attempt(&["https://app.example.com/cb"]))
		.await
		.expect("Storing an attempt should succeed.");
	store.put_signed_in(&session, &user).await.expect("Recording the user should succeed.");
	store.clear(&session).await.expect("Clearing the session should succeed.");

	assert!(
		store.take_attempt(&session).await.expect("Take should succeed.").is_none(),
		"Cleared sessions must not retain attempts.",
	);
	assert!(
		store.signed_in_user(&session).await.expect("Lookup should succeed.").is_none(),
		"Cleared sessions must not retain users.",
	);
}

#[tokio::test]
async fn sessions_are_isolated_from_each_other() {
	let store = MemoryStore::default();
	let left = session("session-left");
	let right = session("session-right");

	store
		.put_attempt(&left, attempt(&["https://left.example.com/cb"]))
		.await
		.expect("Storing the left attempt should succeed.");

	assert!(
		store.take_attempt(&right).await.expect("Take should succeed.").is_none(),
		"One session's attempt must be invisible to another.",
	);
	assert!(store.take_attempt(&left).await.expect("Take should succeed.").is_some());
}
