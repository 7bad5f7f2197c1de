//! OAuth 2.0 login relay—resolve callback hosts behind proxies, walk fallback
//! redirect candidates, and turn authorization codes into local users in one
//! crate built for production.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod error;
pub mod flows;
pub mod host;
pub mod http;
pub mod identity;
pub mod oauth;
pub mod obs;
pub mod profile;
pub mod provider;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		flows::Relay,
		host::HostDomainResolver,
		http::ReqwestHttpClient,
		identity::{MemoryDirectory, UserDirectory},
		oauth::ReqwestTransportErrorMapper,
		provider::ProviderDescriptor,
		store::{MemoryStore, SessionStore},
	};

	/// Relay type alias used by reqwest-backed integration tests.
	pub type ReqwestTestRelay = Relay<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Constructs a [`Relay`] backed by in-memory stores and the reqwest transport used across
	/// integration tests.
	pub fn build_reqwest_test_relay(
		descriptor: ProviderDescriptor,
		resolver: HostDomainResolver,
		client_id: &str,
		client_secret: &str,
	) -> (ReqwestTestRelay, Arc<MemoryStore>, Arc<MemoryDirectory>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn SessionStore> = store_backend.clone();
		let directory_backend = Arc::new(MemoryDirectory::default());
		let directory: Arc<dyn UserDirectory> = directory_backend.clone();
		let http_client = test_reqwest_http_client();
		let mapper = Arc::new(ReqwestTransportErrorMapper);
		let relay = Relay::with_http_client(
			store,
			directory,
			descriptor,
			resolver,
			client_id,
			http_client,
			mapper,
		)
		.with_client_secret(client_secret);

		(relay, store_backend, directory_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use oauth2_relay as _;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _, tokio as _};
