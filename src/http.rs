//! Transport primitives for token exchanges and profile fetches.
//!
//! The module exposes [`TokenHttpClient`] alongside [`ResponseMetadata`] and
//! [`ResponseMetadataSlot`] so downstream crates can integrate custom HTTP
//! clients without losing the relay's failure-classification hooks.
//! Implementations call [`ResponseMetadataSlot::take`] before dispatching a
//! request and [`ResponseMetadataSlot::store`] once an HTTP status is known,
//! so transport errors can be mapped to the correct pipeline stage with
//! consistent metadata.

// std
use std::ops::Deref;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
// self
use crate::_prelude::*;

#[cfg(feature = "reqwest")] const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Abstraction over HTTP transports capable of executing provider requests
/// while publishing response metadata to the relay's error-mapping pipeline.
///
/// The trait is the relay's only dependency on an HTTP stack. Callers provide
/// an implementation (typically behind `Arc<T>` where `T: TokenHttpClient`)
/// and the relay requests short-lived [`AsyncHttpClient`] handles that each
/// carry a clone of a [`ResponseMetadataSlot`]. Implementations must be
/// `Send + Sync + 'static` so they can be shared across relay instances, and
/// the handles they return must own whatever state is required so their
/// request futures remain `Send` for the lifetime of the in-flight call.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds an [`AsyncHttpClient`] handle that records outcomes in `slot`.
	///
	/// Implementations must call [`ResponseMetadataSlot::take`] before
	/// submitting the HTTP request so stale information never leaks across
	/// fallback retries, and [`ResponseMetadataSlot::store`] once a response
	/// status is known.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Captures metadata from the most recent HTTP response for error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the provider, if available.
	pub status: Option<u16>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
///
/// The relay creates a fresh slot for each provider request and reads the
/// captured metadata immediately after the call resolves.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// The default client bounds every provider call with a conservative timeout
/// and does not follow redirects; token endpoints return results directly
/// rather than delegating to another URI. Configure any custom
/// [`ReqwestClient`] the same way, because the relay hands this client to the
/// `oauth2` crate for the exchange step.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds an instrumented HTTP client that captures response metadata.
	pub(crate) fn instrumented(&self, slot: ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle::new(self.0.clone(), slot)
	}
}
#[cfg(feature = "reqwest")]
impl Default for ReqwestHttpClient {
	fn default() -> Self {
		let client = ReqwestClient::builder()
			.timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.unwrap_or_default();

		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

#[cfg(feature = "reqwest")]
/// Instrumented adapter that implements [`AsyncHttpClient`] for reqwest.
pub(crate) struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}
#[cfg(feature = "reqwest")]
impl InstrumentedHttpClient {
	fn new(client: ReqwestClient, slot: ResponseMetadataSlot) -> Self {
		Self { client, slot }
	}
}

#[cfg(feature = "reqwest")]
/// Public handle returned by [`ReqwestHttpClient`] that satisfies [`TokenHttpClient`].
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
#[cfg(feature = "reqwest")]
impl InstrumentedHandle {
	fn new(client: ReqwestClient, slot: ResponseMetadataSlot) -> Self {
		Self(Arc::new(InstrumentedHttpClient::new(client, slot)))
	}
}
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let response = client
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();

			client.slot.store(ResponseMetadata { status: Some(status.as_u16()) });

			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}
#[cfg(feature = "reqwest")]
impl TokenHttpClient for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		self.instrumented(slot)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn metadata_slot_is_consume_once() {
		let slot = ResponseMetadataSlot::default();

		slot.store(ResponseMetadata { status: Some(502) });

		assert_eq!(slot.take().and_then(|meta| meta.status), Some(502));
		assert!(slot.take().is_none(), "The slot must not replay stale metadata.");
	}
}
