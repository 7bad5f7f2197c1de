//! Callback-candidate resolution for services whose external hostname shifts.
//!
//! The resolver derives a priority-ordered list of fully qualified callback
//! URLs from the inbound request's host headers, a freshness-bounded cache of
//! the most recently observed host, statically configured deployment hosts,
//! and a loopback development fallback. It performs no network calls.

// self
use crate::_prelude::*;

const DEFAULT_CALLBACK_PATH: &str = "/auth/callback";
const DEFAULT_DEV_PORT: u16 = 5000;
const DEFAULT_HOST_FRESHNESS: Duration = Duration::minutes(30);

/// Host-related header values extracted from an inbound request.
///
/// The embedding HTTP layer fills this in from `Host`, `X-Forwarded-Host`,
/// and `X-Forwarded-Proto`; all fields are optional because reverse proxies
/// differ in what they forward.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
	/// `Host` header value.
	pub host: Option<String>,
	/// `X-Forwarded-Host` header value, preferred over `host` when present.
	pub forwarded_host: Option<String>,
	/// `X-Forwarded-Proto` header value.
	pub forwarded_proto: Option<String>,
}
impl RequestContext {
	/// Creates an empty context (no host information available).
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the `Host` header value.
	pub fn with_host(mut self, host: impl Into<String>) -> Self {
		self.host = Some(host.into());

		self
	}

	/// Sets the `X-Forwarded-Host` header value.
	pub fn with_forwarded_host(mut self, host: impl Into<String>) -> Self {
		self.forwarded_host = Some(host.into());

		self
	}

	/// Sets the `X-Forwarded-Proto` header value.
	pub fn with_forwarded_proto(mut self, proto: impl Into<String>) -> Self {
		self.forwarded_proto = Some(proto.into());

		self
	}
}

/// Freshness-bounded cache of the most recently observed external host.
///
/// Replaces process-global "last detected host" variables: the cache is owned
/// by the resolver that uses it, so concurrent requests from different hosts
/// never bias each other through hidden module state.
#[derive(Clone, Debug)]
pub struct HostCache {
	freshness: Duration,
	inner: Arc<Mutex<Option<(String, OffsetDateTime)>>>,
}
impl HostCache {
	/// Creates a cache whose entries stay relevant for `freshness`.
	///
	/// Clones share the underlying slot, so a cache handed to several relay
	/// instances keeps them in agreement about the last observed host.
	pub fn new(freshness: Duration) -> Self {
		Self { freshness, inner: Arc::new(Mutex::new(None)) }
	}

	/// Records the most recently observed host.
	pub fn observe(&self, host: &str, now: OffsetDateTime) {
		*self.inner.lock() = Some((host.to_owned(), now));
	}

	/// Returns the cached host if it is still within the freshness window.
	pub fn recent(&self, now: OffsetDateTime) -> Option<String> {
		let guard = self.inner.lock();
		let (host, seen_at) = guard.as_ref()?;

		if now - *seen_at <= self.freshness { Some(host.clone()) } else { None }
	}
}
impl Default for HostCache {
	fn default() -> Self {
		Self::new(DEFAULT_HOST_FRESHNESS)
	}
}

/// Derives priority-ordered callback candidate URLs from request context.
#[derive(Clone, Debug)]
pub struct HostDomainResolver {
	callback_path: String,
	deployment_hosts: Vec<String>,
	dev_port: u16,
	cache: HostCache,
}
impl HostDomainResolver {
	/// Creates a resolver producing callbacks under the provided path.
	pub fn new(callback_path: impl Into<String>) -> Self {
		Self {
			callback_path: callback_path.into(),
			deployment_hosts: Vec::new(),
			dev_port: DEFAULT_DEV_PORT,
			cache: HostCache::default(),
		}
	}

	/// Adds statically known deployment hosts, tried after header-derived ones.
	pub fn with_deployment_hosts<I, S>(mut self, hosts: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.deployment_hosts = hosts.into_iter().map(Into::into).collect();

		self
	}

	/// Overrides the port of the loopback development fallback.
	pub fn with_dev_port(mut self, port: u16) -> Self {
		self.dev_port = port;

		self
	}

	/// Replaces the last-observed-host cache.
	pub fn with_cache(mut self, cache: HostCache) -> Self {
		self.cache = cache;

		self
	}

	/// Produces the ordered candidate callback URLs for a request.
	///
	/// Ordering: header-derived host first, then the fresh cached host, then
	/// configured deployment hosts, then the loopback fallback. The list is
	/// deduplicated and never empty. HTTPS is forced unless the host is
	/// loopback; a forwarded protocol can confirm HTTPS for a loopback host
	/// but never downgrades a candidate to plain HTTP.
	pub fn candidates(&self, ctx: &RequestContext) -> Vec<Url> {
		let now = OffsetDateTime::now_utc();
		let header_host =
			ctx.forwarded_host.as_deref().or(ctx.host.as_deref()).and_then(sanitize_host);

		if let Some(host) = header_host.as_deref() {
			self.cache.observe(host, now);
		}

		let header_proto =
			ctx.forwarded_proto.as_deref().map(str::trim).filter(|proto| *proto == "https");
		let mut hosts: Vec<String> = Vec::new();
		let mut candidates = Vec::new();

		if let Some(host) = header_host {
			if let Some(url) = self.callback_url(&host, header_proto) {
				candidates.push(url);
			}

			hosts.push(host);
		}
		if let Some(cached) = self.cache.recent(now)
			&& !hosts.contains(&cached)
		{
			hosts.push(cached);
		}
		for configured in &self.deployment_hosts {
			if let Some(host) = sanitize_host(configured)
				&& !hosts.contains(&host)
			{
				hosts.push(host);
			}
		}

		let loopback = format!("localhost:{}", self.dev_port);

		if !hosts.contains(&loopback) {
			hosts.push(loopback);
		}

		for url in hosts.iter().skip(candidates.len()).filter_map(|host| self.callback_url(host, None)) {
			if !candidates.contains(&url) {
				candidates.push(url);
			}
		}

		candidates
	}

	fn callback_url(&self, host: &str, proto: Option<&str>) -> Option<Url> {
		let scheme = match proto {
			Some(proto) => proto,
			None if is_loopback(host) => "http",
			None => "https",
		};

		Url::parse(&format!("{scheme}://{host}{}", self.callback_path)).ok()
	}
}
impl Default for HostDomainResolver {
	fn default() -> Self {
		Self::new(DEFAULT_CALLBACK_PATH)
	}
}

/// Normalizes a host header value, rejecting anything that could smuggle
/// extra URL components into the callback.
fn sanitize_host(raw: &str) -> Option<String> {
	let trimmed = raw.trim().trim_end_matches('.');

	if trimmed.is_empty() {
		return None;
	}

	let lowered = trimmed.to_ascii_lowercase();
	let valid = lowered
		.chars()
		.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']'));

	if valid { Some(lowered) } else { None }
}

fn is_loopback(host: &str) -> bool {
	if host.starts_with("[::1]") {
		return true;
	}

	let bare = host.split_once(':').map(|(name, _)| name).unwrap_or(host);

	matches!(bare, "localhost" | "127.0.0.1")
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn urls(candidates: &[Url]) -> Vec<&str> {
		candidates.iter().map(Url::as_str).collect()
	}

	#[test]
	fn header_host_leads_then_deployment_then_loopback() {
		let resolver = HostDomainResolver::new("/auth/callback")
			.with_deployment_hosts(["fallback.example.com"])
			.with_dev_port(5000);
		let ctx = RequestContext::new().with_host("app.example.com");
		let candidates = resolver.candidates(&ctx);

		assert_eq!(
			urls(&candidates),
			[
				"https://app.example.com/auth/callback",
				"https://fallback.example.com/auth/callback",
				"http://localhost:5000/auth/callback",
			]
		);
	}

	#[test]
	fn forwarded_host_wins_over_host() {
		let resolver = HostDomainResolver::default();
		let ctx = RequestContext::new()
			.with_host("internal-pod:8080")
			.with_forwarded_host("preview.example.com");
		let candidates = resolver.candidates(&ctx);

		assert_eq!(candidates[0].as_str(), "https://preview.example.com/auth/callback");
	}

	#[test]
	fn forwarded_proto_never_downgrades_the_scheme() {
		let resolver = HostDomainResolver::default();
		let ctx = RequestContext::new()
			.with_forwarded_host("edge.example.com")
			.with_forwarded_proto("http");
		let candidates = resolver.candidates(&ctx);

		assert_eq!(
			candidates[0].as_str(),
			"https://edge.example.com/auth/callback",
			"A forwarded plain-HTTP protocol must not produce an insecure candidate",
		);

		let ctx = RequestContext::new()
			.with_forwarded_host("edge.example.com")
			.with_forwarded_proto("gopher");
		let candidates = resolver.candidates(&ctx);

		assert_eq!(
			candidates[0].as_str(),
			"https://edge.example.com/auth/callback",
			"Unrecognized forwarded protocols fall back to HTTPS",
		);

		let ctx = RequestContext::new()
			.with_forwarded_host("localhost:5000")
			.with_forwarded_proto("https");
		let candidates = resolver.candidates(&ctx);

		assert_eq!(
			candidates[0].as_str(),
			"https://localhost:5000/auth/callback",
			"A TLS-terminating proxy in front of loopback upgrades the candidate",
		);
	}

	#[test]
	fn no_host_still_yields_the_loopback_fallback() {
		let resolver = HostDomainResolver::default();
		let candidates = resolver.candidates(&RequestContext::new());

		assert_eq!(urls(&candidates), ["http://localhost:5000/auth/callback"]);
	}

	#[test]
	fn cached_host_biases_later_requests_without_headers() {
		let resolver =
			HostDomainResolver::default().with_deployment_hosts(["fallback.example.com"]);

		resolver.candidates(&RequestContext::new().with_host("app.example.com"));

		let later = resolver.candidates(&RequestContext::new());

		assert_eq!(later[0].as_str(), "https://app.example.com/auth/callback");
	}

	#[test]
	fn stale_cache_entries_are_ignored() {
		let cache = HostCache::new(Duration::ZERO);

		cache.observe("old.example.com", OffsetDateTime::now_utc() - Duration::minutes(5));

		let resolver = HostDomainResolver::default().with_cache(cache);
		let candidates = resolver.candidates(&RequestContext::new());

		assert_eq!(urls(&candidates), ["http://localhost:5000/auth/callback"]);
	}

	#[test]
	fn hostile_host_headers_are_dropped() {
		let resolver = HostDomainResolver::default();
		let ctx = RequestContext::new().with_host("evil.example.com/phish?x=");
		let candidates = resolver.candidates(&ctx);

		assert_eq!(urls(&candidates), ["http://localhost:5000/auth/callback"]);
	}

	#[test]
	fn duplicate_hosts_collapse() {
		let resolver = HostDomainResolver::default()
			.with_deployment_hosts(["app.example.com", "app.example.com"]);
		let ctx = RequestContext::new().with_host("app.example.com");
		let candidates = resolver.candidates(&ctx);

		assert_eq!(
			urls(&candidates),
			["https://app.example.com/auth/callback", "http://localhost:5000/auth/callback"]
		);
	}

	#[test]
	fn loopback_hosts_keep_http() {
		let resolver = HostDomainResolver::default();
		let ctx = RequestContext::new().with_host("127.0.0.1:5000");
		let candidates = resolver.candidates(&ctx);

		assert_eq!(candidates[0].as_str(), "http://127.0.0.1:5000/auth/callback");
	}
}
