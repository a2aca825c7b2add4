//! Cookie bridge between the session and the identity backend.
//!
//! The bridge is the only component that talks to the `/auth/*` routes. It keeps two cookies in
//! its [`CookieJar`]: the backend-owned refresh credential (opaque, only ever forwarded back to the
//! backend) and the short-lived `access_token` mirror it writes itself after login and refresh.
//!
//! Login, register, and logout each start a new cookie epoch. A refresh response that arrives
//! after the epoch moved on is dropped without touching the jar.

// crates.io
use ::http::{
	HeaderMap, HeaderValue, Method,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, COOKIE},
};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, Credentials, Identity, Registration, Session},
	config::SessionConfig,
	cookie::{self, ACCESS_TOKEN_COOKIE, CookieJar},
	coordinator::{RefreshFuture, TokenRefresher},
	error::{ConfigError, RefreshFailure, TransportError},
	http::{ApiResponse, ApiTransport, OutboundRequest, RequestBody, envelope},
	obs::{self, FlowKind},
};

/// Backend route table.
pub mod routes {
	/// Email/password login.
	pub const LOGIN: &str = "/auth/login";
	/// Account registration.
	pub const REGISTER: &str = "/auth/register";
	/// Refresh-credential exchange.
	pub const REFRESH: &str = "/auth/refresh";
	/// Session teardown.
	pub const LOGOUT: &str = "/auth/logout";
	/// Current account lookup.
	pub const ME: &str = "/auth/me";
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionData {
	access_token: String,
	#[serde(alias = "identity")]
	user: Identity,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshData {
	access_token: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProfileData {
	Wrapped { user: Identity },
	Bare(Identity),
}

/// Talks to the identity backend and keeps the session cookies in sync.
pub struct CookieBridge<T>
where
	T: ?Sized + ApiTransport,
{
	config: SessionConfig,
	transport: Arc<T>,
	jar: Arc<dyn CookieJar>,
	cookie_epoch: Mutex<u64>,
}
impl<T> CookieBridge<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates a bridge over `transport` that stores cookies in `jar`.
	pub fn new(config: SessionConfig, transport: Arc<T>, jar: Arc<dyn CookieJar>) -> Self {
		Self { config, transport, jar, cookie_epoch: Mutex::new(0) }
	}

	/// Configuration the bridge was built with.
	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	/// Returns `true` when the jar holds any backend-owned cookie worth a refresh attempt.
	pub fn has_refresh_credential(&self) -> bool {
		self.jar.header_value(&[ACCESS_TOKEN_COOKIE]).is_some()
	}

	/// Signs in with email and password.
	///
	/// On success the backend sets its refresh cookie and the bridge mirrors the access token
	/// into the `access_token` cookie.
	pub async fn login(&self, credentials: Credentials) -> Result<Session> {
		obs::observe(FlowKind::Login, "login", async {
			let body = json_body(&credentials)?;

			self.establish(routes::LOGIN, body).await
		})
		.await
	}

	/// Creates an account and signs it in.
	pub async fn register(&self, registration: Registration) -> Result<Session> {
		obs::observe(FlowKind::Register, "register", async {
			let body = json_body(&registration)?;

			self.establish(routes::REGISTER, body).await
		})
		.await
	}

	/// Exchanges the refresh cookie for a new access token.
	///
	/// Only backend-owned cookies are forwarded; the stale `access_token` mirror stays local. A
	/// rotated refresh cookie in the response replaces the old one. A non-2xx answer is a
	/// [`RefreshFailure::Rejected`] and drops the access-token mirror. When a logout or login
	/// lands while the call is in flight, the response is discarded and the result is
	/// [`RefreshFailure::Superseded`].
	pub async fn refresh(&self) -> Result<AccessToken> {
		let epoch = *self.cookie_epoch.lock();
		let response = self.send(Method::POST, routes::REFRESH, RequestBody::Empty, None).await?;
		let outcome = if response.is_success() {
			envelope::into_data::<RefreshData>(&response)
				.map(|data| AccessToken::new(data.access_token))
				.map_err(|e| match e {
					Error::Backend { status, message, .. } =>
						Error::from(RefreshFailure::Rejected { status, message }),
					other => other,
				})
		} else {
			let payload = response.json_value();
			let message = envelope::message_of(payload.as_ref())
				.unwrap_or_else(|| "Refresh credential missing or expired".into());

			Err(RefreshFailure::Rejected { status: response.status.as_u16(), message }.into())
		};
		let current = self.cookie_epoch.lock();

		if *current != epoch {
			return Err(RefreshFailure::Superseded.into());
		}

		self.ingest(&response);

		match &outcome {
			Ok(token) => self.jar.set(cookie::access_token_cookie(token, &self.config)),
			Err(_) => self.jar.remove(ACCESS_TOKEN_COOKIE),
		}

		outcome
	}

	/// Tears the session down.
	///
	/// The backend call is best effort: network errors and non-2xx answers are logged and
	/// swallowed. Both session cookies are removed regardless.
	pub async fn logout(&self) {
		*self.cookie_epoch.lock() += 1;

		let _ = obs::observe(FlowKind::Logout, "logout", async {
			let bearer = self.jar.access_token().map(AccessToken::new);
			let outcome = self
				.send(Method::POST, routes::LOGOUT, RequestBody::Empty, bearer.as_ref())
				.await;

			match &outcome {
				Ok(response) if !response.is_success() => obs::warn_absorbed(
					FlowKind::Logout,
					"backend logout answered with an error status",
					&response.status,
				),
				Ok(_) => {},
				Err(e) => obs::warn_absorbed(FlowKind::Logout, "backend logout failed", e),
			}

			self.jar.clear();

			outcome.map(|_| ())
		})
		.await;
	}

	/// Recovers the access token from the `access_token` cookie without touching the network.
	pub fn bootstrap(&self) -> Option<AccessToken> {
		self.jar.access_token().filter(|value| !value.is_empty()).map(AccessToken::new)
	}

	/// Looks up the account the token belongs to.
	pub async fn me(&self, token: &AccessToken) -> Result<Identity> {
		obs::observe(FlowKind::Profile, "me", async {
			let response = self.send(Method::GET, routes::ME, RequestBody::Empty, Some(token)).await?;
			let identity = match envelope::into_data::<ProfileData>(&response)? {
				ProfileData::Wrapped { user } => user,
				ProfileData::Bare(identity) => identity,
			};

			Ok(identity)
		})
		.await
	}

	async fn establish(&self, route: &str, body: serde_json::Value) -> Result<Session> {
		let response = self.send(Method::POST, route, RequestBody::Json(body), None).await?;

		{
			let mut epoch = self.cookie_epoch.lock();

			*epoch += 1;

			self.ingest(&response);
		}

		let data = envelope::into_data::<SessionData>(&response)?;
		let token = AccessToken::new(data.access_token);

		self.jar.set(cookie::access_token_cookie(&token, &self.config));

		Ok(Session::new(data.user, token))
	}

	async fn send(
		&self,
		method: Method,
		route: &str,
		body: RequestBody,
		bearer: Option<&AccessToken>,
	) -> Result<ApiResponse> {
		let url = self.config.endpoint(route)?;
		let mut headers = HeaderMap::new();

		headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

		if matches!(body, RequestBody::Json(_)) {
			headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		}
		if let Some(token) = bearer {
			headers.insert(AUTHORIZATION, bearer_header(token)?);
		}
		if let Some(forwarded) = self.jar.header_value(&[ACCESS_TOKEN_COOKIE]) {
			let value = HeaderValue::from_str(&forwarded)
				.map_err(|e| Error::from(ConfigError::HttpRequest(e.into())))?;

			headers.insert(COOKIE, value);
		}

		let request = OutboundRequest { method, url, headers, body };

		Ok(self.transport.execute(request).await?)
	}

	fn ingest(&self, response: &ApiResponse) {
		for raw in response.set_cookies() {
			self.jar.ingest_set_cookie(raw);
		}
	}
}
impl<T> Debug for CookieBridge<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CookieBridge")
			.field("api_base_url", &self.config.api_base_url.as_str())
			.finish()
	}
}
impl<T> TokenRefresher for CookieBridge<T>
where
	T: ?Sized + ApiTransport,
{
	fn refresh(&self) -> RefreshFuture<'_> {
		Box::pin(CookieBridge::refresh(self))
	}
}

fn json_body<B>(body: &B) -> Result<serde_json::Value>
where
	B: Serialize,
{
	serde_json::to_value(body).map_err(|e| TransportError::Io(std::io::Error::other(e)).into())
}

/// Renders `Authorization: Bearer <token>`.
pub(crate) fn bearer_header(token: &AccessToken) -> Result<HeaderValue> {
	let mut value = HeaderValue::from_str(&token.bearer())
		.map_err(|e| Error::from(ConfigError::HttpRequest(e.into())))?;

	value.set_sensitive(true);

	Ok(value)
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use ::http::{StatusCode, header::SET_COOKIE};
	use serde_json::json;
	// self
	use super::*;
	use crate::{cookie::MemoryCookieJar, http::TransportFuture};

	struct Canned {
		calls: AtomicUsize,
		seen: Mutex<Vec<OutboundRequest>>,
		answer: fn() -> std::result::Result<ApiResponse, TransportError>,
	}
	impl ApiTransport for Canned {
		fn execute(&self, request: OutboundRequest) -> TransportFuture<'_, ApiResponse> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.seen.lock().push(request);

			let answer = (self.answer)();

			Box::pin(async move { answer })
		}
	}

	fn bridge(
		answer: fn() -> std::result::Result<ApiResponse, TransportError>,
	) -> (CookieBridge<Canned>, Arc<Canned>, Arc<MemoryCookieJar>) {
		let config = SessionConfig::builder()
			.api_base_url(Url::parse("http://localhost:5000/api").expect("Test URL should parse."))
			.secure_cookies(false)
			.build()
			.expect("Test config should build.");
		let transport = Arc::new(Canned { calls: AtomicUsize::new(0), seen: Mutex::new(Vec::new()), answer });
		let jar = Arc::new(MemoryCookieJar::default());

		(CookieBridge::new(config, transport.clone(), jar.clone()), transport, jar)
	}

	#[tokio::test]
	async fn refresh_forwards_only_backend_cookies() {
		let (bridge, transport, jar) = bridge(|| {
			let mut response = ApiResponse::json(
				StatusCode::OK,
				&json!({ "success": true, "data": { "accessToken": "fresh" } }),
			);

			response.headers.append(SET_COOKIE, HeaderValue::from_static("refreshToken=r2; HttpOnly; Path=/"));

			Ok(response)
		});

		jar.ingest_set_cookie("refreshToken=r1; HttpOnly; Path=/");
		jar.ingest_set_cookie("access_token=stale; Max-Age=900; Path=/");

		let token = CookieBridge::refresh(&bridge).await.expect("Refresh should succeed.");

		assert_eq!(token.expose(), "fresh");
		assert_eq!(jar.access_token().as_deref(), Some("fresh"));

		CookieBridge::refresh(&bridge).await.expect("Second refresh should succeed.");

		let seen = transport.seen.lock();
		let forwarded = |i: usize| seen[i].headers.get(COOKIE).and_then(|v| v.to_str().ok());

		assert_eq!(seen[0].url.as_str(), "http://localhost:5000/api/auth/refresh");
		assert_eq!(forwarded(0), Some("refreshToken=r1"));
		assert_eq!(forwarded(1), Some("refreshToken=r2"));
	}

	#[tokio::test]
	async fn refresh_rejection_is_a_refresh_failure() {
		let (bridge, _, jar) = bridge(|| {
			Ok(ApiResponse::json(
				StatusCode::UNAUTHORIZED,
				&json!({ "success": false, "message": "Refresh token expired" }),
			))
		});

		jar.ingest_set_cookie("access_token=stale; Max-Age=900; Path=/");

		let err = CookieBridge::refresh(&bridge).await.expect_err("Refresh should be rejected.");

		assert!(matches!(
			err,
			Error::RefreshFailed(RefreshFailure::Rejected { status: 401, ref message }) if message == "Refresh token expired"
		));
		assert!(bridge.bootstrap().is_none());
	}

	#[tokio::test]
	async fn logout_is_fail_open() {
		let (bridge, transport, jar) = bridge(|| {
			Err(TransportError::Io(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "down")))
		});

		jar.ingest_set_cookie("refreshToken=r1; HttpOnly; Path=/");
		jar.ingest_set_cookie("access_token=a1; Max-Age=900; Path=/");
		bridge.logout().await;

		assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
		assert!(jar.names().is_empty());
	}

	struct Gated {
		entered: tokio::sync::Notify,
		gate: tokio::sync::Semaphore,
	}
	impl ApiTransport for Gated {
		fn execute(&self, request: OutboundRequest) -> TransportFuture<'_, ApiResponse> {
			Box::pin(async move {
				if request.url.path().ends_with(routes::REFRESH) {
					self.entered.notify_one();

					let _permit = self.gate.acquire().await.expect("Gate should stay open.");
					let mut response = ApiResponse::json(
						StatusCode::OK,
						&json!({ "success": true, "data": { "accessToken": "late" } }),
					);

					response
						.headers
						.append(SET_COOKIE, HeaderValue::from_static("refreshToken=r2; HttpOnly; Path=/"));

					return Ok(response);
				}

				Ok::<_, TransportError>(ApiResponse::json(StatusCode::OK, &json!({ "success": true })))
			})
		}
	}

	#[tokio::test]
	async fn logout_during_refresh_discards_the_late_cookies() {
		let config = SessionConfig::builder()
			.api_base_url(Url::parse("http://localhost:5000/api").expect("Test URL should parse."))
			.build()
			.expect("Test config should build.");
		let transport = Arc::new(Gated { entered: tokio::sync::Notify::new(), gate: tokio::sync::Semaphore::new(0) });
		let jar = Arc::new(MemoryCookieJar::default());
		let bridge = Arc::new(CookieBridge::new(config, transport.clone(), jar.clone()));

		jar.ingest_set_cookie("refreshToken=r1; HttpOnly; Path=/");
		jar.ingest_set_cookie("access_token=stale; Max-Age=900; Path=/");

		let refreshing = tokio::spawn({
			let bridge = bridge.clone();

			async move { CookieBridge::refresh(&*bridge).await }
		});

		transport.entered.notified().await;
		bridge.logout().await;
		transport.gate.add_permits(1);

		let outcome = refreshing.await.expect("Refresh task should not panic.");

		assert!(matches!(outcome, Err(Error::RefreshFailed(RefreshFailure::Superseded))));
		assert!(jar.names().is_empty());
		assert!(!bridge.has_refresh_credential());
	}

	#[test]
	fn bootstrap_reads_the_cookie_without_network() {
		let (bridge, transport, jar) = bridge(|| unreachable!("bootstrap must not call the backend"));

		assert!(bridge.bootstrap().is_none());

		jar.ingest_set_cookie("access_token=abc123; Max-Age=900; Path=/");

		assert_eq!(bridge.bootstrap().map(|t| t.expose().to_owned()).as_deref(), Some("abc123"));
		assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn me_accepts_wrapped_and_bare_identities() {
		let (wrapped, _, _) = bridge(|| {
			Ok(ApiResponse::json(
				StatusCode::OK,
				&json!({ "success": true, "data": { "user": { "_id": "u-1", "role": "SELLER" } } }),
			))
		});
		let (bare, _, _) = bridge(|| {
			Ok(ApiResponse::json(
				StatusCode::OK,
				&json!({ "success": true, "data": { "id": "u-2", "role": "admin" } }),
			))
		});
		let token = AccessToken::new("t");

		assert_eq!(wrapped.me(&token).await.expect("Wrapped identity should decode.").id.as_ref(), "u-1");
		assert_eq!(bare.me(&token).await.expect("Bare identity should decode.").id.as_ref(), "u-2");
	}
}
