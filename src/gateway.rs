//! Authenticated request gateway.
//!
//! Every resource call goes through [`RequestGateway::send`], which attaches the bearer token,
//! refreshes it proactively when it is about to expire, and on a `401` refreshes once through the
//! shared [`RefreshCoordinator`] before replaying the request. Failures come back as [`ApiError`]
//! so UI layers only ever see one error shape.
//!
//! Each attempt remembers the token it was sent with. A `401` that arrives after another request
//! already rotated that token is replayed with the current one instead of starting a second
//! refresh, and a `401` on a call made without a session is surfaced untouched.

// crates.io
use ::http::{
	HeaderMap, HeaderValue,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	bridge,
	clock::{Clock, SystemClock},
	config::SessionConfig,
	coordinator::{RefreshCoordinator, TokenRefresher},
	error::ApiError,
	http::{ApiRequest, ApiResponse, ApiTransport, OutboundRequest, RequestBody, envelope},
	obs::{self, FlowKind},
	store::CredentialStore,
};

/// Sends API calls on behalf of the signed-in user.
pub struct RequestGateway<T, R>
where
	T: ?Sized + ApiTransport,
	R: ?Sized + TokenRefresher,
{
	config: SessionConfig,
	transport: Arc<T>,
	store: Arc<CredentialStore>,
	coordinator: Arc<RefreshCoordinator<R>>,
	clock: Arc<dyn Clock>,
}
impl<T, R> RequestGateway<T, R>
where
	T: ?Sized + ApiTransport,
	R: ?Sized + TokenRefresher,
{
	/// Creates a gateway sharing `store` and `coordinator` with the rest of the session.
	pub fn new(
		config: SessionConfig,
		transport: Arc<T>,
		store: Arc<CredentialStore>,
		coordinator: Arc<RefreshCoordinator<R>>,
	) -> Self {
		Self { config, transport, store, coordinator, clock: Arc::new(SystemClock) }
	}

	/// Overrides the clock used for the proactive-refresh check.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Coordinator the gateway refreshes through.
	pub fn coordinator(&self) -> &Arc<RefreshCoordinator<R>> {
		&self.coordinator
	}

	/// Sends `request`, refreshing and replaying it at most once on a `401`.
	///
	/// 2xx responses are returned as-is; every other outcome is normalized into [`ApiError`].
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
		self.dispatch(request).await.map_err(ApiError::from)
	}

	/// Sends `request` and decodes the `data` field of the response envelope.
	pub async fn send_json<D>(&self, request: ApiRequest) -> Result<D, ApiError>
	where
		D: DeserializeOwned,
	{
		let response = self.send(request).await?;

		envelope::into_data(&response).map_err(ApiError::from)
	}

	async fn dispatch(&self, request: ApiRequest) -> Result<ApiResponse> {
		obs::observe(FlowKind::Request, "send", async {
			let mut token = self.store.get();

			if !request.skip_refresh && token.as_ref().is_some_and(|t| self.is_expiring(t)) {
				token = Some(self.coordinator.ensure_fresh_token().await?);
			}

			let response = self.execute(&request, token.as_ref()).await?;

			if !response.is_unauthorized() || request.skip_refresh {
				return settle(response);
			}

			let fresh = match self.store.get() {
				// No session to recover, or it ended while the call was out.
				None => return settle(response),
				Some(current) if token.as_ref() != Some(&current) => current,
				Some(_) => self.coordinator.ensure_fresh_token().await?,
			};
			// Exactly one replay; a second 401 is final.
			let replayed = self.execute(&request, Some(&fresh)).await?;

			settle(replayed)
		})
		.await
	}

	/// Undecodable tokens count as expiring.
	fn is_expiring(&self, token: &AccessToken) -> bool {
		token
			.claims()
			.map_or(true, |claims| claims.is_expiring_soon(self.config.expiry_buffer, self.clock.now()))
	}

	async fn execute(&self, request: &ApiRequest, token: Option<&AccessToken>) -> Result<ApiResponse> {
		let url = self.config.endpoint(&request.path)?;
		let mut headers = request.headers.clone();

		apply_content_type(&mut headers, &request.body);

		if !headers.contains_key(ACCEPT) {
			headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
		}
		if let Some(token) = token {
			headers.insert(AUTHORIZATION, bridge::bearer_header(token)?);
		}

		let outbound = OutboundRequest {
			method: request.method.clone(),
			url,
			headers,
			body: request.body.clone(),
		};

		Ok(self.transport.execute(outbound).await?)
	}
}
impl<T, R> Debug for RequestGateway<T, R>
where
	T: ?Sized + ApiTransport,
	R: ?Sized + TokenRefresher,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestGateway")
			.field("api_base_url", &self.config.api_base_url.as_str())
			.field("coordinator", &self.coordinator)
			.finish()
	}
}

/// JSON is the default; multipart and binary bodies keep whatever the transport or caller sets.
fn apply_content_type(headers: &mut HeaderMap, body: &RequestBody) {
	if !body.is_opaque() {
		headers.entry(CONTENT_TYPE).or_insert(HeaderValue::from_static("application/json"));

		return;
	}
	// The transport writes the boundary-bearing header itself.
	if matches!(body, RequestBody::Multipart(_)) {
		headers.remove(CONTENT_TYPE);
	}
}

fn settle(response: ApiResponse) -> Result<ApiResponse> {
	if response.is_success() { Ok(response) } else { Err(envelope::status_error(&response)) }
}
