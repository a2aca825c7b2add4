#![cfg(feature = "reqwest")]

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use ::http::{
	StatusCode,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
use tokio::sync::Semaphore;
use httpmock::prelude::*;
use serde_json::json;
// self
use storefront_session::{
	_preludet::*,
	auth::{AccessToken, Identity, Role, UserId},
	bridge::CookieBridge,
	coordinator::{RefreshCoordinator, RefreshFuture, TokenRefresher},
	cookie::{CookieJar, MemoryCookieJar},
	error::{ApiError, TransportError},
	gateway::RequestGateway,
	http::{
		ApiRequest, ApiResponse, ApiTransport, MultipartPart, OutboundRequest, RequestBody,
		TransportFuture,
	},
	store::CredentialStore,
};

fn seller() -> Identity {
	Identity {
		id: UserId::new("seller-3").expect("Fixture user id should be valid."),
		name: Some("Northside Pharmacy".into()),
		email: None,
		role: Role::Seller,
	}
}

fn token_expiring_in(lifetime: Duration) -> String {
	mint_token("seller-3", Role::Seller, OffsetDateTime::now_utc() + lifetime)
}

fn refresh_body(token: &str) -> String {
	json!({ "success": true, "data": { "accessToken": token } }).to_string()
}

#[tokio::test]
async fn bearer_token_is_attached_and_envelope_decoded() {
	let server = MockServer::start_async().await;
	let session = build_test_session(&server.url("/api"));
	let token = token_expiring_in(Duration::minutes(10));

	session.store.set(AccessToken::new(token.clone()), seller());

	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/products").header("authorization", format!("Bearer {token}"));
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"success":true,"data":[{"name":"Paracetamol"},{"name":"Cetirizine"}]}"#);
		})
		.await;
	let products: Vec<serde_json::Value> = session
		.gateway
		.send_json(ApiRequest::get("/products"))
		.await
		.expect("Authenticated request should succeed.");

	mock.assert_async().await;

	assert_eq!(products.len(), 2);
	assert_eq!(products[0]["name"], "Paracetamol");
}

#[tokio::test]
async fn unauthorized_response_refreshes_and_retries_once() {
	let server = MockServer::start_async().await;
	let session = build_test_session(&server.url("/api"));
	let old = token_expiring_in(Duration::minutes(10));
	let new = token_expiring_in(Duration::minutes(15) + Duration::seconds(1));

	session.store.set(AccessToken::new(old.clone()), seller());

	let rejected = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/orders").header("authorization", format!("Bearer {old}"));
			then.status(401).body(r#"{"success":false,"message":"jwt expired"}"#);
		})
		.await;
	let accepted = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/orders").header("authorization", format!("Bearer {new}"));
			then.status(200).header("content-type", "application/json").body(r#"{"success":true,"data":[]}"#);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200).header("content-type", "application/json").body(refresh_body(&new));
		})
		.await;
	let response = session
		.gateway
		.send(ApiRequest::get("/orders"))
		.await
		.expect("Retried request should succeed.");

	assert_eq!(response.status, StatusCode::OK);

	rejected.assert_calls_async(1).await;
	accepted.assert_calls_async(1).await;
	refresh.assert_calls_async(1).await;

	assert_eq!(session.store.get().map(|token| token.expose().to_owned()), Some(new));
	assert_eq!(session.store.identity(), Some(seller()));
}

#[tokio::test]
async fn second_unauthorized_is_surfaced() {
	let server = MockServer::start_async().await;
	let session = build_test_session(&server.url("/api"));

	session.store.set(AccessToken::new(token_expiring_in(Duration::minutes(10))), seller());

	let resource = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/orders");
			then.status(401)
				.header("content-type", "application/json")
				.body(r#"{"success":false,"message":"Forbidden for this account"}"#);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.body(refresh_body(&token_expiring_in(Duration::minutes(15))));
		})
		.await;
	let err = session
		.gateway
		.send(ApiRequest::get("/orders"))
		.await
		.expect_err("A second 401 must not be retried again.");

	resource.assert_calls_async(2).await;
	refresh.assert_calls_async(1).await;

	assert_eq!(err.status_code, 401);
	assert_eq!(err.message, "Forbidden for this account");
	assert!(err.payload.is_some());
}

#[tokio::test]
async fn expiring_token_is_refreshed_before_sending() {
	let server = MockServer::start_async().await;
	let session = build_test_session(&server.url("/api"));
	let fresh = token_expiring_in(Duration::minutes(15));

	session.store.set(AccessToken::new(token_expiring_in(Duration::seconds(30))), seller());

	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200).header("content-type", "application/json").body(refresh_body(&fresh));
		})
		.await;
	let resource = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/cart").header("authorization", format!("Bearer {fresh}"));
			then.status(200).header("content-type", "application/json").body(r#"{"success":true,"data":{}}"#);
		})
		.await;

	session.gateway.send(ApiRequest::get("/cart")).await.expect("Request should succeed.");

	refresh.assert_calls_async(1).await;
	resource.assert_calls_async(1).await;
}

#[tokio::test]
async fn failed_refresh_normalizes_to_unauthorized_and_clears_the_session() {
	let server = MockServer::start_async().await;
	let session = build_test_session(&server.url("/api"));

	session.store.set(AccessToken::new(token_expiring_in(Duration::minutes(10))), seller());

	let _resource = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/orders");
			then.status(401);
		})
		.await;
	let _refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(401).body(r#"{"success":false,"message":"Refresh token expired"}"#);
		})
		.await;
	let err = session.gateway.send(ApiRequest::get("/orders")).await.expect_err("Refresh should fail.");

	assert_eq!(err.status_code, 401);
	assert!(session.store.get().is_none());
}

#[tokio::test]
async fn backend_errors_keep_status_message_and_payload() {
	let server = MockServer::start_async().await;
	let session = build_test_session(&server.url("/api"));
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/products");
			then.status(422)
				.header("content-type", "application/json")
				.body(r#"{"success":false,"message":"Price must be positive","errors":["price"]}"#);
		})
		.await;
	let err = session
		.gateway
		.send(ApiRequest::post("/products").json(json!({ "name": "Aspirin", "price": -1 })))
		.await
		.expect_err("Validation failure should surface.");

	assert_eq!(err.status_code, 422);
	assert_eq!(err.message, "Price must be positive");
	assert_eq!(err.payload.expect("Payload should be kept.")["errors"][0], "price");
}

#[tokio::test]
async fn network_failures_become_status_zero() {
	let session = build_test_session("http://127.0.0.1:9/api");
	let err = session
		.gateway
		.send(ApiRequest::get("/products"))
		.await
		.expect_err("Nothing listens on the discard port.");

	assert_eq!(err, ApiError { message: "Network error".into(), status_code: 0, payload: None });
}

/// Records every outbound request and answers `200 {}`.
#[derive(Default)]
struct Recording {
	seen: Mutex<Vec<OutboundRequest>>,
}
impl ApiTransport for Recording {
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_, ApiResponse> {
		self.seen.lock().push(request);

		Box::pin(async { Ok::<_, TransportError>(ApiResponse::new(StatusCode::OK, "{}")) })
	}
}

#[tokio::test]
async fn multipart_uploads_never_get_a_forced_json_content_type() {
	let config = test_config("http://localhost:5000/api");
	let transport = Arc::new(Recording::default());
	let jar: Arc<dyn CookieJar> = Arc::new(MemoryCookieJar::default());
	let store = Arc::new(CredentialStore::default());
	let bridge = Arc::new(CookieBridge::new(config.clone(), transport.clone(), jar));
	let coordinator = Arc::new(RefreshCoordinator::new(bridge, store.clone()));
	let gateway = RequestGateway::new(config, transport.clone(), store.clone(), coordinator);

	store.set(AccessToken::new(token_expiring_in(Duration::minutes(10))), seller());

	let upload = ApiRequest::post("/products/42/image")
		.multipart(vec![
			MultipartPart::text("alt", "Blister pack"),
			MultipartPart::file("image", "pack.png", "image/png", vec![0x89, 0x50, 0x4E, 0x47]),
		])
		.header(CONTENT_TYPE, ::http::HeaderValue::from_static("application/json"));

	gateway.send(upload).await.expect("Upload should succeed.");
	gateway
		.send(ApiRequest::post("/products/42/raw").binary(vec![1, 2, 3], Some("application/pdf".into())))
		.await
		.expect("Binary upload should succeed.");
	gateway
		.send(ApiRequest::post("/cart").json(json!({ "productId": "42", "quantity": 2 })))
		.await
		.expect("JSON request should succeed.");

	let seen = transport.seen.lock();

	assert_eq!(seen.len(), 3);
	assert!(!seen[0].headers.contains_key(CONTENT_TYPE));
	assert!(matches!(&seen[0].body, RequestBody::Multipart(parts) if parts.len() == 2));
	assert!(!seen[1].headers.contains_key(CONTENT_TYPE));
	assert!(matches!(
		&seen[1].body,
		RequestBody::Binary { content_type: Some(kind), .. } if kind == "application/pdf"
	));
	assert_eq!(seen[2].headers[CONTENT_TYPE], "application/json");
	assert!(seen.iter().all(|request| request.headers.contains_key(AUTHORIZATION)));
}

/// Rejects the stale bearer with a `401`. Calls under `/slow` hold their answer until the test
/// releases them, so their `401`s land after the token has already been rotated.
struct Staggered {
	stale: String,
	held: AtomicUsize,
	release: Semaphore,
}
impl ApiTransport for Staggered {
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_, ApiResponse> {
		Box::pin(async move {
			let bearer = request.headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());

			if bearer != Some(format!("Bearer {}", self.stale).as_str()) {
				return Ok(ApiResponse::new(StatusCode::OK, r#"{"success":true,"data":{}}"#));
			}
			if request.url.path().starts_with("/api/slow") {
				self.held.fetch_add(1, Ordering::SeqCst);

				let _permit = self.release.acquire().await.expect("Release gate should stay open.");
			}

			Ok::<_, TransportError>(ApiResponse::new(
				StatusCode::UNAUTHORIZED,
				r#"{"success":false,"message":"jwt expired"}"#,
			))
		})
	}
}

struct CountingRefresher {
	calls: AtomicUsize,
	token: String,
}
impl TokenRefresher for CountingRefresher {
	fn refresh(&self) -> RefreshFuture<'_> {
		let call = self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move { Ok(AccessToken::new(format!("{}-{call}", self.token))) })
	}
}

#[tokio::test]
async fn late_unauthorized_replays_with_the_rotated_token_without_refreshing_again() {
	const SLOW: usize = 4;

	let stale = token_expiring_in(Duration::minutes(10));
	let transport = Arc::new(Staggered {
		stale: stale.clone(),
		held: AtomicUsize::new(0),
		release: Semaphore::new(0),
	});
	let refresher = Arc::new(CountingRefresher {
		calls: AtomicUsize::new(0),
		token: token_expiring_in(Duration::minutes(15)),
	});
	let store = Arc::new(CredentialStore::default());
	let coordinator = Arc::new(RefreshCoordinator::new(refresher.clone(), store.clone()));
	let gateway = Arc::new(RequestGateway::new(
		test_config("http://localhost:5000/api"),
		transport.clone(),
		store.clone(),
		coordinator,
	));

	store.set(AccessToken::new(stale), seller());

	let slow = (0..SLOW)
		.map(|i| {
			let gateway = gateway.clone();

			tokio::spawn(async move { gateway.send(ApiRequest::get(format!("/slow/{i}"))).await })
		})
		.collect::<Vec<_>>();

	tokio::time::timeout(std::time::Duration::from_secs(5), async {
		while transport.held.load(Ordering::SeqCst) < SLOW {
			tokio::task::yield_now().await;
		}
	})
	.await
	.expect("Slow requests should reach the transport with the stale token.");

	gateway.send(ApiRequest::get("/fast")).await.expect("Fast request should refresh and succeed.");

	assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);

	for _ in 0..SLOW {
		transport.release.add_permits(1);
		tokio::task::yield_now().await;
	}
	for handle in slow {
		handle
			.await
			.expect("Slow request task should not panic.")
			.expect("Late 401s should be replayed with the rotated token.");
	}

	assert_eq!(refresher.calls.load(Ordering::SeqCst), 1, "Exactly one refresh for the whole burst.");
	assert_eq!(
		store.get().map(|token| token.expose().to_owned()),
		Some(format!("{}-0", refresher.token))
	);
}
