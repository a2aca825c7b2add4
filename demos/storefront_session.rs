//! Walks one storefront session against a mocked identity backend: login, an authenticated
//! catalog call that survives an expired token, the edge guard's view of the session cookie, and
//! a fail-open logout.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
use url::Url;
// self
use storefront_session::{
	_preludet::mint_token,
	auth::{Credentials, Role},
	client::SessionClient,
	config::SessionConfig,
	cookie::{ACCESS_TOKEN_COOKIE, CookieJar, MemoryCookieJar},
	http::{ApiRequest, ReqwestTransport},
	store::CredentialStore,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let first = mint_token("seller-1", Role::Seller, OffsetDateTime::now_utc() + Duration::minutes(15));
	let second = mint_token("seller-1", Role::Seller, OffsetDateTime::now_utc() + Duration::minutes(30));
	let login = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/login");
			then.status(200)
				.header("content-type", "application/json")
				.header("set-cookie", "refreshToken=demo-refresh; HttpOnly; Path=/")
				.body(format!(
					r#"{{"success":true,"data":{{"accessToken":"{first}","user":{{"_id":"seller-1","name":"Northside Pharmacy","role":"SELLER"}}}}}}"#
				));
		})
		.await;
	let revoked = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/products").header("authorization", format!("Bearer {first}"));
			then.status(401).body(r#"{"success":false,"message":"jwt expired"}"#);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh").header("cookie", "refreshToken=demo-refresh");
			then.status(200)
				.header("content-type", "application/json")
				.body(format!(r#"{{"success":true,"data":{{"accessToken":"{second}"}}}}"#));
		})
		.await;
	let products = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/products").header("authorization", format!("Bearer {second}"));
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"success":true,"data":[{"name":"Paracetamol 500mg"},{"name":"Loratadine 10mg"}]}"#);
		})
		.await;
	let logout = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/logout");
			then.status(503);
		})
		.await;
	let config = SessionConfig::builder()
		.api_base_url(Url::parse(&server.url("/api"))?)
		.secure_cookies(false)
		.build()?;
	let jar = Arc::new(MemoryCookieJar::default());
	let client = SessionClient::with_transport(
		config,
		Arc::new(ReqwestTransport::default()),
		jar.clone(),
		Arc::new(CredentialStore::default()),
	);
	let session = client.login(Credentials::new("owner@northside.test", "demo-password")).await?;

	println!("Signed in as {} ({}).", session.identity.id, session.identity.role);

	let catalog: Vec<serde_json::Value> =
		client.gateway().send_json(ApiRequest::get("/products")).await?;

	println!("Catalog has {} products after one transparent refresh.", catalog.len());

	let guard = client.edge_guard();
	let cookie_header = jar
		.access_token()
		.map(|token| format!("{ACCESS_TOKEN_COOKIE}={token}"));

	println!("Seller dashboard: {:?}.", guard.evaluate("/seller/dashboard", cookie_header.as_deref()));
	println!("Admin area: {:?}.", guard.evaluate("/admin", cookie_header.as_deref()));

	client.logout().await;

	println!("After logout: {:?}.", guard.evaluate("/seller/dashboard", None));

	login.assert_async().await;
	revoked.assert_async().await;
	refresh.assert_async().await;
	products.assert_async().await;
	logout.assert_async().await;

	Ok(())
}
