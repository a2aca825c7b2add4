//! Session core for the pharmacy storefront: cookie-bridged refresh, single-flight token
//! rotation, a retrying request gateway, and a role-aware edge guard.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod bridge;
pub mod client;
pub mod clock;
pub mod config;
pub mod cookie;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod guard;
pub mod http;
pub mod obs;
pub mod store;
#[cfg(feature = "reqwest")]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests and demos.

	pub use crate::_prelude::*;

	// crates.io
	use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
	// self
	use crate::{
		auth::Role,
		bridge::CookieBridge,
		config::SessionConfig,
		cookie::{CookieJar, MemoryCookieJar},
		coordinator::RefreshCoordinator,
		gateway::RequestGateway,
		http::ReqwestTransport,
		store::CredentialStore,
	};

	/// Bridge type alias used by reqwest-backed integration tests.
	pub type ReqwestTestBridge = CookieBridge<ReqwestTransport>;
	/// Gateway type alias used by reqwest-backed integration tests.
	pub type ReqwestTestGateway = RequestGateway<ReqwestTransport, ReqwestTestBridge>;

	/// Every piece of a reqwest-backed session stack, wired the same way an application would.
	pub struct TestSession {
		/// Cookie jar shared by the bridge.
		pub jar: Arc<MemoryCookieJar>,
		/// Credential store shared by the coordinator and gateway.
		pub store: Arc<CredentialStore>,
		/// Cookie bridge talking to the mock identity backend.
		pub bridge: Arc<ReqwestTestBridge>,
		/// Single-flight coordinator wrapping the bridge.
		pub coordinator: Arc<RefreshCoordinator<ReqwestTestBridge>>,
		/// Gateway used for resource calls.
		pub gateway: ReqwestTestGateway,
	}

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_transport() -> ReqwestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(client)
	}

	/// Builds a session configuration pointing at the provided mock server base URL.
	pub fn test_config(base_url: &str) -> SessionConfig {
		SessionConfig::builder()
			.api_base_url(Url::parse(base_url).expect("Mock server URL should parse."))
			.secure_cookies(false)
			.build()
			.expect("Test session configuration should build.")
	}

	/// Constructs the full bridge/coordinator/gateway stack backed by an in-memory jar and store.
	pub fn build_test_session(base_url: &str) -> TestSession {
		let config = test_config(base_url);
		let transport = Arc::new(test_reqwest_transport());
		let jar = Arc::new(MemoryCookieJar::default());
		let jar_dyn: Arc<dyn CookieJar> = jar.clone();
		let store = Arc::new(CredentialStore::default());
		let bridge = Arc::new(CookieBridge::new(config.clone(), transport.clone(), jar_dyn));
		let coordinator = Arc::new(RefreshCoordinator::new(bridge.clone(), store.clone()));
		let gateway = RequestGateway::new(config, transport, store.clone(), coordinator.clone());

		TestSession { jar, store, bridge, coordinator, gateway }
	}

	/// Mints an unsigned JWT-shaped token carrying the provided claims.
	///
	/// The signature segment is a fixed placeholder; nothing in the crate verifies it.
	pub fn mint_token(subject: &str, role: Role, expires_at: OffsetDateTime) -> String {
		let issued_at = expires_at - Duration::minutes(15);

		mint_token_with_payload(&serde_json::json!({
			"sub": subject,
			"role": role.as_str(),
			"iat": issued_at.unix_timestamp(),
			"exp": expires_at.unix_timestamp(),
		}))
	}

	/// Mints an unsigned JWT-shaped token around an arbitrary JSON payload.
	pub fn mint_token_with_payload(payload: &serde_json::Value) -> String {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
		let body = URL_SAFE_NO_PAD.encode(payload.to_string());

		format!("{header}.{body}.c2lnbmF0dXJl")
	}
}

mod _prelude {
	pub use std::{
		collections::{HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

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
#[cfg(test)] use {color_eyre as _, httpmock as _};
