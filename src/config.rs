//! Session configuration: API base URL, cookie policy, and refresh timing.
//!
//! Values are assembled through [`SessionConfigBuilder`], which validates them once so the
//! bridge, coordinator, and gateway can treat the result as trusted. [`SessionConfig::from_env`]
//! reads the same settings from the process environment.

/// Builder API for assembling session configuration.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, error::ConfigError};

/// Validated configuration shared by every session component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
	/// Base URL of the identity/API backend, always ending in `/`.
	pub api_base_url: Url,
	/// Marks cookies `Secure`; enabled in production.
	pub secure_cookies: bool,
	/// Lifetime of the mirrored `access_token` cookie.
	pub access_cookie_max_age: Duration,
	/// Remaining lifetime below which the gateway refreshes before sending.
	pub expiry_buffer: Duration,
	/// Upper bound on a single refresh before waiters are rejected.
	pub refresh_deadline: Duration,
	/// Login page the edge guard redirects unauthenticated visitors to.
	pub login_path: String,
}
impl SessionConfig {
	/// Environment variable holding the API base URL.
	pub const ENV_API_BASE_URL: &'static str = "API_BASE_URL";
	/// Environment variable overriding the `Secure` cookie flag.
	pub const ENV_COOKIE_SECURE: &'static str = "COOKIE_SECURE";
	/// Environment variable naming the deployment environment.
	pub const ENV_APP_ENV: &'static str = "APP_ENV";

	/// Creates a new builder with storefront defaults.
	pub fn builder() -> SessionConfigBuilder {
		SessionConfigBuilder::default()
	}

	/// Loads configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Loads configuration through an arbitrary variable lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let raw_base = lookup(Self::ENV_API_BASE_URL)
			.filter(|value| !value.trim().is_empty())
			.ok_or(ConfigError::MissingBaseUrl)?;
		let api_base_url = Url::parse(raw_base.trim())
			.map_err(|source| ConfigError::InvalidBaseUrl { source })?;
		let secure = match lookup(Self::ENV_COOKIE_SECURE) {
			Some(raw) => parse_bool(&raw)
				.ok_or(ConfigError::InvalidEnv { key: Self::ENV_COOKIE_SECURE })?,
			None =>
				lookup(Self::ENV_APP_ENV).is_some_and(|env| env.eq_ignore_ascii_case("production"))
					|| api_base_url.scheme() == "https",
		};

		Self::builder().api_base_url(api_base_url).secure_cookies(secure).build()
	}

	/// Resolves an endpoint path (for example `/auth/refresh`) against the base URL.
	pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		self.api_base_url
			.join(path.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidBaseUrl { source })
	}
}

fn parse_bool(raw: &str) -> Option<bool> {
	match raw.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Some(true),
		"0" | "false" | "no" | "off" => Some(false),
		_ => None,
	}
}
