// self
use crate::{_prelude::*, config::SessionConfig, error::ConfigError};

/// Builder for [`SessionConfig`] values.
#[derive(Debug)]
pub struct SessionConfigBuilder {
	/// Base URL of the identity/API backend.
	pub api_base_url: Option<Url>,
	/// Marks cookies `Secure`.
	pub secure_cookies: bool,
	/// Lifetime of the mirrored `access_token` cookie.
	pub access_cookie_max_age: Duration,
	/// Proactive refresh buffer.
	pub expiry_buffer: Duration,
	/// Refresh deadline.
	pub refresh_deadline: Duration,
	/// Login page path.
	pub login_path: String,
}
impl SessionConfigBuilder {
	/// Default lifetime of the `access_token` cookie.
	pub const DEFAULT_ACCESS_COOKIE_MAX_AGE: Duration = Duration::minutes(15);
	/// Default proactive refresh buffer.
	pub const DEFAULT_EXPIRY_BUFFER: Duration = Duration::seconds(60);
	/// Default refresh deadline.
	pub const DEFAULT_REFRESH_DEADLINE: Duration = Duration::seconds(15);

	/// Sets the API base URL.
	pub fn api_base_url(mut self, url: Url) -> Self {
		self.api_base_url = Some(url);

		self
	}

	/// Toggles the `Secure` cookie attribute.
	pub fn secure_cookies(mut self, secure: bool) -> Self {
		self.secure_cookies = secure;

		self
	}

	/// Overrides the `access_token` cookie lifetime.
	pub fn access_cookie_max_age(mut self, max_age: Duration) -> Self {
		self.access_cookie_max_age = max_age;

		self
	}

	/// Overrides the proactive refresh buffer.
	pub fn expiry_buffer(mut self, buffer: Duration) -> Self {
		self.expiry_buffer = buffer;

		self
	}

	/// Overrides the refresh deadline.
	pub fn refresh_deadline(mut self, deadline: Duration) -> Self {
		self.refresh_deadline = deadline;

		self
	}

	/// Overrides the login page path.
	pub fn login_path(mut self, path: impl Into<String>) -> Self {
		self.login_path = path.into();

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<SessionConfig, ConfigError> {
		let mut api_base_url = self.api_base_url.ok_or(ConfigError::MissingBaseUrl)?;

		if api_base_url.cannot_be_a_base() {
			return Err(ConfigError::CannotBeABase { url: api_base_url.to_string() });
		}
		if !api_base_url.path().ends_with('/') {
			let path = format!("{}/", api_base_url.path());

			api_base_url.set_path(&path);
		}
		if !self.refresh_deadline.is_positive() {
			return Err(ConfigError::NonPositiveDeadline);
		}
		if self.expiry_buffer.is_negative() {
			return Err(ConfigError::NegativeBuffer);
		}

		Ok(SessionConfig {
			api_base_url,
			secure_cookies: self.secure_cookies,
			access_cookie_max_age: self.access_cookie_max_age,
			expiry_buffer: self.expiry_buffer,
			refresh_deadline: self.refresh_deadline,
			login_path: self.login_path,
		})
	}
}
impl Default for SessionConfigBuilder {
	fn default() -> Self {
		Self {
			api_base_url: None,
			secure_cookies: true,
			access_cookie_max_age: Self::DEFAULT_ACCESS_COOKIE_MAX_AGE,
			expiry_buffer: Self::DEFAULT_EXPIRY_BUFFER,
			refresh_deadline: Self::DEFAULT_REFRESH_DEADLINE,
			login_path: "/login".into(),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Failed to parse test URL.")
	}

	#[test]
	fn build_normalizes_trailing_slash() {
		let config = SessionConfig::builder()
			.api_base_url(url("https://api.rx.test/v1"))
			.build()
			.expect("Config should build.");

		assert_eq!(config.api_base_url.as_str(), "https://api.rx.test/v1/");
		assert_eq!(config.expiry_buffer, Duration::seconds(60));
		assert_eq!(config.access_cookie_max_age, Duration::minutes(15));
		assert!(config.secure_cookies);
	}

	#[test]
	fn build_rejects_bad_timing_and_urls() {
		assert!(matches!(SessionConfig::builder().build(), Err(ConfigError::MissingBaseUrl)));
		assert!(matches!(
			SessionConfig::builder().api_base_url(url("mailto:ops@rx.test")).build(),
			Err(ConfigError::CannotBeABase { .. })
		));
		assert!(matches!(
			SessionConfig::builder()
				.api_base_url(url("https://api.rx.test"))
				.refresh_deadline(Duration::ZERO)
				.build(),
			Err(ConfigError::NonPositiveDeadline)
		));
		assert!(matches!(
			SessionConfig::builder()
				.api_base_url(url("https://api.rx.test"))
				.expiry_buffer(Duration::seconds(-1))
				.build(),
			Err(ConfigError::NegativeBuffer)
		));
	}
}
