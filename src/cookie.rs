//! Cookie policy and storage for the access-token mirror and backend-owned cookies.
//!
//! The bridge writes one cookie of its own, [`ACCESS_TOKEN_COOKIE`], and otherwise treats the
//! jar as an opaque carrier for whatever the identity backend sets (the refresh credential in
//! particular). Jars never hand backend-owned cookie values to application code; they only
//! render them back into a `Cookie` header aimed at the backend.

pub mod memory;

pub use memory::MemoryCookieJar;

// crates.io
use ::cookie::{Cookie, SameSite};
// self
use crate::{_prelude::*, auth::AccessToken, config::SessionConfig};

/// Name of the short-lived, HttpOnly cookie mirroring the access token.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Storage contract for the cookies a session carries.
pub trait CookieJar
where
	Self: Send + Sync,
{
	/// Returns the live [`ACCESS_TOKEN_COOKIE`] value, the only cookie readable by callers.
	fn access_token(&self) -> Option<String>;

	/// Stores a cookie, replacing any cookie with the same name.
	///
	/// Cookies that are already expired (for example `Max-Age=0`) remove the stored cookie.
	fn set(&self, cookie: Cookie<'static>);

	/// Removes a cookie; succeeds even when the cookie is absent.
	fn remove(&self, name: &str);

	/// Removes every cookie.
	fn clear(&self);

	/// Renders every live cookie except `excluded` into a `Cookie` request header value.
	fn header_value(&self, excluded: &[&str]) -> Option<String>;

	/// Ingests a raw `Set-Cookie` header; malformed values are ignored.
	fn ingest_set_cookie(&self, raw: &str) {
		if let Ok(cookie) = Cookie::parse_encoded(raw.to_owned()) {
			self.set(cookie);
		}
	}
}

/// Builds the `access_token` cookie: HttpOnly, `SameSite=Lax`, `Path=/`, short-lived.
pub fn access_token_cookie(token: &AccessToken, config: &SessionConfig) -> Cookie<'static> {
	Cookie::build((ACCESS_TOKEN_COOKIE, token.expose().to_owned()))
		.path("/")
		.http_only(true)
		.same_site(SameSite::Lax)
		.secure(config.secure_cookies)
		.max_age(config.access_cookie_max_age)
		.build()
}

/// Looks up one cookie in a raw `Cookie` request header.
pub fn find_in_header(header: &str, name: &str) -> Option<String> {
	Cookie::split_parse_encoded(header)
		.filter_map(|parsed| parsed.ok())
		.find(|cookie| cookie.name() == name)
		.map(|cookie| cookie.value().to_owned())
		.filter(|value| !value.is_empty())
}
