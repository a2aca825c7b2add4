//! Thread-safe in-memory [`CookieJar`] honoring `Max-Age` and `Expires`.

// crates.io
use ::cookie::Cookie;
// self
use crate::{
	_prelude::*,
	clock::{Clock, SystemClock},
	cookie::{ACCESS_TOKEN_COOKIE, CookieJar},
};

#[derive(Clone, Debug)]
struct StoredCookie {
	cookie: Cookie<'static>,
	expires_at: Option<OffsetDateTime>,
}
impl StoredCookie {
	fn is_live(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_none_or(|instant| now < instant)
	}
}

/// Cookie jar that keeps cookies in-process, as a browser would for one tab.
#[derive(Clone)]
pub struct MemoryCookieJar {
	cookies: Arc<RwLock<HashMap<String, StoredCookie>>>,
	clock: Arc<dyn Clock>,
}
impl MemoryCookieJar {
	/// Creates a jar that evaluates expiry against `clock`.
	pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
		Self { cookies: Default::default(), clock }
	}

	/// Names of all live cookies, sorted.
	pub fn names(&self) -> Vec<String> {
		let now = self.clock.now();
		let mut names: Vec<_> = self
			.cookies
			.read()
			.iter()
			.filter(|(_, stored)| stored.is_live(now))
			.map(|(name, _)| name.clone())
			.collect();

		names.sort();

		names
	}

	fn value_of(&self, name: &str) -> Option<String> {
		let now = self.clock.now();

		self.cookies
			.read()
			.get(name)
			.filter(|stored| stored.is_live(now))
			.map(|stored| stored.cookie.value().to_owned())
	}

	fn expiry_of(cookie: &Cookie<'_>, now: OffsetDateTime) -> Option<OffsetDateTime> {
		match (cookie.max_age(), cookie.expires_datetime()) {
			(Some(max_age), _) => Some(now + max_age),
			(None, Some(instant)) => Some(instant),
			(None, None) => None,
		}
	}
}
impl Default for MemoryCookieJar {
	fn default() -> Self {
		Self::with_clock(Arc::new(SystemClock))
	}
}
impl Debug for MemoryCookieJar {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MemoryCookieJar").field("names", &self.names()).finish()
	}
}
impl CookieJar for MemoryCookieJar {
	fn access_token(&self) -> Option<String> {
		self.value_of(ACCESS_TOKEN_COOKIE)
	}

	fn set(&self, cookie: Cookie<'static>) {
		let now = self.clock.now();
		let expires_at = Self::expiry_of(&cookie, now);
		let name = cookie.name().to_owned();
		let stored = StoredCookie { cookie, expires_at };
		let mut guard = self.cookies.write();

		if stored.is_live(now) {
			guard.insert(name, stored);
		} else {
			guard.remove(&name);
		}
	}

	fn remove(&self, name: &str) {
		self.cookies.write().remove(name);
	}

	fn clear(&self) {
		self.cookies.write().clear();
	}

	fn header_value(&self, excluded: &[&str]) -> Option<String> {
		let now = self.clock.now();
		let guard = self.cookies.read();
		let mut pairs: Vec<_> = guard
			.iter()
			.filter(|(name, stored)| !excluded.contains(&name.as_str()) && stored.is_live(now))
			.map(|(_, stored)| stored.cookie.stripped().encoded().to_string())
			.collect();

		if pairs.is_empty() {
			return None;
		}

		pairs.sort();

		Some(pairs.join("; "))
	}
}
