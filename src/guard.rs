//! Role-aware edge guard for the storefront's protected areas.
//!
//! The guard runs before a page renders. It reads the `access_token` cookie, decodes the role
//! claim, and decides whether the request may continue. It never fails: every problem with the
//! cookie or token becomes a redirect to the login page.
//!
//! Paths are canonicalized before the prefix lookup: percent-escapes are decoded, dot segments
//! resolved, repeated and backslash separators collapsed, and case folded. `//Admin/./%64ashboard`
//! therefore lands in the admin area like `/admin/dashboard` does.
//!
//! Claims are decoded without verifying the signature by default. The guard only picks which page
//! to show; every API call behind that page is still authorized by the backend. Deployments that
//! want signature checks at the edge plug in their own [`ClaimsVerifier`].

// crates.io
use ::http::header::COOKIE;
// self
use crate::{
	_prelude::*,
	auth::{AccessClaims, Role},
	config::SessionConfig,
	cookie::{self, ACCESS_TOKEN_COOKIE},
};

/// Outcome of evaluating one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardDecision {
	/// The request may proceed.
	Allow,
	/// No usable session; send the visitor to log in and come back.
	RedirectLogin {
		/// Login URL carrying the original path in `next`.
		location: String,
	},
	/// Signed in, but the area belongs to another role; send the visitor home.
	RedirectHome {
		/// Dashboard of the visitor's own role.
		location: String,
	},
}
impl GuardDecision {
	/// Returns `true` for [`GuardDecision::Allow`].
	pub fn is_allow(&self) -> bool {
		matches!(self, Self::Allow)
	}

	/// Redirect target, if the decision is a redirect.
	pub fn location(&self) -> Option<&str> {
		match self {
			Self::Allow => None,
			Self::RedirectLogin { location } | Self::RedirectHome { location } => Some(location),
		}
	}
}

/// Turns a raw access token into trusted claims.
pub trait ClaimsVerifier
where
	Self: Send + Sync,
{
	/// Decodes (and optionally verifies) `token`.
	///
	/// Rejections are reported as [`Error::MalformedToken`]; the guard turns any error into a
	/// login redirect.
	fn verify(&self, token: &str) -> Result<AccessClaims>;
}

/// Decodes the payload segment without checking the signature.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnverifiedClaims;
impl ClaimsVerifier for UnverifiedClaims {
	fn verify(&self, token: &str) -> Result<AccessClaims> {
		Ok(AccessClaims::decode(token)?)
	}
}

/// Maps role-scoped path prefixes to the role allowed inside them.
#[derive(Clone)]
pub struct EdgeGuard {
	login_path: String,
	verifier: Arc<dyn ClaimsVerifier>,
}
impl EdgeGuard {
	/// Creates a guard redirecting to the configured login page.
	pub fn new(config: &SessionConfig) -> Self {
		Self::with_login_path(config.login_path.clone())
	}

	/// Creates a guard redirecting to `login_path`.
	pub fn with_login_path(login_path: impl Into<String>) -> Self {
		Self { login_path: login_path.into(), verifier: Arc::new(UnverifiedClaims) }
	}

	/// Replaces the claims verifier.
	pub fn with_verifier(mut self, verifier: Arc<dyn ClaimsVerifier>) -> Self {
		self.verifier = verifier;

		self
	}

	/// Role that owns `path`, or `None` when the path is public.
	///
	/// Matching is per segment on the canonical path: `/admin` and `/admin/users` belong to
	/// [`Role::Admin`], `/administrator` does not.
	pub fn protected_role(path: &str) -> Option<Role> {
		let path = canonical_path(path);

		Role::ALL.into_iter().find(|role| in_area(&path, role.area_prefix()))
	}

	/// Evaluates a path against the raw `Cookie` request header.
	pub fn evaluate(&self, path: &str, cookie_header: Option<&str>) -> GuardDecision {
		let token = cookie_header.and_then(|header| cookie::find_in_header(header, ACCESS_TOKEN_COOKIE));

		self.evaluate_token(path, token.as_deref())
	}

	/// Evaluates a path against an already extracted access token.
	pub fn evaluate_token(&self, path: &str, token: Option<&str>) -> GuardDecision {
		let Some(required) = Self::protected_role(path) else {
			return GuardDecision::Allow;
		};
		let Some(claims) = token.and_then(|token| self.verifier.verify(token).ok()) else {
			return GuardDecision::RedirectLogin { location: self.login_location(path) };
		};

		if claims.role == required {
			GuardDecision::Allow
		} else {
			GuardDecision::RedirectHome { location: claims.role.home_path().to_owned() }
		}
	}

	/// Evaluates an incoming HTTP request.
	///
	/// Multiple `Cookie` headers (as HTTP/2 allows) are read as one.
	pub fn evaluate_request<B>(&self, request: &::http::Request<B>) -> GuardDecision {
		let cookies = request
			.headers()
			.get_all(COOKIE)
			.iter()
			.filter_map(|value| value.to_str().ok())
			.collect::<Vec<_>>()
			.join("; ");
		let cookies = if cookies.is_empty() { None } else { Some(cookies.as_str()) };

		self.evaluate(request.uri().path(), cookies)
	}

	fn login_location(&self, path: &str) -> String {
		let next: String = url::form_urlencoded::byte_serialize(path.as_bytes()).collect();
		let separator = if self.login_path.contains('?') { '&' } else { '?' };

		format!("{}{separator}next={next}", self.login_path)
	}
}
impl Debug for EdgeGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("EdgeGuard").field("login_path", &self.login_path).finish()
	}
}

fn in_area(path: &str, prefix: &str) -> bool {
	path.strip_prefix(prefix).is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Double- and triple-encoded escapes are unwrapped up to this many times.
const MAX_DECODE_ROUNDS: usize = 3;

/// Normalizes `path` the way a lenient router would before dispatching it.
fn canonical_path(path: &str) -> String {
	let end = path.find(['?', '#']).unwrap_or(path.len());
	let mut decoded = path[..end].to_owned();

	for _ in 0..MAX_DECODE_ROUNDS {
		let next = String::from_utf8_lossy(&urlencoding::decode_binary(decoded.as_bytes())).into_owned();

		if next == decoded {
			break;
		}

		decoded = next;
	}

	let mut segments = Vec::new();

	for segment in decoded.split(['/', '\\']) {
		match segment {
			"" | "." => {},
			".." => {
				segments.pop();
			},
			segment => segments.push(segment.to_ascii_lowercase()),
		}
	}

	format!("/{}", segments.join("/"))
}
