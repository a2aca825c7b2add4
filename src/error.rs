//! Session-level error types shared across the bridge, coordinator, gateway, and stores.

// self
use crate::_prelude::*;

/// Session-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical session error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Session mirror failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Refresh could not produce a new access token; the session is gone.
	#[error(transparent)]
	RefreshFailed(#[from] RefreshFailure),

	/// Backend answered 401 for an authenticated call.
	#[error("Request was not authorized.")]
	Unauthorized {
		/// Parsed response body, when the backend sent one.
		payload: Option<serde_json::Value>,
	},
	/// Backend answered with a non-success status or envelope.
	#[error("Backend rejected the request: {message}.")]
	Backend {
		/// HTTP status code returned by the backend.
		status: u16,
		/// Backend- or session-supplied message.
		message: String,
		/// Parsed response body, when the backend sent one.
		payload: Option<serde_json::Value>,
	},
	/// Response body did not match the expected envelope.
	#[error("Backend returned a malformed response body.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the offending response.
		status: u16,
	},
	/// Access token could not be decoded into claims.
	#[error(transparent)]
	MalformedToken(#[from] crate::auth::ClaimsError),
}
impl Error {
	/// HTTP status associated with the error, `0` for failures that never reached the backend.
	pub fn status_code(&self) -> u16 {
		match self {
			Self::Unauthorized { .. } | Self::RefreshFailed(_) | Self::MalformedToken(_) => 401,
			Self::Backend { status, .. } | Self::MalformedResponse { status, .. } => *status,
			Self::Storage(_) | Self::Config(_) | Self::Transport(_) => 0,
		}
	}

	/// Returns `true` when the error is the canonical "needs refresh" signal.
	pub fn is_unauthorized(&self) -> bool {
		matches!(self, Self::Unauthorized { .. })
	}
}

/// Configuration and validation failures raised while assembling a session stack.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] ::http::Error),
	/// API base URL is missing.
	#[error("The API base URL is not configured.")]
	MissingBaseUrl,
	/// API base URL cannot be parsed or joined.
	#[error("The API base URL is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// API base URL cannot carry path segments.
	#[error("The API base URL `{url}` cannot be used as a base.")]
	CannotBeABase {
		/// Offending URL.
		url: String,
	},
	/// Environment variable carries an unusable value.
	#[error("Environment variable `{key}` has an invalid value.")]
	InvalidEnv {
		/// Variable name.
		key: &'static str,
	},
	/// Refresh deadline must be positive.
	#[error("The refresh deadline must be positive.")]
	NonPositiveDeadline,
	/// Expiry buffer must not be negative.
	#[error("The expiry buffer must not be negative.")]
	NegativeBuffer,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Terminal refresh failure shared verbatim with every queued waiter.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshFailure {
	/// Identity backend rejected the refresh credential (expired, invalid, revoked).
	#[error("Refresh credential was rejected: {message}.")]
	Rejected {
		/// HTTP status returned by the backend.
		status: u16,
		/// Backend-supplied message.
		message: String,
	},
	/// Refresh did not complete because the backend was unreachable or replied garbage.
	#[error("Refresh could not complete: {message}.")]
	Unavailable {
		/// Rendered underlying failure.
		message: String,
	},
	/// Refresh exceeded the coordinator deadline.
	#[error("Refresh did not settle within {seconds}s.")]
	TimedOut {
		/// Deadline that elapsed, in whole seconds.
		seconds: u64,
	},
	/// The caller driving the refresh went away before it settled.
	#[error("Refresh was abandoned before it settled.")]
	Abandoned,
	/// The session was logged out or replaced while the refresh was in flight; its token is
	/// discarded.
	#[error("Session ended while the refresh was in flight.")]
	Superseded,
}

/// Uniform error shape surfaced to UI layers: `{ message, statusCode, payload }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
	/// Human-readable message.
	pub message: String,
	/// HTTP status code, `0` for transport failures.
	pub status_code: u16,
	/// Parsed backend body, when available.
	pub payload: Option<serde_json::Value>,
}
impl ApiError {
	/// Message used for every transport-level failure.
	pub const NETWORK_MESSAGE: &'static str = "Network error";
}
impl Display for ApiError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{} (status {})", self.message, self.status_code)
	}
}
impl StdError for ApiError {}
impl From<Error> for ApiError {
	fn from(e: Error) -> Self {
		let status_code = e.status_code();

		match e {
			Error::Transport(_) =>
				Self { message: Self::NETWORK_MESSAGE.into(), status_code, payload: None },
			Error::Unauthorized { payload } => Self {
				message: payload
					.as_ref()
					.and_then(|value| crate::http::envelope::message_of(Some(value)))
					.unwrap_or_else(|| "Unauthorized".into()),
				status_code,
				payload,
			},
			Error::Backend { message, payload, .. } => Self { message, status_code, payload },
			other => Self { message: other.to_string(), status_code, payload: None },
		}
	}
}
