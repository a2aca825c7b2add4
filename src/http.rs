//! Transport primitives for calls to the identity/API backend.
//!
//! The module exposes [`ApiTransport`] alongside the request/response value types it moves so
//! downstream crates can plug in their own HTTP stack (or a recording fake in tests) without
//! touching the bridge or gateway. Bodies are kept as owned, cloneable values because the gateway
//! may replay a request once after a refresh.

pub mod envelope;

pub use envelope::Envelope;

// crates.io
use ::http::{
	HeaderMap, HeaderValue, Method, StatusCode,
	header::{CONTENT_TYPE, SET_COOKIE},
};
// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`ApiTransport::execute`].
pub type TransportFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing backend calls.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by the bridge
/// and the gateway. A transport reports every HTTP response it receives, including 4xx/5xx, as
/// `Ok`; only failures that never produced a response become [`TransportError`].
pub trait ApiTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends a fully resolved request.
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_, ApiResponse>;
}

/// One part of a multipart body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultipartPart {
	/// Form field name.
	pub name: String,
	/// Optional file name for file parts.
	pub file_name: Option<String>,
	/// Optional MIME type for the part.
	pub content_type: Option<String>,
	/// Raw part contents.
	pub bytes: Vec<u8>,
}
impl MultipartPart {
	/// Creates a plain text field.
	pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			file_name: None,
			content_type: None,
			bytes: value.into().into_bytes(),
		}
	}

	/// Creates a file field.
	pub fn file(
		name: impl Into<String>,
		file_name: impl Into<String>,
		content_type: impl Into<String>,
		bytes: Vec<u8>,
	) -> Self {
		Self {
			name: name.into(),
			file_name: Some(file_name.into()),
			content_type: Some(content_type.into()),
			bytes,
		}
	}
}

/// Request payload variants.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RequestBody {
	/// No body.
	#[default]
	Empty,
	/// JSON document.
	Json(serde_json::Value),
	/// `multipart/form-data`; the transport generates the boundary-bearing content type.
	Multipart(Vec<MultipartPart>),
	/// Raw bytes with an optional explicit content type.
	Binary {
		/// Payload bytes.
		bytes: Vec<u8>,
		/// Content type sent alongside the bytes.
		content_type: Option<String>,
	},
}
impl RequestBody {
	/// Returns `true` for bodies whose content type must be left to the transport or caller.
	pub fn is_opaque(&self) -> bool {
		matches!(self, Self::Multipart(_) | Self::Binary { .. })
	}
}

/// Backend call as seen by application code; paths are relative to the API base URL.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the API base URL (for example `/products`).
	pub path: String,
	/// Extra headers supplied by the caller.
	pub headers: HeaderMap,
	/// Request payload.
	pub body: RequestBody,
	/// Disables refresh handling; used for the auth endpoints themselves.
	pub skip_refresh: bool,
}
impl ApiRequest {
	/// Creates a request with no body.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			headers: HeaderMap::new(),
			body: RequestBody::Empty,
			skip_refresh: false,
		}
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// Shorthand for a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// Shorthand for a `PUT` request.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::PUT, path)
	}

	/// Shorthand for a `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Attaches a JSON body.
	pub fn json(mut self, value: serde_json::Value) -> Self {
		self.body = RequestBody::Json(value);

		self
	}

	/// Attaches a multipart body.
	pub fn multipart(mut self, parts: Vec<MultipartPart>) -> Self {
		self.body = RequestBody::Multipart(parts);

		self
	}

	/// Attaches a raw body.
	pub fn binary(mut self, bytes: Vec<u8>, content_type: Option<String>) -> Self {
		self.body = RequestBody::Binary { bytes, content_type };

		self
	}

	/// Adds or replaces a header.
	pub fn header(mut self, name: ::http::header::HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Opts the request out of proactive and reactive refresh.
	pub fn skip_refresh(mut self) -> Self {
		self.skip_refresh = true;

		self
	}
}

/// Fully resolved request handed to an [`ApiTransport`].
#[derive(Clone, Debug)]
pub struct OutboundRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute URL.
	pub url: Url,
	/// Final header set.
	pub headers: HeaderMap,
	/// Request payload.
	pub body: RequestBody,
}

/// Backend response captured by the transport.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw body bytes.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Convenience constructor used by fakes.
	pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Convenience constructor for JSON bodies.
	pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
		let mut response = Self::new(status, value.to_string());

		response.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		response
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Returns `true` for the canonical "needs refresh" status.
	pub fn is_unauthorized(&self) -> bool {
		self.status == StatusCode::UNAUTHORIZED
	}

	/// Parses the body as JSON, if it is JSON.
	pub fn json_value(&self) -> Option<serde_json::Value> {
		if self.body.is_empty() {
			return None;
		}

		serde_json::from_slice(&self.body).ok()
	}

	/// Iterates over every `Set-Cookie` header value.
	pub fn set_cookies(&self) -> impl Iterator<Item = &str> {
		self.headers.get_all(SET_COOKIE).iter().filter_map(|value| value.to_str().ok())
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	fn build_form(
		parts: Vec<MultipartPart>,
	) -> Result<reqwest::multipart::Form, TransportError> {
		let mut form = reqwest::multipart::Form::new();

		for part in parts {
			let mut piece = reqwest::multipart::Part::bytes(part.bytes);

			if let Some(file_name) = part.file_name {
				piece = piece.file_name(file_name);
			}
			if let Some(content_type) = part.content_type {
				piece = piece.mime_str(&content_type)?;
			}

			form = form.part(part.name, piece);
		}

		Ok(form)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiTransport for ReqwestTransport {
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_, ApiResponse> {
		let client = self.0.clone();

		Box::pin(async move {
			let OutboundRequest { method, url, headers, body } = request;
			let mut builder = client.request(method, url).headers(headers);

			builder = match body {
				RequestBody::Empty => builder,
				RequestBody::Json(value) => builder.body(
					serde_json::to_vec(&value)
						.map_err(|e| TransportError::Io(std::io::Error::other(e)))?,
				),
				RequestBody::Multipart(parts) => builder.multipart(Self::build_form(parts)?),
				RequestBody::Binary { bytes, content_type } => {
					let builder = builder.body(bytes);

					match content_type {
						Some(value) => builder.header(CONTENT_TYPE, value),
						None => builder,
					}
				},
			};

			let response = builder.send().await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();

			Ok(ApiResponse { status, headers, body })
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn response_helpers_read_json_and_cookies() {
		let mut response = ApiResponse::json(
			StatusCode::OK,
			&serde_json::json!({ "success": true, "data": { "accessToken": "t" } }),
		);

		response
			.headers
			.append(SET_COOKIE, HeaderValue::from_static("refreshToken=r1; HttpOnly; Path=/"));
		response.headers.append(SET_COOKIE, HeaderValue::from_static("theme=dark"));

		assert!(response.is_success());
		assert_eq!(response.json_value().expect("Body should be JSON.")["data"]["accessToken"], "t");
		assert_eq!(response.set_cookies().count(), 2);
	}

	#[test]
	fn opaque_bodies_are_detected() {
		assert!(RequestBody::Multipart(vec![MultipartPart::text("name", "Aspirin")]).is_opaque());
		assert!(RequestBody::Binary { bytes: vec![1, 2], content_type: None }.is_opaque());
		assert!(!RequestBody::Json(serde_json::json!({})).is_opaque());
		assert!(!RequestBody::Empty.is_opaque());
	}

	#[test]
	fn empty_bodies_are_not_json() {
		assert!(ApiResponse::new(StatusCode::NO_CONTENT, Vec::new()).json_value().is_none());
		assert!(ApiResponse::new(StatusCode::BAD_GATEWAY, "<html>").json_value().is_none());
	}
}
