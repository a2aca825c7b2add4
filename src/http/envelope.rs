//! Backend response envelope: `{ success, message?, data? }`.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, http::ApiResponse};

/// Wrapper every backend route answers with.
#[derive(Clone, Debug, Deserialize)]
pub struct Envelope<T> {
	/// Whether the backend considers the call successful.
	#[serde(default = "default_success")]
	pub success: bool,
	/// Optional human-readable message.
	#[serde(default)]
	pub message: Option<String>,
	/// Route-specific payload; a missing field reads as `None`.
	pub data: Option<T>,
}

fn default_success() -> bool {
	true
}

/// Pulls the `message` field out of an error body, if there is one.
pub fn message_of(payload: Option<&serde_json::Value>) -> Option<String> {
	payload?.get("message")?.as_str().map(str::to_owned)
}

/// Converts a non-2xx response into the matching [`Error`].
pub fn status_error(response: &ApiResponse) -> Error {
	let payload = response.json_value();

	if response.is_unauthorized() {
		return Error::Unauthorized { payload };
	}

	let message = message_of(payload.as_ref()).unwrap_or_else(|| {
		response.status.canonical_reason().unwrap_or("Request failed").to_owned()
	});

	Error::Backend { status: response.status.as_u16(), message, payload }
}

/// Decodes the envelope of a response regardless of its status.
pub fn decode<T>(response: &ApiResponse) -> Result<Envelope<T>>
where
	T: DeserializeOwned,
{
	let mut de = serde_json::Deserializer::from_slice(&response.body);

	serde_path_to_error::deserialize(&mut de)
		.map_err(|source| Error::MalformedResponse { source, status: response.status.as_u16() })
}

/// Returns the `data` payload of a successful response.
///
/// Non-2xx statuses map through [`status_error`]; a `success: false` envelope or a missing
/// `data` field becomes [`Error::Backend`] carrying the response status.
pub fn into_data<T>(response: &ApiResponse) -> Result<T>
where
	T: DeserializeOwned,
{
	if !response.is_success() {
		return Err(status_error(response));
	}

	let status = response.status.as_u16();
	let envelope = decode::<T>(response)?;

	if !envelope.success {
		return Err(Error::Backend {
			status,
			message: envelope.message.unwrap_or_else(|| "Request failed".into()),
			payload: response.json_value(),
		});
	}

	envelope.data.ok_or_else(|| Error::Backend {
		status,
		message: "Response carried no data".into(),
		payload: response.json_value(),
	})
}
