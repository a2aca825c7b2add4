//! Unverified claim decoding for JWT-shaped access tokens.
//!
//! Claims are read straight out of the payload segment. The signature is never checked here: the
//! identity backend re-validates every token it receives, and the edge layer only ever reads
//! tokens from an HttpOnly cookie written by this crate. Deployments that need stronger
//! guarantees plug a verifier into [`crate::guard::EdgeGuard`].

// crates.io
use base64::{
	Engine,
	alphabet::URL_SAFE,
	engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
// self
use crate::{_prelude::*, auth::Role};

const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
	&URL_SAFE,
	GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Failures raised while decoding token claims.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ClaimsError {
	/// Token does not have the `header.payload.signature` shape.
	#[error("Access token is not a three-part JWT.")]
	NotAJwt,
	/// Payload segment is not valid base64url.
	#[error("Access token payload is not valid base64url.")]
	Encoding,
	/// Payload segment is not a JSON object with the expected fields.
	#[error("Access token payload is not valid JSON: {0}.")]
	Json(String),
	/// Role claim is absent or names an unknown role.
	#[error("Access token carries no usable role claim.")]
	MissingRole,
	/// Expiry claim is present but not a representable instant.
	#[error("Access token expiry claim is out of range.")]
	InvalidExpiry,
}

/// Claims the storefront relies on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessClaims {
	/// Subject (account identifier), when present.
	pub subject: Option<String>,
	/// Role granted to the subject.
	pub role: Role,
	/// Issued-at instant, when present.
	pub issued_at: Option<OffsetDateTime>,
	/// Expiry instant; tokens without `exp` never expire on the client side.
	pub expires_at: Option<OffsetDateTime>,
}
impl AccessClaims {
	/// Decodes claims from a raw token without verifying its signature.
	pub fn decode(token: &str) -> Result<Self, ClaimsError> {
		let mut segments = token.split('.');
		let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
			(Some(header), Some(payload), Some(_), None)
				if !header.is_empty() && !payload.is_empty() =>
				payload,
			_ => return Err(ClaimsError::NotAJwt),
		};
		let bytes = PAYLOAD_ENGINE.decode(payload).map_err(|_| ClaimsError::Encoding)?;
		let raw: RawClaims =
			serde_json::from_slice(&bytes).map_err(|e| ClaimsError::Json(e.to_string()))?;

		raw.try_into()
	}

	/// Returns `true` when fewer than `buffer` remain before expiry at `now`.
	pub fn is_expiring_soon(&self, buffer: Duration, now: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| expires_at - now < buffer)
	}
}

#[derive(Deserialize)]
struct RawClaims {
	#[serde(default, alias = "id", alias = "userId")]
	sub: Option<serde_json::Value>,
	#[serde(default)]
	role: Option<String>,
	#[serde(default)]
	iat: Option<i64>,
	#[serde(default)]
	exp: Option<i64>,
}
impl TryFrom<RawClaims> for AccessClaims {
	type Error = ClaimsError;

	fn try_from(raw: RawClaims) -> Result<Self, Self::Error> {
		let role = raw
			.role
			.as_deref()
			.and_then(|value| value.parse::<Role>().ok())
			.ok_or(ClaimsError::MissingRole)?;
		let expires_at = raw
			.exp
			.map(|secs| {
				OffsetDateTime::from_unix_timestamp(secs).map_err(|_| ClaimsError::InvalidExpiry)
			})
			.transpose()?;
		let issued_at = raw.iat.and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok());
		let subject = raw.sub.and_then(|value| match value {
			serde_json::Value::String(s) => Some(s),
			serde_json::Value::Number(n) => Some(n.to_string()),
			_ => None,
		});

		Ok(Self { subject, role, issued_at, expires_at })
	}
}
