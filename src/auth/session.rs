//! Authenticated identity, session tuple, and login/registration payloads.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, Role, UserId},
};

/// Account details the identity backend returns for the signed-in user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
	/// Backend account identifier.
	#[serde(alias = "_id")]
	pub id: UserId,
	/// Display name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// Contact email.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	/// Role granted to the account.
	pub role: Role,
}

/// Identity plus the access token currently proving it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
	/// Signed-in account.
	pub identity: Identity,
	/// Current bearer token.
	pub access_token: AccessToken,
}
impl Session {
	/// Pairs an identity with its access token.
	pub fn new(identity: Identity, access_token: AccessToken) -> Self {
		Self { identity, access_token }
	}
}

/// Email/password pair submitted to `/auth/login`.
#[derive(Clone, Serialize)]
pub struct Credentials {
	/// Account email.
	pub email: String,
	/// Account password; never logged.
	pub password: String,
}
impl Credentials {
	/// Creates a credential pair.
	pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
		Self { email: email.into(), password: password.into() }
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Sign-up payload submitted to `/auth/register`.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
	/// Display name.
	pub name: String,
	/// Account email.
	pub email: String,
	/// Account password; never logged.
	pub password: String,
	/// Requested role; the backend decides whether to honor it.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub role: Option<Role>,
}
impl Debug for Registration {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Registration")
			.field("name", &self.name)
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.field("role", &self.role)
			.finish()
	}
}
