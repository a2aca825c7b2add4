//! Closed role enumeration and the role-scoped storefront areas it unlocks.

// self
use crate::_prelude::*;

/// Role claim carried inside every access token.
///
/// Serializes as the upper-case wire value; deserialization accepts any casing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
	/// Marketplace operator.
	Admin,
	/// Pharmacy listing products.
	Seller,
	/// Shopper placing orders.
	Customer,
}
impl Role {
	/// Every role, in table order.
	pub const ALL: [Role; 3] = [Role::Admin, Role::Seller, Role::Customer];

	/// Returns the claim value used on the wire.
	pub const fn as_str(self) -> &'static str {
		match self {
			Role::Admin => "ADMIN",
			Role::Seller => "SELLER",
			Role::Customer => "CUSTOMER",
		}
	}

	/// Path prefix of the area reserved for this role.
	pub const fn area_prefix(self) -> &'static str {
		match self {
			Role::Admin => "/admin",
			Role::Seller => "/seller",
			Role::Customer => "/customer",
		}
	}

	/// Landing page inside the role's own area.
	pub const fn home_path(self) -> &'static str {
		match self {
			Role::Admin => "/admin/dashboard",
			Role::Seller => "/seller/dashboard",
			Role::Customer => "/customer/dashboard",
		}
	}
}
impl Display for Role {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Role {
	type Err = UnknownRole;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Role::ALL
			.into_iter()
			.find(|role| role.as_str().eq_ignore_ascii_case(s))
			.ok_or_else(|| UnknownRole(s.to_owned()))
	}
}
impl<'de> Deserialize<'de> for Role {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		raw.parse().map_err(serde::de::Error::custom)
	}
}

/// Error returned when a role claim names no known role.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Unknown role `{0}`.")]
pub struct UnknownRole(pub String);
