//! Credential storage: the in-process [`CredentialStore`] and the mirrors that persist it.

pub mod credential;
pub mod file;
pub mod memory;

pub use credential::CredentialStore;
pub use file::FileMirror;
pub use memory::MemoryMirror;

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, Identity},
};

/// Durable copy of the session used to rebuild the store on start.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
	/// Access token held when the snapshot was written.
	pub access_token: AccessToken,
	/// Identity, when known.
	pub identity: Option<Identity>,
	/// Instant the snapshot was written.
	#[serde(with = "time::serde::rfc3339")]
	pub saved_at: OffsetDateTime,
}

/// Persistence contract for session snapshots.
///
/// Calls are synchronous and expected to be cheap; the store invokes them on every write.
pub trait SessionMirror
where
	Self: Send + Sync,
{
	/// Loads the last snapshot, if any.
	fn load(&self) -> Result<Option<SessionSnapshot>, StoreError>;

	/// Persists a snapshot, replacing the previous one.
	fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError>;

	/// Drops any persisted snapshot.
	fn clear(&self) -> Result<(), StoreError>;
}

/// Error type produced by [`SessionMirror`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
