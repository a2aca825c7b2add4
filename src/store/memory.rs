//! In-memory [`SessionMirror`] for tests and single-process demos.

// self
use crate::{
	_prelude::*,
	store::{SessionMirror, SessionSnapshot, StoreError},
};

/// Mirror that keeps the latest snapshot in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryMirror(Arc<RwLock<Option<SessionSnapshot>>>);
impl MemoryMirror {
	/// Returns the snapshot currently held, without going through the trait.
	pub fn snapshot(&self) -> Option<SessionSnapshot> {
		self.0.read().clone()
	}
}
impl SessionMirror for MemoryMirror {
	fn load(&self) -> Result<Option<SessionSnapshot>, StoreError> {
		Ok(self.snapshot())
	}

	fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
		*self.0.write() = Some(snapshot.clone());

		Ok(())
	}

	fn clear(&self) -> Result<(), StoreError> {
		self.0.write().take();

		Ok(())
	}
}
