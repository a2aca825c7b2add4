//! Process-wide holder for the current access token and identity.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, Identity, Session},
	clock::{Clock, SystemClock},
	obs::{self, FlowKind},
	store::{SessionMirror, SessionSnapshot},
};

#[derive(Clone, Debug, Default)]
struct Slot {
	token: Option<AccessToken>,
	identity: Option<Identity>,
	version: u64,
	epoch: u64,
}

/// Holds the active session; writes are visible to every later read immediately.
///
/// The store performs no network I/O. When a [`SessionMirror`] is attached every write is
/// mirrored so the session can be rebuilt after a restart; mirror failures are logged and never
/// roll back the in-memory state. Mirror writes happen under the slot lock, so the snapshot on
/// disk follows the same order as the in-memory writes.
pub struct CredentialStore {
	slot: RwLock<Slot>,
	mirror: Option<Arc<dyn SessionMirror>>,
	clock: Arc<dyn Clock>,
}
impl CredentialStore {
	/// Creates an empty store that mirrors writes into `mirror`.
	pub fn with_mirror(mirror: Arc<dyn SessionMirror>) -> Self {
		Self { slot: Default::default(), mirror: Some(mirror), clock: Arc::new(SystemClock) }
	}

	/// Rebuilds a store from the mirror's last snapshot.
	pub fn restore(mirror: Arc<dyn SessionMirror>) -> Result<Self> {
		let snapshot = mirror.load()?;
		let store = Self::with_mirror(mirror);

		if let Some(snapshot) = snapshot {
			let mut slot = store.slot.write();

			slot.token = Some(snapshot.access_token);
			slot.identity = snapshot.identity;
			slot.version = 1;
		}

		Ok(store)
	}

	/// Overrides the clock used to stamp snapshots.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Current access token.
	pub fn get(&self) -> Option<AccessToken> {
		self.slot.read().token.clone()
	}

	/// Current identity, when known.
	pub fn identity(&self) -> Option<Identity> {
		self.slot.read().identity.clone()
	}

	/// Current session, when both token and identity are known.
	pub fn session(&self) -> Option<Session> {
		let slot = self.slot.read();

		match (&slot.token, &slot.identity) {
			(Some(token), Some(identity)) => Some(Session::new(identity.clone(), token.clone())),
			_ => None,
		}
	}

	/// Monotonic write counter; bumps on every `set`, `replace_token`, and `clear`.
	pub fn version(&self) -> u64 {
		self.slot.read().version
	}

	/// Session generation; bumps only when a session is installed or dropped.
	///
	/// A refresh started under one epoch must not write into another.
	pub fn epoch(&self) -> u64 {
		self.slot.read().epoch
	}

	/// Installs a fresh session.
	pub fn set(&self, token: AccessToken, identity: Identity) {
		let mut slot = self.slot.write();

		slot.token = Some(token);
		slot.identity = Some(identity);
		slot.version += 1;
		slot.epoch += 1;

		self.mirror_save(self.snapshot_of(&slot));
	}

	/// Swaps the access token while keeping the known identity.
	pub fn replace_token(&self, token: AccessToken) {
		let mut slot = self.slot.write();

		slot.token = Some(token);
		slot.version += 1;

		self.mirror_save(self.snapshot_of(&slot));
	}

	/// Swaps the access token only if the session is still the one from `epoch`.
	///
	/// Returns `false`, leaving the store untouched, when the session was cleared or replaced in
	/// the meantime.
	pub fn replace_token_in(&self, epoch: u64, token: AccessToken) -> bool {
		let mut slot = self.slot.write();

		if slot.epoch != epoch {
			return false;
		}

		slot.token = Some(token);
		slot.version += 1;

		self.mirror_save(self.snapshot_of(&slot));

		true
	}

	/// Records the identity for the current token (for example after `/auth/me`).
	pub fn set_identity(&self, identity: Identity) {
		let mut slot = self.slot.write();

		slot.identity = Some(identity);
		slot.version += 1;

		self.mirror_save(self.snapshot_of(&slot));
	}

	/// Drops the session.
	pub fn clear(&self) {
		self.clear_matching(None);
	}

	/// Drops the session only if it is still the one from `epoch`.
	pub fn clear_in(&self, epoch: u64) -> bool {
		self.clear_matching(Some(epoch))
	}

	fn clear_matching(&self, epoch: Option<u64>) -> bool {
		let mut slot = self.slot.write();

		if epoch.is_some_and(|epoch| epoch != slot.epoch) {
			return false;
		}

		slot.token = None;
		slot.identity = None;
		slot.version += 1;
		slot.epoch += 1;

		if let Some(Err(e)) = self.mirror.as_ref().map(|mirror| mirror.clear()) {
			obs::warn_absorbed(FlowKind::Logout, "session mirror clear failed", &e);
		}

		true
	}

	fn snapshot_of(&self, slot: &Slot) -> Option<SessionSnapshot> {
		self.mirror.as_ref()?;

		slot.token.clone().map(|access_token| SessionSnapshot {
			access_token,
			identity: slot.identity.clone(),
			saved_at: self.clock.now(),
		})
	}

	fn mirror_save(&self, snapshot: Option<SessionSnapshot>) {
		let Some((mirror, snapshot)) = self.mirror.as_ref().zip(snapshot) else {
			return;
		};

		if let Err(e) = mirror.save(&snapshot) {
			obs::warn_absorbed(FlowKind::Refresh, "session mirror write failed", &e);
		}
	}
}
impl Default for CredentialStore {
	fn default() -> Self {
		Self { slot: Default::default(), mirror: None, clock: Arc::new(SystemClock) }
	}
}
impl Debug for CredentialStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let slot = self.slot.read();

		f.debug_struct("CredentialStore")
			.field("token_set", &slot.token.is_some())
			.field("identity", &slot.identity)
			.field("version", &slot.version)
			.field("mirrored", &self.mirror.is_some())
			.finish()
	}
}
