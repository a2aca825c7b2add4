#![cfg(feature = "reqwest")]

// std
use std::{env, process};
// crates.io
use time::macros;
// self
use storefront_session::{
	_preludet::*,
	auth::{AccessToken, Identity, Role, UserId},
	clock::ManualClock,
	store::{CredentialStore, FileMirror, MemoryMirror, SessionMirror, SessionSnapshot, StoreError},
};

fn customer() -> Identity {
	Identity {
		id: UserId::new("customer-9").expect("Fixture user id should be valid."),
		name: Some("Lin".into()),
		email: Some("lin@rx.test".into()),
		role: Role::Customer,
	}
}

fn temp_path() -> std::path::PathBuf {
	env::temp_dir().join(format!(
		"storefront_session_store_{}_{}.json",
		process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos()
	))
}

#[test]
fn writes_are_visible_immediately_and_bump_the_version() {
	let store = CredentialStore::default();

	assert!(store.get().is_none());
	assert!(store.session().is_none());

	store.set(AccessToken::new("a1"), customer());

	assert_eq!(store.get(), Some(AccessToken::new("a1")));
	assert_eq!(store.session().map(|session| session.identity), Some(customer()));

	let before = store.version();

	store.replace_token(AccessToken::new("a2"));

	assert_eq!(store.get(), Some(AccessToken::new("a2")));
	assert_eq!(store.identity(), Some(customer()));
	assert!(store.version() > before);

	store.clear();

	assert!(store.get().is_none());
	assert!(store.identity().is_none());
}

#[test]
fn mirror_tracks_every_write() {
	let mirror = Arc::new(MemoryMirror::default());
	let clock = ManualClock::new(macros::datetime!(2025-06-01 08:30 UTC));
	let store = CredentialStore::with_mirror(mirror.clone()).with_clock(Arc::new(clock));

	store.set(AccessToken::new("a1"), customer());

	let snapshot = mirror.snapshot().expect("Login should be mirrored.");

	assert_eq!(snapshot.access_token, AccessToken::new("a1"));
	assert_eq!(snapshot.identity, Some(customer()));
	assert_eq!(snapshot.saved_at, macros::datetime!(2025-06-01 08:30 UTC));

	store.clear();

	assert!(mirror.snapshot().is_none());
}

#[test]
fn writes_pinned_to_an_old_epoch_are_refused() {
	let mirror = Arc::new(MemoryMirror::default());
	let store = CredentialStore::with_mirror(mirror.clone());

	store.set(AccessToken::new("a1"), customer());

	let epoch = store.epoch();

	assert!(store.replace_token_in(epoch, AccessToken::new("a2")));
	assert_eq!(store.epoch(), epoch, "Rotating the token keeps the session epoch.");

	store.clear();

	assert!(!store.replace_token_in(epoch, AccessToken::new("late")));
	assert!(store.get().is_none());
	assert!(mirror.snapshot().is_none(), "A refused write must not reach the mirror.");

	store.set(AccessToken::new("b1"), customer());

	assert!(!store.clear_in(epoch));
	assert_eq!(store.get(), Some(AccessToken::new("b1")));
	assert!(store.clear_in(store.epoch()));
	assert!(store.get().is_none());
}

#[test]
fn restore_rebuilds_the_session_from_a_file() {
	let path = temp_path();

	{
		let mirror = Arc::new(FileMirror::open(&path).expect("Mirror should open."));
		let store = CredentialStore::with_mirror(mirror);

		store.set(AccessToken::new("persisted"), customer());
	}

	let mirror = Arc::new(FileMirror::open(&path).expect("Mirror should reopen."));
	let restored = CredentialStore::restore(mirror.clone()).expect("Restore should succeed.");

	assert_eq!(restored.get(), Some(AccessToken::new("persisted")));
	assert_eq!(restored.identity(), Some(customer()));

	restored.clear();

	assert!(mirror.load().expect("Load after clear should succeed.").is_none());
}

#[test]
fn mirror_failures_do_not_block_memory_updates() {
	struct Broken;
	impl SessionMirror for Broken {
		fn load(&self) -> Result<Option<SessionSnapshot>, StoreError> {
			Ok(None)
		}

		fn save(&self, _: &SessionSnapshot) -> Result<(), StoreError> {
			Err(StoreError::Backend { message: "disk full".into() })
		}

		fn clear(&self) -> Result<(), StoreError> {
			Err(StoreError::Backend { message: "disk full".into() })
		}
	}

	let store = CredentialStore::with_mirror(Arc::new(Broken));

	store.set(AccessToken::new("a1"), customer());

	assert_eq!(store.get(), Some(AccessToken::new("a1")));

	store.clear();

	assert!(store.get().is_none());
}

#[test]
fn restore_surfaces_load_failures() {
	struct Unreadable;
	impl SessionMirror for Unreadable {
		fn load(&self) -> Result<Option<SessionSnapshot>, StoreError> {
			Err(StoreError::Serialization { message: "unexpected end of file".into() })
		}

		fn save(&self, _: &SessionSnapshot) -> Result<(), StoreError> {
			Ok(())
		}

		fn clear(&self) -> Result<(), StoreError> {
			Ok(())
		}
	}

	let err = CredentialStore::restore(Arc::new(Unreadable)).expect_err("Restore should fail.");

	assert!(matches!(err, Error::Storage(StoreError::Serialization { .. })));
}
