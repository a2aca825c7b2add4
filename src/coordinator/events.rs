// crates.io
use tokio::sync::broadcast;
// self
use crate::{_prelude::*, auth::Identity, error::RefreshFailure};

/// Session lifecycle notifications for navigation and UI layers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
	/// A login or registration installed a new session.
	LoggedIn(Identity),
	/// A refresh rotated the access token.
	Refreshed,
	/// The user logged out.
	LoggedOut,
	/// Refresh failed terminally; the session is gone and the user must log in again.
	Terminated(RefreshFailure),
}

/// Broadcast hub for [`SessionEvent`]s; publishing never blocks and never fails.
#[derive(Clone, Debug)]
pub struct SessionEvents(broadcast::Sender<SessionEvent>);
impl SessionEvents {
	const CAPACITY: usize = 32;

	/// Subscribes to events published from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
		self.0.subscribe()
	}

	pub(crate) fn publish(&self, event: SessionEvent) {
		// No subscribers is not an error.
		let _ = self.0.send(event);
	}
}
impl Default for SessionEvents {
	fn default() -> Self {
		Self(broadcast::channel(Self::CAPACITY).0)
	}
}
