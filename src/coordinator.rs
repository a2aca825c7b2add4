//! Single-flight refresh coordination.
//!
//! [`RefreshCoordinator::ensure_fresh_token`] collapses any number of concurrent refresh requests
//! into one call to the underlying [`TokenRefresher`]. The first caller becomes the leader and
//! drives the network call; everyone arriving while it is in flight is queued as a waiter and
//! settled, in arrival order, with the leader's outcome. Success rotates the token in the
//! [`CredentialStore`]; failure clears it and publishes [`SessionEvent::Terminated`]. Both writes
//! are pinned to the store epoch the flight started under, so a logout that lands mid-refresh
//! wins: the late token is discarded and everyone gets [`RefreshFailure::Superseded`].
//!
//! The flight is bounded by a deadline. A leader whose future is dropped before the refresh
//! settles releases the flight through a drop guard, and its waiters retry on their own.

mod events;
mod metrics;

pub use events::{SessionEvent, SessionEvents};
pub use metrics::RefreshMetrics;

// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	config::SessionConfig,
	error::RefreshFailure,
	obs::{self, FlowKind},
	store::CredentialStore,
};

/// Boxed future returned by [`TokenRefresher::refresh`].
pub type RefreshFuture<'a> = Pin<Box<dyn Future<Output = Result<AccessToken>> + 'a + Send>>;

type RefreshOutcome = Result<AccessToken, RefreshFailure>;

/// Anything able to exchange the refresh credential for a new access token.
pub trait TokenRefresher
where
	Self: 'static + Send + Sync,
{
	/// Performs one refresh network call.
	fn refresh(&self) -> RefreshFuture<'_>;
}

/// Whether a refresh is currently in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshStatus {
	/// No refresh in flight.
	Idle,
	/// A leader is waiting on the refresher.
	Refreshing,
}

struct RefreshWaiter(oneshot::Sender<RefreshOutcome>);

struct FlightState {
	status: RefreshStatus,
	waiters: VecDeque<RefreshWaiter>,
}

/// Owns the refresh status flag and waiter queue for one session context.
pub struct RefreshCoordinator<R>
where
	R: ?Sized + TokenRefresher,
{
	refresher: Arc<R>,
	store: Arc<CredentialStore>,
	state: Mutex<FlightState>,
	deadline: Duration,
	events: SessionEvents,
	metrics: Arc<RefreshMetrics>,
}
impl<R> RefreshCoordinator<R>
where
	R: ?Sized + TokenRefresher,
{
	/// Creates an idle coordinator with the default deadline.
	pub fn new(refresher: Arc<R>, store: Arc<CredentialStore>) -> Self {
		Self {
			refresher,
			store,
			state: Mutex::new(FlightState {
				status: RefreshStatus::Idle,
				waiters: VecDeque::new(),
			}),
			deadline: crate::config::SessionConfigBuilder::DEFAULT_REFRESH_DEADLINE,
			events: SessionEvents::default(),
			metrics: Default::default(),
		}
	}

	/// Creates an idle coordinator using the configured deadline.
	pub fn from_config(
		refresher: Arc<R>,
		store: Arc<CredentialStore>,
		config: &SessionConfig,
	) -> Self {
		Self::new(refresher, store).with_deadline(config.refresh_deadline)
	}

	/// Overrides the refresh deadline; non-positive values are ignored.
	pub fn with_deadline(mut self, deadline: Duration) -> Self {
		if deadline.is_positive() {
			self.deadline = deadline;
		}

		self
	}

	/// Shares an existing event hub instead of the coordinator's own.
	pub fn with_events(mut self, events: SessionEvents) -> Self {
		self.events = events;

		self
	}

	/// Event hub the coordinator publishes to.
	pub fn events(&self) -> &SessionEvents {
		&self.events
	}

	/// Refresh counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Credential store the coordinator writes to.
	pub fn store(&self) -> &Arc<CredentialStore> {
		&self.store
	}

	/// Current status flag.
	pub fn status(&self) -> RefreshStatus {
		self.state.lock().status
	}

	/// Number of callers queued behind the in-flight refresh.
	pub fn pending_waiters(&self) -> usize {
		self.state.lock().waiters.len()
	}

	/// Returns a fresh access token, starting at most one refresh for all concurrent callers.
	pub async fn ensure_fresh_token(&self) -> Result<AccessToken> {
		loop {
			let waiter = {
				let mut state = self.state.lock();

				match state.status {
					RefreshStatus::Refreshing => {
						let (tx, rx) = oneshot::channel();

						state.waiters.push_back(RefreshWaiter(tx));
						self.metrics.record_coalesced();

						Some(rx)
					},
					RefreshStatus::Idle => {
						state.status = RefreshStatus::Refreshing;

						None
					},
				}
			};
			let Some(rx) = waiter else {
				return self.lead().await.map_err(Error::from);
			};

			match rx.await {
				// The leader went away; take another turn, possibly as the new leader.
				Ok(Err(RefreshFailure::Abandoned)) | Err(_) => continue,
				Ok(outcome) => return outcome.map_err(Error::from),
			}
		}
	}

	/// Ends the session locally.
	///
	/// A refresh still in flight is settled as [`RefreshFailure::Superseded`] for its leader and
	/// every waiter; its token never reaches the store.
	pub fn end_session(&self) {
		self.store.clear();
	}

	async fn lead(&self) -> RefreshOutcome {
		let mut flight = Flight { coordinator: self, epoch: self.store.epoch(), settled: false };

		self.metrics.record_attempt();

		let deadline = self.deadline.unsigned_abs();
		let outcome = obs::observe(FlowKind::Refresh, "ensure_fresh_token", async {
			match tokio::time::timeout(deadline, self.refresher.refresh()).await {
				Ok(Ok(token)) => Ok(token),
				Ok(Err(e)) => Err(classify(e)),
				Err(_) => Err(RefreshFailure::TimedOut { seconds: deadline.as_secs() }),
			}
		})
		.await;

		flight.settle(outcome)
	}

	fn finish(&self, epoch: u64, outcome: RefreshOutcome) -> RefreshOutcome {
		// Writes are pinned to the session the flight started under.
		let outcome = match outcome {
			Ok(token) if self.store.replace_token_in(epoch, token.clone()) => Ok(token),
			Ok(_) => Err(RefreshFailure::Superseded),
			Err(failure) if ends_session(&failure) && !self.store.clear_in(epoch) =>
				Err(RefreshFailure::Superseded),
			other => other,
		};

		match &outcome {
			Ok(_) => self.metrics.record_success(),
			Err(failure) => {
				self.metrics.record_failure();

				if ends_session(failure) {
					obs::warn_absorbed(
						FlowKind::Refresh,
						"refresh failed; session terminated",
						failure,
					);
				}
			},
		}

		let waiters = {
			let mut state = self.state.lock();

			state.status = RefreshStatus::Idle;

			std::mem::take(&mut state.waiters)
		};

		for RefreshWaiter(tx) in waiters {
			// A waiter whose caller was dropped simply misses the result.
			let _ = tx.send(outcome.clone());
		}

		match &outcome {
			Ok(_) => self.events.publish(SessionEvent::Refreshed),
			Err(failure) if ends_session(failure) =>
				self.events.publish(SessionEvent::Terminated(failure.clone())),
			Err(_) => {},
		}

		outcome
	}
}
impl<R> Debug for RefreshCoordinator<R>
where
	R: ?Sized + TokenRefresher,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("RefreshCoordinator")
			.field("status", &state.status)
			.field("waiters", &state.waiters.len())
			.field("deadline", &self.deadline)
			.finish()
	}
}

/// Releases the flight exactly once, even when the leader's future is dropped mid-refresh.
struct Flight<'a, R>
where
	R: ?Sized + TokenRefresher,
{
	coordinator: &'a RefreshCoordinator<R>,
	epoch: u64,
	settled: bool,
}
impl<R> Flight<'_, R>
where
	R: ?Sized + TokenRefresher,
{
	fn settle(&mut self, outcome: RefreshOutcome) -> RefreshOutcome {
		self.settled = true;

		self.coordinator.finish(self.epoch, outcome)
	}
}
impl<R> Drop for Flight<'_, R>
where
	R: ?Sized + TokenRefresher,
{
	fn drop(&mut self) {
		if !self.settled {
			let _ = self.coordinator.finish(self.epoch, Err(RefreshFailure::Abandoned));
		}
	}
}

/// Abandoned and superseded flights leave the store to whoever owns it now.
fn ends_session(failure: &RefreshFailure) -> bool {
	!matches!(failure, RefreshFailure::Abandoned | RefreshFailure::Superseded)
}

fn classify(error: Error) -> RefreshFailure {
	match error {
		Error::RefreshFailed(failure) => failure,
		Error::Unauthorized { .. } =>
			RefreshFailure::Rejected { status: 401, message: "Unauthorized".into() },
		Error::Backend { status, message, .. } => RefreshFailure::Rejected { status, message },
		other => RefreshFailure::Unavailable { message: other.to_string() },
	}
}
