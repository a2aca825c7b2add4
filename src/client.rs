//! Session facade wiring the bridge, store, coordinator, and gateway together.

// self
use crate::{
	_prelude::*,
	auth::{Credentials, Registration, Session},
	bridge::CookieBridge,
	config::SessionConfig,
	cookie::CookieJar,
	coordinator::{RefreshCoordinator, SessionEvent, SessionEvents},
	error::ApiError,
	gateway::RequestGateway,
	guard::EdgeGuard,
	http::{ApiRequest, ApiResponse, ApiTransport},
	obs::{self, FlowKind},
	store::CredentialStore,
};
#[cfg(feature = "reqwest")]
use crate::{cookie::MemoryCookieJar, http::ReqwestTransport};

/// Session client specialized for the crate's default reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestSessionClient = SessionClient<ReqwestTransport>;

/// One user session: login state, refresh coordination, and authenticated API access.
///
/// Every component shares the same [`CredentialStore`], so a token rotated by one concurrent
/// request is immediately visible to the rest. Cloning is not supported; share the client through
/// an `Arc` instead.
pub struct SessionClient<T>
where
	T: ?Sized + ApiTransport,
{
	config: SessionConfig,
	store: Arc<CredentialStore>,
	bridge: Arc<CookieBridge<T>>,
	coordinator: Arc<RefreshCoordinator<CookieBridge<T>>>,
	gateway: RequestGateway<T, CookieBridge<T>>,
}
impl<T> SessionClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Assembles a session over caller-provided transport, jar, and store.
	pub fn with_transport(
		config: SessionConfig,
		transport: Arc<T>,
		jar: Arc<dyn CookieJar>,
		store: Arc<CredentialStore>,
	) -> Self {
		let bridge = Arc::new(CookieBridge::new(config.clone(), transport.clone(), jar));
		let coordinator =
			Arc::new(RefreshCoordinator::from_config(bridge.clone(), store.clone(), &config));
		let gateway =
			RequestGateway::new(config.clone(), transport, store.clone(), coordinator.clone());

		Self { config, store, bridge, coordinator, gateway }
	}

	/// Configuration shared by every component.
	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	/// Credential store holding the current session.
	pub fn store(&self) -> &Arc<CredentialStore> {
		&self.store
	}

	/// Cookie bridge talking to the identity backend.
	pub fn bridge(&self) -> &Arc<CookieBridge<T>> {
		&self.bridge
	}

	/// Single-flight refresh coordinator.
	pub fn coordinator(&self) -> &Arc<RefreshCoordinator<CookieBridge<T>>> {
		&self.coordinator
	}

	/// Gateway for authenticated API calls.
	pub fn gateway(&self) -> &RequestGateway<T, CookieBridge<T>> {
		&self.gateway
	}

	/// Lifecycle event hub.
	pub fn events(&self) -> &SessionEvents {
		self.coordinator.events()
	}

	/// Edge guard honoring the configured login page.
	pub fn edge_guard(&self) -> EdgeGuard {
		EdgeGuard::new(&self.config)
	}

	/// Current session, if signed in.
	pub fn session(&self) -> Option<Session> {
		self.store.session()
	}

	/// Signs in and installs the session.
	pub async fn login(&self, credentials: Credentials) -> Result<Session> {
		let session = self.bridge.login(credentials).await?;

		self.install(&session);

		Ok(session)
	}

	/// Registers an account and installs the resulting session.
	pub async fn register(&self, registration: Registration) -> Result<Session> {
		let session = self.bridge.register(registration).await?;

		self.install(&session);

		Ok(session)
	}

	/// Signs out locally even when the backend cannot be reached.
	///
	/// A refresh still in flight settles as superseded; its token never reaches the store or the
	/// jar.
	pub async fn logout(&self) {
		self.coordinator.end_session();
		self.bridge.logout().await;
		self.events().publish(SessionEvent::LoggedOut);
	}

	/// Rebuilds the session on start.
	///
	/// The `access_token` cookie wins over a token restored from a mirror. Without either, a
	/// refresh credential left in the jar is exchanged once. The identity is fetched from
	/// `/auth/me`; a `401` there triggers one coordinated refresh. Returns `None` when there is
	/// nothing to recover.
	pub async fn bootstrap(&self) -> Result<Option<Session>> {
		obs::observe(FlowKind::Bootstrap, "bootstrap", async {
			let token = match self.bridge.bootstrap().or_else(|| self.store.get()) {
				Some(token) => {
					self.store.replace_token(token.clone());

					token
				},
				None if self.bridge.has_refresh_credential() =>
					match self.coordinator.ensure_fresh_token().await {
						Ok(token) => token,
						Err(Error::RefreshFailed(_)) => return Ok(None),
						Err(e) => return Err(e),
					},
				None => return Ok(None),
			};

			let identity = match self.bridge.me(&token).await {
				Ok(identity) => identity,
				Err(e) if e.is_unauthorized() => {
					let fresh = self.coordinator.ensure_fresh_token().await?;

					self.bridge.me(&fresh).await?
				},
				Err(e) => return Err(e),
			};

			self.store.set_identity(identity);

			Ok(self.store.session())
		})
		.await
	}

	/// Shorthand for [`RequestGateway::send`].
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
		self.gateway.send(request).await
	}

	fn install(&self, session: &Session) {
		self.store.set(session.access_token.clone(), session.identity.clone());
		self.events().publish(SessionEvent::LoggedIn(session.identity.clone()));
	}
}
#[cfg(feature = "reqwest")]
impl SessionClient<ReqwestTransport> {
	/// Creates a reqwest-backed session with an in-memory jar and store.
	pub fn new(config: SessionConfig) -> Self {
		Self::with_transport(
			config,
			Arc::new(ReqwestTransport::default()),
			Arc::new(MemoryCookieJar::default()),
			Arc::new(CredentialStore::default()),
		)
	}
}
impl<T> Debug for SessionClient<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionClient")
			.field("api_base_url", &self.config.api_base_url.as_str())
			.field("store", &self.store)
			.field("coordinator", &self.coordinator)
			.finish()
	}
}
