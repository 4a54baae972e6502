use crate::client::IdentityProviderClient;
use crate::config::{OnRefreshError, SessionOptions};
use crate::error::{AlreadyInitializedSnafu, InitializationSnafu, LogoutSnafu, SessionError};
use crate::state::{Authenticated, NotAuthenticated, SessionState, SessionVersion};
use crate::ticker::{IntervalTicker, OnTick, RefreshTicker, TickerHandle};
use crate::token_claims::KeycloakClaims;
use crate::{AccessToken, AuthenticatedClient};
use futures::lock::Mutex as AsyncMutex;
use leptos::prelude::{ArcRwSignal, Get, Set, With, WithUntracked};
use snafu::ResultExt;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Owns the identity provider client and the one session of this application.
///
/// Construct exactly one manager in the root of your application and hand it to
/// [`SessionProvider`](crate::components::SessionProvider), which exposes a read-only
/// [`SessionHandle`] to all descendants.
///
/// The manager:
/// - drives the one-time initialization of the identity provider client,
/// - keeps a snapshot of the access token and its claims,
/// - renews the token on a timer, started after a successful initialization and stopped on
///   logout, on `shutdown` or when the last manager reference is dropped.
///
/// Cloning is cheap. All clones share the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    options: SessionOptions,
    client: Arc<dyn IdentityProviderClient>,
    ticker: Arc<dyn RefreshTicker>,

    /// Single source of truth of session information. Only ever written by the manager.
    state: ArcRwSignal<SessionState>,

    /// Which session we are currently in.
    ///
    /// Incremented whenever the session is established, renewed or dropped. Asynchronous
    /// results which originated from an older version are discarded.
    version: Mutex<SessionVersion>,

    initialization_started: AtomicBool,

    /// Held for the duration of a token renewal.
    renewal: AsyncMutex<()>,

    refresh_timer: Mutex<Option<TickerHandle>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Debug for SessionManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("options", &self.inner.options)
            .field("state", &self.inner.state.with_untracked(SessionState::pretty_print))
            .field("version", &*lock(&self.inner.version))
            .field(
                "initialization_started",
                &self.inner.initialization_started.load(Ordering::Acquire),
            )
            .field("refresh_timer", &*lock(&self.inner.refresh_timer))
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a manager refreshing tokens through a browser interval.
    ///
    /// # Errors
    /// Returns `SessionError::Config` if the options are unusable.
    pub fn new(
        options: SessionOptions,
        client: impl IdentityProviderClient,
    ) -> Result<Self, SessionError> {
        Self::with_ticker(options, client, IntervalTicker)
    }

    /// Create a manager using a custom `RefreshTicker`.
    ///
    /// # Errors
    /// Returns `SessionError::Config` if the options are unusable.
    pub fn with_ticker(
        options: SessionOptions,
        client: impl IdentityProviderClient,
        ticker: impl RefreshTicker,
    ) -> Result<Self, SessionError> {
        options.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                options,
                client: Arc::new(client),
                ticker: Arc::new(ticker),
                state: ArcRwSignal::new(SessionState::Indeterminate),
                version: Mutex::new(SessionVersion::ZERO),
                initialization_started: AtomicBool::new(false),
                renewal: AsyncMutex::new(()),
                refresh_timer: Mutex::new(None),
            }),
        })
    }

    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    /// The read-only view of this session, meant to be handed to consumers.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            manager: self.clone(),
        }
    }

    /// Current session state. Tracked: reading this in a reactive context re-runs it on change.
    pub fn state(&self) -> SessionState {
        self.inner.state.get()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.with(SessionState::is_loading)
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.with(SessionState::is_authenticated)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.inner.state.with(|state| state.has_role(role))
    }

    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        self.inner.state.with(|state| state.has_any_role(roles))
    }

    /// The current access token, read at call time. Untracked.
    pub fn access_token(&self) -> Option<AccessToken> {
        self.inner
            .state
            .with_untracked(|state| state.access_token().cloned())
    }

    pub fn claims(&self) -> Option<Arc<KeycloakClaims>> {
        self.inner.state.with(|state| state.claims().cloned())
    }

    pub fn session_version(&self) -> SessionVersion {
        *lock(&self.inner.version)
    }

    pub fn is_refresh_timer_running(&self) -> bool {
        lock(&self.inner.refresh_timer).is_some()
    }

    /// Initialize the identity provider client and establish the session.
    ///
    /// Resolves to whether the user is authenticated. Starts the refresh timer if so.
    ///
    /// # Errors
    /// - `SessionError::AlreadyInitialized` if called more than once. The client is not touched.
    /// - `SessionError::Initialization` if the identity provider is unreachable, misconfigured or
    ///   the user abandoned the login. The session is `NotAuthenticated` afterward and no timer
    ///   is started. No retry is attempted.
    /// - `SessionError::MissingToken` if the client reported success without exposing a token.
    pub async fn initialize(&self) -> Result<bool, SessionError> {
        if self
            .inner
            .initialization_started
            .swap(true, Ordering::AcqRel)
        {
            tracing::warn!("Session manager was already initialized. Ignoring call.");
            return AlreadyInitializedSnafu.fail();
        }

        let options = &self.inner.options;
        tracing::trace!(
            realm = %options.realm,
            client_id = %options.client_id,
            on_load = options.on_load.as_str(),
            "Initializing session..."
        );

        let version = self.session_version();
        let result = self
            .inner
            .client
            .init(options)
            .await
            .context(InitializationSnafu);

        if version != self.session_version() {
            tracing::debug!("Session changed while initializing. Discarding initialization result.");
            return Ok(self.is_authenticated());
        }

        match result {
            Ok(true) => match self.read_session() {
                Some(authenticated) => {
                    tracing::trace!("Session established");
                    self.replace_state(SessionState::Authenticated(authenticated));
                    self.start_refresh_timer();
                    Ok(true)
                }
                None => {
                    let err = SessionError::MissingToken;
                    tracing::error!(?err, "Session initialization failed.");
                    self.replace_state(SessionState::NotAuthenticated(NotAuthenticated {
                        last_error: Some(err.clone()),
                    }));
                    Err(err)
                }
            },
            Ok(false) => {
                tracing::trace!("User is not authenticated");
                self.replace_state(SessionState::NotAuthenticated(NotAuthenticated::default()));
                Ok(false)
            }
            Err(err) => {
                tracing::error!(?err, "Session initialization failed.");
                self.replace_state(SessionState::NotAuthenticated(NotAuthenticated {
                    last_error: Some(err.clone()),
                }));
                Err(err)
            }
        }
    }

    /// Renew the access token if it expires within the configured `min_token_validity`.
    /// This is what the refresh timer runs on every tick.
    ///
    /// Skipped while another renewal is in flight, so timer firings never overlap.
    ///
    /// Resolves to whether the token was replaced.
    ///
    /// # Errors
    /// Returns `SessionError::Refresh` if the renewal failed. Depending on
    /// `AdvancedOptions::on_refresh_error`, the session was dropped or kept.
    pub async fn refresh(&self) -> Result<bool, SessionError> {
        let Some(_renewal) = self.inner.renewal.try_lock() else {
            tracing::debug!("Requested token refresh has no effect, as one is already in flight.");
            return Ok(false);
        };
        self.renew(self.inner.options.advanced.min_token_validity).await
    }

    /// Renew the access token regardless of its remaining validity.
    ///
    /// Waits for a renewal already in flight. If that one replaced the token, its outcome is
    /// taken instead of asking the identity provider again.
    ///
    /// # Errors
    /// Same as [`refresh`](Self::refresh).
    pub async fn force_refresh(&self) -> Result<bool, SessionError> {
        let version = self.session_version();
        let _renewal = self.inner.renewal.lock().await;
        if version != self.session_version() {
            tracing::trace!("Session changed while waiting for a pending renewal.");
            return Ok(self.inner.state.with_untracked(SessionState::is_authenticated));
        }
        self.renew(Duration::MAX).await
    }

    /// End the session: stops the refresh timer, clears the local session and terminates the
    /// session at the identity provider.
    ///
    /// # Errors
    /// Returns `SessionError::Logout` if the identity provider could not end its session. The
    /// local session is cleared nonetheless.
    pub async fn logout(&self) -> Result<(), SessionError> {
        tracing::trace!("Logging out...");
        self.forget();
        self.inner
            .client
            .logout(self.inner.options.post_logout_redirect_url.as_ref())
            .await
            .context(LogoutSnafu)
            .inspect_err(|err| tracing::warn!(?err, "Identity provider logout failed."))
    }

    /// Forget the session. This is a local operation, not hitting the identity provider.
    /// It immediately locks the user out of protected areas, but does not end the session at
    /// the identity provider.
    pub fn forget(&self) {
        tracing::trace!("Dropping session");
        self.stop_refresh_timer();
        self.replace_state(SessionState::NotAuthenticated(NotAuthenticated::default()));
    }

    /// Teardown. Stops the refresh timer, leaving the session untouched.
    pub fn shutdown(&self) {
        self.stop_refresh_timer();
    }

    /// Restart the refresh timer after a [`shutdown`](Self::shutdown).
    ///
    /// Only starts a timer if a session is established and none is running. Returns whether a
    /// timer was started.
    pub fn resume(&self) -> bool {
        if !self.inner.state.with_untracked(SessionState::is_authenticated) {
            tracing::trace!("No session established. Not resuming refresh timer.");
            return false;
        }
        if self.is_refresh_timer_running() {
            return false;
        }
        self.start_refresh_timer();
        true
    }

    /// Only called while holding `renewal`.
    async fn renew(&self, min_validity: Duration) -> Result<bool, SessionError> {
        if !self.inner.state.with_untracked(SessionState::is_authenticated) {
            tracing::debug!("Requested token refresh has no effect, as no session is established.");
            return Ok(false);
        }

        let version = self.session_version();
        let result = self.inner.client.update_token(min_validity).await;

        if version != self.session_version() {
            tracing::debug!("Session changed while refreshing. Discarding refresh result.");
            return Ok(false);
        }

        match result {
            Ok(true) => match self.read_session() {
                Some(authenticated) => {
                    tracing::trace!("Token refreshed");
                    self.replace_state(SessionState::Authenticated(authenticated));
                    Ok(true)
                }
                None => {
                    let err = SessionError::MissingToken;
                    tracing::warn!(?err, "Token refresh failed.");
                    self.handle_refresh_error(&err);
                    Err(err)
                }
            },
            Ok(false) => {
                tracing::trace!("Token still valid. No refresh necessary.");
                Ok(false)
            }
            Err(source) => {
                let err = SessionError::Refresh { source };
                tracing::warn!(?err, "Token refresh failed.");
                self.handle_refresh_error(&err);
                Err(err)
            }
        }
    }

    fn handle_refresh_error(&self, err: &SessionError) {
        match self.inner.options.advanced.on_refresh_error {
            OnRefreshError::KeepSession => {
                tracing::trace!("Keeping last known session despite failed refresh.");
            }
            OnRefreshError::DropSession => {
                tracing::trace!("Dropping session after failed refresh.");
                self.stop_refresh_timer();
                self.replace_state(SessionState::NotAuthenticated(NotAuthenticated {
                    last_error: Some(err.clone()),
                }));
            }
        }
    }

    /// Snapshot of the token the client currently holds.
    fn read_session(&self) -> Option<Authenticated> {
        let access_token = self.inner.client.token()?;
        let claims = match self.inner.client.token_parsed() {
            Some(parsed) => KeycloakClaims::from_value(parsed),
            None => {
                tracing::warn!("Identity provider client exposed a token but no parsed claims.");
                KeycloakClaims::default()
            }
        };
        Some(Authenticated::new(access_token, claims))
    }

    /// The only way the session state is ever changed.
    fn replace_state(&self, state: SessionState) {
        {
            let mut version = lock(&self.inner.version);
            *version = version.increment();
        }
        self.inner.state.set(state);
    }

    fn start_refresh_timer(&self) {
        // The timer must not keep the manager alive.
        let inner = Arc::downgrade(&self.inner);
        let on_tick: OnTick = Arc::new(move || {
            if let Some(inner) = inner.upgrade() {
                let manager = SessionManager { inner };
                leptos::task::spawn_local(async move {
                    manager.scheduled_refresh().await;
                });
            }
        });

        let period = self.inner.options.advanced.refresh_interval;
        tracing::trace!(?period, "Starting refresh timer");
        let handle = self.inner.ticker.start(period, on_tick);
        let previous = lock(&self.inner.refresh_timer).replace(handle);
        drop(previous);
    }

    fn stop_refresh_timer(&self) {
        let handle = lock(&self.inner.refresh_timer).take();
        if let Some(handle) = handle {
            handle.stop();
        }
    }

    async fn scheduled_refresh(&self) {
        if let Err(err) = self.refresh().await {
            tracing::debug!(?err, "Scheduled token refresh did not succeed.");
        }
    }
}

/// Read-only view of the session, provided as context by
/// [`SessionProvider`](crate::components::SessionProvider).
///
/// Consumers can read the state and claims, check roles, log out and create an
/// [`AuthenticatedClient`]. They cannot alter the session otherwise.
///
/// ```no_run
/// use leptos_keycloak_session::use_session;
///
/// let session = use_session();
/// if session.has_role("admin") {
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SessionHandle {
    manager: SessionManager,
}

impl SessionHandle {
    /// Current session state. Tracked.
    pub fn state(&self) -> SessionState {
        self.manager.state()
    }

    /// `true` until initialization completed. Tracked.
    pub fn is_loading(&self) -> bool {
        self.manager.is_loading()
    }

    /// Tracked.
    pub fn is_authenticated(&self) -> bool {
        self.manager.is_authenticated()
    }

    /// Claims of the current session. `None` when not authenticated. Tracked.
    pub fn claims(&self) -> Option<Arc<KeycloakClaims>> {
        self.manager.claims()
    }

    /// The freshest access token available right now. Untracked.
    pub fn access_token(&self) -> Option<AccessToken> {
        self.manager.access_token()
    }

    /// Whether the user holds the realm role `role`. Always `false` when not authenticated.
    /// Tracked.
    pub fn has_role(&self, role: &str) -> bool {
        self.manager.has_role(role)
    }

    /// Tracked.
    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        self.manager.has_any_role(roles)
    }

    /// # Errors
    /// See [`SessionManager::logout`].
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.manager.logout().await
    }

    /// Renew the token regardless of its remaining validity. Used after a request was rejected
    /// with a 401.
    pub(crate) async fn force_refresh(&self) -> Result<bool, SessionError> {
        self.manager.force_refresh().await
    }

    /// An HTTP client attaching the current access token to every request.
    pub fn client(&self) -> AuthenticatedClient {
        AuthenticatedClient::new(reqwest::Client::new(), self.clone())
    }

    pub fn client_from(&self, client: reqwest::Client) -> AuthenticatedClient {
        AuthenticatedClient::new(client, self.clone())
    }
}
