use leptos_keycloak_session::url::Url;
use leptos_keycloak_session::{IdentityProviderClient, IdpError, SessionOptions};
use futures::channel::oneshot;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Scriptable stand-in for an OIDC browser adapter.
///
/// Clones share their state, so a test can keep one clone while the session manager owns
/// another.
#[derive(Clone)]
pub struct FakeIdentityProvider {
    state: Arc<Mutex<FakeState>>,
}

struct FakeState {
    init_result: Result<bool, IdpError>,
    logout_result: Result<(), IdpError>,

    /// Handed out once `init` succeeded.
    initial_session: Option<(String, Value)>,

    /// Handed out once `update_token` reports a replaced token.
    next_session: Option<(String, Value)>,

    /// Results of consecutive `update_token` calls. `Ok(false)` once exhausted.
    update_results: VecDeque<Result<bool, IdpError>>,

    current: Option<(String, Value)>,

    /// Keeps the next `update_token` call pending until released.
    update_gate: Option<oneshot::Receiver<()>>,

    init_calls: Vec<SessionOptions>,
    update_calls: Vec<Duration>,
    logout_calls: Vec<Option<Url>>,
}

pub fn claims(username: &str, roles: &[&str]) -> Value {
    json!({
        "sub": format!("{username}-id"),
        "preferred_username": username,
        "email": format!("{username}@example.com"),
        "given_name": username,
        "family_name": "Tester",
        "realm_access": { "roles": roles },
    })
}

impl FakeIdentityProvider {
    fn with(init_result: Result<bool, IdpError>, initial_session: Option<(String, Value)>) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                init_result,
                logout_result: Ok(()),
                initial_session,
                next_session: None,
                update_results: VecDeque::new(),
                current: None,
                update_gate: None,
                init_calls: Vec::new(),
                update_calls: Vec::new(),
                logout_calls: Vec::new(),
            })),
        }
    }

    /// `init` resolves `true`, exposing `token` and `claims`.
    pub fn authenticated(token: &str, claims: Value) -> Self {
        Self::with(Ok(true), Some((token.to_owned(), claims)))
    }

    /// `init` resolves `false`.
    pub fn anonymous() -> Self {
        Self::with(Ok(false), None)
    }

    /// `init` fails with `err`.
    pub fn failing(err: IdpError) -> Self {
        Self::with(Err(err), None)
    }

    /// `init` resolves `true` but never exposes a token.
    pub fn authenticated_without_token() -> Self {
        Self::with(Ok(true), None)
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake state not poisoned")
    }

    pub fn queue_update_result(&self, result: Result<bool, IdpError>) {
        self.lock().update_results.push_back(result);
    }

    /// The session handed out after the next successful renewal.
    pub fn rotate_to(&self, token: &str, claims: Value) {
        self.lock().next_session = Some((token.to_owned(), claims));
    }

    /// Keep the next `update_token` call pending until the returned sender is used or dropped.
    pub fn hold_next_update(&self) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        self.lock().update_gate = Some(gate);
        release
    }

    pub fn fail_logout(&self, err: IdpError) {
        self.lock().logout_result = Err(err);
    }

    pub fn init_calls(&self) -> usize {
        self.lock().init_calls.len()
    }

    pub fn update_calls(&self) -> Vec<Duration> {
        self.lock().update_calls.clone()
    }

    pub fn logout_calls(&self) -> Vec<Option<Url>> {
        self.lock().logout_calls.clone()
    }
}

#[async_trait::async_trait(?Send)]
impl IdentityProviderClient for FakeIdentityProvider {
    async fn init(&self, options: &SessionOptions) -> Result<bool, IdpError> {
        let mut state = self.lock();
        state.init_calls.push(options.clone());
        if let Ok(true) = state.init_result {
            state.current = state.initial_session.clone();
        }
        state.init_result.clone()
    }

    async fn update_token(&self, min_validity: Duration) -> Result<bool, IdpError> {
        let gate = {
            let mut state = self.lock();
            state.update_calls.push(min_validity);
            state.update_gate.take()
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let mut state = self.lock();
        let result = state.update_results.pop_front().unwrap_or(Ok(false));
        if let Ok(true) = result {
            if let Some(next) = state.next_session.take() {
                state.current = Some(next);
            }
        }
        result
    }

    async fn logout(&self, redirect_url: Option<&Url>) -> Result<(), IdpError> {
        let mut state = self.lock();
        state.logout_calls.push(redirect_url.cloned());
        state.current = None;
        state.logout_result.clone()
    }

    fn token(&self) -> Option<String> {
        self.lock().current.as_ref().map(|(token, _)| token.clone())
    }

    fn token_parsed(&self) -> Option<Value> {
        self.lock().current.as_ref().map(|(_, claims)| claims.clone())
    }
}
