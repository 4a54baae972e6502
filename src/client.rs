use crate::config::SessionOptions;
use snafu::Snafu;
use std::time::Duration;
use url::Url;

/// Failures reported by an identity provider client.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum IdpError {
    #[snafu(display("IdpError: Identity provider is unreachable: {message}"))]
    Unreachable { message: String },

    #[snafu(display("IdpError: Identity provider is misconfigured: {message}"))]
    Misconfigured { message: String },

    #[snafu(display("IdpError: The user abandoned the login"))]
    LoginAbandoned,

    #[snafu(display("IdpError: Token renewal was rejected: {message}"))]
    RefreshRejected { message: String },

    #[snafu(display("IdpError: {message}"))]
    Other { message: String },
}

/// The external OIDC browser adapter this crate drives (e.g. a binding to `keycloak-js`).
///
/// All protocol work (authorization code flow, PKCE, token validation, session iframe checks)
/// happens behind this trait. The session manager only calls these operations and trusts their
/// results.
///
/// Futures are not required to be `Send`, as everything runs on the single UI thread.
#[async_trait::async_trait(?Send)]
pub trait IdentityProviderClient: Send + Sync + 'static {
    /// Establish a session. Resolves to whether the user is authenticated afterward.
    ///
    /// Depending on `options.on_load`, this either forces a login or only checks for an existing
    /// single sign-on session.
    async fn init(&self, options: &SessionOptions) -> Result<bool, IdpError>;

    /// Renew the access token if it expires within `min_validity`.
    /// Resolves to `true` if the token was actually replaced.
    ///
    /// `Duration::MAX` forces a renewal.
    async fn update_token(&self, min_validity: Duration) -> Result<bool, IdpError>;

    /// Terminate the session at the identity provider.
    async fn logout(&self, redirect_url: Option<&Url>) -> Result<(), IdpError>;

    /// The current raw access token, if any.
    fn token(&self) -> Option<String>;

    /// The decoded claims of the current access token, if any.
    fn token_parsed(&self) -> Option<serde_json::Value>;
}
