use crate::error::{ConfigSnafu, SessionError};
use std::time::Duration;
use url::Url;

pub(crate) const DEFAULT_KEYCLOAK_URL: &str = "http://localhost:8080";
pub(crate) const DEFAULT_REALM: &str = "demo-app";
pub(crate) const DEFAULT_CLIENT_ID: &str = "demo-app-frontend";

/// Represents the parameters required for initializing a `SessionManager`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// Url of your keycloak instance, E.g. "http://localhost:8080"
    pub keycloak_server_url: Url,

    /// The keycloak realm you want to use.
    pub realm: String,

    /// The name of this client as configured inside your Keycloak admin area.
    pub client_id: String,

    /// What should happen during initialization.
    /// Defaults to `OnLoad::LoginRequired`.
    pub on_load: OnLoad,

    /// Proof key for code exchange method requested from the identity provider client.
    /// `None` disables PKCE. Defaults to `Some(PkceMethod::S256)`.
    pub pkce_method: Option<PkceMethod>,

    /// Whether the identity provider client should continuously monitor the session validity.
    /// Defaults to `true`.
    pub check_login_iframe: bool,

    /// Url to which you want to be redirected after a logout.
    /// `None` lets the identity provider client decide.
    pub post_logout_redirect_url: Option<Url>,

    pub advanced: AdvancedOptions,
}

/// Login policy applied during initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnLoad {
    /// Immediately redirect to the login page if no session exists.
    #[default]
    LoginRequired,

    /// Only check for an existing single sign-on session. Anonymous use is permitted.
    CheckSso,
}

impl OnLoad {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnLoad::LoginRequired => "login-required",
            OnLoad::CheckSso => "check-sso",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PkceMethod {
    #[default]
    S256,
}

impl PkceMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PkceMethod::S256 => "S256",
        }
    }
}

/// Strategy for handling token refresh failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnRefreshError {
    /// Keep the last known session. Claims may be stale until an API call fails upstream.
    KeepSession,

    /// Drop the session, effectively logging the user out locally.
    #[default]
    DropSession,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdvancedOptions {
    /// Interval after which the token is checked for renewal.
    /// Defaults to `Duration::from_secs(60)`.
    pub refresh_interval: Duration,

    /// Describes how much validity the access token must have left to not be renewed.
    /// Defaults to `Duration::from_secs(70)`.
    pub min_token_validity: Duration,

    /// What to do when a scheduled refresh fails.
    /// Defaults to `OnRefreshError::DropSession`.
    pub on_refresh_error: OnRefreshError,
}

impl Default for AdvancedOptions {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(60),
            min_token_validity: Duration::from_secs(70),
            on_refresh_error: OnRefreshError::default(),
        }
    }
}

impl SessionOptions {
    pub fn new(
        keycloak_server_url: Url,
        realm: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            keycloak_server_url,
            realm: realm.into(),
            client_id: client_id.into(),
            on_load: OnLoad::default(),
            pkce_method: Some(PkceMethod::default()),
            check_login_iframe: true,
            post_logout_redirect_url: None,
            advanced: AdvancedOptions::default(),
        }
    }

    /// Options built from the `KEYCLOAK_URL`, `KEYCLOAK_REALM` and `KEYCLOAK_CLIENT_ID`
    /// environment variables, captured when compiling the application.
    pub fn from_build_env() -> Result<Self, SessionError> {
        Self::from_values(
            option_env!("KEYCLOAK_URL"),
            option_env!("KEYCLOAK_REALM"),
            option_env!("KEYCLOAK_CLIENT_ID"),
        )
    }

    pub(crate) fn from_values(
        url: Option<&str>,
        realm: Option<&str>,
        client_id: Option<&str>,
    ) -> Result<Self, SessionError> {
        let url = url.unwrap_or(DEFAULT_KEYCLOAK_URL);
        let keycloak_server_url = Url::parse(url).map_err(|err| {
            ConfigSnafu {
                reason: format!("'{url}' is not a valid keycloak url: {err}"),
            }
            .build()
        })?;
        let options = Self::new(
            keycloak_server_url,
            realm.unwrap_or(DEFAULT_REALM),
            client_id.unwrap_or(DEFAULT_CLIENT_ID),
        );
        options.validate()?;
        Ok(options)
    }

    pub fn with_on_load(mut self, on_load: OnLoad) -> Self {
        self.on_load = on_load;
        self
    }

    pub fn with_post_logout_redirect_url(mut self, url: Url) -> Self {
        self.post_logout_redirect_url = Some(url);
        self
    }

    pub fn with_advanced(mut self, advanced: AdvancedOptions) -> Self {
        self.advanced = advanced;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), SessionError> {
        if self.keycloak_server_url.cannot_be_a_base()
            || self.keycloak_server_url.host_str().is_none()
        {
            return ConfigSnafu {
                reason: format!(
                    "keycloak_server_url '{}' must be an absolute url with a host",
                    self.keycloak_server_url
                ),
            }
            .fail();
        }
        if self.realm.trim().is_empty() {
            return ConfigSnafu {
                reason: "realm must not be empty",
            }
            .fail();
        }
        if self.client_id.trim().is_empty() {
            return ConfigSnafu {
                reason: "client_id must not be empty",
            }
            .fail();
        }
        if self.advanced.refresh_interval.is_zero() {
            return ConfigSnafu {
                reason: "advanced.refresh_interval must be greater than zero",
            }
            .fail();
        }
        Ok(())
    }
}
