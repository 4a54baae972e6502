use crate::error::SessionError;
use crate::token_claims::KeycloakClaims;
use crate::AccessToken;
use std::sync::Arc;
use time::OffsetDateTime;

/// The current state of the session.
///
/// - `Indeterminate` until initialization completed. Views should render a loading placeholder.
/// - `Authenticated` if the identity provider client established a session. Token and claims
///   only exist inside this variant, so they are never observable without being authenticated.
/// - `NotAuthenticated` if there is no session, either because the user is anonymous, the
///   initialization failed, the session was dropped after a failed refresh or the user logged
///   out.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SessionState {
    #[default]
    Indeterminate,

    Authenticated(Authenticated),

    NotAuthenticated(NotAuthenticated),
}

impl SessionState {
    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Indeterminate)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn authenticated(&self) -> Option<&Authenticated> {
        match self {
            SessionState::Authenticated(authenticated) => Some(authenticated),
            SessionState::Indeterminate | SessionState::NotAuthenticated(_) => None,
        }
    }

    pub fn access_token(&self) -> Option<&AccessToken> {
        self.authenticated().map(|it| &it.access_token)
    }

    pub fn claims(&self) -> Option<&Arc<KeycloakClaims>> {
        self.authenticated().map(|it| &it.claims)
    }

    /// Always `false` while not authenticated, regardless of any earlier session.
    pub fn has_role(&self, role: &str) -> bool {
        self.claims().is_some_and(|it| it.has_realm_role(role))
    }

    /// Whether any of `roles` is held. Always `false` while not authenticated.
    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        self.claims()
            .is_some_and(|it| roles.iter().any(|role| it.has_realm_role(role.as_ref())))
    }

    /// Pretty prints the current state. Useful for debugging purposes.
    pub fn pretty_print(&self) -> String {
        match self {
            SessionState::Indeterminate => "SessionState::Indeterminate".to_owned(),
            SessionState::Authenticated(Authenticated {
                access_token: _,
                claims,
                updated_at,
            }) => {
                #[derive(Debug)]
                #[expect(unused)]
                struct Pretty<'a> {
                    access_token: &'a str,
                    claims: &'a KeycloakClaims,
                    updated_at: OffsetDateTime,
                }
                format!(
                    "SessionState::Authenticated {:#?}",
                    Pretty {
                        access_token: "<redacted>",
                        claims,
                        updated_at: *updated_at,
                    }
                )
            }
            SessionState::NotAuthenticated(not_authenticated) => {
                format!("SessionState::NotAuthenticated {not_authenticated:#?}")
            }
        }
    }
}

/// State only accessible when the user is authenticated.
#[derive(Debug, Clone, PartialEq)]
pub struct Authenticated {
    /// Access token to be used in an authorization header.
    /// Replaced whenever the refresh timer renews the token.
    pub access_token: AccessToken,

    /// Claims decoded from the same token as `access_token`.
    pub claims: Arc<KeycloakClaims>,

    /// When the session was established or last renewed.
    pub updated_at: OffsetDateTime,
}

impl Authenticated {
    pub(crate) fn new(access_token: AccessToken, claims: KeycloakClaims) -> Self {
        Self {
            access_token,
            claims: Arc::new(claims),
            updated_at: OffsetDateTime::now_utc(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotAuthenticated {
    /// The error which led to this state, if any.
    /// `None` for anonymous users and after a regular logout.
    pub last_error: Option<SessionError>,
}

/// Session version identifier. Internally represented using a numeric value.
///
/// Not orderable to prevent issues due to numeric overflows. Only equality is ever checked,
/// which still works when overflown.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct SessionVersion(pub(crate) u64);

impl SessionVersion {
    pub const ZERO: SessionVersion = SessionVersion(0);

    #[must_use]
    pub fn increment(self) -> Self {
        SessionVersion(self.0.wrapping_add(1))
    }
}
