use crate::state::SessionState;
use itertools::Itertools;

/// What the profile view shows about the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub realm_roles: Vec<String>,
}

impl Profile {
    /// `None` unless the session is authenticated.
    pub fn from_state(state: &SessionState) -> Option<Self> {
        let claims = state.claims()?;
        Some(Self {
            username: claims.preferred_username.clone(),
            email: claims.email.clone(),
            full_name: claims.full_name(),
            realm_roles: claims
                .realm_access
                .as_ref()
                .map(|it| it.0.roles.clone())
                .unwrap_or_default(),
        })
    }

    /// Realm roles joined for display, E.g. "user, admin".
    pub fn roles_display(&self) -> String {
        self.realm_roles.iter().join(", ")
    }
}
