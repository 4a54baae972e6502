use crate::state::SessionState;

/// Outcome of checking a session against a set of acceptable roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,

    /// There is no authenticated session (including while initialization is still running).
    NotAuthenticated,

    /// The session holds none of the acceptable roles.
    MissingRole,
}

/// Decide whether content guarded by `required_roles` may be shown.
///
/// `required_roles` lists acceptable realm roles. Holding any one of them is sufficient.
/// An empty list only requires authentication.
pub fn evaluate<S: AsRef<str>>(state: &SessionState, required_roles: &[S]) -> Access {
    if !state.is_authenticated() {
        return Access::NotAuthenticated;
    }
    if required_roles.is_empty() || state.has_any_role(required_roles) {
        Access::Granted
    } else {
        Access::MissingRole
    }
}
