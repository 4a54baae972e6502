use crate::client::IdpError;
use snafu::Snafu;

/// An enumeration representing the failures the session lifecycle can run into.
///
/// This type is `Clone`, as the last error is kept inside `NotAuthenticated` state, which is
/// shared with every component reading the session.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SessionError {
    #[snafu(display("SessionError: Invalid configuration: {reason}"))]
    Config { reason: String },

    #[snafu(display("SessionError: The session manager was already initialized"))]
    AlreadyInitialized,

    #[snafu(display("SessionError: Could not initialize the session"))]
    Initialization { source: IdpError },

    #[snafu(display(
        "SessionError: Identity provider reported an authenticated session but exposed no token"
    ))]
    MissingToken,

    #[snafu(display("SessionError: Could not refresh the access token"))]
    Refresh { source: IdpError },

    #[snafu(display("SessionError: Could not end the identity provider session"))]
    Logout { source: IdpError },
}
