use crate::{Authenticated, SessionHandle, SessionManager};
use leptos::prelude::{expect_context, provide_context, use_context};

/// Provide the read-only [`SessionHandle`] of `manager` to all components rendered below the
/// current one. [`SessionProvider`](crate::components::SessionProvider) does this for you.
pub fn provide_session(manager: &SessionManager) -> SessionHandle {
    let handle = manager.handle();
    provide_context(handle.clone());
    handle
}

/// Get the session provided by a parent component.
///
/// # Panics
/// Panics if no `SessionHandle` was provided, e.g. because this component is not rendered below
/// a `SessionProvider`.
pub fn use_session() -> SessionHandle {
    expect_context::<SessionHandle>()
}

pub fn try_use_session() -> Option<SessionHandle> {
    use_context::<SessionHandle>()
}

/// Get the authenticated state of the provided session.
///
/// Only call this in components rendered below
/// [`ShowWhenAuthenticated`](crate::components::ShowWhenAuthenticated) or
/// [`RequireRoles`](crate::components::RequireRoles).
///
/// # Panics
/// Panics if no session was provided or the user is not authenticated.
pub fn expect_authenticated() -> Authenticated {
    use_session()
        .state()
        .authenticated()
        .cloned()
        .expect("an authenticated session. Only call this below ShowWhenAuthenticated or RequireRoles")
}
