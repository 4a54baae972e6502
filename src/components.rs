use crate::gate::{self, Access};
use crate::profile::Profile;
use crate::{
    SessionError, SessionHandle, SessionManager, provide_session, try_use_session, use_session,
};
use leptos::either::EitherOf3;
use leptos::prelude::*;

/// Placeholder texts rendered by the components of this module.
pub mod text {
    pub const LOADING: &str = "Loading authentication...";
    pub const NOT_AUTHENTICATED: &str = "Not authenticated";
    pub const MUST_LOG_IN: &str = "You must log in";
    pub const NO_ADMIN_PERMISSIONS: &str = "You do not have administrator permissions";
    pub const ACCESS_DENIED: &str = "Access denied. Please log in.";
    pub const MISSING_ROLES: &str = "You do not have the required permissions.";
}

/// The realm role required by [`AdminPanel`].
pub const ADMIN_ROLE: &str = "admin";

fn spawn_logout(session: SessionHandle) {
    leptos::task::spawn_local(async move {
        if let Err(err) = session.logout().await {
            tracing::warn!(?err, "Logout did not complete.");
        }
    });
}

/// Provide the session of `manager` to child components and initialize it.
///
/// Initialization is started once the component is mounted on the client. Until it completed,
/// the `loading` view is shown. When this component is cleaned up, the refresh timer of the
/// manager is stopped. Mounting it again with the same manager resumes the timer.
///
/// # Example
/// ```no_run
/// use leptos::prelude::*;
/// use leptos_keycloak_session::components::{AdminPanel, SessionProvider, UserProfile};
/// use leptos_keycloak_session::{IdentityProviderClient, SessionManager, SessionOptions};
///
/// # fn app(client: impl IdentityProviderClient) -> impl IntoView {
/// let options = SessionOptions::from_build_env().expect("valid keycloak configuration");
/// let manager = SessionManager::new(options, client).expect("valid keycloak configuration");
///
/// view! {
///     <SessionProvider manager=manager>
///         <h1>"My application"</h1>
///         <UserProfile/>
///         <AdminPanel/>
///     </SessionProvider>
/// }
/// # }
/// ```
#[component]
#[allow(clippy::must_use_candidate)]
pub fn SessionProvider(
    /// The manager owning the session. Construct one per application.
    manager: SessionManager,

    /// View shown while the session is initializing.
    #[prop(into, optional)]
    loading: Option<ViewFn>,

    children: ChildrenFn,
) -> impl IntoView {
    let session = provide_session(&manager);

    // Effects only run on the client, which is the only place initialization may happen.
    Effect::new({
        let manager = manager.clone();
        move |_| {
            let manager = manager.clone();
            leptos::task::spawn_local(async move {
                // Failures are logged by the manager and reflected in the session state.
                match manager.initialize().await {
                    Ok(_) => {}
                    Err(SessionError::AlreadyInitialized) => {
                        // Remounted. The previous cleanup stopped the refresh timer.
                        manager.resume();
                    }
                    Err(err) => {
                        tracing::debug!(?err, "Session initialization did not succeed.");
                    }
                }
            });
        }
    });

    on_cleanup(move || manager.shutdown());

    move || {
        if session.is_loading() {
            loading.as_ref().map_or_else(
                || view! { <div class="session-loading">{text::LOADING}</div> }.into_any(),
                ViewFn::run,
            )
        } else {
            children()
        }
    }
}

/// Render `children` only when the session is authenticated and holds at least one of `roles`.
///
/// With no `roles` given, only authentication is required. The children are rendered as they
/// are. Denials render the `not_authenticated` or `forbidden` views, falling back to
/// [`text::ACCESS_DENIED`] and [`text::MISSING_ROLES`].
///
/// # Example
/// ```no_run
/// use leptos::prelude::*;
/// use leptos_keycloak_session::components::RequireRoles;
///
/// # #[component]
/// # fn Component() -> impl IntoView {
/// view! {
///     <RequireRoles roles=vec!["editor".to_owned(), "admin".to_owned()]>
///         <p>"Editing tools"</p>
///     </RequireRoles>
/// }
/// # }
/// ```
#[component]
#[allow(clippy::must_use_candidate)]
pub fn RequireRoles(
    /// Acceptable realm roles. Holding any one of them grants access.
    #[prop(into, optional)]
    roles: Vec<String>,

    /// View shown when the user is not authenticated.
    #[prop(into, optional)]
    not_authenticated: Option<ViewFn>,

    /// View shown when the user holds none of the acceptable roles.
    #[prop(into, optional)]
    forbidden: Option<ViewFn>,

    children: ChildrenFn,
) -> impl IntoView {
    let session = use_session();

    move || match gate::evaluate(&session.state(), &roles) {
        Access::Granted => EitherOf3::A(children()),
        Access::NotAuthenticated => EitherOf3::B(not_authenticated.as_ref().map_or_else(
            || view! { <div class="access-denied">{text::ACCESS_DENIED}</div> }.into_any(),
            ViewFn::run,
        )),
        Access::MissingRole => EitherOf3::C(forbidden.as_ref().map_or_else(
            || view! { <div class="access-denied">{text::MISSING_ROLES}</div> }.into_any(),
            ViewFn::run,
        )),
    }
}

/// Show `children` only when the user is authenticated, `fallback` otherwise.
#[component]
#[allow(clippy::must_use_candidate)]
pub fn ShowWhenAuthenticated(
    #[prop(into, optional)] fallback: Option<ViewFn>,
    children: ChildrenFn,
) -> impl IntoView {
    let session = use_session();

    move || {
        if session.is_authenticated() {
            children()
        } else {
            fallback.as_ref().map_or_else(|| ().into_any(), ViewFn::run)
        }
    }
}

/// Profile of the authenticated user with a logout button.
#[component]
#[allow(clippy::must_use_candidate)]
pub fn UserProfile() -> impl IntoView {
    let session = use_session();

    move || match Profile::from_state(&session.state()) {
        None => view! { <div>{text::NOT_AUTHENTICATED}</div> }.into_any(),
        Some(profile) => {
            let roles = profile.roles_display();
            let session = session.clone();
            view! {
                <div class="user-profile">
                    <h2>"User profile"</h2>
                    <p><strong>"Username: "</strong>{profile.username}</p>
                    <p><strong>"Email: "</strong>{profile.email}</p>
                    <p><strong>"Name: "</strong>{profile.full_name}</p>
                    <p><strong>"Roles: "</strong>{roles}</p>
                    <button on:click=move |_| spawn_logout(session.clone())>"Log out"</button>
                </div>
            }
            .into_any()
        }
    }
}

/// Content only visible to users holding the [`ADMIN_ROLE`] realm role.
#[component]
#[allow(clippy::must_use_candidate)]
pub fn AdminPanel() -> impl IntoView {
    let session = use_session();

    move || match gate::evaluate(&session.state(), &[ADMIN_ROLE]) {
        Access::NotAuthenticated => view! { <div>{text::MUST_LOG_IN}</div> }.into_any(),
        Access::MissingRole => view! { <div>{text::NO_ADMIN_PERMISSIONS}</div> }.into_any(),
        Access::Granted => view! {
            <div class="admin-panel">
                <h2>"Administration"</h2>
                <p>"Only visible to administrators"</p>
            </div>
        }
        .into_any(),
    }
}

/// Immediately logs out the user when rendered.
///
/// You may use this in your router and render it as the only component when the user hits
/// the "/logout" path locally. Does nothing when no session was provided.
#[component]
#[allow(clippy::must_use_candidate)]
pub fn EndSession() -> impl IntoView {
    let session = try_use_session();
    // The session MUST only be ended on the client, not on the server.
    Effect::new(move |_| match session.clone() {
        Some(session) => {
            tracing::trace!("Logging out...");
            spawn_logout(session);
        }
        None => {
            tracing::trace!("No session provided. Nothing to end.");
        }
    });
}
