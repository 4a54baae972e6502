//! Keycloak sessions for Leptos applications.
//!
//! All protocol work is delegated to an external OIDC browser adapter (E.g. a binding to
//! `keycloak-js`), implementing [`IdentityProviderClient`]. This crate owns what is around it:
//!
//! - a [`SessionManager`] initializing the client exactly once and renewing the access token
//!   on a timer,
//! - a read-only [`SessionHandle`] provided as context to all descendant components,
//! - an [`AuthenticatedClient`] attaching the current access token to outgoing requests,
//! - components gating content by authentication and realm roles.
//!
//! ```no_run
//! use leptos::prelude::*;
//! use leptos_keycloak_session::components::{RequireRoles, SessionProvider};
//! use leptos_keycloak_session::{IdentityProviderClient, SessionManager, SessionOptions, use_session};
//!
//! fn app(client: impl IdentityProviderClient) -> impl IntoView {
//!     // Reads KEYCLOAK_URL, KEYCLOAK_REALM and KEYCLOAK_CLIENT_ID at compile time.
//!     let options = SessionOptions::from_build_env().expect("valid keycloak configuration");
//!     let manager = SessionManager::new(options, client).expect("valid keycloak configuration");
//!
//!     view! {
//!         <SessionProvider manager=manager>
//!             <RequireRoles roles=vec!["admin".to_owned()]>
//!                 <ConfidentialArea/>
//!             </RequireRoles>
//!         </SessionProvider>
//!     }
//! }
//!
//! #[component]
//! fn ConfidentialArea() -> impl IntoView {
//!     let session = use_session();
//!     view! {
//!         <div>
//!             "Hello, " { move || session.claims().map(|it| it.preferred_username.clone()) }
//!         </div>
//!     }
//! }
//! ```

mod authenticated_client;
mod client;
pub mod components;
mod config;
mod error;
pub mod gate;
mod hooks;
mod manager;
mod profile;
mod state;
mod ticker;
mod token_claims;

// Library exports (additional to pub modules).
pub use authenticated_client::*;
pub use client::*;
pub use config::*;
pub use error::*;
pub use hooks::*;
pub use manager::*;
pub use profile::*;
pub use state::*;
pub use ticker::*;
pub use token_claims::*;
pub mod url {
    pub use url::Url;
}
pub mod reqwest {
    pub use reqwest::*;
}

type AccessToken = String;
