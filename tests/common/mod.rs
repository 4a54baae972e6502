#![allow(dead_code)]

pub mod executor;
pub mod fake_idp;
pub mod recording_ticker;
pub mod tracing;

use leptos_keycloak_session::url::Url;
use leptos_keycloak_session::{AdvancedOptions, SessionOptions};

pub fn options() -> SessionOptions {
    SessionOptions::new(
        Url::parse("http://localhost:8080").expect("valid url"),
        "demo-app",
        "demo-app-frontend",
    )
}

pub fn options_with(advanced: AdvancedOptions) -> SessionOptions {
    options().with_advanced(advanced)
}
