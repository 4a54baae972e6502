use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
};
use http::{HeaderMap, StatusCode};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::{net::TcpListener, task::JoinHandle};

pub const FRESH_TOKEN: &str = "fresh-token";

pub struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct Backend {
    addr: SocketAddr,
    protected_hits: Arc<AtomicUsize>,
    _server: AbortOnDrop<()>,
}

impl Backend {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Number of requests "/protected" received so far, accepted or not.
    pub fn protected_hits(&self) -> usize {
        self.protected_hits.load(Ordering::SeqCst)
    }
}

pub async fn start_axum_backend() -> Backend {
    let protected_hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route("/echo", get(echo).post(echo).put(echo).delete(echo))
        .route("/protected", get(protected))
        .route("/always-401", get(always_unauthorized))
        .route("/teapot", get(teapot))
        .with_state(protected_hits.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("TcpListener");
    let addr = listener.local_addr().expect("local addr");

    let server_jh = tokio::spawn(async move {
        tracing::info!(%addr, "Serving test backend...");
        axum::serve(listener, router.into_make_service())
            .await
            .expect("Server to start successfully");
    });

    Backend {
        addr,
        protected_hits,
        _server: AbortOnDrop(server_jh),
    }
}

fn header(headers: &HeaderMap, name: http::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|it| it.to_str().ok())
        .map(ToOwned::to_owned)
}

/// Reflects what the client sent.
async fn echo(headers: HeaderMap, body: String) -> Response {
    Json(json!({
        "authorization": header(&headers, http::header::AUTHORIZATION),
        "content_type": header(&headers, http::header::CONTENT_TYPE),
        "body": body,
    }))
    .into_response()
}

/// Only accepts the token handed out after a renewal.
async fn protected(State(hits): State<Arc<AtomicUsize>>, headers: HeaderMap) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    let expected = format!("Bearer {FRESH_TOKEN}");
    match header(&headers, http::header::AUTHORIZATION) {
        Some(authorization) if authorization == expected => {
            Json(json!({ "secret": 42 })).into_response()
        }
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn always_unauthorized() -> Response {
    StatusCode::UNAUTHORIZED.into_response()
}

async fn teapot() -> Response {
    (StatusCode::IM_A_TEAPOT, "short and stout").into_response()
}
