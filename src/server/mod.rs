//! HTTP listing API and range-aware file server.
//!
//! Every path outside `/api/v1` is served from disk: stored shards under
//! `/db/...`, everything else from the html directory.

pub mod api;
pub mod files;
pub mod range;

use std::path::PathBuf;

use axum::extract::Request;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{from_fn, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::Result;

pub const API_PREFIX: &str = "/api/v1";

#[derive(Debug, Clone)]
pub struct ServerState {
    pub storage_root: PathBuf,
    pub html_dir: PathBuf,
}

impl ServerState {
    pub fn new(storage_root: impl Into<PathBuf>, html_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            html_dir: html_dir.into(),
        }
    }
}

/// Answers preflight requests on any path and marks every response as
/// readable from any origin.
async fn cors(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        return (
            StatusCode::OK,
            [
                (ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
                (
                    ACCESS_CONTROL_ALLOW_METHODS,
                    HeaderValue::from_static("POST, GET, DELETE, OPTIONS"),
                ),
                (
                    ACCESS_CONTROL_ALLOW_HEADERS,
                    HeaderValue::from_static("Authorization, Content-Type"),
                ),
            ],
        )
            .into_response();
    }

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

pub fn router(state: ServerState) -> Router {
    let api = Router::new()
        .route("/alive", get(api::alive))
        .route("/servers", get(api::servers))
        .route("/servers/:server", get(api::databases))
        .route("/servers/:server/:database", get(api::partitions))
        .route("/servers/:server/:database/files", get(api::files));

    Router::new()
        .nest(API_PREFIX, api)
        .fallback(files::serve_file)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(cors))
        .with_state(state)
}

pub async fn serve(state: ServerState, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(
        "Serving {} and {} on http://{}",
        state.storage_root.display(),
        state.html_dir.display(),
        listener.local_addr()?
    );
    axum::serve(listener, router(state)).await?;
    Ok(())
}
