use std::collections::BTreeSet;
use std::path::{Path as StdPath, PathBuf};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::app::{FeedstashError, Result};
use crate::server::ServerState;
use crate::store::{list_datasets, list_partition_dirs, list_partitions, list_servers};

/// Path segments that would step outside the storage root.
fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains(['/', '\\'])
}

fn listing_failed(e: FeedstashError) -> Response {
    error!("Listing failed: {}", e);
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

/// Run a directory listing on the blocking pool. `None` when `dir` is not
/// a directory.
async fn list_dir<T, F>(dir: PathBuf, list: F) -> Result<Option<T>>
where
    T: Send + 'static,
    F: FnOnce(&StdPath) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        if !dir.is_dir() {
            return Ok(None);
        }
        list(&dir).map(Some)
    })
    .await
    .map_err(|e| FeedstashError::Other(format!("listing task failed: {e}")))?
}

pub async fn alive() -> Json<serde_json::Value> {
    Json(json!({"message": "alive"}))
}

pub async fn servers(State(state): State<ServerState>) -> Response {
    match list_dir(state.storage_root.clone(), list_servers).await {
        Ok(Some(servers)) => Json(json!({"Servers": servers})).into_response(),
        Ok(None) => {
            error!("Storage root {} does not exist", state.storage_root.display());
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(e) => listing_failed(e),
    }
}

pub async fn databases(State(state): State<ServerState>, Path(server): Path<String>) -> Response {
    if !is_safe_segment(&server) {
        return StatusCode::NOT_FOUND.into_response();
    }
    match list_dir(state.storage_root.join(&server), list_datasets).await {
        Ok(Some(databases)) => Json(json!({"Databases": databases})).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => listing_failed(e),
    }
}

pub async fn partitions(
    State(state): State<ServerState>,
    Path((server, database)): Path<(String, String)>,
) -> Response {
    if !is_safe_segment(&server) || !is_safe_segment(&database) {
        return StatusCode::NOT_FOUND.into_response();
    }
    let dir = state.storage_root.join(&server).join(&database);
    match list_dir(dir, list_partition_dirs).await {
        Ok(Some(partitions)) => Json(json!({"Partitions": partitions})).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => listing_failed(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct FilesQuery {
    partition_key: Option<String>,
    partition_values: Option<String>,
}

pub async fn files(
    State(state): State<ServerState>,
    Path((server, database)): Path<(String, String)>,
    Query(query): Query<FilesQuery>,
) -> Response {
    let Some(key) = query.partition_key.filter(|k| !k.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "partition_key is required").into_response();
    };
    if !is_safe_segment(&server) || !is_safe_segment(&database) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let filter: Option<BTreeSet<String>> = query
        .partition_values
        .map(|values| {
            values
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
                .collect::<BTreeSet<_>>()
        })
        .filter(|values| !values.is_empty());

    let dir = state.storage_root.join(&server).join(&database);
    let listed = list_dir(dir, move |dir| list_partitions(dir, &key, filter.as_ref())).await;
    match listed {
        Ok(Some(files)) => Json(json!({
            "Path": format!("/db/{server}/{database}"),
            "Files": files,
        }))
        .into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => listing_failed(e),
    }
}
