use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, error};

use crate::server::range::{parse_range_header, ByteRange, RangeError};
use crate::server::ServerState;
use crate::store::DATA_SUFFIX;

const OCTET_STREAM: &str = "application/octet-stream";

/// A request path mapped onto disk.
#[derive(Debug, PartialEq, Eq)]
pub struct ResolvedPath {
    pub path: PathBuf,
    pub content_type: String,
}

/// `db/<server>/<feed>.parquet/<partition>/<file>.parquet`
fn is_data_path(rel: &str) -> bool {
    let Some(rest) = rel.strip_prefix("db/") else {
        return false;
    };
    let segments: Vec<&str> = rest.split('/').collect();
    segments.len() == 4
        && segments.iter().all(|s| !s.is_empty())
        && segments[1].ends_with(DATA_SUFFIX)
        && segments[3].ends_with(DATA_SUFFIX)
}

/// Map a URL path onto the storage root or the html directory.
///
/// `None` for paths that try to climb out with `..`.
pub fn resolve_path(state: &ServerState, url_path: &str) -> Option<ResolvedPath> {
    let rel = url_path.trim_start_matches('/');
    if rel.split('/').any(|segment| segment == ".." || segment.contains('\\')) {
        return None;
    }

    if let Some(stored) = rel.strip_prefix("db/").filter(|_| is_data_path(rel)) {
        let path = state.storage_root.join(stored);
        return Some(ResolvedPath {
            path,
            content_type: OCTET_STREAM.to_string(),
        });
    }

    let mut path = state.html_dir.join(rel);
    if rel.is_empty() || rel.ends_with('/') {
        path.push("index.html");
    }
    let content_type = mime_guess::from_path(&path).first_or_octet_stream().to_string();
    Some(ResolvedPath { path, content_type })
}

fn header(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static(OCTET_STREAM))
}

async fn read_range(path: &Path, range: ByteRange) -> std::io::Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(range.start)).await?;
    let mut buf = vec![0; range.byte_count() as usize];
    file.read_exact(&mut buf).await?;
    Ok(buf)
}

fn internal_error(path: &Path, e: std::io::Error) -> Response {
    error!("Failed to read {}: {}", path.display(), e);
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

/// GET/HEAD on anything outside the API, honoring `Range`.
pub async fn serve_file(
    State(state): State<ServerState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let Some(resolved) = resolve_path(&state, uri.path()) else {
        return (StatusCode::BAD_REQUEST, "invalid path").into_response();
    };

    let size = match tokio::fs::metadata(&resolved.path).await {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => return (StatusCode::NOT_FOUND, "not found").into_response(),
    };
    let head_only = method == Method::HEAD;

    let Some(range_header) = headers.get(RANGE) else {
        let body = if head_only {
            Body::empty()
        } else {
            match tokio::fs::read(&resolved.path).await {
                Ok(bytes) => Body::from(bytes),
                Err(e) => return internal_error(&resolved.path, e),
            }
        };
        return (
            StatusCode::OK,
            [
                (CONTENT_TYPE, header(&resolved.content_type)),
                (ACCEPT_RANGES, HeaderValue::from_static("bytes")),
                (CONTENT_LENGTH, HeaderValue::from(size)),
            ],
            body,
        )
            .into_response();
    };

    let Ok(range_header) = range_header.to_str() else {
        return (StatusCode::BAD_REQUEST, "malformed range").into_response();
    };

    let range = match parse_range_header(range_header, size) {
        Ok(ranges) => {
            if ranges.len() > 1 {
                debug!("Serving first of {} ranges for {}", ranges.len(), uri.path());
            }
            match ranges.first() {
                Some(range) => *range,
                None => return (StatusCode::BAD_REQUEST, "malformed range").into_response(),
            }
        }
        Err(e @ RangeError::Malformed(_)) => {
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
        Err(e @ RangeError::Unsatisfiable(_)) => {
            return (
                StatusCode::RANGE_NOT_SATISFIABLE,
                [(CONTENT_RANGE, header(&format!("bytes */{size}")))],
                e.to_string(),
            )
                .into_response();
        }
    };

    let body = if head_only {
        Body::empty()
    } else {
        match read_range(&resolved.path, range).await {
            Ok(bytes) => Body::from(bytes),
            Err(e) => return internal_error(&resolved.path, e),
        }
    };

    (
        StatusCode::PARTIAL_CONTENT,
        [
            (CONTENT_TYPE, header(&resolved.content_type)),
            (ACCEPT_RANGES, HeaderValue::from_static("bytes")),
            (
                CONTENT_RANGE,
                header(&format!("bytes {}-{}/{}", range.start, range.end, size)),
            ),
            (CONTENT_LENGTH, HeaderValue::from(range.byte_count())),
        ],
        body,
    )
        .into_response()
}
