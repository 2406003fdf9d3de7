use std::fs;
use std::path::Path;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt; // for `oneshot`

use feedstash::server::{router, ServerState};

struct Fixture {
    _dir: tempfile::TempDir,
    app: Router,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("db");
    let html = dir.path().join("html");

    let dataset = db.join("example.social/home.parquet");
    for day in ["20240101", "20240102"] {
        let partition = dataset.join(format!("date={day}"));
        fs::create_dir_all(&partition).unwrap();
        fs::write(partition.join("file-0.parquet"), b"0123456789").unwrap();
    }
    fs::create_dir_all(db.join("example.social/scratch")).unwrap();
    fs::create_dir_all(html.join("docs")).unwrap();
    fs::write(html.join("index.html"), "<h1>feedstash</h1>").unwrap();
    fs::write(html.join("docs/index.html"), "<h1>docs</h1>").unwrap();

    let app = router(ServerState::new(&db, &html));
    Fixture { _dir: dir, app }
}

async fn send(app: &Router, method: Method, uri: &str, range: Option<&str>) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(range) = range {
        builder = builder.header("range", range);
    }
    app.clone().oneshot(builder.body(Body::empty()).unwrap()).await.unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

const SHARD: &str = "/db/example.social/home.parquet/date=20240101/file-0.parquet";

#[tokio::test]
async fn test_alive() {
    let f = fixture();
    let response = send(&f.app, Method::GET, "/api/v1/alive", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert_eq!(body_json(response).await, serde_json::json!({"message": "alive"}));
}

#[tokio::test]
async fn test_listing_endpoints() {
    let f = fixture();

    let servers = body_json(send(&f.app, Method::GET, "/api/v1/servers", None).await).await;
    assert_eq!(servers["Servers"], serde_json::json!(["example.social"]));

    let databases =
        body_json(send(&f.app, Method::GET, "/api/v1/servers/example.social", None).await).await;
    assert_eq!(databases["Databases"], serde_json::json!(["home.parquet"]));

    let partitions = body_json(
        send(&f.app, Method::GET, "/api/v1/servers/example.social/home.parquet", None).await,
    )
    .await;
    assert_eq!(
        partitions["Partitions"],
        serde_json::json!(["date=20240101", "date=20240102"])
    );
}

#[tokio::test]
async fn test_unknown_server_is_not_found() {
    let f = fixture();
    let response = send(&f.app, Method::GET, "/api/v1/servers/nowhere.example", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_files_with_value_filter() {
    let f = fixture();
    let uri = "/api/v1/servers/example.social/home.parquet/files?partition_key=date&partition_values=20240102,20991231";
    let response = send(&f.app, Method::GET, uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["Files"], serde_json::json!(["date=20240102/file-0.parquet"]));
    assert_eq!(json["Path"], "/db/example.social/home.parquet");
}

#[tokio::test]
async fn test_files_requires_partition_key() {
    let f = fixture();
    let uri = "/api/v1/servers/example.social/home.parquet/files";
    let response = send(&f.app, Method::GET, uri, None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_full_file() {
    let f = fixture();
    let response = send(&f.app, Method::GET, SHARD, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["accept-ranges"], "bytes");
    assert_eq!(response.headers()["content-type"], "application/octet-stream");
    assert_eq!(body_bytes(response).await, b"0123456789");
}

#[tokio::test]
async fn test_partial_content() {
    let f = fixture();
    let response = send(&f.app, Method::GET, SHARD, Some("bytes=0-4")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()["content-range"], "bytes 0-4/10");
    assert_eq!(response.headers()["content-length"], "5");
    assert_eq!(body_bytes(response).await, b"01234");
}

#[tokio::test]
async fn test_only_first_range_is_served() {
    let f = fixture();
    let response = send(&f.app, Method::GET, SHARD, Some("bytes=-3, 0-1")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()["content-range"], "bytes 7-9/10");
    assert_eq!(body_bytes(response).await, b"789");
}

#[tokio::test]
async fn test_range_past_end_is_rejected() {
    let f = fixture();
    let response = send(&f.app, Method::GET, SHARD, Some("bytes=100-104")).await;
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(response.headers()["content-range"], "bytes */10");
}

#[tokio::test]
async fn test_malformed_range_is_bad_request() {
    let f = fixture();
    for range in ["lines=0-4", "bytes=4-1", "bytes=x"] {
        let response = send(&f.app, Method::GET, SHARD, Some(range)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{range}");
    }
}

#[tokio::test]
async fn test_head_has_headers_without_body() {
    let f = fixture();
    let response = send(&f.app, Method::HEAD, SHARD, Some("bytes=2-")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()["content-range"], "bytes 2-9/10");
    assert_eq!(response.headers()["content-length"], "8");
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_static_index_documents() {
    let f = fixture();

    let response = send(&f.app, Method::GET, "/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/html");
    assert_eq!(body_bytes(response).await, b"<h1>feedstash</h1>");

    let response = send(&f.app, Method::GET, "/docs/", None).await;
    assert_eq!(body_bytes(response).await, b"<h1>docs</h1>");
}

#[tokio::test]
async fn test_missing_file_is_not_found() {
    let f = fixture();
    let response = send(&f.app, Method::GET, "/missing.js", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_options_preflight_on_any_path() {
    let f = fixture();
    for uri in ["/api/v1/servers", "/anything/at/all"] {
        let response = send(&f.app, Method::OPTIONS, uri, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["access-control-allow-methods"], "POST, GET, DELETE, OPTIONS");
        assert_eq!(headers["access-control-allow-headers"], "Authorization, Content-Type");
    }
}

#[tokio::test]
async fn test_missing_storage_root_is_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(ServerState::new(dir.path().join("nope"), Path::new("/nonexistent")));
    let response = send(&app, Method::GET, "/api/v1/servers", None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
