//! API Routes
//!
//! - `POST /upload` - raw body upload to `<folder>/<filename>`
//! - `GET /stream` - relay an object with its metadata headers
//! - `POST /presign-put`, `GET /presign-get` - direct-transfer URLs
//! - `POST /images`, `GET /images/{id}` - stored key records
//! - `GET /health` - database round-trip

pub mod health;
pub mod images;
pub mod presign;
pub mod stream;
pub mod upload;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::apply_cors;
use crate::models::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let allowed_origins = state.config.server.cors_allowed_origins.clone();

    let router = Router::new()
        .merge(upload::router(state.clone()))
        .merge(stream::router(state.clone()))
        .merge(presign::router(state.clone()))
        .merge(images::router(state.clone()))
        .merge(health::router(state));

    apply_cors(router, &allowed_origins).layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body, Bytes},
        http::{header, Request, Response, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::memory_config;
    use crate::db::memory::MemoryImageStore;
    use crate::storage::{
        MemoryObjectStore, ObjectMetadata, ObjectStore, ObjectStoreError, ObjectStream,
    };

    /// Object store whose every call fails like an unreachable endpoint.
    struct UnreachableObjectStore;

    #[async_trait]
    impl ObjectStore for UnreachableObjectStore {
        async fn put_object(&self, _: &str, _: Bytes, _: &str) -> Result<(), ObjectStoreError> {
            Err(ObjectStoreError::Request("connection refused".into()))
        }

        async fn head_object(&self, _: &str) -> Result<ObjectMetadata, ObjectStoreError> {
            Err(ObjectStoreError::Request("connection refused".into()))
        }

        async fn get_object(&self, _: &str) -> Result<ObjectStream, ObjectStoreError> {
            Err(ObjectStoreError::Request("connection refused".into()))
        }

        async fn presign_put(&self, _: &str, _: &str, _: u32) -> Result<String, ObjectStoreError> {
            Err(ObjectStoreError::Request("credentials expired".into()))
        }

        async fn presign_get(&self, _: &str, _: u32) -> Result<String, ObjectStoreError> {
            Err(ObjectStoreError::Request("credentials expired".into()))
        }
    }

    struct TestApp {
        router: Router,
        images: Arc<MemoryImageStore>,
    }

    fn app_with(objects: Arc<dyn ObjectStore>, max_upload_bytes: usize) -> TestApp {
        let mut config = memory_config();
        config.upload.max_upload_bytes = max_upload_bytes;

        let images = Arc::new(MemoryImageStore::new());
        let state = AppState::new(config, objects, images.clone());

        TestApp {
            router: create_router(state),
            images,
        }
    }

    fn app() -> TestApp {
        app_with(Arc::new(MemoryObjectStore::new()), 50 * 1024 * 1024)
    }

    async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
        router.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response<Body>) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_bytes(uri: &str, content_type: Option<&str>, bytes: Vec<u8>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri(uri);
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        builder.body(Body::from(bytes)).unwrap()
    }

    fn jpeg_bytes() -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
        bytes.extend((0..150_000u32).map(|i| (i % 253) as u8));
        bytes.extend([0xFF, 0xD9]);
        bytes
    }

    #[tokio::test]
    async fn test_upload_then_stream_round_trip() {
        let app = app();
        let payload = jpeg_bytes();

        let response = send(
            &app.router,
            post_bytes(
                "/upload?folder=images&filename=test.jpg",
                Some("image/jpeg"),
                payload.clone(),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "ok": true, "key": "images/test.jpg" }));

        let response = send(&app.router, get("/stream?key=images/test.jpg")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
        assert_eq!(
            response.headers()[header::CONTENT_LENGTH],
            payload.len().to_string().as_str()
        );
        assert!(response.headers().contains_key(header::ETAG));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), payload.as_slice());
    }

    #[tokio::test]
    async fn test_upload_normalizes_key_segments() {
        let app = app();
        let response = send(
            &app.router,
            post_bytes("/upload?folder=images/&filename=/cat.png", Some("image/png"), vec![1, 2, 3]),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["key"], "images/cat.png");
    }

    #[tokio::test]
    async fn test_upload_defaults_content_type() {
        let app = app();
        let response = send(
            &app.router,
            post_bytes("/upload?folder=docs&filename=blob", None, b"raw".to_vec()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app.router, get("/stream?key=docs/blob")).await;
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/octet-stream");
    }

    #[tokio::test]
    async fn test_upload_requires_folder_and_filename() {
        let app = app();

        for uri in [
            "/upload",
            "/upload?folder=images",
            "/upload?filename=test.jpg",
            "/upload?folder=%20&filename=test.jpg",
        ] {
            let response = send(&app.router, post_bytes(uri, Some("image/jpeg"), vec![1])).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri={uri}");
            assert_eq!(
                json_body(response).await,
                json!({ "ok": false, "error": "folder_and_filename_required" })
            );
        }
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_body() {
        let app = app();
        let response = send(
            &app.router,
            post_bytes("/upload?folder=images&filename=a.jpg", Some("image/jpeg"), Vec::new()),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "empty_body");
    }

    #[tokio::test]
    async fn test_upload_rejects_oversized_body() {
        let app = app_with(Arc::new(MemoryObjectStore::new()), 16);

        // Without a declared length the limit is hit while reading.
        let response = send(
            &app.router,
            post_bytes("/upload?folder=images&filename=a.bin", None, vec![7; 17]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json_body(response).await["error"], "payload_too_large");

        // A declared length over the limit is rejected up front.
        let request = Request::builder()
            .method("POST")
            .uri("/upload?folder=images&filename=a.bin")
            .header(header::CONTENT_LENGTH, "1000")
            .body(Body::from(vec![7; 1000]))
            .unwrap();
        let response = send(&app.router, request).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        // Exactly at the limit is accepted.
        let response = send(
            &app.router,
            post_bytes("/upload?folder=images&filename=a.bin", None, vec![7; 16]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_upload_interrupted_body_is_not_reported_as_too_large() {
        let app = app_with(Arc::new(MemoryObjectStore::new()), 1024);

        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "client went away")),
        ];
        let request = Request::builder()
            .method("POST")
            .uri("/upload?folder=images&filename=a.bin")
            .body(Body::from_stream(futures::stream::iter(chunks)))
            .unwrap();

        let response = send(&app.router, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await, json!({ "ok": false, "error": "invalid_body" }));
    }

    #[tokio::test]
    async fn test_repeated_query_parameters_are_json_errors() {
        let app = app();

        for request in [
            get("/stream?key=a&key=b"),
            get("/presign-get?key=a&key=b"),
            post_bytes("/upload?folder=a&folder=b&filename=x", None, vec![1]),
        ] {
            let response = send(&app.router, request).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(
                json_body(response).await,
                json!({ "ok": false, "error": "invalid_parameters" })
            );
        }
    }

    #[tokio::test]
    async fn test_undecodable_image_id_is_json_error() {
        let app = app();
        let response = send(&app.router, get("/images/%FF")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({ "ok": false, "error": "invalid_parameters" })
        );
    }

    #[tokio::test]
    async fn test_upload_store_failure_is_reported() {
        let app = app_with(Arc::new(UnreachableObjectStore), 1024);
        let response = send(
            &app.router,
            post_bytes("/upload?folder=images&filename=a.jpg", Some("image/jpeg"), vec![1, 2]),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await, json!({ "ok": false, "error": "upload_failed" }));
    }

    #[tokio::test]
    async fn test_stream_errors() {
        let app = app();

        let response = send(&app.router, get("/stream")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "key_required");

        let response = send(&app.router, get("/stream?key=images/missing.jpg")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await, json!({ "ok": false, "error": "not_found" }));

        let app = app_with(Arc::new(UnreachableObjectStore), 1024);
        let response = send(&app.router, get("/stream?key=images/a.jpg")).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json_body(response).await["error"], "fetch_failed");
    }

    #[tokio::test]
    async fn test_presign_put_generates_key_and_url() {
        let app = app();
        let response = send(
            &app.router,
            post_json("/presign-put", json!({ "folder": "uploads", "contentType": "image/png" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["contentType"], "image/png");
        assert_eq!(body["expiresIn"], 300);

        let key = body["key"].as_str().unwrap();
        let (folder, id) = key.split_once('/').unwrap();
        assert_eq!(folder, "uploads");
        assert!(uuid::Uuid::parse_str(id).is_ok());

        let put_url = body["putUrl"].as_str().unwrap();
        assert!(put_url.starts_with("http://"));
        assert!(put_url.contains(key));
        let expires: u32 = put_url
            .split(['?', '&'])
            .find_map(|pair| pair.strip_prefix("X-Amz-Expires="))
            .unwrap()
            .parse()
            .unwrap();
        assert!(expires <= 300);
    }

    #[tokio::test]
    async fn test_presign_put_keys_never_collide() {
        let app = app();
        let mut keys = std::collections::HashSet::new();
        for _ in 0..20 {
            let response = send(&app.router, post_json("/presign-put", json!({ "folder": "uploads" }))).await;
            let body = json_body(response).await;
            assert_eq!(body["contentType"], "application/octet-stream");
            keys.insert(body["key"].as_str().unwrap().to_string());
        }
        assert_eq!(keys.len(), 20);
    }

    #[tokio::test]
    async fn test_presign_put_errors() {
        let app = app();

        let response = send(&app.router, post_json("/presign-put", json!({ "contentType": "image/png" }))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "folder_required");

        let request = Request::builder()
            .method("POST")
            .uri("/presign-put")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = send(&app.router, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "invalid_body");

        let app = app_with(Arc::new(UnreachableObjectStore), 1024);
        let response = send(&app.router, post_json("/presign-put", json!({ "folder": "uploads" }))).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error"], "presign_failed");
    }

    #[tokio::test]
    async fn test_presign_get() {
        let app = app();

        let response = send(&app.router, get("/presign-get?key=images/test.jpg")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["key"], "images/test.jpg");
        assert_eq!(body["expiresIn"], 600);
        assert!(body["getUrl"].as_str().unwrap().contains("X-Amz-Expires=600"));

        let response = send(&app.router, get("/presign-get?key=")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "key_required");
    }

    #[tokio::test]
    async fn test_save_key_is_idempotent() {
        let app = app();

        let first = json_body(send(&app.router, post_json("/images", json!({ "key": "images/test.jpg" }))).await).await;
        let second = json_body(send(&app.router, post_json("/images", json!({ "key": "images/test.jpg" }))).await).await;

        assert_eq!(first["ok"], true);
        assert_eq!(first["image"]["key"], "images/test.jpg");
        assert_eq!(first["image"]["id"], second["image"]["id"]);
        assert_eq!(app.images.count_key("images/test.jpg").await, 1);

        let other = json_body(send(&app.router, post_json("/images", json!({ "key": "images/other.jpg" }))).await).await;
        assert_ne!(other["image"]["id"], first["image"]["id"]);
    }

    #[tokio::test]
    async fn test_save_key_requires_key() {
        let app = app();
        for body in [json!({}), json!({ "key": "" }), json!({ "key": "   " })] {
            let response = send(&app.router, post_json("/images", body)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(json_body(response).await, json!({ "ok": false, "error": "key_required" }));
        }
    }

    #[tokio::test]
    async fn test_get_image_by_id() {
        let app = app();
        let saved = json_body(send(&app.router, post_json("/images", json!({ "key": "images/a.jpg" }))).await).await;
        let id = saved["image"]["id"].as_i64().unwrap();

        let response = send(&app.router, get(&format!("/images/{id}"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "ok": true, "image": { "id": id, "key": "images/a.jpg" } })
        );

        let response = send(&app.router, get("/images/999999")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await, json!({ "ok": false, "error": "not_found" }));

        let response = send(&app.router, get("/images/abc")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await, json!({ "ok": false, "error": "bad_id" }));
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let response = send(&app.router, get("/health")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["storage"], "memory");
        assert!(chrono::DateTime::parse_from_rfc3339(body["now"].as_str().unwrap()).is_ok());
    }
}
