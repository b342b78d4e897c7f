use crate::config::ApiConfig;
use crate::dispatcher::BatchDispatcher;
use crate::event::WebhookRequest;
use crate::record_store::FaceRecordStore;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::future::Future;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<BatchDispatcher>,
    pub records: Arc<dyn FaceRecordStore>,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", post(receive_batch))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Webhook endpoint. Acknowledges the batch whatever happened to its messages.
///
/// The body is parsed as JSON whatever its `Content-Type`; triggers do not
/// always set one.
async fn receive_batch(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let request: WebhookRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Rejected webhook body");
            return StatusCode::BAD_REQUEST;
        }
    };

    info!(messages = request.messages.len(), "Received batch");
    state.dispatcher.handle(request.messages).await;
    StatusCode::OK
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "face-cut"
    }))
}

/// Readiness check endpoint
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.records.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "database": "connected"
            })),
        ),
        Err(e) => {
            error!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "not_ready",
                    "database": "disconnected",
                    "error": format!("{e:#}")
                })),
            )
        }
    }
}

/// Serve the webhook API until `shutdown` resolves
pub async fn start_api_server<F>(state: AppState, config: &ApiConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state);
    let addr = format!("{}:{}", config.host, config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "App listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventMessage, FacePayload, Point};
    use crate::geometry::BoxSelection;
    use crate::imaging::test_support::{encode, quadrant_photo};
    use crate::object_store::MockObjectStore;
    use crate::processor::{MessageProcessor, ProcessorSettings};
    use crate::record_store::MockFaceRecordStore;
    use axum::body::Body;
    use axum::http::Request;
    use image::ImageFormat;
    use tower::ServiceExt;

    fn state(objects: MockObjectStore, records: MockFaceRecordStore, ready: bool) -> AppState {
        let settings = ProcessorSettings {
            photo_bucket: "photos".to_string(),
            face_bucket: "faces".to_string(),
            jpeg_quality: 75,
            box_selection: BoxSelection::Span,
        };
        let mut health = MockFaceRecordStore::new();
        health.expect_ping().returning(move || {
            if ready {
                Ok(())
            } else {
                Err(anyhow::anyhow!("connection refused"))
            }
        });

        let processor = MessageProcessor::new(Arc::new(objects), Arc::new(records), settings);
        AppState {
            dispatcher: Arc::new(BatchDispatcher::new(Arc::new(processor), 2)),
            records: Arc::new(health),
        }
    }

    fn valid_message() -> serde_json::Value {
        let payload = FacePayload {
            object_key: "photo1.jpg".to_string(),
            face: vec![
                Point { x: 1.0, y: 1.0 },
                Point { x: 20.0, y: 1.0 },
                Point { x: 20.0, y: 20.0 },
                Point { x: 1.0, y: 20.0 },
            ],
        };
        serde_json::to_value(EventMessage::wrap(&payload).unwrap()).unwrap()
    }

    fn post_json(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_webhook_acknowledges_with_empty_body() {
        let photo = encode(quadrant_photo(32, 32), ImageFormat::Png);
        let mut objects = MockObjectStore::new();
        objects
            .expect_get_object()
            .times(1)
            .returning(move |_, _| Ok(photo.clone()));
        objects
            .expect_put_object()
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        let mut records = MockFaceRecordStore::new();
        records.expect_insert().times(1).returning(|_| Ok(()));

        let router = create_router(state(objects, records, true));
        let response = router
            .oneshot(post_json(serde_json::json!({
                "messages": [valid_message(), {"details": {}}]
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_webhook_without_messages_is_rejected() {
        let router = create_router(state(
            MockObjectStore::new(),
            MockFaceRecordStore::new(),
            true,
        ));
        let response = router
            .oneshot(post_json(serde_json::json!({"records": []})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let router = create_router(state(
            MockObjectStore::new(),
            MockFaceRecordStore::new(),
            true,
        ));
        let response = router
            .oneshot(
                Request::post("/")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_webhook_without_content_type_is_processed() {
        let photo = encode(quadrant_photo(32, 32), ImageFormat::Png);
        let mut objects = MockObjectStore::new();
        objects
            .expect_get_object()
            .times(1)
            .returning(move |_, _| Ok(photo.clone()));
        objects
            .expect_put_object()
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        let mut records = MockFaceRecordStore::new();
        records.expect_insert().times(1).returning(|_| Ok(()));

        let body = serde_json::json!({ "messages": [valid_message()] }).to_string();
        let router = create_router(state(objects, records, true));
        let response = router
            .oneshot(Request::post("/").body(Body::from(body)).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readiness_reports_database_state() {
        let router = create_router(state(
            MockObjectStore::new(),
            MockFaceRecordStore::new(),
            false,
        ));
        let response = router
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let router = create_router(state(
            MockObjectStore::new(),
            MockFaceRecordStore::new(),
            true,
        ));
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
