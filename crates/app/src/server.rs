//! HTTP surface: PDF upload, index status, and the WebSocket query route.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use pdf_chat_core::{IndexStatus, SessionCoordinator, UploadStatus};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Shared state for every request and socket.
pub struct AppState {
    pub coordinator: Arc<SessionCoordinator>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/upload-pdf/", post(upload_pdf))
        .route("/status", get(index_status))
        .route("/ws", get(super::ws::ws_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, coordinator: Arc<SessionCoordinator>) -> anyhow::Result<()> {
    let app = build_router(Arc::new(AppState { coordinator }));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening for uploads and websocket sessions");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

async fn upload_pdf(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> (StatusCode, Json<UploadStatus>) {
    let (file_name, bytes) = match read_file_field(&mut multipart).await {
        Ok(Some(file)) => file,
        Ok(None) => {
            return failed(StatusCode::BAD_REQUEST, "multipart field `file` is required");
        }
        Err(error) => {
            return failed(StatusCode::BAD_REQUEST, &error.to_string());
        }
    };

    info!(file_name = %file_name, bytes = bytes.len(), "pdf upload received");
    match state.coordinator.ingest(&file_name, bytes).await {
        Ok(_) => (StatusCode::OK, Json(UploadStatus::processed())),
        Err(error) => failed(StatusCode::BAD_REQUEST, &error.to_string()),
    }
}

async fn read_file_field(
    multipart: &mut Multipart,
) -> Result<Option<(String, Vec<u8>)>, axum::extract::multipart::MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("document.pdf")
            .to_string();
        let bytes = field.bytes().await?;
        return Ok(Some((file_name, bytes.to_vec())));
    }
    Ok(None)
}

fn failed(code: StatusCode, detail: &str) -> (StatusCode, Json<UploadStatus>) {
    warn!(%code, detail, "pdf processing failed");
    (code, Json(UploadStatus::failed(detail)))
}

async fn index_status(State(state): State<Arc<AppState>>) -> Json<IndexStatus> {
    Json(state.coordinator.status())
}

#[cfg(test)]
mod tests {
    use crate::test_support::{coordinator, json_body, multipart_request, router};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use pdf_chat_core::test_support::{blank_pdf, text_pdf};
    use pdf_chat_core::{NOT_READY_MESSAGE, UPLOAD_FAILED_STATUS, UPLOAD_OK_STATUS};
    use tower::ServiceExt;

    fn status_request() -> Request<Body> {
        Request::builder()
            .uri("/status")
            .body(Body::empty())
            .expect("request builds")
    }

    #[tokio::test]
    async fn text_pdf_upload_is_processed() {
        let app = router(coordinator());

        let response = app
            .clone()
            .oneshot(multipart_request(
                "file",
                &text_pdf(&["The capital of France is Paris."]),
            ))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], UPLOAD_OK_STATUS);
        assert!(body.get("detail").is_none());

        let status = json_body(app.oneshot(status_request()).await.expect("router responds")).await;
        assert_eq!(status["state"], "ready");
        assert_eq!(status["file_name"], "upload.pdf");
    }

    #[tokio::test]
    async fn image_only_upload_is_rejected_and_leaves_no_index() {
        let coordinator = coordinator();
        let app = router(coordinator.clone());

        let response = app
            .clone()
            .oneshot(multipart_request("file", &blank_pdf()))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["status"], UPLOAD_FAILED_STATUS);

        let status = json_body(app.oneshot(status_request()).await.expect("router responds")).await;
        assert_eq!(status["state"], "empty");
        assert_eq!(
            coordinator.respond("What is the capital?").await.response,
            NOT_READY_MESSAGE
        );
    }

    #[tokio::test]
    async fn malformed_pdf_upload_reports_failure() {
        let response = router(coordinator())
            .oneshot(multipart_request("file", b"this is not a pdf"))
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["status"], UPLOAD_FAILED_STATUS);
    }

    #[tokio::test]
    async fn upload_without_file_field_is_rejected() {
        let response = router(coordinator())
            .oneshot(multipart_request("attachment", b"%PDF-1.4"))
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["status"], UPLOAD_FAILED_STATUS);
    }

    #[tokio::test]
    async fn status_starts_empty() {
        let response = router(coordinator())
            .oneshot(status_request())
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["state"], "empty");
    }
}
