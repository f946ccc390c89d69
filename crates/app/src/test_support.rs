use crate::server::{build_router, AppState};
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request};
use axum::Router;
use pdf_chat_core::{AnswerSynthesizer, CharacterNgramEmbedder, SearchError, SessionCoordinator};
use std::net::SocketAddr;
use std::sync::Arc;

/// Answers with the prompt it was given.
pub struct EchoSynthesizer;

#[async_trait]
impl AnswerSynthesizer for EchoSynthesizer {
    async fn synthesize(&self, prompt: &str) -> Result<String, SearchError> {
        Ok(prompt.to_string())
    }
}

pub fn coordinator() -> Arc<SessionCoordinator> {
    Arc::new(SessionCoordinator::new(
        Arc::new(CharacterNgramEmbedder::default()),
        Arc::new(EchoSynthesizer),
    ))
}

pub fn router(coordinator: Arc<SessionCoordinator>) -> Router {
    build_router(Arc::new(AppState { coordinator }))
}

/// Serves `app` on an ephemeral local port for the rest of the test.
pub async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server runs");
    });
    addr
}

pub fn multipart_request(field: &str, payload: &[u8]) -> Request<Body> {
    let boundary = "pdfchatboundary";
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"upload.pdf\"\r\nContent-Type: application/pdf\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload-pdf/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("request builds")
}

pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}
