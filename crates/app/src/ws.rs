//! WebSocket query session.
//!
//! Protocol:
//! → Client sends: {"query": "..."}
//! ← Server sends: {"response": "..."}
//!
//! One reply per request, in request order. Frames that are not JSON or carry
//! no query are ignored.

use super::server::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use pdf_chat_core::{ChatRequest, ChatResponse};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    info!(%connection_id, "websocket client connected");

    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(message) => message,
            Err(error) => {
                warn!(%connection_id, %error, "websocket receive failed");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                let Some(query) = parse_query(text.as_str()) else {
                    debug!(%connection_id, "ignoring frame without a query");
                    continue;
                };

                let reply = state.coordinator.respond(&query).await;
                if send_reply(&mut socket, &reply).await.is_err() {
                    warn!(%connection_id, "client went away before the reply was sent");
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    info!(%connection_id, "websocket client disconnected");
}

/// The non-blank `query` of a request frame, if there is one.
///
/// Only a JSON object counts as a request; serde would otherwise accept a
/// sequence in field order.
fn parse_query(text: &str) -> Option<String> {
    let value = serde_json::from_str::<serde_json::Value>(text).ok()?;
    if !value.is_object() {
        return None;
    }
    serde_json::from_value::<ChatRequest>(value)
        .ok()?
        .query
        .filter(|query| !query.trim().is_empty())
}

async fn send_reply(socket: &mut WebSocket, reply: &ChatResponse) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(reply).map_err(axum::Error::new)?;
    socket.send(Message::Text(payload.into())).await
}

#[cfg(test)]
mod tests {
    use super::parse_query;
    use crate::test_support::{coordinator, router, spawn_server};
    use futures::{SinkExt, StreamExt};
    use pdf_chat_core::test_support::{blank_pdf, text_pdf};
    use pdf_chat_core::{ChatResponse, NOT_READY_MESSAGE};
    use std::time::Duration;
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn connect(addr: std::net::SocketAddr) -> Client {
        let (client, _response) = connect_async(format!("ws://{addr}/ws"))
            .await
            .expect("websocket handshake");
        client
    }

    async fn send_text(client: &mut Client, text: &str) {
        client
            .send(Message::Text(text.into()))
            .await
            .expect("frame sent");
    }

    async fn next_reply(client: &mut Client) -> ChatResponse {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(10), client.next())
                .await
                .expect("reply arrives in time")
                .expect("connection open")
                .expect("frame readable");
            if let Message::Text(text) = message {
                return serde_json::from_str(text.as_str()).expect("reply is json");
            }
        }
    }

    /// Closes the session and asserts no further replies were queued.
    async fn assert_no_more_replies(mut client: Client) {
        client.close(None).await.expect("close sent");
        let drained = tokio::time::timeout(Duration::from_secs(10), async {
            while let Some(Ok(message)) = client.next().await {
                assert!(!message.is_text(), "unexpected reply: {message:?}");
            }
        })
        .await;
        assert!(drained.is_ok());
    }

    #[test]
    fn query_field_is_extracted() {
        assert_eq!(
            parse_query(r#"{"query": "What is the capital of France?"}"#).as_deref(),
            Some("What is the capital of France?")
        );
    }

    #[test]
    fn frames_without_a_usable_query_are_ignored() {
        assert_eq!(parse_query("not json"), None);
        assert_eq!(parse_query(r#"{"question": "hi"}"#), None);
        assert_eq!(parse_query(r#"{"query": "   "}"#), None);
        assert_eq!(parse_query(r#"{"query": null}"#), None);
        assert_eq!(parse_query(r#"{"query": 42}"#), None);
        assert_eq!(parse_query(r#"["query"]"#), None);
        assert_eq!(parse_query(r#"["What is X?"]"#), None);
        assert_eq!(parse_query(r#""What is X?""#), None);
    }

    #[tokio::test]
    async fn each_query_gets_one_reply_in_order() {
        let coordinator = coordinator();
        coordinator
            .ingest("france.pdf", text_pdf(&["The capital of France is Paris."]))
            .await
            .expect("index builds");
        let addr = spawn_server(router(coordinator)).await;
        let mut client = connect(addr).await;

        send_text(&mut client, "not json").await;
        send_text(&mut client, r#"["What is X?"]"#).await;
        send_text(&mut client, r#"{"query": "   "}"#).await;
        send_text(&mut client, r#"{"query": "What is the capital of France?"}"#).await;
        send_text(&mut client, r#"{"query": "Which city is named?"}"#).await;

        let first = next_reply(&mut client).await;
        assert!(first.response.contains("Paris"));
        assert!(first
            .response
            .ends_with("Question: What is the capital of France?\nHelpful Answer:"));

        let second = next_reply(&mut client).await;
        assert!(second
            .response
            .ends_with("Question: Which city is named?\nHelpful Answer:"));

        assert_no_more_replies(client).await;
    }

    #[tokio::test]
    async fn query_after_empty_upload_is_told_to_upload() {
        let coordinator = coordinator();
        assert!(coordinator.ingest("scan.pdf", blank_pdf()).await.is_err());
        let addr = spawn_server(router(coordinator)).await;
        let mut client = connect(addr).await;

        send_text(&mut client, r#"{"query": "What does it say?"}"#).await;
        assert_eq!(next_reply(&mut client).await.response, NOT_READY_MESSAGE);

        assert_no_more_replies(client).await;
    }
}
