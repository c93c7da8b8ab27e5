//! Live feeds over WebSocket. Each snapshot is sent as one JSON text frame
//! holding the full current list; closing the socket releases the
//! subscription.

use crate::application::chat::listener::ListenerHandle;
use crate::domain::chat::{comment::Comment, errors::DomainError, message::Message};
use crate::presentation::http::state::AppState;
use axum::{
    extract::{
        Path, State,
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;

pub async fn messages_feed(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| async move {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = state.chat.subscribe_all_messages(forward::<Message>(tx)).await;
        serve_feed(socket, rx, subscription).await;
    })
}

pub async fn user_messages_feed(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(usertag): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = state
            .chat
            .subscribe_user_messages(&usertag, forward::<Message>(tx))
            .await;
        serve_feed(socket, rx, subscription).await;
    })
}

pub async fn comments_feed(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = state
            .chat
            .subscribe_comments(&message_id, forward::<Comment>(tx))
            .await;
        serve_feed(socket, rx, subscription).await;
    })
}

/// Serialises each delivered list into a frame for the socket task.
fn forward<T>(frames: mpsc::UnboundedSender<String>) -> impl Fn(Vec<T>) + Send + 'static
where
    T: Serialize + 'static,
{
    move |items| match serde_json::to_string(&items) {
        Ok(json) => {
            let _ = frames.send(json);
        }
        Err(e) => tracing::warn!(error = %e, "Failed to encode feed snapshot"),
    }
}

async fn serve_feed(
    socket: WebSocket,
    mut frames: mpsc::UnboundedReceiver<String>,
    subscription: Result<ListenerHandle, DomainError>,
) {
    let (mut sender, mut receiver) = socket.split();

    let handle = match subscription {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(error = %e, "Could not open live feed");
            let body = serde_json::json!({ "error": "Live updates unavailable" }).to_string();
            let _ = sender.send(WsMessage::Text(body.into())).await;
            let _ = sender.send(WsMessage::Close(None)).await;
            return;
        }
    };

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Some(json) => {
                    if sender.send(WsMessage::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                // The listener ended; nothing more will arrive.
                None => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    handle.cancel();
    tracing::debug!("Feed socket closed, subscription released");
}
