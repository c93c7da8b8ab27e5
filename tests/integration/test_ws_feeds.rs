use super::helpers::serve;
use async_trait::async_trait;
use chatfeed::{
    application::chat::use_case::ChatUseCase,
    domain::{
        chat::{errors::DomainError, message::NewMessage},
        store::{
            document::{Document, FieldWrites},
            query::Query,
            repository::{DocumentStore, SnapshotStream},
        },
    },
    infrastructure::store::memory_store::InMemoryDocumentStore,
};
use futures_util::StreamExt;
use serde_json::{Value, json};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message as WsMessage,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(addr: SocketAddr, path: &str) -> Socket {
    let (socket, _) = connect_async(format!("ws://{}{}", addr, path))
        .await
        .expect("websocket handshake failed");
    socket
}

/// Next JSON text frame, skipping control frames.
async fn next_json(socket: &mut Socket) -> Value {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match socket.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    return serde_json::from_str::<Value>(&text).expect("frame is not JSON");
                }
                Some(Ok(WsMessage::Close(_))) | None => panic!("feed closed"),
                Some(Ok(_)) => {}
                Some(Err(e)) => panic!("websocket error: {}", e),
            }
        }
    })
    .await
    .expect("no frame delivered")
}

async fn wait_for_no_listeners(store: &InMemoryDocumentStore) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while store.listener_count().await > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("feed subscription was not released");
}

fn ids(frame: &Value) -> Vec<String> {
    frame
        .as_array()
        .expect("frame should hold a list")
        .iter()
        .map(|item| item["id"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn messages_feed_pushes_snapshots_and_releases_on_close() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let chat = ChatUseCase::new(store.clone());
    let first = chat
        .post_message(NewMessage::new("@ana", "Ana", "first"))
        .await
        .unwrap();
    let addr = serve(store.clone()).await;

    let mut socket = connect(addr, "/api/v1/ws/messages").await;
    assert_eq!(ids(&next_json(&mut socket).await), vec![first.clone()]);
    assert_eq!(store.listener_count().await, 1);

    let second = chat
        .post_message(NewMessage::new("@bo", "Bo", "second"))
        .await
        .unwrap();
    assert_eq!(ids(&next_json(&mut socket).await), vec![first, second]);

    socket.close(None).await.expect("close failed");
    wait_for_no_listeners(&store).await;
}

#[tokio::test]
async fn comments_feed_carries_only_its_message() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let chat = ChatUseCase::new(store.clone());
    let addr = serve(store.clone()).await;

    let mut socket = connect(addr, "/api/v1/ws/messages/m1/comments").await;
    assert_eq!(next_json(&mut socket).await, json!([]));

    chat.post_comment("elsewhere", "@bo", "Bo", "m2").await.unwrap();
    chat.post_comment("here", "@ana", "Ana", "m1").await.unwrap();

    let frame = next_json(&mut socket).await;
    let comments = frame.as_array().expect("frame should hold a list");
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0]["post"], json!("m1"));
    assert_eq!(comments[0]["comentario"], json!("here"));

    drop(socket);
    wait_for_no_listeners(&store).await;
}

#[tokio::test]
async fn user_feed_filters_by_handle() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let chat = ChatUseCase::new(store.clone());
    let mine = chat
        .post_message(NewMessage::new("@ana", "Ana", "one"))
        .await
        .unwrap();
    chat.post_message(NewMessage::new("@bo", "Bo", "two"))
        .await
        .unwrap();
    let addr = serve(store.clone()).await;

    let mut socket = connect(addr, "/api/v1/ws/users/@ana/messages").await;
    assert_eq!(ids(&next_json(&mut socket).await), vec![mine]);

    socket.close(None).await.expect("close failed");
    wait_for_no_listeners(&store).await;
}

/// Store whose live queries can never be opened.
struct NoLiveQueries;

#[async_trait]
impl DocumentStore for NoLiveQueries {
    async fn create(&self, _: &str, _: FieldWrites) -> Result<String, DomainError> {
        Err(DomainError::StoreWrite("read only".into()))
    }

    async fn get_by_id(&self, _: &str, _: &str) -> Result<Option<Document>, DomainError> {
        Ok(None)
    }

    async fn update(&self, _: &str, _: &str, _: FieldWrites) -> Result<(), DomainError> {
        Err(DomainError::StoreWrite("read only".into()))
    }

    async fn query(&self, _: &str, _: &Query) -> Result<Vec<Document>, DomainError> {
        Ok(Vec::new())
    }

    async fn subscribe(&self, _: &str, _: Query) -> Result<SnapshotStream, DomainError> {
        Err(DomainError::Subscription("listener limit reached".into()))
    }
}

#[tokio::test]
async fn failed_subscription_sends_error_frame_then_closes() {
    let addr = serve(Arc::new(NoLiveQueries)).await;
    let mut socket = connect(addr, "/api/v1/ws/messages").await;

    assert_eq!(
        next_json(&mut socket).await,
        json!({ "error": "Live updates unavailable" })
    );

    let closing = tokio::time::timeout(Duration::from_secs(2), socket.next())
        .await
        .expect("socket stayed open");
    assert!(matches!(
        closing,
        Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None
    ));
}
