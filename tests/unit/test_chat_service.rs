use chatfeed::{
    application::chat::use_case::ChatUseCase,
    domain::{
        chat::{
            comment::{COMMENT_COLLECTION, Comment},
            errors::DomainError,
            like::LikeOutcome,
            message::{CHAT_COLLECTION, LikeTransition, Message, NewMessage},
        },
        store::{document::FieldWrites, query::Query, repository::DocumentStore},
    },
    infrastructure::store::memory_store::InMemoryDocumentStore,
};
use futures_util::future::join_all;
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;

fn setup() -> (Arc<InMemoryDocumentStore>, ChatUseCase) {
    let store = Arc::new(InMemoryDocumentStore::new());
    let chat = ChatUseCase::new(store.clone());
    (store, chat)
}

async fn post(chat: &ChatUseCase, usertag: &str, content: &str) -> String {
    chat.post_message(NewMessage::new(usertag, "Name", content))
        .await
        .expect("post message")
}

async fn message(chat: &ChatUseCase, id: &str) -> Message {
    chat.get_message(id)
        .await
        .expect("read message")
        .expect("message exists")
}

/// Waits for the first delivered list that satisfies `done`.
async fn recv_until<T>(rx: &mut mpsc::UnboundedReceiver<Vec<T>>, done: impl Fn(&[T]) -> bool) -> Vec<T> {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let items = rx.recv().await.expect("listener closed");
            if done(&items) {
                return items;
            }
        }
    })
    .await
    .expect("no matching snapshot delivered")
}

#[tokio::test]
async fn posted_message_starts_with_empty_counters() {
    let (_, chat) = setup();
    let id = post(&chat, "@a", "hola").await;

    let stored = message(&chat, &id).await;
    assert_eq!(stored.likes, 0);
    assert!(stored.likes_by.is_empty());
    assert_eq!(stored.comments, 0);
    assert!(stored.legacy_comments.is_empty());
    assert_eq!(stored.usertag, "@a");
}

#[tokio::test]
async fn like_toggle_scenario_with_two_users() {
    let (_, chat) = setup();
    let id = post(&chat, "@a", "hola").await;

    assert_eq!(chat.toggle_like(&id, "u1").await, LikeOutcome::Liked);
    let m = message(&chat, &id).await;
    assert_eq!((m.likes, m.likes_by.clone()), (1, vec!["u1".to_string()]));

    assert_eq!(chat.toggle_like(&id, "u2").await, LikeOutcome::Liked);
    let m = message(&chat, &id).await;
    assert_eq!(
        (m.likes, m.likes_by.clone()),
        (2, vec!["u1".to_string(), "u2".to_string()])
    );

    assert_eq!(chat.toggle_like(&id, "u1").await, LikeOutcome::Unliked);
    let m = message(&chat, &id).await;
    assert_eq!((m.likes, m.likes_by.clone()), (1, vec!["u2".to_string()]));
}

#[tokio::test]
async fn toggling_twice_restores_the_original_state() {
    let (_, chat) = setup();
    let id = post(&chat, "@a", "hola").await;
    chat.toggle_like(&id, "u9").await;
    let before = message(&chat, &id).await;

    chat.toggle_like(&id, "u1").await;
    chat.toggle_like(&id, "u1").await;

    let after = message(&chat, &id).await;
    assert_eq!(after.likes, before.likes);
    assert_eq!(after.likes_by, before.likes_by);
}

#[tokio::test]
async fn toggle_on_missing_message_changes_nothing() {
    let (store, chat) = setup();

    let outcome = chat.toggle_like("does-not-exist", "u1").await;

    assert_eq!(outcome, LikeOutcome::MessageNotFound);
    let docs = store.query(CHAT_COLLECTION, &Query::all()).await.unwrap();
    assert!(docs.is_empty());
}

#[tokio::test]
async fn concurrent_toggles_by_different_users_all_land() {
    let (_, chat) = setup();
    let chat = Arc::new(chat);
    let id = post(&chat, "@a", "popular").await;

    let toggles = (0..20).map(|n| {
        let chat = chat.clone();
        let id = id.clone();
        tokio::spawn(async move { chat.toggle_like(&id, &format!("u{}", n)).await })
    });
    for outcome in join_all(toggles).await {
        assert_eq!(outcome.unwrap(), LikeOutcome::Liked);
    }

    let m = message(&chat, &id).await;
    assert_eq!(m.likes, 20);
    assert_eq!(m.likes_by.len(), 20);
}

#[tokio::test]
async fn racing_likes_by_the_same_user_count_once() {
    let (store, chat) = setup();
    let id = post(&chat, "@a", "hola").await;

    // Both toggles read "not liked" before either write lands.
    let first = LikeTransition::for_likers(Some(&json!([])), "u1");
    let second = LikeTransition::for_likers(Some(&json!([])), "u1");
    store
        .update(CHAT_COLLECTION, &id, first.writes("u1"))
        .await
        .unwrap();
    store
        .update(CHAT_COLLECTION, &id, second.writes("u1"))
        .await
        .unwrap();

    let m = message(&chat, &id).await;
    assert_eq!(m.likes, 1);
    assert_eq!(m.likes_by, vec!["u1".to_string()]);
}

#[tokio::test]
async fn toggle_only_needs_the_liker_set() {
    let (store, chat) = setup();
    let id = store
        .create(
            CHAT_COLLECTION,
            FieldWrites::new()
                .set("usertag", "@a")
                .set("likes", 1.5)
                .set("likesBy", json!([])),
        )
        .await
        .unwrap();

    assert_eq!(chat.toggle_like(&id, "u1").await, LikeOutcome::Liked);

    let doc = store.get_by_id(CHAT_COLLECTION, &id).await.unwrap().unwrap();
    assert_eq!(doc.get("likesBy"), Some(&json!(["u1"])));
    assert_eq!(doc.get("likes"), Some(&json!(2.5)));
}

#[tokio::test]
async fn listing_fails_on_an_undecodable_message() {
    let (store, chat) = setup();
    post(&chat, "@a", "fine").await;
    store
        .create(
            CHAT_COLLECTION,
            FieldWrites::new()
                .set("usertag", "@a")
                .set("likes", 1.5)
                .server_timestamp("created_at"),
        )
        .await
        .unwrap();

    assert!(matches!(
        chat.list_messages().await,
        Err(DomainError::Serialization(_))
    ));
    assert!(matches!(
        chat.list_user_messages("@a").await,
        Err(DomainError::Serialization(_))
    ));
}

#[tokio::test]
async fn listing_comments_fails_on_an_undecodable_comment() {
    let (store, chat) = setup();
    chat.post_comment("hi", "@a", "A", "m1").await.unwrap();
    store
        .create(COMMENT_COLLECTION, FieldWrites::new().set("post", "m1"))
        .await
        .unwrap();

    assert!(matches!(
        chat.list_comments("m1").await,
        Err(DomainError::Serialization(_))
    ));
}

#[tokio::test]
async fn comment_is_stored_and_counted_on_its_parent() {
    let (store, chat) = setup();
    let id = post(&chat, "@a", "hola").await;

    let comment_id = chat.post_comment("hi", "@a", "A", &id).await.unwrap();

    let comments = chat.list_comments(&id).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].id, comment_id);
    assert_eq!(comments[0].message_id, id);
    assert_eq!(comments[0].body, "hi");
    assert_eq!(message(&chat, &id).await.comments, 1);

    let all = store
        .query(COMMENT_COLLECTION, &Query::all())
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn comment_on_missing_parent_is_still_stored() {
    let (store, chat) = setup();

    chat.post_comment("hi", "@a", "A", "ghost").await.unwrap();

    assert_eq!(chat.list_comments("ghost").await.unwrap().len(), 1);
    let messages = store.query(CHAT_COLLECTION, &Query::all()).await.unwrap();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn all_messages_feed_appends_newer_messages_last() {
    let (_, chat) = setup();
    let first = post(&chat, "@a", "first").await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _handle = chat
        .subscribe_all_messages(move |messages: Vec<Message>| {
            let _ = tx.send(messages);
        })
        .await
        .unwrap();

    let initial = recv_until(&mut rx, |m| m.len() == 1).await;
    assert_eq!(initial[0].id, first);

    let second = post(&chat, "@b", "second").await;
    let next = recv_until(&mut rx, |m| m.len() == 2).await;
    assert_eq!(next[0].id, first);
    assert_eq!(next[1].id, second);
    assert!(next[0].created_at <= next[1].created_at);
}

#[tokio::test]
async fn all_messages_feed_reflects_like_changes() {
    let (_, chat) = setup();
    let id = post(&chat, "@a", "hola").await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _handle = chat
        .subscribe_all_messages(move |messages: Vec<Message>| {
            let _ = tx.send(messages);
        })
        .await
        .unwrap();
    recv_until(&mut rx, |m| m.len() == 1).await;

    chat.toggle_like(&id, "u1").await;
    let liked = recv_until(&mut rx, |m| m[0].likes == 1).await;
    assert_eq!(liked[0].likes_by, vec!["u1".to_string()]);
}

#[tokio::test]
async fn comments_feed_only_carries_its_own_message() {
    let (_, chat) = setup();
    let mine = post(&chat, "@a", "mine").await;
    let other = post(&chat, "@b", "other").await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _handle = chat
        .subscribe_comments(&mine, move |comments: Vec<Comment>| {
            let _ = tx.send(comments);
        })
        .await
        .unwrap();
    recv_until(&mut rx, |c| c.is_empty()).await;

    chat.post_comment("elsewhere", "@b", "B", &other).await.unwrap();
    chat.post_comment("here", "@a", "A", &mine).await.unwrap();

    let delivered = recv_until(&mut rx, |c| !c.is_empty()).await;
    assert_eq!(delivered.len(), 1);
    assert!(delivered.iter().all(|c| c.message_id == mine));
    assert_eq!(delivered[0].body, "here");
}

#[tokio::test]
async fn user_feed_filters_by_handle() {
    let (_, chat) = setup();
    post(&chat, "@a", "one").await;
    post(&chat, "@b", "two").await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _handle = chat
        .subscribe_user_messages("@a", move |messages: Vec<Message>| {
            let _ = tx.send(messages);
        })
        .await
        .unwrap();
    let initial = recv_until(&mut rx, |m| !m.is_empty()).await;
    assert!(initial.iter().all(|m| m.usertag == "@a"));

    post(&chat, "@a", "three").await;
    let next = recv_until(&mut rx, |m| m.len() == 2).await;
    assert!(next.iter().all(|m| m.usertag == "@a"));
}

#[tokio::test]
async fn cancelling_a_handle_releases_the_store_listener() {
    let (store, chat) = setup();
    let handle = chat
        .subscribe_all_messages(|_: Vec<Message>| {})
        .await
        .unwrap();
    assert_eq!(store.listener_count().await, 1);

    handle.cancel();

    tokio::time::timeout(Duration::from_secs(2), async {
        while store.listener_count().await > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("listener should be released after cancel");
}
