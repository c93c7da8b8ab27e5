use super::listener::ListenerHandle;
use crate::domain::chat::{
    comment::{COMMENT_COLLECTION, Comment, NewComment, fields as comment_fields},
    errors::DomainError,
    like::LikeOutcome,
    message::{CHAT_COLLECTION, LikeTransition, Message, NewMessage, fields as message_fields},
};
use crate::domain::store::{
    document::{Document, FieldWrites},
    query::{Direction, Query},
    repository::DocumentStore,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Chat operations over the `chat` and `comentario` collections.
///
/// Primary writes propagate their errors. Bookkeeping writes (like and
/// comment counters) are logged and swallowed.
pub struct ChatUseCase {
    store: Arc<dyn DocumentStore>,
}

impl ChatUseCase {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn post_message(&self, message: NewMessage) -> Result<String, DomainError> {
        let usertag = message.usertag.clone();
        let id = self
            .store
            .create(CHAT_COLLECTION, message.into_writes())
            .await
            .inspect_err(|e| error!(usertag = %usertag, error = %e, "Failed to post message"))?;
        info!(message_id = %id, usertag = %usertag, "Message posted");
        Ok(id)
    }

    /// Flips `user_id`'s like on a message.
    ///
    /// Reads only the stored liker set. The set and the counter change in one
    /// atomic update, and the counter moves only when the set did.
    pub async fn toggle_like(&self, message_id: &str, user_id: &str) -> LikeOutcome {
        let message = match self.store.get_by_id(CHAT_COLLECTION, message_id).await {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                warn!(message_id, "Cannot toggle like, message does not exist");
                return LikeOutcome::MessageNotFound;
            }
            Err(e) => {
                error!(message_id, error = %e, "Failed to read message for like toggle");
                return LikeOutcome::NotApplied;
            }
        };

        let transition = LikeTransition::for_likers(message.get(message_fields::LIKES_BY), user_id);
        if transition == LikeTransition::Unlike {
            debug!(message_id, user_id, "User already liked this message, removing like");
        }

        match self
            .store
            .update(CHAT_COLLECTION, message_id, transition.writes(user_id))
            .await
        {
            Ok(()) => match transition {
                LikeTransition::Like => LikeOutcome::Liked,
                LikeTransition::Unlike => LikeOutcome::Unliked,
            },
            Err(DomainError::NotFound(_)) => {
                warn!(message_id, "Message disappeared before the like was applied");
                LikeOutcome::MessageNotFound
            }
            Err(e) => {
                warn!(message_id, user_id, error = %e, "Like toggle not applied");
                LikeOutcome::NotApplied
            }
        }
    }

    /// Stores a comment on `message_id`, then bumps the parent's comment
    /// counter if the parent exists. A failed bump leaves the comment in
    /// place and the counter one short.
    pub async fn post_comment(
        &self,
        body: impl Into<String>,
        usertag: impl Into<String>,
        username: impl Into<String>,
        message_id: &str,
    ) -> Result<String, DomainError> {
        let comment = NewComment {
            message_id: message_id.to_string(),
            body: body.into(),
            usertag: usertag.into(),
            username: username.into(),
        };
        let comment_id = self
            .store
            .create(COMMENT_COLLECTION, comment.into_writes())
            .await
            .inspect_err(|e| error!(message_id, error = %e, "Failed to post comment"))?;
        info!(message_id, comment_id = %comment_id, "Comment posted");

        match self.store.get_by_id(CHAT_COLLECTION, message_id).await {
            Ok(Some(_)) => {
                let bump = FieldWrites::new().increment(message_fields::COMMENTS, 1);
                if let Err(e) = self.store.update(CHAT_COLLECTION, message_id, bump).await {
                    warn!(message_id, error = %e, "Comment counter not incremented");
                }
            }
            Ok(None) => debug!(message_id, "Comment parent does not exist, counter untouched"),
            Err(e) => warn!(message_id, error = %e, "Could not read comment parent"),
        }

        Ok(comment_id)
    }

    pub async fn get_message(&self, message_id: &str) -> Result<Option<Message>, DomainError> {
        self.store
            .get_by_id(CHAT_COLLECTION, message_id)
            .await?
            .map(|doc| doc.decode())
            .transpose()
    }

    pub async fn list_messages(&self) -> Result<Vec<Message>, DomainError> {
        let docs = self.store.query(CHAT_COLLECTION, &all_messages()).await?;
        decode_each(docs)
    }

    pub async fn list_user_messages(&self, usertag: &str) -> Result<Vec<Message>, DomainError> {
        let docs = self
            .store
            .query(CHAT_COLLECTION, &user_messages(usertag))
            .await?;
        decode_each(docs)
    }

    pub async fn list_comments(&self, message_id: &str) -> Result<Vec<Comment>, DomainError> {
        let docs = self
            .store
            .query(COMMENT_COLLECTION, &message_comments(message_id))
            .await?;
        decode_each(docs)
    }

    /// Pushes the full comment list of `message_id` on every change.
    pub async fn subscribe_comments<F>(
        &self,
        message_id: &str,
        on_update: F,
    ) -> Result<ListenerHandle, DomainError>
    where
        F: Fn(Vec<Comment>) + Send + 'static,
    {
        let stream = self
            .store
            .subscribe(COMMENT_COLLECTION, message_comments(message_id))
            .await?;
        Ok(ListenerHandle::spawn(
            stream,
            format!("comments of {}", message_id),
            on_update,
        ))
    }

    /// Pushes every message, oldest first, on every change.
    pub async fn subscribe_all_messages<F>(&self, on_update: F) -> Result<ListenerHandle, DomainError>
    where
        F: Fn(Vec<Message>) + Send + 'static,
    {
        let stream = self.store.subscribe(CHAT_COLLECTION, all_messages()).await?;
        Ok(ListenerHandle::spawn(
            stream,
            "all messages".to_string(),
            on_update,
        ))
    }

    pub async fn subscribe_user_messages<F>(
        &self,
        usertag: &str,
        on_update: F,
    ) -> Result<ListenerHandle, DomainError>
    where
        F: Fn(Vec<Message>) + Send + 'static,
    {
        let stream = self
            .store
            .subscribe(CHAT_COLLECTION, user_messages(usertag))
            .await?;
        Ok(ListenerHandle::spawn(
            stream,
            format!("messages of {}", usertag),
            on_update,
        ))
    }
}

/// One-shot reads fail on the first document that does not decode; live
/// feeds skip such documents instead.
fn decode_each<T: DeserializeOwned>(docs: Vec<Document>) -> Result<Vec<T>, DomainError> {
    docs.into_iter().map(Document::decode).collect()
}

fn all_messages() -> Query {
    Query::all().order_by(message_fields::CREATED_AT, Direction::Ascending)
}

fn user_messages(usertag: &str) -> Query {
    Query::all().where_eq(message_fields::USERTAG, usertag)
}

fn message_comments(message_id: &str) -> Query {
    Query::all().where_eq(comment_fields::POST, message_id)
}
