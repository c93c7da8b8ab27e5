use crate::domain::store::document::FieldWrites;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

pub const CHAT_COLLECTION: &str = "chat";

/// Stored field names of a chat message.
pub mod fields {
    pub const USERTAG: &str = "usertag";
    pub const USERNAME: &str = "username";
    pub const CONTENT: &str = "content";
    pub const CREATED_AT: &str = "created_at";
    pub const LIKES: &str = "likes";
    pub const LIKES_BY: &str = "likesBy";
    pub const COMMENTS: &str = "comentarios";
    pub const LEGACY_COMMENTS: &str = "comentarios_text";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub usertag: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub likes: i64,
    #[serde(rename = "likesBy", default)]
    pub likes_by: Vec<String>,
    #[serde(rename = "comentarios", default)]
    pub comments: i64,
    /// Inline comments from the first schema version. Current writers leave
    /// it empty; comments live in their own collection.
    #[serde(rename = "comentarios_text", default)]
    #[ts(type = "Array<unknown>")]
    pub legacy_comments: Vec<Value>,
    /// Any other payload field supplied when the message was posted.
    #[serde(flatten)]
    #[ts(skip)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeTransition {
    Like,
    Unlike,
}

impl LikeTransition {
    /// Which way a toggle by `user_id` flips a message whose stored liker
    /// set is `likers`. A missing or malformed set counts as empty.
    pub fn for_likers(likers: Option<&Value>, user_id: &str) -> Self {
        let liked = match likers {
            Some(Value::Array(members)) => members.iter().any(|m| m.as_str() == Some(user_id)),
            _ => false,
        };
        if liked {
            LikeTransition::Unlike
        } else {
            LikeTransition::Like
        }
    }

    /// Liker-set and counter writes, applied together in one atomic update.
    /// The counter only moves when the set membership actually changed.
    pub fn writes(self, user_id: &str) -> FieldWrites {
        let member = vec![Value::String(user_id.to_string())];
        match self {
            LikeTransition::Like => FieldWrites::new()
                .array_union(fields::LIKES_BY, member)
                .increment_on_change(fields::LIKES, 1, fields::LIKES_BY),
            LikeTransition::Unlike => FieldWrites::new()
                .array_remove(fields::LIKES_BY, member)
                .increment_on_change(fields::LIKES, -1, fields::LIKES_BY),
        }
    }
}

/// Payload of a new chat message. Unknown fields are stored as given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewMessage {
    #[serde(default)]
    pub usertag: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub content: String,
    #[serde(flatten)]
    #[ts(skip)]
    pub extra: Map<String, Value>,
}

impl NewMessage {
    pub fn new(
        usertag: impl Into<String>,
        username: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            usertag: usertag.into(),
            username: username.into(),
            content: content.into(),
            extra: Map::new(),
        }
    }

    /// Caller payload first, then the bookkeeping fields, which always win.
    pub fn into_writes(self) -> FieldWrites {
        FieldWrites::new()
            .set_all(self.extra)
            .set(fields::USERTAG, self.usertag)
            .set(fields::USERNAME, self.username)
            .set(fields::CONTENT, self.content)
            .server_timestamp(fields::CREATED_AT)
            .set(fields::LIKES, 0)
            .set(fields::LIKES_BY, Value::Array(Vec::new()))
            .set(fields::COMMENTS, 0)
            .set(fields::LEGACY_COMMENTS, Value::Array(Vec::new()))
    }
}
