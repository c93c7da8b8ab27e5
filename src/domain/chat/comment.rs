use crate::domain::store::document::FieldWrites;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub const COMMENT_COLLECTION: &str = "comentario";

/// Stored field names of a comment.
pub mod fields {
    pub const POST: &str = "post";
    pub const BODY: &str = "comentario";
    pub const USERTAG: &str = "usertag";
    pub const USERNAME: &str = "username";
    pub const CREATED_AT: &str = "created_at";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Comment {
    pub id: String,
    /// Id of the parent message. Not enforced by the store.
    #[serde(rename = "post")]
    pub message_id: String,
    #[serde(rename = "comentario")]
    pub body: String,
    pub usertag: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub message_id: String,
    pub body: String,
    pub usertag: String,
    pub username: String,
}

impl NewComment {
    pub fn into_writes(self) -> FieldWrites {
        FieldWrites::new()
            .set(fields::POST, self.message_id)
            .set(fields::BODY, self.body)
            .set(fields::USERTAG, self.usertag)
            .set(fields::USERNAME, self.username)
            .server_timestamp(fields::CREATED_AT)
    }
}
