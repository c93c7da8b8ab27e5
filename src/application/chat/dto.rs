use crate::domain::chat::{like::LikeOutcome, message::NewMessage};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, TS)]
#[ts(export)]
pub struct PostMessageRequest {
    #[validate(length(min = 1, max = 64))]
    pub usertag: String,
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
    #[serde(flatten)]
    #[ts(skip)]
    pub extra: Map<String, Value>,
}

impl From<PostMessageRequest> for NewMessage {
    fn from(req: PostMessageRequest) -> Self {
        NewMessage {
            usertag: req.usertag,
            username: req.username,
            content: req.content,
            extra: req.extra,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, TS)]
#[ts(export)]
pub struct ToggleLikeRequest {
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate, TS)]
#[ts(export)]
pub struct AddCommentRequest {
    #[validate(length(min = 1, max = 500))]
    pub body: String,
    #[validate(length(min = 1, max = 64))]
    pub usertag: String,
    #[validate(length(min = 1, max = 64))]
    pub username: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagesQuery {
    pub usertag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreatedResponse {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ToggleLikeResponse {
    pub outcome: LikeOutcome,
}
