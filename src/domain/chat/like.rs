use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// What a like toggle did. Toggling never fails from the caller's point of
/// view; problems are logged and reported here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum LikeOutcome {
    Liked,
    Unliked,
    MessageNotFound,
    /// The store rejected the update; nothing changed.
    NotApplied,
}

impl LikeOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, LikeOutcome::Liked | LikeOutcome::Unliked)
    }
}
