use super::{
    document::{Document, FieldWrites},
    query::Query,
};
use crate::domain::chat::errors::DomainError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// One push from a live query: the full current result set, or the error
/// that ended the subscription.
pub type Snapshot = Result<Vec<Document>, DomainError>;

pub type SnapshotSender = mpsc::UnboundedSender<Snapshot>;

/// Receiving side of a live query. Dropping it cancels the subscription; the
/// store notices the closed channel and releases its listener.
pub struct SnapshotStream {
    receiver: mpsc::UnboundedReceiver<Snapshot>,
}

impl SnapshotStream {
    pub fn channel() -> (SnapshotSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { receiver: rx })
    }

    /// Waits for the next snapshot. `None` once the store side has gone away.
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.receiver.recv().await
    }
}

/// Contract of the managed document database backing the chat.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates a document with a store-assigned id and returns the id.
    async fn create(&self, collection: &str, writes: FieldWrites) -> Result<String, DomainError>;

    async fn get_by_id(&self, collection: &str, id: &str)
    -> Result<Option<Document>, DomainError>;

    /// Applies all `writes` to an existing document as one atomic change.
    /// Fails with `NotFound` when the document does not exist.
    async fn update(&self, collection: &str, id: &str, writes: FieldWrites)
    -> Result<(), DomainError>;

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, DomainError>;

    /// Opens a live query. The current result set is pushed immediately and
    /// again after every change to `collection`.
    async fn subscribe(&self, collection: &str, query: Query)
    -> Result<SnapshotStream, DomainError>;
}
