use crate::domain::store::{document::Document, repository::SnapshotStream};
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, warn};

/// Capability to stop a live subscription.
///
/// Delivery stops when the handle is cancelled or dropped; the underlying
/// snapshot stream is released and the store drops its listener. Store
/// requests already in flight are not interrupted.
#[must_use = "dropping the handle cancels the subscription"]
#[derive(Debug)]
pub struct ListenerHandle {
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Starts forwarding decoded snapshots from `stream` to `on_update`.
    pub(crate) fn spawn<T, F>(stream: SnapshotStream, listener: String, on_update: F) -> Self
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(Vec<T>) + Send + 'static,
    {
        let span = tracing::info_span!("listener", query = %listener);
        let task = tokio::spawn(pump(stream, on_update).instrument(span));
        Self { task }
    }

    pub fn cancel(self) {
        self.task.abort();
    }

    /// False once the subscription ended, either through a store error or
    /// because the store closed the stream.
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn pump<T, F>(mut stream: SnapshotStream, on_update: F)
where
    T: DeserializeOwned,
    F: Fn(Vec<T>),
{
    while let Some(snapshot) = stream.next().await {
        match snapshot {
            Ok(docs) => on_update(decode_all(docs)),
            Err(e) => {
                error!(error = %e, "Live query failed, no further updates will be delivered");
                return;
            }
        }
    }
    debug!("Live query closed by the store");
}

/// Decodes every document, skipping the ones that do not fit the record type.
fn decode_all<T: DeserializeOwned>(docs: Vec<Document>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| {
            let id = doc.id.clone();
            doc.decode()
                .map_err(|e| warn!(document_id = %id, error = %e, "Skipping undecodable document"))
                .ok()
        })
        .collect()
}
