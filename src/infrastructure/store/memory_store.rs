use crate::domain::{
    chat::errors::DomainError,
    store::{
        document::{Document, FieldWrites, Fields},
        query::Query,
        repository::{DocumentStore, SnapshotSender, SnapshotStream},
    },
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Process-local document store with live queries.
///
/// Every mutation runs under one lock, so each create or update is atomic
/// and listeners observe changes in commit order.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, BTreeMap<String, Fields>>,
    listeners: Vec<Listener>,
}

struct Listener {
    collection: String,
    query: Query,
    sender: SnapshotSender,
    last: Vec<Document>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live queries still attached.
    pub async fn listener_count(&self) -> usize {
        let mut inner = self.inner.lock().await;
        inner.prune_released();
        inner.listeners.len()
    }
}

impl Inner {
    fn prune_released(&mut self) {
        self.listeners.retain(|listener| {
            let open = !listener.sender.is_closed();
            if !open {
                debug!(collection = %listener.collection, "Dropping released listener");
            }
            open
        });
    }

    fn evaluate(&self, collection: &str, query: &Query) -> Vec<Document> {
        let docs = self
            .collections
            .get(collection)
            .into_iter()
            .flatten()
            .map(|(id, fields)| Document::new(id.clone(), fields.clone()));
        query.evaluate(docs)
    }

    /// Pushes fresh result sets to the listeners of `collection` whose
    /// results changed, and drops listeners whose stream was released.
    fn notify(&mut self, collection: &str) {
        self.prune_released();
        let mut listeners = std::mem::take(&mut self.listeners);
        listeners.retain_mut(|listener| {
            if listener.collection != collection {
                return true;
            }
            let snapshot = self.evaluate(collection, &listener.query);
            if snapshot == listener.last {
                return true;
            }
            listener.last = snapshot.clone();
            listener.sender.send(Ok(snapshot)).is_ok()
        });
        self.listeners = listeners;
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn create(&self, collection: &str, writes: FieldWrites) -> Result<String, DomainError> {
        let id = Uuid::now_v7().to_string();
        let mut fields = Fields::new();
        writes.apply(&mut fields, Utc::now());

        let mut inner = self.inner.lock().await;
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields);
        inner.notify(collection);
        Ok(id)
    }

    async fn get_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, DomainError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        writes: FieldWrites,
    ) -> Result<(), DomainError> {
        let mut inner = self.inner.lock().await;
        let fields = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| DomainError::NotFound(format!("{}/{}", collection, id)))?;
        writes.apply(fields, Utc::now());
        inner.notify(collection);
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, DomainError> {
        let inner = self.inner.lock().await;
        Ok(inner.evaluate(collection, query))
    }

    async fn subscribe(
        &self,
        collection: &str,
        query: Query,
    ) -> Result<SnapshotStream, DomainError> {
        let (sender, stream) = SnapshotStream::channel();
        let mut inner = self.inner.lock().await;
        inner.prune_released();
        let initial = inner.evaluate(collection, &query);
        sender
            .send(Ok(initial.clone()))
            .map_err(|e| DomainError::Subscription(e.to_string()))?;
        inner.listeners.push(Listener {
            collection: collection.to_string(),
            query,
            sender,
            last: initial,
        });
        Ok(stream)
    }
}
