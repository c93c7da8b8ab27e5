use crate::domain::{
    chat::errors::DomainError,
    store::{
        document::{Document, FieldWrites, Fields},
        query::{Direction, Query},
        repository::{DocumentStore, SnapshotSender, SnapshotStream},
    },
};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{
    PgPool,
    postgres::{PgListener, PgNotification},
    types::Json,
};
use tracing::{Instrument, debug, error, warn};
use uuid::Uuid;

/// Channel the `documents` trigger notifies on, with the collection name as
/// payload.
pub const NOTIFY_CHANNEL: &str = "document_changes";

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: String,
    data: Json<Fields>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Document::new(row.id, row.data.0)
    }
}

/// Document store on a Postgres `documents` table with JSONB bodies.
///
/// Updates lock the row, apply the writes and store the result inside one
/// transaction. Live queries re-run on every NOTIFY for their collection.
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn fetch(pool: &PgPool, collection: &str, query: &Query) -> Result<Vec<Document>, sqlx::Error> {
    let filter = Json(query.filter_object());
    let rows = match &query.order_by {
        None => {
            sqlx::query_as::<_, DocumentRow>(
                "SELECT id, data FROM documents \
                 WHERE collection = $1 AND data @> $2 \
                 ORDER BY id",
            )
            .bind(collection)
            .bind(filter)
            .fetch_all(pool)
            .await?
        }
        Some(order) => {
            let direction = match order.direction {
                Direction::Ascending => "ASC",
                Direction::Descending => "DESC",
            };
            let sql = format!(
                "SELECT id, data FROM documents \
                 WHERE collection = $1 AND data @> $2 AND (data -> $3) IS NOT NULL \
                 ORDER BY data -> $3 {}, id",
                direction
            );
            sqlx::query_as::<_, DocumentRow>(&sql)
                .bind(collection)
                .bind(filter)
                .bind(&order.field)
                .fetch_all(pool)
                .await?
        }
    };
    Ok(rows.into_iter().map(Document::from).collect())
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn create(&self, collection: &str, writes: FieldWrites) -> Result<String, DomainError> {
        let id = Uuid::now_v7().to_string();
        let mut fields = Fields::new();
        writes.apply(&mut fields, Utc::now());

        sqlx::query("INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(&id)
            .bind(Json(Value::Object(fields)))
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::StoreWrite(e.to_string()))?;
        Ok(id)
    }

    async fn get_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, DomainError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, data FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::StoreRead(e.to_string()))?;
        Ok(row.map(Document::from))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        writes: FieldWrites,
    ) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::StoreWrite(e.to_string()))?;

        let current = sqlx::query_scalar::<_, Json<Fields>>(
            "SELECT data FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| DomainError::StoreWrite(e.to_string()))?
        .ok_or_else(|| DomainError::NotFound(format!("{}/{}", collection, id)))?;

        let mut fields = current.0;
        writes.apply(&mut fields, Utc::now());

        sqlx::query(
            "UPDATE documents SET data = $3, updated_at = NOW() WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(Value::Object(fields)))
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::StoreWrite(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::StoreWrite(e.to_string()))?;
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, DomainError> {
        fetch(&self.pool, collection, query)
            .await
            .map_err(|e| DomainError::StoreRead(e.to_string()))
    }

    async fn subscribe(
        &self,
        collection: &str,
        query: Query,
    ) -> Result<SnapshotStream, DomainError> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| DomainError::Subscription(e.to_string()))?;
        listener
            .listen(NOTIFY_CHANNEL)
            .await
            .map_err(|e| DomainError::Subscription(e.to_string()))?;

        // Listening before the first read so no change slips between the two.
        let initial = fetch(&self.pool, collection, &query)
            .await
            .map_err(|e| DomainError::Subscription(e.to_string()))?;
        let (sender, stream) = SnapshotStream::channel();
        sender
            .send(Ok(initial.clone()))
            .map_err(|e| DomainError::Subscription(e.to_string()))?;

        let watch = LiveQuery {
            pool: self.pool.clone(),
            collection: collection.to_string(),
            query,
            sender,
            last: initial,
        };
        let span = tracing::info_span!("live_query", collection = %collection);
        tokio::spawn(watch.run(listener).instrument(span));
        Ok(stream)
    }
}

struct LiveQuery {
    pool: PgPool,
    collection: String,
    query: Query,
    sender: SnapshotSender,
    last: Vec<Document>,
}

impl LiveQuery {
    async fn run(mut self, mut listener: PgListener) {
        loop {
            let received = tokio::select! {
                _ = self.sender.closed() => {
                    debug!("Live query released");
                    return;
                }
                received = listener.try_recv() => received,
            };

            let stale = match received {
                Ok(Some(notification)) => self.concerns(&notification),
                Ok(None) => {
                    warn!("Notification connection lost, resynchronising");
                    true
                }
                Err(e) => {
                    error!(error = %e, "Notification listener failed");
                    let _ = self.sender.send(Err(DomainError::Subscription(e.to_string())));
                    return;
                }
            };

            if stale && !self.refresh().await {
                return;
            }
        }
    }

    fn concerns(&self, notification: &PgNotification) -> bool {
        notification.payload() == self.collection
    }

    /// Re-runs the query and pushes the result if it changed. Returns false
    /// once the subscription is over.
    async fn refresh(&mut self) -> bool {
        match fetch(&self.pool, &self.collection, &self.query).await {
            Ok(snapshot) if snapshot == self.last => true,
            Ok(snapshot) => {
                self.last = snapshot.clone();
                self.sender.send(Ok(snapshot)).is_ok()
            }
            Err(e) => {
                error!(error = %e, "Live query refresh failed");
                let _ = self.sender.send(Err(DomainError::Subscription(e.to_string())));
                false
            }
        }
    }
}
