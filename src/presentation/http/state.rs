use crate::{
    application::chat::use_case::ChatUseCase,
    config::Config,
    domain::store::repository::DocumentStore,
    infrastructure::store::memory_store::InMemoryDocumentStore,
};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatUseCase>,
    /// Present when the Postgres store is in use; probed by the health check.
    pub db: Option<PgPool>,
    pub config: Config,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, db: Option<PgPool>, config: Config) -> Self {
        Self {
            chat: Arc::new(ChatUseCase::new(store)),
            db,
            config,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryDocumentStore::new()),
            None,
            Config::in_memory(),
        )
    }
}
