//! Document store adapter
//!
//! Collection-scoped find/insert over BSON documents. Handlers only see the
//! [`DocumentStore`] trait; the process entrypoint picks the backend.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use std::sync::Arc;
use thiserror::Error;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use crate::config::{DatabaseConfig, StoreBackend};
use crate::logger;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Store handle shared across connection tasks
pub type SharedStore = Arc<dyn DocumentStore>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A unique constraint rejected the write
    #[error("duplicate key: {0}")]
    Duplicate(String),

    /// The store accepted the request but the operation failed
    #[error("store operation failed: {0}")]
    Operation(String),

    /// A record could not be converted to or from BSON
    #[error("document encoding failed: {0}")]
    Encoding(String),
}

impl StoreError {
    /// Short tag safe to expose to clients
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Duplicate(_) => "duplicate",
            Self::Operation(_) => "operation",
            Self::Encoding(_) => "encoding",
        }
    }
}

impl From<mongodb::bson::ser::Error> for StoreError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents in `collection` whose fields equal every field of `filter`
    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>>;

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>>;

    /// Insert a document, returning its `_id`
    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson>;

    /// Declare that `field` must be unique within `collection`
    async fn ensure_unique(&self, collection: &str, field: &str) -> Result<()>;

    async fn ping(&self) -> Result<()>;
}

/// Open the configured store and run its startup checks.
///
/// Only an unusable connection string is an error here. An unreachable
/// server is logged and the handle is returned anyway, so requests fail
/// individually until the store comes back.
pub async fn open(config: &DatabaseConfig) -> Result<SharedStore> {
    let store: SharedStore = match config.backend {
        StoreBackend::Mongodb => Arc::new(MongoStore::connect(config).await?),
        StoreBackend::Memory => {
            logger::log_warning("Using in-memory store, records are lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    match store.ping().await {
        Ok(()) => logger::log_info("Connected to Database"),
        Err(e) => logger::log_error(&format!("Error in connecting to the database: {e}")),
    }

    if let Err(e) = store.ensure_unique(&config.users_collection, "email").await {
        logger::log_warning(&format!(
            "Unique index on {}.email not created yet: {e}",
            config.users_collection
        ));
    }

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use mongodb::bson::doc;

    #[tokio::test]
    async fn test_open_memory_backend_enforces_unique_email() {
        let mut cfg = Config::from_defaults().unwrap();
        cfg.database.backend = StoreBackend::Memory;

        let store = open(&cfg.database).await.unwrap();
        store.ping().await.unwrap();

        let users = &cfg.database.users_collection;
        store
            .insert_one(users, doc! { "email": "a@x.com" })
            .await
            .unwrap();
        let err = store
            .insert_one(users, doc! { "email": "a@x.com" })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert_eq!(err.kind(), "duplicate");
    }
}
