//! MongoDB backend
//!
//! The client connects lazily and pools internally, so one `MongoStore` is
//! shared by every connection task. Unique indexes that could not be created
//! at startup are retried before the next insert into their collection. A
//! collection that already holds duplicates cannot get the index; its
//! uniqueness is then checked with a lookup before each insert.

use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::{CommandError, ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Database, IndexModel};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::{DocumentStore, Result, StoreError};
use crate::config::DatabaseConfig;
use crate::logger;

/// Server error code for a unique index violation
const DUPLICATE_KEY: i32 = 11000;

/// How a collection's unique field is enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexState {
    /// Index not created yet, retried before the next insert
    Pending,
    Ready,
    /// Existing duplicates block the index, inserts look the value up first
    LookupOnly,
}

pub struct MongoStore {
    database: Database,
    /// collection -> (unique field, enforcement)
    unique_indexes: Mutex<HashMap<String, (String, IndexState)>>,
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        match err.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(write_error))
                if write_error.code == DUPLICATE_KEY =>
            {
                Self::Duplicate(write_error.message.clone())
            }
            // index builds report existing duplicates as a command error
            ErrorKind::Command(CommandError { code, message, .. }) if *code == DUPLICATE_KEY => {
                Self::Duplicate(message.clone())
            }
            ErrorKind::ServerSelection { .. }
            | ErrorKind::Io(_)
            | ErrorKind::ConnectionPoolCleared { .. } => Self::Unavailable(err.to_string()),
            ErrorKind::BsonDeserialization(_) | ErrorKind::BsonSerialization(_) => {
                Self::Encoding(err.to_string())
            }
            _ => Self::Operation(err.to_string()),
        }
    }
}

impl MongoStore {
    /// Parse the connection string and build a client for the configured database
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| StoreError::Unavailable(format!("invalid connection string: {e}")))?;
        options.app_name = Some("event_portal".to_string());
        options.server_selection_timeout =
            Some(Duration::from_millis(config.server_selection_timeout_ms));

        let client = Client::with_options(options)?;

        Ok(Self {
            database: client.database(&config.name),
            unique_indexes: Mutex::new(HashMap::new()),
        })
    }

    fn collection(&self, name: &str) -> mongodb::Collection<Document> {
        self.database.collection::<Document>(name)
    }

    async fn create_unique_index(&self, collection: &str, field: &str) -> Result<()> {
        let mut keys = Document::new();
        keys.insert(field, 1);
        let index = IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().unique(true).build())
            .build();

        let outcome = self
            .collection(collection)
            .create_index(index)
            .await
            .map(|_| ())
            .map_err(StoreError::from);
        self.record_index_outcome(collection, field, outcome)
    }

    /// Settle the index state after a build attempt.
    ///
    /// Existing duplicates are not retried: the collection falls back to
    /// lookups and the caller sees success.
    fn record_index_outcome(&self, collection: &str, field: &str, outcome: Result<()>) -> Result<()> {
        match outcome {
            Ok(()) => {
                self.set_index_state(collection, field, IndexState::Ready);
                logger::log_debug(&format!("Unique index ready on {collection}.{field}"));
                Ok(())
            }
            Err(StoreError::Duplicate(detail)) => {
                self.set_index_state(collection, field, IndexState::LookupOnly);
                logger::log_warning(&format!(
                    "{collection} already holds duplicate {field} values ({detail}), \
                     checking {field} by lookup before inserts"
                ));
                Ok(())
            }
            Err(e) => {
                self.set_index_state(collection, field, IndexState::Pending);
                Err(e)
            }
        }
    }

    fn set_index_state(&self, collection: &str, field: &str, state: IndexState) {
        if let Ok(mut indexes) = self.unique_indexes.lock() {
            indexes.insert(collection.to_string(), (field.to_string(), state));
        }
    }

    fn index_state(&self, collection: &str) -> Option<(String, IndexState)> {
        let indexes = self.unique_indexes.lock().ok()?;
        indexes.get(collection).cloned()
    }

    /// Fail with `Duplicate` if a record already holds `document[field]`
    async fn reject_existing(&self, collection: &str, field: &str, document: &Document) -> Result<()> {
        let Some(value) = document.get(field) else {
            return Ok(());
        };

        let mut filter = Document::new();
        filter.insert(field, value.clone());
        if self.collection(collection).find_one(filter).await?.is_some() {
            return Err(StoreError::Duplicate(format!("{collection} {field}: {value}")));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>> {
        let cursor = self.collection(collection).find(filter).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
        Ok(self.collection(collection).find_one(filter).await?)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson> {
        if let Some((field, IndexState::Pending)) = self.index_state(collection) {
            self.create_unique_index(collection, &field).await?;
        }
        if let Some((field, IndexState::LookupOnly)) = self.index_state(collection) {
            self.reject_existing(collection, &field, &document).await?;
        }

        let result = self.collection(collection).insert_one(document).await?;
        Ok(result.inserted_id)
    }

    async fn ensure_unique(&self, collection: &str, field: &str) -> Result<()> {
        self.set_index_state(collection, field, IndexState::Pending);
        self.create_unique_index(collection, field).await
    }

    async fn ping(&self) -> Result<()> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_connect_rejects_bad_connection_string() {
        let mut cfg = Config::from_defaults().unwrap();
        cfg.database.uri = "postgres://localhost".to_string();

        let err = MongoStore::connect(&cfg.database).await.err().unwrap();
        assert_eq!(err.kind(), "unavailable");
    }

    #[tokio::test]
    async fn test_connect_is_lazy() {
        // no server is contacted until the first operation
        let cfg = Config::from_defaults().unwrap();
        let store = MongoStore::connect(&cfg.database).await.unwrap();
        assert!(store.index_state("logindetails").is_none());

        store.set_index_state("logindetails", "email", IndexState::Pending);
        assert_eq!(
            store.index_state("logindetails"),
            Some(("email".to_string(), IndexState::Pending))
        );
    }

    #[tokio::test]
    async fn test_index_outcomes() {
        let cfg = Config::from_defaults().unwrap();
        let store = MongoStore::connect(&cfg.database).await.unwrap();
        let state = |store: &MongoStore| store.index_state("logindetails").map(|(_, s)| s);

        // unreachable server: error surfaces and the build is retried later
        let err = store
            .record_index_outcome(
                "logindetails",
                "email",
                Err(StoreError::Unavailable("timeout".to_string())),
            )
            .unwrap_err();
        assert_eq!(err.kind(), "unavailable");
        assert_eq!(state(&store), Some(IndexState::Pending));

        // existing duplicates: no error, no more retries, lookups instead
        store
            .record_index_outcome(
                "logindetails",
                "email",
                Err(StoreError::Duplicate("E11000".to_string())),
            )
            .unwrap();
        assert_eq!(state(&store), Some(IndexState::LookupOnly));

        store
            .record_index_outcome("logindetails", "email", Ok(()))
            .unwrap();
        assert_eq!(state(&store), Some(IndexState::Ready));
    }
}
