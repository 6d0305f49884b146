//! In-process document store
//!
//! Keeps collections in a mutex-guarded map. Unique constraints are checked
//! under the same lock as the insert, so concurrent writers cannot both pass.

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Bson, Document};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{DocumentStore, Result, StoreError};
use crate::logger;

#[derive(Default)]
struct Collection {
    documents: Vec<Document>,
    unique_fields: Vec<String>,
}

impl Collection {
    fn conflict(&self, document: &Document) -> Option<String> {
        self.unique_fields.iter().find_map(|field| {
            let value = document.get(field)?;
            self.documents
                .iter()
                .any(|existing| existing.get(field) == Some(value))
                .then(|| format!("{field}: {value}"))
        })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .lock()
            .map_err(|_| StoreError::Operation("memory store lock poisoned".to_string()))
    }
}

fn matches(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(key, expected)| document.get(key) == Some(expected))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>> {
        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .map(|c| {
                c.documents
                    .iter()
                    .filter(|d| matches(d, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .and_then(|c| c.documents.iter().find(|d| matches(d, &filter)).cloned()))
    }

    async fn insert_one(&self, collection: &str, mut document: Document) -> Result<Bson> {
        let mut collections = self.lock()?;
        let entry = collections.entry(collection.to_string()).or_default();

        if let Some(conflict) = entry.conflict(&document) {
            return Err(StoreError::Duplicate(format!("{collection} {conflict}")));
        }

        if !document.contains_key("_id") {
            document.insert("_id", ObjectId::new());
        }
        let id = document.get("_id").cloned().unwrap_or(Bson::Null);
        entry.documents.push(document);
        Ok(id)
    }

    async fn ensure_unique(&self, collection: &str, field: &str) -> Result<()> {
        let mut collections = self.lock()?;
        let entry = collections.entry(collection.to_string()).or_default();
        if entry.unique_fields.iter().any(|f| f == field) {
            return Ok(());
        }

        let mut seen = Vec::new();
        let mut has_duplicates = false;
        for value in entry.documents.iter().filter_map(|d| d.get(field)) {
            if seen.contains(&value) {
                has_duplicates = true;
                break;
            }
            seen.push(value);
        }
        if has_duplicates {
            // existing records stay, new writes are still checked
            logger::log_warning(&format!(
                "{collection} already holds duplicate {field} values, enforcing uniqueness for new records only"
            ));
        }

        entry.unique_fields.push(field.to_string());
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[tokio::test]
    async fn test_find_filters_by_field_equality() {
        let store = MemoryStore::new();
        store
            .insert_one("Event", doc! { "name": "Bo", "age": "30" })
            .await
            .unwrap();
        store
            .insert_one("Event", doc! { "name": "Cy", "age": "30" })
            .await
            .unwrap();

        assert_eq!(store.find("Event", doc! {}).await.unwrap().len(), 2);
        assert_eq!(store.find("Event", doc! { "age": "30" }).await.unwrap().len(), 2);

        let bo = store.find("Event", doc! { "name": "Bo" }).await.unwrap();
        assert_eq!(bo.len(), 1);
        assert_eq!(bo[0].get_str("name").unwrap(), "Bo");
    }

    #[tokio::test]
    async fn test_find_one_absent() {
        let store = MemoryStore::new();
        assert!(store
            .find_one("logindetails", doc! { "email": "nobody@x.com" })
            .await
            .unwrap()
            .is_none());
        assert!(store.find("missing", doc! {}).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_assigns_object_id() {
        let store = MemoryStore::new();
        let id = store.insert_one("Event", doc! { "name": "Bo" }).await.unwrap();
        assert!(matches!(id, Bson::ObjectId(_)));

        let stored = store.find_one("Event", doc! {}).await.unwrap().unwrap();
        assert_eq!(stored.get("_id"), Some(&id));
    }

    #[tokio::test]
    async fn test_duplicates_allowed_without_constraint() {
        let store = MemoryStore::new();
        let record = doc! { "name": "Bo", "email": "b@x.com" };
        store.insert_one("Event", record.clone()).await.unwrap();
        store.insert_one("Event", record).await.unwrap();
        assert_eq!(store.find("Event", doc! {}).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unique_constraint_rejects_second_insert() {
        let store = MemoryStore::new();
        store.ensure_unique("logindetails", "email").await.unwrap();
        // idempotent
        store.ensure_unique("logindetails", "email").await.unwrap();

        store
            .insert_one("logindetails", doc! { "email": "a@x.com", "name": "Ann" })
            .await
            .unwrap();
        let err = store
            .insert_one("logindetails", doc! { "email": "a@x.com", "name": "Eve" })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));

        let users = store
            .find("logindetails", doc! { "email": "a@x.com" })
            .await
            .unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].get_str("name").unwrap(), "Ann");
    }

    #[tokio::test]
    async fn test_constraint_holds_over_existing_duplicates() {
        let store = MemoryStore::new();
        for _ in 0..2 {
            store
                .insert_one("logindetails", doc! { "email": "a@x.com" })
                .await
                .unwrap();
        }

        store.ensure_unique("logindetails", "email").await.unwrap();

        store
            .insert_one("logindetails", doc! { "email": "b@x.com" })
            .await
            .unwrap();
        let err = store
            .insert_one("logindetails", doc! { "email": "b@x.com" })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));

        // the already duplicated value is closed to new records too
        assert!(store
            .insert_one("logindetails", doc! { "email": "a@x.com" })
            .await
            .is_err());
        assert_eq!(store.find("logindetails", doc! {}).await.unwrap().len(), 3);
    }
}
