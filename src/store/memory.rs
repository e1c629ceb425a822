use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::debug;
use uuid::Uuid;

use super::{
    ChangeEvent, ChangeKind, Document, DocumentStore, Fields, Query, StoreError, Subscription,
    SubscriptionEvent,
};

/// Process-local document store.
///
/// Collections are created on first write. Every write is published on a
/// broadcast channel that backs [`DocumentStore::subscribe`].
#[derive(Clone)]
pub struct InMemoryStore {
    collections: Arc<DashMap<String, HashMap<String, Fields>>>,
    changes_tx: broadcast::Sender<ChangeEvent>,
}

impl InMemoryStore {
    pub fn new(event_buffer_size: usize) -> Self {
        let (changes_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));
        Self {
            collections: Arc::new(DashMap::new()),
            changes_tx,
        }
    }

    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    fn publish(&self, collection: &str, kind: ChangeKind, document: Document) {
        let _ = self.changes_tx.send(ChangeEvent {
            collection: collection.to_string(),
            kind,
            document,
        });
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn fetch(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        query.validate()?;

        let documents: Vec<Document> = match self.collections.get(&query.collection) {
            Some(docs) => docs
                .iter()
                .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                .filter(|document| query.matches(document))
                .collect(),
            None => Vec::new(),
        };

        debug!(
            collection = %query.collection,
            matched = documents.len(),
            "in-memory fetch"
        );
        Ok(documents)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.collections.get(collection).and_then(|docs| {
            docs.get(id)
                .map(|fields| Document::new(id.to_string(), fields.clone()))
        }))
    }

    async fn insert(&self, collection: &str, fields: Fields) -> Result<Document, StoreError> {
        let id = Uuid::new_v4().simple().to_string();
        let document = Document::new(id.clone(), fields);

        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id, document.fields.clone());

        self.publish(collection, ChangeKind::Added, document.clone());
        Ok(document)
    }

    async fn set(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        let previous = self
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(document.id.clone(), document.fields.clone());

        let kind = if previous.is_some() {
            ChangeKind::Modified
        } else {
            ChangeKind::Added
        };
        self.publish(collection, kind, document);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<Document, StoreError> {
        let merged = {
            let mut docs = self
                .collections
                .get_mut(collection)
                .ok_or_else(|| not_found(collection, id))?;
            let existing = docs.get_mut(id).ok_or_else(|| not_found(collection, id))?;
            existing.extend(fields);
            Document::new(id.to_string(), existing.clone())
        };

        self.publish(collection, ChangeKind::Modified, merged.clone());
        Ok(merged)
    }

    async fn create(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        {
            let mut docs = self.collections.entry(collection.to_string()).or_default();
            if docs.contains_key(&document.id) {
                return Err(StoreError::Conflict(format!(
                    "{collection}/{} already exists",
                    document.id
                )));
            }
            docs.insert(document.id.clone(), document.fields.clone());
        }

        self.publish(collection, ChangeKind::Added, document);
        Ok(())
    }

    async fn update_if(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        expected: &Value,
        fields: Fields,
    ) -> Result<Document, StoreError> {
        let merged = {
            let mut docs = self
                .collections
                .get_mut(collection)
                .ok_or_else(|| not_found(collection, id))?;
            let existing = docs.get_mut(id).ok_or_else(|| not_found(collection, id))?;
            if existing.get(field) != Some(expected) {
                return Err(StoreError::Conflict(format!(
                    "{collection}/{id}: {field} no longer equals {expected}"
                )));
            }
            existing.extend(fields);
            Document::new(id.to_string(), existing.clone())
        };

        self.publish(collection, ChangeKind::Modified, merged.clone());
        Ok(merged)
    }

    fn subscribe(&self, query: Query) -> Result<Subscription, StoreError> {
        query.validate()?;

        let stream = BroadcastStream::new(self.changes_tx.subscribe()).filter_map(move |result| {
            match result {
                Ok(event) if event.collection == query.collection && query.matches(&event.document) => {
                    Some(SubscriptionEvent::Changed(event))
                }
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    Some(SubscriptionEvent::Lagged(skipped))
                }
            }
        });

        Ok(Subscription::new(Box::pin(stream)))
    }
}

fn not_found(collection: &str, id: &str) -> StoreError {
    StoreError::NotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}
