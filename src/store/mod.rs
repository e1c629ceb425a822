//! Document-store seam.
//!
//! The marketplace data lives in a remote document database. Everything in
//! this crate talks to it through [`DocumentStore`], so the aggregator and
//! the write paths can be pointed at the in-memory store in tests and at a
//! real backend in production.

pub mod memory;

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use futures::stream::BoxStream;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

pub use memory::InMemoryStore;

/// Upper bound on the value list of a single `IN` filter.
pub const MAX_IN_VALUES: usize = 10;

pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("{collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("failed to decode {collection}/{id}: {reason}")]
    Decode {
        collection: String,
        id: String,
        reason: String,
    },
}

/// A stored document: an id plus its field map. The id is never part of
/// the fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Serializes a record into a document, lifting out any `id` field.
    pub fn from_record<T: Serialize>(id: impl Into<String>, record: &T) -> Result<Self, StoreError> {
        let id = id.into();
        match serde_json::to_value(record) {
            Ok(Value::Object(mut fields)) => {
                fields.remove("id");
                Ok(Self { id, fields })
            }
            Ok(other) => Err(StoreError::InvalidQuery(format!(
                "document {id} must serialize to an object, got {other}"
            ))),
            Err(err) => Err(StoreError::InvalidQuery(format!(
                "document {id} failed to serialize: {err}"
            ))),
        }
    }

    /// Decodes the document into `T`, re-injecting the id as `id`.
    pub fn decode<T: DeserializeOwned>(&self, collection: &str) -> Result<T, StoreError> {
        let mut fields = self.fields.clone();
        fields.insert("id".to_string(), Value::String(self.id.clone()));

        serde_json::from_value(Value::Object(fields)).map_err(|err| StoreError::Decode {
            collection: collection.to_string(),
            id: self.id.clone(),
            reason: err.to_string(),
        })
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { field: String, value: Value },
    In { field: String, values: Vec<Value> },
}

impl Filter {
    fn matches(&self, document: &Document) -> bool {
        match self {
            Filter::Eq { field, value } => document.field(field) == Some(value),
            Filter::In { field, values } => document
                .field(field)
                .is_some_and(|actual| values.contains(actual)),
        }
    }
}

/// A collection-scoped conjunction of filters.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn where_in<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filters.push(Filter::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Rejects `IN` filters the backing store would refuse: empty lists and
    /// lists longer than [`MAX_IN_VALUES`].
    pub fn validate(&self) -> Result<(), StoreError> {
        for filter in &self.filters {
            if let Filter::In { field, values } = filter {
                if values.is_empty() {
                    return Err(StoreError::InvalidQuery(format!(
                        "IN filter on {field} needs at least one value"
                    )));
                }
                if values.len() > MAX_IN_VALUES {
                    return Err(StoreError::InvalidQuery(format!(
                        "IN filter on {field} has {} values, limit is {MAX_IN_VALUES}",
                        values.len()
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.filters.iter().all(|filter| filter.matches(document))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
}

#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub collection: String,
    pub kind: ChangeKind,
    pub document: Document,
}

#[derive(Debug, Clone)]
pub enum SubscriptionEvent {
    Changed(ChangeEvent),
    /// The subscriber fell behind and `n` notifications were dropped.
    Lagged(u64),
}

/// Live feed of changes matching a query. Dropping it unsubscribes.
pub struct Subscription {
    inner: BoxStream<'static, SubscriptionEvent>,
}

impl Subscription {
    pub fn new(inner: BoxStream<'static, SubscriptionEvent>) -> Self {
        Self { inner }
    }

    /// Ends the subscription. Dropping the handle has the same effect.
    pub fn unsubscribe(self) {}
}

impl Stream for Subscription {
    type Item = SubscriptionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// One-shot snapshot of the documents matching `query`.
    async fn fetch(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Stores `fields` under a freshly generated id.
    async fn insert(&self, collection: &str, fields: Fields) -> Result<Document, StoreError>;

    /// Creates or replaces the document with `document.id`.
    async fn set(&self, collection: &str, document: Document) -> Result<(), StoreError>;

    /// Stores `document` under its own id; fails with
    /// [`StoreError::Conflict`] if that id is taken.
    async fn create(&self, collection: &str, document: Document) -> Result<(), StoreError>;

    /// Merges `fields` into an existing document.
    async fn update(&self, collection: &str, id: &str, fields: Fields)
    -> Result<Document, StoreError>;

    /// Merges `fields` only if `field` still holds `expected`, atomically with
    /// the write. Fails with [`StoreError::Conflict`] otherwise.
    async fn update_if(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        expected: &Value,
        fields: Fields,
    ) -> Result<Document, StoreError>;

    fn subscribe(&self, query: Query) -> Result<Subscription, StoreError>;
}
