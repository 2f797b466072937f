//! Remote document-store contract.
//!
//! Any document database that can create, fetch, update and query JSON-like
//! documents by collection satisfies [`DocumentStore`]. Writes name the fields
//! the backend must stamp with its own clock, standing in for a server-side
//! timestamp primitive.

#![allow(missing_docs)]

use std::cmp::Ordering;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Opaque key/value payload carried by records.
pub type Fields = serde_json::Map<String, Value>;

/// The fixed set of collections this subsystem writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    UserInteractions,
    GeneratedContent,
    Analytics,
    UserPreferences,
}

impl Collection {
    pub const ALL: [Self; 4] = [
        Self::UserInteractions,
        Self::GeneratedContent,
        Self::Analytics,
        Self::UserPreferences,
    ];

    /// Collection name as stored in the backend.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UserInteractions => "user_interactions",
            Self::GeneratedContent => "generated_content",
            Self::Analytics => "analytics",
            Self::UserPreferences => "user_preferences",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failures surfaced at the store boundary.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("remote store is configured but no client is attached")]
    Unavailable,

    #[error("write to {collection} failed: {details}")]
    Write {
        collection: Collection,
        details: String,
    },

    #[error("read from {collection} failed: {details}")]
    Read {
        collection: Collection,
        details: String,
    },

    #[error("document {id} not found in {collection}")]
    NotFound { collection: Collection, id: String },

    #[error("invalid {collection} record: {details}")]
    InvalidRecord {
        collection: Collection,
        details: String,
    },

    #[error("malformed document {id} in {collection}: {details}")]
    Malformed {
        collection: Collection,
        id: String,
        details: String,
    },
}

/// A document write: plain fields plus fields the backend stamps itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentWrite {
    pub fields: Fields,
    pub server_timestamps: Vec<String>,
}

impl DocumentWrite {
    #[must_use]
    pub fn new(fields: Fields) -> Self {
        Self {
            fields,
            server_timestamps: Vec::new(),
        }
    }

    /// Serialize a record into a write, dropping its client-side `id`.
    pub fn from_record<T: Serialize>(
        collection: Collection,
        record: &T,
    ) -> Result<Self, BackendError> {
        match serde_json::to_value(record) {
            Ok(Value::Object(mut fields)) => {
                fields.remove("id");
                Ok(Self::new(fields))
            }
            Ok(other) => Err(BackendError::InvalidRecord {
                collection,
                details: format!("expected an object, got {other}"),
            }),
            Err(e) => Err(BackendError::InvalidRecord {
                collection,
                details: e.to_string(),
            }),
        }
    }

    /// Mark `field` as server-stamped; any client value for it is discarded.
    #[must_use]
    pub fn stamp(mut self, field: &str) -> Self {
        self.fields.remove(field);
        self.server_timestamps.push(field.to_string());
        self
    }

    /// Resolve server-stamped fields against `now`.
    #[must_use]
    pub fn resolve(self, now: DateTime<Utc>) -> Fields {
        let mut fields = self.fields;
        let stamp = Value::String(format_timestamp(now));
        for field in self.server_timestamps {
            fields.insert(field, stamp.clone());
        }
        fields
    }
}

/// A stored document: backend id plus its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    /// Decode into a typed record, exposing the backend id as `id`.
    pub fn into_record<T: DeserializeOwned>(self, collection: Collection) -> Result<T, BackendError> {
        let Self { id, mut fields } = self;
        fields.insert("id".to_string(), Value::String(id.clone()));
        serde_json::from_value(Value::Object(fields)).map_err(|e| BackendError::Malformed {
            collection,
            id,
            details: e.to_string(),
        })
    }
}

/// Sort direction for [`OrderBy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    /// Dotted field path.
    pub field: String,
    pub direction: Direction,
}

/// Equality filters, optional ordering, optional limit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// `(dotted field path, expected value)` pairs, all of which must match.
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }

    #[must_use]
    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether every filter matches `fields`.
    #[must_use]
    pub fn matches(&self, fields: &Fields) -> bool {
        self.filters
            .iter()
            .all(|(path, expected)| lookup_path(fields, path) == Some(expected))
    }

    /// Evaluate the query over documents given in insertion order.
    ///
    /// Documents without the ordering field are excluded when ordering is
    /// requested. Ties keep insertion order when ascending and reverse it
    /// when descending, so "newest first" holds for equal timestamps.
    #[must_use]
    pub fn apply(&self, documents: Vec<Document>) -> Vec<Document> {
        let mut selected: Vec<(usize, Document)> = documents
            .into_iter()
            .enumerate()
            .filter(|(_, doc)| self.matches(&doc.fields))
            .collect();

        if let Some(order) = &self.order_by {
            selected.retain(|(_, doc)| lookup_path(&doc.fields, &order.field).is_some());
            selected.sort_by(|(ia, a), (ib, b)| {
                let by_value = compare_values(
                    lookup_path(&a.fields, &order.field),
                    lookup_path(&b.fields, &order.field),
                )
                .then(ia.cmp(ib));
                match order.direction {
                    Direction::Ascending => by_value,
                    Direction::Descending => by_value.reverse(),
                }
            });
        }

        let limit = self.limit.unwrap_or(usize::MAX);
        selected.into_iter().take(limit).map(|(_, doc)| doc).collect()
    }
}

/// Resolve a dotted path (`eventData.toolName`) inside a document.
#[must_use]
pub fn lookup_path<'a>(fields: &'a Fields, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = fields.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Total order used for `order_by`: numbers numerically, RFC 3339 strings
/// chronologically, other strings lexically, mixed kinds by kind.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Some(x), Some(y)) => kind_rank(x).cmp(&kind_rank(y)),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}

const fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Timestamp wire format shared by every backend.
#[must_use]
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Remote document store, treated as an opaque collaborator.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document and return its backend-assigned id.
    async fn create(&self, collection: Collection, write: DocumentWrite)
    -> Result<String, BackendError>;

    /// Fetch one document by id.
    async fn get(&self, collection: Collection, id: &str)
    -> Result<Option<Document>, BackendError>;

    /// Merge fields into an existing document. Fails with `NotFound` when absent.
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        write: DocumentWrite,
    ) -> Result<(), BackendError>;

    /// Create or wholly replace the document at `id`.
    async fn set(
        &self,
        collection: Collection,
        id: &str,
        write: DocumentWrite,
    ) -> Result<(), BackendError>;

    /// Run an equality/order/limit query.
    async fn query(&self, collection: Collection, query: &Query)
    -> Result<Vec<Document>, BackendError>;
}
