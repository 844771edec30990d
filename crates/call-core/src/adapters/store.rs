//! Realtime document store contract
//!
//! The coordinator treats the store as an opaque key-value change feed:
//! documents addressed by `collection/id`, field-level merge updates with a
//! few atomic helpers, and subscriptions delivering full snapshots (single
//! document) or change records (queries). Dropping a receiver unsubscribes.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::errors::StoreError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Address of one document
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct DocumentPath {
    pub collection: String,
    pub id: String,
}

impl DocumentPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self { collection: collection.into(), id: id.into() }
    }
}

impl std::fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// One field operation inside an update
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Overwrite the field
    Set(Value),
    /// Append the elements not already present
    ArrayUnion(Vec<Value>),
    /// Add to a numeric field, treating a missing field as zero
    Increment(i64),
    /// Server-assigned write time
    ServerTimestamp,
    Delete,
}

/// Merge update applied atomically to one document.
///
/// Field paths are dotted (`candidates.alice`); intermediate maps are
/// created as needed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentUpdate {
    pub fields: Vec<(String, FieldValue)>,
}

impl DocumentUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((path.into(), FieldValue::Set(value.into())));
        self
    }

    pub fn array_union(mut self, path: impl Into<String>, values: Vec<Value>) -> Self {
        self.fields.push((path.into(), FieldValue::ArrayUnion(values)));
        self
    }

    pub fn increment(mut self, path: impl Into<String>, by: i64) -> Self {
        self.fields.push((path.into(), FieldValue::Increment(by)));
        self
    }

    pub fn server_timestamp(mut self, path: impl Into<String>) -> Self {
        self.fields.push((path.into(), FieldValue::ServerTimestamp));
        self
    }

    pub fn delete(mut self, path: impl Into<String>) -> Self {
        self.fields.push((path.into(), FieldValue::Delete));
        self
    }
}

/// Equality-filtered query over one collection
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<(String, Value)>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self { collection: collection.into(), filters: Vec::new() }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.filters
            .iter()
            .all(|(field, expected)| lookup_path(document, field) == Some(expected))
    }
}

/// Kind of change seen by a query subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// Change record delivered to query subscribers
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    pub kind: ChangeKind,
    pub id: String,
    pub data: Value,
}

/// Snapshot of a single document; `data` is `None` when it does not exist
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub path: DocumentPath,
    pub data: Option<Value>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document; fails if it already exists
    async fn create(&self, path: &DocumentPath, fields: Value) -> StoreResult<()>;

    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Value>>;

    /// Merge update; fails if the document does not exist
    async fn update(&self, path: &DocumentPath, update: DocumentUpdate) -> StoreResult<()>;

    /// Current snapshot first, then one per change
    async fn subscribe_document(
        &self,
        path: &DocumentPath,
    ) -> StoreResult<mpsc::UnboundedReceiver<DocumentSnapshot>>;

    /// Current matches first (as `Added`), then incremental changes
    async fn subscribe_query(
        &self,
        query: Query,
    ) -> StoreResult<mpsc::UnboundedReceiver<Vec<DocumentChange>>>;
}

/// Resolve a dotted path inside a JSON document
pub fn lookup_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(document, |node, segment| node.get(segment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_matching() {
        let query = Query::collection("calls")
            .where_eq("receiverId", "bob")
            .where_eq("status", "ringing");

        assert!(query.matches(&json!({"receiverId": "bob", "status": "ringing"})));
        assert!(!query.matches(&json!({"receiverId": "bob", "status": "busy"})));
        assert!(!query.matches(&json!({"status": "ringing"})));
    }

    #[test]
    fn test_lookup_path() {
        let doc = json!({"candidates": {"alice": [1, 2]}});
        assert_eq!(lookup_path(&doc, "candidates.alice"), Some(&json!([1, 2])));
        assert_eq!(lookup_path(&doc, "candidates.bob"), None);
    }
}
