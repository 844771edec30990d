//! In-process [`DocumentStore`] with realtime subscriptions
//!
//! Good enough to run two coordinators against each other in one process:
//! merge updates, array-union, increments, server timestamps, document and
//! query subscriptions. Writes can be switched off to simulate an outage.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace};

use super::store::{
    ChangeKind, DocumentChange, DocumentPath, DocumentSnapshot, DocumentStore, DocumentUpdate,
    FieldValue, Query, StoreResult,
};
use crate::errors::StoreError;

/// A write accepted by the store, kept for inspection
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRecord {
    Create { path: DocumentPath, fields: Value },
    Update { path: DocumentPath, update: DocumentUpdate },
}

impl WriteRecord {
    pub fn path(&self) -> &DocumentPath {
        match self {
            WriteRecord::Create { path, .. } | WriteRecord::Update { path, .. } => path,
        }
    }
}

struct QuerySubscriber {
    query: Query,
    tx: mpsc::UnboundedSender<Vec<DocumentChange>>,
    visible: HashSet<String>,
}

#[derive(Default)]
struct StoreInner {
    documents: HashMap<DocumentPath, Value>,
    doc_subscribers: HashMap<DocumentPath, Vec<mpsc::UnboundedSender<DocumentSnapshot>>>,
    query_subscribers: Vec<QuerySubscriber>,
    /// Inspection log of accepted writes; grows until cleared
    writes: Vec<WriteRecord>,
}

impl StoreInner {
    fn notify(&mut self, path: &DocumentPath) {
        let data = self.documents.get(path).cloned();

        if let Some(subscribers) = self.doc_subscribers.get_mut(path) {
            let snapshot = DocumentSnapshot { path: path.clone(), data: data.clone() };
            subscribers.retain(|tx| tx.send(snapshot.clone()).is_ok());
        }

        self.query_subscribers.retain_mut(|subscriber| {
            if subscriber.query.collection != path.collection {
                return !subscriber.tx.is_closed();
            }
            let matches_now = data.as_ref().map_or(false, |d| subscriber.query.matches(d));
            let was_visible = subscriber.visible.contains(&path.id);
            let change = match (was_visible, matches_now) {
                (false, true) => {
                    subscriber.visible.insert(path.id.clone());
                    Some(ChangeKind::Added)
                }
                (true, true) => Some(ChangeKind::Modified),
                (true, false) => {
                    subscriber.visible.remove(&path.id);
                    Some(ChangeKind::Removed)
                }
                (false, false) => None,
            };
            match change {
                Some(kind) => {
                    let record = DocumentChange {
                        kind,
                        id: path.id.clone(),
                        data: data.clone().unwrap_or(Value::Null),
                    };
                    subscriber.tx.send(vec![record]).is_ok()
                }
                None => !subscriber.tx.is_closed(),
            }
        });
    }
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    inner: Mutex<StoreInner>,
    reject_writes: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every create/update until switched back
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// All accepted writes, oldest first.
    ///
    /// The log only exists for inspection and is never read back by the
    /// store itself; long-running users should call [`clear_writes`](Self::clear_writes).
    pub async fn writes(&self) -> Vec<WriteRecord> {
        self.inner.lock().await.writes.clone()
    }

    /// Accepted writes addressed to `path`
    pub async fn writes_for(&self, path: &DocumentPath) -> Vec<WriteRecord> {
        self.inner
            .lock()
            .await
            .writes
            .iter()
            .filter(|w| w.path() == path)
            .cloned()
            .collect()
    }

    /// Forget the write log; documents and subscriptions are untouched
    pub async fn clear_writes(&self) {
        self.inner.lock().await.writes.clear();
    }

    pub async fn document_count(&self) -> usize {
        self.inner.lock().await.documents.len()
    }

    fn check_writable(&self, path: &DocumentPath) -> StoreResult<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected(format!("writes to {} are disabled", path)));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create(&self, path: &DocumentPath, fields: Value) -> StoreResult<()> {
        self.check_writable(path)?;
        if !fields.is_object() {
            return Err(StoreError::Malformed {
                path: path.to_string(),
                message: "document root must be an object".to_string(),
            });
        }

        let mut inner = self.inner.lock().await;
        if inner.documents.contains_key(path) {
            return Err(StoreError::AlreadyExists(path.to_string()));
        }
        inner.documents.insert(path.clone(), fields.clone());
        inner.writes.push(WriteRecord::Create { path: path.clone(), fields });
        debug!("Created document {}", path);
        inner.notify(path);
        Ok(())
    }

    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Value>> {
        Ok(self.inner.lock().await.documents.get(path).cloned())
    }

    async fn update(&self, path: &DocumentPath, update: DocumentUpdate) -> StoreResult<()> {
        self.check_writable(path)?;

        let mut inner = self.inner.lock().await;
        let document = inner
            .documents
            .get_mut(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;

        // Apply to a copy so a bad path leaves the document untouched
        let mut updated = document.clone();
        for (field, value) in &update.fields {
            apply_field(&mut updated, field, value)?;
        }
        *document = updated;

        trace!("Updated document {} with {} field ops", path, update.fields.len());
        inner.writes.push(WriteRecord::Update { path: path.clone(), update });
        inner.notify(path);
        Ok(())
    }

    async fn subscribe_document(
        &self,
        path: &DocumentPath,
    ) -> StoreResult<mpsc::UnboundedReceiver<DocumentSnapshot>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().await;

        let initial = DocumentSnapshot { path: path.clone(), data: inner.documents.get(path).cloned() };
        // Receiver is alive, the send cannot fail
        let _ = tx.send(initial);

        inner.doc_subscribers.entry(path.clone()).or_default().push(tx);
        debug!("Subscribed to document {}", path);
        Ok(rx)
    }

    async fn subscribe_query(
        &self,
        query: Query,
    ) -> StoreResult<mpsc::UnboundedReceiver<Vec<DocumentChange>>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().await;

        let mut initial: Vec<DocumentChange> = inner
            .documents
            .iter()
            .filter(|(path, data)| path.collection == query.collection && query.matches(data))
            .map(|(path, data)| DocumentChange {
                kind: ChangeKind::Added,
                id: path.id.clone(),
                data: data.clone(),
            })
            .collect();
        initial.sort_by(|a, b| a.id.cmp(&b.id));

        let visible = initial.iter().map(|c| c.id.clone()).collect();
        if !initial.is_empty() {
            let _ = tx.send(initial);
        }

        debug!("Subscribed to query on {} with {} filters", query.collection, query.filters.len());
        inner.query_subscribers.push(QuerySubscriber { query, tx, visible });
        Ok(rx)
    }
}

fn apply_field(document: &mut Value, path: &str, value: &FieldValue) -> StoreResult<()> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;

    let mut node = document;
    for segment in parents {
        let map = as_object(node);
        node = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    let parent = as_object(node);

    match value {
        FieldValue::Set(v) => {
            parent.insert(last.to_string(), v.clone());
        }
        FieldValue::ServerTimestamp => {
            parent.insert(last.to_string(), Value::String(chrono::Utc::now().to_rfc3339()));
        }
        FieldValue::Delete => {
            parent.remove(*last);
        }
        FieldValue::Increment(by) => {
            let current = parent.get(*last).and_then(Value::as_i64).unwrap_or(0);
            parent.insert(last.to_string(), Value::from(current + by));
        }
        FieldValue::ArrayUnion(values) => {
            let slot = parent
                .entry(last.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }
            if let Value::Array(items) = slot {
                for v in values {
                    if !items.contains(v) {
                        items.push(v.clone());
                    }
                }
            }
        }
    }
    Ok(())
}

/// Coerce a node into a map, replacing scalars the way a merge write does
fn as_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn path(id: &str) -> DocumentPath {
        DocumentPath::new("calls", id)
    }

    #[tokio::test]
    async fn test_create_and_merge_update() {
        let store = MemoryDocumentStore::new();
        store.create(&path("c1"), json!({"status": "ringing", "count": 1})).await.unwrap();

        store
            .update(
                &path("c1"),
                DocumentUpdate::new()
                    .set("status", "connected")
                    .increment("count", 2)
                    .array_union("candidates.alice", vec![json!("a"), json!("b")])
                    .array_union("candidates.alice", vec![json!("b"), json!("c")]),
            )
            .await
            .unwrap();

        let doc = store.get(&path("c1")).await.unwrap().unwrap();
        assert_eq!(doc["status"], "connected");
        assert_eq!(doc["count"], 3);
        assert_eq!(doc["candidates"]["alice"], json!(["a", "b", "c"]));
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let store = MemoryDocumentStore::new();
        store.create(&path("c1"), json!({})).await.unwrap();
        let err = store.create(&path("c1"), json!({})).await.unwrap_err();
        assert_eq!(err, StoreError::AlreadyExists("calls/c1".into()));
    }

    #[tokio::test]
    async fn test_update_missing_document() {
        let store = MemoryDocumentStore::new();
        let err = store.update(&path("nope"), DocumentUpdate::new().set("a", 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_path_leaves_document_untouched() {
        let store = MemoryDocumentStore::new();
        store.create(&path("c1"), json!({"a": 1})).await.unwrap();
        let err = store
            .update(&path("c1"), DocumentUpdate::new().set("a", 2).set("b..c", 3))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath(_)));
        assert_eq!(store.get(&path("c1")).await.unwrap().unwrap(), json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_rejected_writes() {
        let store = MemoryDocumentStore::new();
        store.set_reject_writes(true);
        assert!(matches!(
            store.create(&path("c1"), json!({})).await,
            Err(StoreError::Rejected(_))
        ));
        store.set_reject_writes(false);
        store.create(&path("c1"), json!({})).await.unwrap();
        assert_eq!(store.writes().await.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_writes_keeps_documents() {
        let store = MemoryDocumentStore::new();
        store.create(&path("c1"), json!({"status": "ringing"})).await.unwrap();
        store.update(&path("c1"), DocumentUpdate::new().set("status", "ended")).await.unwrap();
        assert_eq!(store.writes().await.len(), 2);

        store.clear_writes().await;
        assert!(store.writes().await.is_empty());
        assert_eq!(store.get(&path("c1")).await.unwrap().unwrap()["status"], "ended");

        store.update(&path("c1"), DocumentUpdate::new().set("status", "busy")).await.unwrap();
        assert_eq!(store.writes_for(&path("c1")).await.len(), 1);
    }

    #[tokio::test]
    async fn test_document_subscription() {
        let store = MemoryDocumentStore::new();
        let mut rx = store.subscribe_document(&path("c1")).await.unwrap();

        let initial = rx.recv().await.unwrap();
        assert_eq!(initial.data, None);

        store.create(&path("c1"), json!({"status": "ringing"})).await.unwrap();
        let created = rx.recv().await.unwrap();
        assert_eq!(created.data.unwrap()["status"], "ringing");

        store.update(&path("c1"), DocumentUpdate::new().server_timestamp("endedAt")).await.unwrap();
        let updated = rx.recv().await.unwrap();
        assert!(updated.data.unwrap()["endedAt"].is_string());
    }

    #[tokio::test]
    async fn test_query_subscription_changes() {
        let store = MemoryDocumentStore::new();
        store
            .create(&path("old"), json!({"receiverId": "bob", "status": "ringing"}))
            .await
            .unwrap();

        let query = Query::collection("calls")
            .where_eq("receiverId", "bob")
            .where_eq("status", "ringing");
        let mut rx = store.subscribe_query(query).await.unwrap();

        let initial = rx.recv().await.unwrap();
        assert_eq!(initial.len(), 1);
        assert_eq!(initial[0].kind, ChangeKind::Added);

        store
            .create(&path("new"), json!({"receiverId": "bob", "status": "ringing"}))
            .await
            .unwrap();
        let added = rx.recv().await.unwrap();
        assert_eq!((added[0].kind, added[0].id.as_str()), (ChangeKind::Added, "new"));

        store.update(&path("new"), DocumentUpdate::new().set("status", "busy")).await.unwrap();
        let removed = rx.recv().await.unwrap();
        assert_eq!(removed[0].kind, ChangeKind::Removed);

        // Not addressed to bob: no change record
        store
            .create(&path("other"), json!({"receiverId": "carol", "status": "ringing"}))
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let store = MemoryDocumentStore::new();
        let rx = store.subscribe_document(&path("c1")).await.unwrap();
        drop(rx);
        store.create(&path("c1"), json!({})).await.unwrap();
        assert!(store.inner.lock().await.doc_subscribers[&path("c1")].is_empty());
    }
}
