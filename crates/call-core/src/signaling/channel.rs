//! Typed signaling operations over the document store

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::document::CallDocument;
use crate::adapters::{
    DocumentChange, DocumentPath, DocumentSnapshot, DocumentStore, DocumentUpdate, Query,
};
use crate::errors::{CallError, Result};
use crate::types::{CallId, CallStatus, IceCandidate, ParticipantId, SessionDescription};

/// Signaling channel bound to one calls collection
#[derive(Clone)]
pub struct CallSignaling {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl CallSignaling {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self { store, collection: collection.into() }
    }

    pub fn path(&self, call_id: &CallId) -> DocumentPath {
        DocumentPath::new(self.collection.clone(), call_id.as_str())
    }

    pub async fn create_call(&self, call_id: &CallId, document: &CallDocument) -> Result<()> {
        let path = self.path(call_id);
        let fields = document.to_value()?;
        self.store
            .create(&path, fields)
            .await
            .map_err(|e| CallError::signaling_write("create call", e))?;
        info!("Published call document {}", path);
        Ok(())
    }

    /// Current document, `None` when it no longer exists
    pub async fn fetch(&self, call_id: &CallId) -> Result<Option<CallDocument>> {
        let path = self.path(call_id);
        match self.store.get(&path).await? {
            Some(value) => Ok(Some(CallDocument::from_value(&path, &value)?)),
            None => Ok(None),
        }
    }

    pub async fn append_candidate(
        &self,
        call_id: &CallId,
        participant: &ParticipantId,
        candidate: &IceCandidate,
    ) -> Result<()> {
        let value = serde_json::to_value(candidate)
            .map_err(|e| CallError::internal(format!("candidate serialization: {}", e)))?;
        let update = DocumentUpdate::new()
            .array_union(format!("candidates.{}", participant), vec![value]);
        self.write(call_id, "append candidate", update).await
    }

    /// Publish the callee's answer; the call becomes connected in the same write
    pub async fn write_answer(&self, call_id: &CallId, answer: &SessionDescription) -> Result<()> {
        let answer = serde_json::to_value(answer)
            .map_err(|e| CallError::internal(format!("answer serialization: {}", e)))?;
        let update = DocumentUpdate::new()
            .set("answer", answer)
            .set("status", CallStatus::Connected.as_str())
            .server_timestamp("acceptedAt");
        self.write(call_id, "write answer", update).await
    }

    /// Write a status; `ended` and `declined` also stamp `endedAt`
    pub async fn write_status(&self, call_id: &CallId, status: CallStatus) -> Result<()> {
        let mut update = DocumentUpdate::new().set("status", status.as_str());
        if matches!(status, CallStatus::Ended | CallStatus::Declined) {
            update = update.server_timestamp("endedAt");
        }
        self.write(call_id, "write status", update).await
    }

    pub async fn mark_busy(&self, call_id: &CallId) -> Result<()> {
        self.write_status(call_id, CallStatus::Busy).await
    }

    pub async fn subscribe_call(
        &self,
        call_id: &CallId,
    ) -> Result<mpsc::UnboundedReceiver<DocumentSnapshot>> {
        Ok(self.store.subscribe_document(&self.path(call_id)).await?)
    }

    /// Ringing calls addressed to `me`
    pub async fn subscribe_incoming(
        &self,
        me: &ParticipantId,
    ) -> Result<mpsc::UnboundedReceiver<Vec<DocumentChange>>> {
        let query = Query::collection(self.collection.clone())
            .where_eq("receiverId", Value::from(me.as_str()))
            .where_eq("status", CallStatus::Ringing.as_str());
        Ok(self.store.subscribe_query(query).await?)
    }

    async fn write(&self, call_id: &CallId, operation: &str, update: DocumentUpdate) -> Result<()> {
        let path = self.path(call_id);
        debug!("{} on {}", operation, path);
        self.store
            .update(&path, update)
            .await
            .map_err(|e| CallError::signaling_write(operation, e))
    }
}
