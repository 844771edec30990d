//! Shared harness: coordinators wired to one in-memory store

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use murmur_call_core::adapters::{
    DocumentPath, DocumentStore, FieldValue, LoopbackMediaTransport, LoopbackNegotiation,
    MemoryDocumentStore, WriteRecord,
};
use murmur_call_core::signaling::CallDocument;
use murmur_call_core::{CallConfig, CallCoordinator, CallEvent, CallId, CallState, ParticipantProfile};
use serde_json::Value;
use tokio::sync::broadcast;

pub const WAIT: Duration = Duration::from_secs(3);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn profile(id: &str) -> ParticipantProfile {
    let mut name = id.to_string();
    if let Some(first) = name.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    ParticipantProfile::new(id).with_name(name)
}

pub fn config(id: &str) -> CallConfig {
    CallConfig::new(profile(id)).with_duration_tick(Duration::from_millis(50))
}

/// One participant: coordinator, its media transport and an event feed
pub struct Peer {
    pub coordinator: Arc<CallCoordinator>,
    pub media: Arc<LoopbackMediaTransport>,
    pub events: broadcast::Receiver<CallEvent>,
}

impl Peer {
    pub async fn start(store: &Arc<MemoryDocumentStore>, config: CallConfig) -> Self {
        Self::start_with_media(store, config, Arc::new(LoopbackMediaTransport::new())).await
    }

    pub async fn start_with_media(
        store: &Arc<MemoryDocumentStore>,
        config: CallConfig,
        media: Arc<LoopbackMediaTransport>,
    ) -> Self {
        let coordinator = CallCoordinator::new(config, store.clone(), media.clone())
            .expect("valid config");
        let events = coordinator.subscribe_events();
        coordinator.start().await.expect("coordinator starts");
        Self { coordinator, media, events }
    }

    pub async fn wait_for_state(&self, state: CallState) {
        let coordinator = self.coordinator.clone();
        let reached = wait_until(move || {
            let coordinator = coordinator.clone();
            async move { coordinator.state().await == state }
        })
        .await;
        assert!(
            reached,
            "{} never reached {:?}, stuck in {:?}",
            self.coordinator.local().id,
            state,
            self.coordinator.state().await
        );
    }

    /// Next event matching `pred`, skipping the rest
    pub async fn next_event<F>(&mut self, pred: F) -> CallEvent
    where
        F: Fn(&CallEvent) -> bool,
    {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, self.events.recv()).await {
                Ok(Ok(event)) if pred(&event) => return event,
                Ok(Ok(_)) | Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(broadcast::error::RecvError::Closed)) => panic!("event channel closed"),
                Err(_) => panic!("timed out waiting for event"),
            }
        }
    }

    /// Assert the call is fully released
    pub async fn assert_released(&self) {
        assert_eq!(self.coordinator.state().await, CallState::Idle);
        assert_eq!(self.coordinator.current_call_id().await, None);
        assert!(!self.coordinator.holds_media().await);
        assert_eq!(self.coordinator.active_task_count().await, 0);
        assert_eq!(self.media.live_media_count(), 0);
    }
}

/// Poll `check` until it holds or [`WAIT`] passes
pub async fn wait_until<F, Fut>(check: F) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check().await
}

pub fn call_path(call_id: &CallId) -> DocumentPath {
    DocumentPath::new("calls", call_id.as_str())
}

pub async fn document(store: &MemoryDocumentStore, call_id: &CallId) -> CallDocument {
    let path = call_path(call_id);
    let value = store.get(&path).await.unwrap().expect("call document exists");
    CallDocument::from_value(&path, &value).unwrap()
}

/// Wait until the negotiation has applied `count` remote candidates
pub async fn wait_for_applied_candidates(negotiation: &Arc<LoopbackNegotiation>, count: usize) -> bool {
    let negotiation = negotiation.clone();
    wait_until(move || {
        let negotiation = negotiation.clone();
        async move { negotiation.applied_candidates().len() == count }
    })
    .await
}

/// Wait until the call document satisfies `check`
pub async fn wait_for_document<F>(store: &MemoryDocumentStore, call_id: &CallId, check: F) -> bool
where
    F: Fn(&CallDocument) -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        if check(&document(store, call_id).await) {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn written_status(write: &WriteRecord) -> Option<String> {
    match write {
        WriteRecord::Update { update, .. } => update.fields.iter().find_map(|(field, op)| {
            match (field.as_str(), op) {
                ("status", FieldValue::Set(Value::String(status))) => Some(status.clone()),
                _ => None,
            }
        }),
        WriteRecord::Create { .. } => None,
    }
}

/// Number of writes to the document after the one that set `status`
pub async fn writes_after_status(store: &MemoryDocumentStore, call_id: &CallId, status: &str) -> usize {
    let writes = store.writes_for(&call_path(call_id)).await;
    let position = writes
        .iter()
        .position(|w| written_status(w).as_deref() == Some(status))
        .expect("status was written");
    writes.len() - position - 1
}

/// Status values written by updates to the document, in order
pub async fn status_writes(store: &MemoryDocumentStore, call_id: &CallId) -> Vec<String> {
    store
        .writes_for(&call_path(call_id))
        .await
        .iter()
        .filter_map(written_status)
        .collect()
}
