//! Caller-side signaling properties, driven by writing the callee's half of
//! the document by hand

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use murmur_call_core::adapters::{DocumentStore, DocumentUpdate, MemoryDocumentStore};
use murmur_call_core::signaling::CallSignaling;
use murmur_call_core::{CallId, CallState, CallType, IceCandidate, SessionDescription};
use pretty_assertions::assert_eq;
use serde_json::json;

async fn ringing_call(store: &Arc<MemoryDocumentStore>) -> (Peer, CallId) {
    init_tracing();
    let alice = Peer::start(store, config("alice")).await;
    let call_id = alice
        .coordinator
        .initiate(profile("bob"), CallType::Audio)
        .await
        .unwrap();
    (alice, call_id)
}

async fn append_bob_candidate(store: &MemoryDocumentStore, call_id: &CallId, candidate: &str) {
    let update = DocumentUpdate::new().array_union(
        "candidates.bob",
        vec![json!({"candidate": candidate, "sdpMid": "0", "sdpMLineIndex": 0})],
    );
    store.update(&call_path(call_id), update).await.unwrap();
}

fn candidate_names(candidates: Vec<IceCandidate>) -> Vec<String> {
    candidates.into_iter().map(|c| c.candidate).collect()
}

#[tokio::test]
async fn test_early_candidates_are_replayed_in_order() {
    let store = Arc::new(MemoryDocumentStore::new());
    let (alice, call_id) = ringing_call(&store).await;
    let negotiation = alice.media.last_negotiation().unwrap();

    for name in ["cand-0", "cand-1", "cand-2"] {
        append_bob_candidate(&store, &call_id, name).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(negotiation.applied_candidates().is_empty(), "no remote description yet");
    assert_eq!(alice.coordinator.state().await, CallState::OutgoingRinging);

    let signaling = CallSignaling::new(store.clone(), "calls");
    signaling
        .write_answer(&call_id, &SessionDescription::answer("v=0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\n"))
        .await
        .unwrap();
    alice.wait_for_state(CallState::Connected).await;

    assert!(wait_for_applied_candidates(&negotiation, 3).await);
    assert_eq!(
        candidate_names(negotiation.applied_candidates()),
        vec!["cand-0", "cand-1", "cand-2"]
    );

    // Later candidates go straight through
    append_bob_candidate(&store, &call_id, "cand-3").await;
    assert!(wait_for_applied_candidates(&negotiation, 4).await);
    assert_eq!(negotiation.applied_candidates()[3].candidate, "cand-3");

    alice.coordinator.end().await.unwrap();
}

#[tokio::test]
async fn test_answer_applied_once() {
    let store = Arc::new(MemoryDocumentStore::new());
    let (alice, call_id) = ringing_call(&store).await;
    let negotiation = alice.media.last_negotiation().unwrap();
    let signaling = CallSignaling::new(store.clone(), "calls");
    let answer = SessionDescription::answer("v=0");

    // Two answer writes back to back, then more snapshots carrying it
    signaling.write_answer(&call_id, &answer).await.unwrap();
    store
        .update(&call_path(&call_id), DocumentUpdate::new().set("answer", json!(answer)))
        .await
        .unwrap();
    alice.wait_for_state(CallState::Connected).await;

    for n in 0..3 {
        append_bob_candidate(&store, &call_id, &format!("cand-{}", n)).await;
    }
    assert!(wait_for_applied_candidates(&negotiation, 3).await);

    assert_eq!(negotiation.remote_description_count(), 1);
    assert_eq!(alice.coordinator.state().await, CallState::Connected);
    alice.coordinator.end().await.unwrap();
}

#[tokio::test]
async fn test_bad_candidate_is_dropped() {
    let store = Arc::new(MemoryDocumentStore::new());
    let (alice, call_id) = ringing_call(&store).await;
    let negotiation = alice.media.last_negotiation().unwrap();

    CallSignaling::new(store.clone(), "calls")
        .write_answer(&call_id, &SessionDescription::answer("v=0"))
        .await
        .unwrap();
    alice.wait_for_state(CallState::Connected).await;

    append_bob_candidate(&store, &call_id, "").await;
    append_bob_candidate(&store, &call_id, "cand-ok").await;
    assert!(wait_for_applied_candidates(&negotiation, 1).await);

    assert_eq!(candidate_names(negotiation.applied_candidates()), vec!["cand-ok"]);
    assert_eq!(alice.coordinator.state().await, CallState::Connected);
    alice.coordinator.end().await.unwrap();
}

#[tokio::test]
async fn test_remote_end_while_ringing_adds_no_write() {
    let store = Arc::new(MemoryDocumentStore::new());
    let (alice, call_id) = ringing_call(&store).await;

    store
        .update(&call_path(&call_id), DocumentUpdate::new().set("status", "ended"))
        .await
        .unwrap();
    alice.wait_for_state(CallState::Idle).await;
    alice.assert_released().await;

    assert_eq!(status_writes(&store, &call_id).await, vec!["ended"]);
}
