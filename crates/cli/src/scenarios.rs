use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, ensure};
use murmur_call_core::adapters::{DocumentPath, DocumentStore, MemoryDocumentStore};
use murmur_call_core::signaling::CallDocument;
use murmur_call_core::{CallConfig, CallEvent, CallId, CallState, CallStatus, CallType};
use tracing::info;

use crate::Scenario;
use crate::participant::Participant;

pub struct Options {
    pub hold: Duration,
    pub audio_only: bool,
}

impl Options {
    fn call_type(&self) -> CallType {
        if self.audio_only { CallType::Audio } else { CallType::Video }
    }
}

pub async fn run(scenario: Scenario, template: &CallConfig, options: &Options) -> anyhow::Result<()> {
    let store = Arc::new(MemoryDocumentStore::new());
    info!("Running {:?} scenario", scenario);

    match scenario {
        Scenario::Answer => answer(template, options, &store).await,
        Scenario::Busy => busy(template, options, &store).await,
        Scenario::Decline => decline(template, options, &store).await,
    }
}

/// `caller` rings `callee` and `callee` picks up
async fn connect(
    caller: &mut Participant,
    callee: &mut Participant,
    call_type: CallType,
) -> anyhow::Result<CallId> {
    let call_id = caller.coordinator.initiate(callee.profile(), call_type).await?;
    callee
        .wait_for("incoming call", |e| matches!(e, CallEvent::IncomingCall(_)))
        .await?;
    callee.coordinator.accept().await?;

    caller.wait_for_state(CallState::Connected).await?;
    callee.wait_for_state(CallState::Connected).await?;
    Ok(call_id)
}

async fn answer(
    template: &CallConfig,
    options: &Options,
    store: &Arc<MemoryDocumentStore>,
) -> anyhow::Result<()> {
    let mut alice = Participant::join("alice", "Alice", template, store).await?;
    let mut bob = Participant::join("bob", "Bob", template, store).await?;

    let call_id = connect(&mut alice, &mut bob, options.call_type()).await?;
    let document = fetch(template, store, &call_id).await?;
    ensure!(document.status == CallStatus::Connected, "document not connected");
    ensure!(document.accepted_at.is_some(), "acceptedAt missing");

    tokio::time::sleep(options.hold).await;
    alice.coordinator.end().await?;
    bob.wait_for_state(CallState::Idle).await?;
    alice.wait_for_state(CallState::Idle).await?;

    let document = fetch(template, store, &call_id).await?;
    summary(&call_id, &document);
    alice.leave().await;
    bob.leave().await;
    Ok(())
}

async fn busy(
    template: &CallConfig,
    options: &Options,
    store: &Arc<MemoryDocumentStore>,
) -> anyhow::Result<()> {
    let mut alice = Participant::join("alice", "Alice", template, store).await?;
    let mut bob = Participant::join("bob", "Bob", template, store).await?;
    let mut carol = Participant::join("carol", "Carol", template, store).await?;

    let first = connect(&mut carol, &mut bob, options.call_type()).await?;

    let second = alice.coordinator.initiate(bob.profile(), options.call_type()).await?;
    alice
        .wait_for("busy signal", |e| {
            matches!(e, CallEvent::Notification { message, .. } if message == "Line busy")
        })
        .await?;
    alice.wait_for_state(CallState::Idle).await?;

    ensure!(
        bob.coordinator.current_call_id().await.as_ref() == Some(&first),
        "busy rejection disturbed the active call"
    );
    ensure!(bob.coordinator.state().await == CallState::Connected, "bob dropped the active call");

    summary(&second, &fetch(template, store, &second).await?);

    tokio::time::sleep(options.hold).await;
    bob.coordinator.end().await?;
    carol.wait_for_state(CallState::Idle).await?;
    summary(&first, &fetch(template, store, &first).await?);

    alice.leave().await;
    bob.leave().await;
    carol.leave().await;
    Ok(())
}

async fn decline(
    template: &CallConfig,
    options: &Options,
    store: &Arc<MemoryDocumentStore>,
) -> anyhow::Result<()> {
    let mut alice = Participant::join("alice", "Alice", template, store).await?;
    let mut bob = Participant::join("bob", "Bob", template, store).await?;

    let call_id = alice.coordinator.initiate(bob.profile(), options.call_type()).await?;
    bob.wait_for("incoming call", |e| matches!(e, CallEvent::IncomingCall(_)))
        .await?;
    bob.coordinator.decline().await?;

    alice.wait_for_state(CallState::Idle).await?;
    bob.wait_for_state(CallState::Idle).await?;

    let document = fetch(template, store, &call_id).await?;
    ensure!(document.status == CallStatus::Declined, "expected declined, got {}", document.status);
    ensure!(document.ended_at.is_some(), "endedAt missing");
    summary(&call_id, &document);

    alice.leave().await;
    bob.leave().await;
    Ok(())
}

async fn fetch(
    template: &CallConfig,
    store: &MemoryDocumentStore,
    call_id: &CallId,
) -> anyhow::Result<CallDocument> {
    let path = DocumentPath::new(&template.calls_collection, call_id.as_str());
    match store.get(&path).await? {
        Some(value) => Ok(CallDocument::from_value(&path, &value)?),
        None => bail!("call document {} is missing", path),
    }
}

fn summary(call_id: &CallId, document: &CallDocument) {
    let candidates: usize = document.candidates.values().map(Vec::len).sum();
    info!(
        "Call {}: {} -> {} ({}), status {}, {} candidates, answered: {}",
        call_id,
        document.caller_name,
        document.receiver_name,
        document.call_type,
        document.status,
        candidates,
        document.answer.is_some()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_call_core::ParticipantProfile;

    fn options() -> Options {
        Options { hold: Duration::from_millis(10), audio_only: true }
    }

    fn template() -> CallConfig {
        CallConfig::new(ParticipantProfile::new("template")).with_duration_tick(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_answer_scenario() {
        run(Scenario::Answer, &template(), &options()).await.unwrap();
    }

    #[tokio::test]
    async fn test_busy_scenario() {
        run(Scenario::Busy, &template(), &options()).await.unwrap();
    }

    #[tokio::test]
    async fn test_decline_scenario() {
        run(Scenario::Decline, &template(), &options()).await.unwrap();
    }
}
