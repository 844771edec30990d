use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use murmur_call_core::adapters::{LoopbackMediaTransport, MemoryDocumentStore};
use murmur_call_core::{
    CallConfig, CallCoordinator, CallEvent, CallState, EndReason, ParticipantProfile,
    format_duration,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const EVENT_WAIT: Duration = Duration::from_secs(5);

/// One in-process user with its own coordinator
pub struct Participant {
    pub name: String,
    pub coordinator: Arc<CallCoordinator>,
    events: broadcast::Receiver<CallEvent>,
    printer: JoinHandle<()>,
}

impl Participant {
    pub async fn join(
        id: &str,
        name: &str,
        template: &CallConfig,
        store: &Arc<MemoryDocumentStore>,
    ) -> anyhow::Result<Self> {
        let config = CallConfig {
            local: ParticipantProfile::new(id).with_name(name),
            ..template.clone()
        };
        let media = Arc::new(LoopbackMediaTransport::new());
        let coordinator = CallCoordinator::new(config, store.clone(), media)?;
        let events = coordinator.subscribe_events();
        let printer = tokio::spawn(print_events(name.to_string(), coordinator.subscribe_events()));
        coordinator
            .start()
            .await
            .with_context(|| format!("starting {}", name))?;

        Ok(Self { name: name.to_string(), coordinator, events, printer })
    }

    pub fn profile(&self) -> ParticipantProfile {
        self.coordinator.local().clone()
    }

    /// Wait for the first event matching `pred`
    pub async fn wait_for<F>(&mut self, what: &str, pred: F) -> anyhow::Result<CallEvent>
    where
        F: Fn(&CallEvent) -> bool,
    {
        let deadline = tokio::time::Instant::now() + EVENT_WAIT;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, self.events.recv()).await {
                Ok(Ok(event)) if pred(&event) => return Ok(event),
                Ok(Ok(_)) => continue,
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    warn!("{} skipped {} events", self.name, skipped);
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    bail!("{} stopped publishing events", self.name)
                }
                Err(_) => bail!("{} timed out waiting for {}", self.name, what),
            }
        }
    }

    pub async fn wait_for_state(&mut self, state: CallState) -> anyhow::Result<()> {
        if self.coordinator.state().await == state {
            return Ok(());
        }
        self.wait_for(&format!("{:?}", state), |event| {
            matches!(event, CallEvent::StateChanged { new_state, .. } if *new_state == state)
        })
        .await
        .map(|_| ())
    }

    pub async fn leave(self) {
        self.coordinator.shutdown().await;
        // Let the printer drain what is already queued
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.printer.abort();
    }
}

async fn print_events(name: String, mut events: broadcast::Receiver<CallEvent>) {
    loop {
        match events.recv().await {
            Ok(CallEvent::DurationTick { .. }) => {}
            Ok(event) => info!("[{}] {}", name, describe(&event)),
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn describe(event: &CallEvent) -> String {
    match event {
        CallEvent::StateChanged { old_state, new_state, .. } => {
            format!("{:?} -> {:?}", old_state, new_state)
        }
        CallEvent::IncomingCall(incoming) => format!(
            "incoming {} call from {}",
            incoming.call_type,
            incoming.caller.display_name()
        ),
        CallEvent::RejectedBusy { caller, .. } => format!("told {} we are busy", caller),
        CallEvent::Notification { level, message } => format!("{:?}: {}", level, message),
        CallEvent::RingtoneStarted => "ringtone on".to_string(),
        CallEvent::RingtoneStopped => "ringtone off".to_string(),
        CallEvent::MediaConnected { call_id } => format!("media flowing on {}", call_id),
        CallEvent::DurationTick { elapsed, .. } => format_duration(*elapsed),
        CallEvent::CallEnded { reason, .. } => format!("call ended ({})", end_reason(reason)),
    }
}

fn end_reason(reason: &EndReason) -> String {
    match reason {
        EndReason::LocalHangup => "hung up".to_string(),
        EndReason::Declined => "declined".to_string(),
        EndReason::RemoteStatus(status) => format!("remote {}", status),
        EndReason::RingTimeout => "no answer".to_string(),
        EndReason::TransportDegraded(state) => format!("transport {:?}", state),
        EndReason::Failed(message) => format!("failed: {}", message),
    }
}
