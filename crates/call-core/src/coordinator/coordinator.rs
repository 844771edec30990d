use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::router::{EventRouter, RoutedEvent};
use crate::adapters::{ChangeKind, DocumentStore, MediaTransport, TrackKind};
use crate::config::CallConfig;
use crate::errors::{CallError, Result};
use crate::signaling::{CallDocument, CallSignaling};
use crate::state_machine::{ActionContext, SessionEvent, SessionState, StateMachine};
use crate::state_table::CallState;
use crate::types::{CallEvent, CallId, CallStatus, CallType, ParticipantProfile};

const EVENT_BROADCAST_CAPACITY: usize = 256;

/// Coordinates at most one call for one participant.
///
/// User operations and routed events all lock the same session, so they
/// are applied one at a time in arrival order.
pub struct CallCoordinator {
    ctx: ActionContext,
    machine: StateMachine,
    session: Mutex<SessionState>,
    router_rx: Mutex<Option<mpsc::Receiver<RoutedEvent>>>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl CallCoordinator {
    pub fn new(
        config: CallConfig,
        store: Arc<dyn DocumentStore>,
        media: Arc<dyn MediaTransport>,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let signaling = CallSignaling::new(store, config.calls_collection.clone());
        let (router, router_rx) = EventRouter::new(config.event_channel_capacity);
        let (events, _) = broadcast::channel(EVENT_BROADCAST_CAPACITY);

        info!("Creating call coordinator for {}", config.local.id);

        Ok(Arc::new(Self {
            ctx: ActionContext { config, signaling, media, events, router },
            machine: StateMachine::with_default_table(),
            session: Mutex::new(SessionState::new()),
            router_rx: Mutex::new(Some(router_rx)),
            background: Mutex::new(Vec::new()),
        }))
    }

    /// Start listening for incoming calls and processing routed events
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let router_rx = self
            .router_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| CallError::internal("coordinator already started"))?;

        let incoming = self
            .ctx
            .signaling
            .subscribe_incoming(&self.ctx.config.local.id)
            .await?;

        let mut background = self.background.lock().await;
        background.push(self.ctx.router.forward_incoming(incoming));
        background.push(tokio::spawn(run_event_loop(Arc::downgrade(self), router_rx)));

        info!("Call coordinator for {} started", self.ctx.config.local.id);
        Ok(())
    }

    /// Place a call; returns once the offer is published and it rings
    pub async fn initiate(&self, callee: ParticipantProfile, call_type: CallType) -> Result<CallId> {
        if callee.id.as_str().trim().is_empty() {
            return Err(CallError::InvalidCallee("no callee selected".to_string()));
        }
        if callee.id == self.ctx.config.local.id {
            return Err(CallError::InvalidCallee("cannot call yourself".to_string()));
        }

        let mut session = self.session.lock().await;
        if session.state != CallState::Idle {
            return Err(CallError::CallInProgress);
        }

        self.machine
            .process_event(&mut session, &self.ctx, SessionEvent::MakeCall { callee, call_type })
            .await?;

        session
            .call_id
            .clone()
            .ok_or_else(|| CallError::internal("call ended while being placed"))
    }

    /// Answer the pending incoming call
    pub async fn accept(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.state != CallState::IncomingRinging {
            return Err(CallError::NoPendingCall);
        }
        self.machine
            .process_event(&mut session, &self.ctx, SessionEvent::AcceptCall)
            .await
    }

    /// Reject the pending incoming call
    pub async fn decline(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.state != CallState::IncomingRinging {
            return Err(CallError::NoPendingCall);
        }
        self.machine
            .process_event(&mut session, &self.ctx, SessionEvent::DeclineCall)
            .await
    }

    /// Hang up; does nothing when there is no call
    pub async fn end(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        self.machine
            .process_event(&mut session, &self.ctx, SessionEvent::HangupCall)
            .await
    }

    /// Flip the microphone; returns true when now muted
    pub async fn toggle_mute(&self) -> Result<bool> {
        let enabled = self.toggle_track(TrackKind::Audio).await?;
        info!("Microphone {}", if enabled { "unmuted" } else { "muted" });
        Ok(!enabled)
    }

    /// Flip the camera; returns true when now enabled
    pub async fn toggle_video(&self) -> Result<bool> {
        let enabled = self.toggle_track(TrackKind::Video).await?;
        info!("Camera {}", if enabled { "on" } else { "off" });
        Ok(enabled)
    }

    async fn toggle_track(&self, kind: TrackKind) -> Result<bool> {
        let name = match kind {
            TrackKind::Audio => "audio",
            TrackKind::Video => "video",
        };
        let mut session = self.session.lock().await;
        session
            .local_media
            .as_mut()
            .and_then(|media| media.toggle_track(kind))
            .ok_or_else(|| CallError::NoLocalTrack(name.to_string()))
    }

    pub async fn state(&self) -> CallState {
        self.session.lock().await.state
    }

    pub async fn current_call_id(&self) -> Option<CallId> {
        self.session.lock().await.call_id.clone()
    }

    /// Number of per-call background tasks still running
    pub async fn active_task_count(&self) -> usize {
        self.session.lock().await.tasks.running()
    }

    /// Whether local media or a peer negotiation is still held
    pub async fn holds_media(&self) -> bool {
        let session = self.session.lock().await;
        session.local_media.is_some() || session.negotiation.is_some()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CallEvent> {
        self.ctx.events.subscribe()
    }

    pub fn local(&self) -> &ParticipantProfile {
        &self.ctx.config.local
    }

    /// End any call and stop all background work
    pub async fn shutdown(&self) {
        if let Err(e) = self.end().await {
            warn!("Error ending call during shutdown: {}", e);
        }
        for handle in self.background.lock().await.drain(..) {
            handle.abort();
        }
        info!("Call coordinator for {} shut down", self.ctx.config.local.id);
    }

    async fn handle_routed(&self, routed: RoutedEvent) {
        match routed {
            RoutedEvent::Call { call_id, event } => {
                let mut session = self.session.lock().await;
                if !session.is_current(&call_id) {
                    debug!("Dropping {:?} for stale call {}", event.event_type(), call_id);
                    return;
                }
                if let Err(e) = self.machine.process_event(&mut session, &self.ctx, event).await {
                    warn!("Event for {} failed: {}", call_id, e);
                }
            }
            RoutedEvent::Snapshot { call_id, snapshot } => {
                let mut session = self.session.lock().await;
                if !session.is_current(&call_id) {
                    debug!("Dropping snapshot for stale call {}", call_id);
                    return;
                }
                let Some(role) = session.role else {
                    return;
                };

                let events = match &snapshot.data {
                    Some(data) => match CallDocument::from_value(&snapshot.path, data) {
                        Ok(document) => {
                            let events = SessionEvent::from_document(role, &document);
                            session.observed_status = Some(document.status);
                            session.latest_document = Some(document);
                            events
                        }
                        Err(e) => {
                            warn!("Ignoring unreadable snapshot of {}: {}", snapshot.path, e);
                            return;
                        }
                    },
                    None => {
                        info!("Call document {} disappeared", snapshot.path);
                        session.document_linked = false;
                        vec![SessionEvent::RemoteTerminated { status: CallStatus::Ended }]
                    }
                };

                for event in events {
                    // An earlier event may have ended the call
                    if !session.is_current(&call_id) {
                        break;
                    }
                    if let Err(e) = self.machine.process_event(&mut session, &self.ctx, event).await {
                        warn!("Snapshot event for {} failed: {}", call_id, e);
                    }
                }
            }
            RoutedEvent::Incoming(changes) => {
                for change in changes {
                    if change.kind != ChangeKind::Added {
                        continue;
                    }
                    let call_id = CallId(change.id);
                    let path = self.ctx.signaling.path(&call_id);
                    let document = match CallDocument::from_value(&path, &change.data) {
                        Ok(document) => document,
                        Err(e) => {
                            warn!("Ignoring unreadable incoming call {}: {}", call_id, e);
                            continue;
                        }
                    };
                    if document.status != CallStatus::Ringing {
                        continue;
                    }

                    let mut session = self.session.lock().await;
                    let event = SessionEvent::IncomingCall { call_id: call_id.clone(), document };
                    if let Err(e) = self.machine.process_event(&mut session, &self.ctx, event).await {
                        warn!("Incoming call {} failed: {}", call_id, e);
                    }
                }
            }
        }
    }
}

impl Drop for CallCoordinator {
    fn drop(&mut self) {
        for handle in self.background.get_mut().drain(..) {
            handle.abort();
        }
        self.session.get_mut().tasks.abort_all();
    }
}

async fn run_event_loop(coordinator: Weak<CallCoordinator>, mut rx: mpsc::Receiver<RoutedEvent>) {
    while let Some(routed) = rx.recv().await {
        let Some(coordinator) = coordinator.upgrade() else {
            break;
        };
        coordinator.handle_routed(routed).await;
    }
    debug!("Call event loop stopped");
}
