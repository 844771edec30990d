//! Event router
//!
//! Every source of events (document subscriptions, the incoming-call query,
//! peer negotiation events, timers) forwards into one channel. A single loop
//! in the coordinator drains it, so events are never processed concurrently.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::adapters::{DocumentChange, DocumentSnapshot, PeerEvent};
use crate::state_machine::SessionEvent;
use crate::types::{CallId, ConnectionState};

/// An event waiting for the coordinator loop
#[derive(Debug)]
pub enum RoutedEvent {
    /// Event for `call_id`; dropped if that call is no longer current
    Call { call_id: CallId, event: SessionEvent },
    /// New snapshot of the document of `call_id`
    Snapshot { call_id: CallId, snapshot: DocumentSnapshot },
    /// Changes to the incoming-call query
    Incoming(Vec<DocumentChange>),
}

/// Sending half of the router channel
#[derive(Clone)]
pub struct EventRouter {
    tx: mpsc::Sender<RoutedEvent>,
}

impl EventRouter {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<RoutedEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queue an event; false once the loop is gone
    pub async fn send(&self, event: RoutedEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    /// Forward document snapshots for `call_id`
    pub fn forward_snapshots(
        &self,
        call_id: CallId,
        mut snapshots: mpsc::UnboundedReceiver<DocumentSnapshot>,
    ) -> JoinHandle<()> {
        let router = self.clone();
        tokio::spawn(async move {
            while let Some(snapshot) = snapshots.recv().await {
                trace!("Snapshot for {}", call_id);
                let routed = RoutedEvent::Snapshot { call_id: call_id.clone(), snapshot };
                if !router.send(routed).await {
                    break;
                }
            }
            debug!("Document subscription for {} closed", call_id);
        })
    }

    /// Forward local candidates and connection state changes for `call_id`
    pub fn forward_peer_events(
        &self,
        call_id: CallId,
        mut events: mpsc::UnboundedReceiver<PeerEvent>,
    ) -> JoinHandle<()> {
        let router = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(event) = session_event_for(event) else {
                    continue;
                };
                let routed = RoutedEvent::Call { call_id: call_id.clone(), event };
                if !router.send(routed).await {
                    break;
                }
            }
            debug!("Peer events for {} closed", call_id);
        })
    }

    /// Forward incoming-call query changes
    pub fn forward_incoming(
        &self,
        mut changes: mpsc::UnboundedReceiver<Vec<DocumentChange>>,
    ) -> JoinHandle<()> {
        let router = self.clone();
        tokio::spawn(async move {
            while let Some(batch) = changes.recv().await {
                if !router.send(RoutedEvent::Incoming(batch)).await {
                    break;
                }
            }
            debug!("Incoming call listener closed");
        })
    }
}

fn session_event_for(event: PeerEvent) -> Option<SessionEvent> {
    match event {
        PeerEvent::LocalCandidate(candidate) => {
            Some(SessionEvent::LocalCandidateGathered { candidate })
        }
        PeerEvent::ConnectionStateChanged(ConnectionState::Connected) => {
            Some(SessionEvent::TransportConnected)
        }
        PeerEvent::ConnectionStateChanged(state) if state.is_degraded() => {
            Some(SessionEvent::TransportDegraded { state })
        }
        PeerEvent::ConnectionStateChanged(_) => None,
    }
}
