//! The coordinator's single call slot

use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

use crate::adapters::{LocalMedia, PeerNegotiation};
use crate::signaling::{CallDocument, CandidateTracker};
use crate::state_table::CallState;
use crate::types::{
    CallId, CallStatus, CallType, EndReason, ParticipantProfile, Role, SessionDescription,
};

/// Background tasks owned by the current call
#[derive(Default)]
pub struct SessionTasks {
    pub document_subscription: Option<JoinHandle<()>>,
    pub peer_events: Option<JoinHandle<()>>,
    pub ring_timer: Option<JoinHandle<()>>,
    pub duration_timer: Option<JoinHandle<()>>,
}

impl SessionTasks {
    pub fn cancel_ring_timer(&mut self) {
        if let Some(handle) = self.ring_timer.take() {
            handle.abort();
        }
    }

    pub fn cancel_duration_timer(&mut self) {
        if let Some(handle) = self.duration_timer.take() {
            handle.abort();
        }
    }

    pub fn cancel_subscriptions(&mut self) {
        for handle in [self.document_subscription.take(), self.peer_events.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
    }

    pub fn abort_all(&mut self) {
        self.cancel_ring_timer();
        self.cancel_duration_timer();
        self.cancel_subscriptions();
    }

    pub fn running(&self) -> usize {
        [
            &self.document_subscription,
            &self.peer_events,
            &self.ring_timer,
            &self.duration_timer,
        ]
        .iter()
        .filter(|h| h.as_ref().map_or(false, |h| !h.is_finished()))
        .count()
    }
}

/// Everything the coordinator knows about the current call
pub struct SessionState {
    pub state: CallState,
    pub call_id: Option<CallId>,
    pub role: Option<Role>,
    pub call_type: Option<CallType>,
    pub peer: Option<ParticipantProfile>,

    /// Ringing document waiting for accept/decline
    pub pending_incoming: Option<CallDocument>,
    pub latest_document: Option<CallDocument>,
    /// Last status seen in the document or written by us
    pub observed_status: Option<CallStatus>,
    /// The call document exists and is ours to write
    pub document_linked: bool,

    pub local_media: Option<Box<dyn LocalMedia>>,
    pub negotiation: Option<Arc<dyn PeerNegotiation>>,
    pub local_description: Option<SessionDescription>,
    pub candidates: CandidateTracker,

    pub tasks: SessionTasks,
    pub ringtone_playing: bool,
    pub connected_at: Option<Instant>,
    pub end_reason: Option<EndReason>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            state: CallState::Idle,
            call_id: None,
            role: None,
            call_type: None,
            peer: None,
            pending_incoming: None,
            latest_document: None,
            observed_status: None,
            document_linked: false,
            local_media: None,
            negotiation: None,
            local_description: None,
            candidates: CandidateTracker::new(),
            tasks: SessionTasks::default(),
            ringtone_playing: false,
            connected_at: None,
            end_reason: None,
        }
    }

    /// Whether the document already reached ended/declined/busy
    pub fn is_terminal(&self) -> bool {
        self.observed_status.map_or(false, |s| s.is_terminal())
    }

    /// Whether the document may still be written
    pub fn can_write_document(&self) -> bool {
        self.call_id.is_some() && self.document_linked && !self.is_terminal()
    }

    pub fn has_remote_description(&self) -> bool {
        self.negotiation
            .as_ref()
            .map_or(false, |n| n.has_remote_description())
    }

    /// Whether `call_id` is the call this slot holds
    pub fn is_current(&self, call_id: &CallId) -> bool {
        self.call_id.as_ref() == Some(call_id)
    }

    /// Drop all per-call data and return to an empty slot
    pub fn reset(&mut self) {
        self.tasks.abort_all();
        let state = self.state;
        *self = SessionState::new();
        self.state = state;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
