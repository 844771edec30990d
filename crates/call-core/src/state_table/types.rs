use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Local state of the coordinator's single call slot
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum CallState {
    /// No call; ready to place or receive one
    Idle,
    /// Caller acquiring media and publishing the offer
    Placing,
    /// Offer published, waiting for the callee's answer
    OutgoingRinging,
    /// Incoming call surfaced, waiting for accept/decline
    IncomingRinging,
    /// Callee producing and publishing its answer
    Connecting,
    /// Both descriptions applied
    Connected,
    /// Teardown in progress; always followed by Idle
    Ended,
}

impl CallState {
    /// Whether the call slot is occupied
    pub fn is_active(&self) -> bool {
        !matches!(self, CallState::Idle | CallState::Ended)
    }
}

/// Event types that trigger transitions.
///
/// Payloads travel in [`crate::state_machine::SessionEvent`]; the table only
/// keys on the type.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum EventType {
    // User-initiated events
    MakeCall,
    AcceptCall,
    DeclineCall,
    HangupCall,

    // Store events
    IncomingCall,
    AnswerReceived,
    RemoteCandidatesReceived,
    RemoteTerminated,

    // Transport events
    LocalCandidateGathered,
    TransportConnected,
    TransportDegraded,

    // Timers
    RingTimeout,

    // Internal coordination events
    OfferPublished,
    AnswerPublished,
    CleanupComplete,
}

impl EventType {
    /// User-initiated events fail loudly when no transition matches;
    /// everything else is dropped
    pub fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            EventType::MakeCall | EventType::AcceptCall | EventType::DeclineCall | EventType::HangupCall
        )
    }
}

/// Key for looking up transitions in the state table
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct StateKey {
    pub state: CallState,
    pub event: EventType,
}

impl StateKey {
    pub fn new(state: CallState, event: EventType) -> Self {
        Self { state, event }
    }
}

/// Conditions that must hold for a transition to fire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Guard {
    /// An incoming call is pending
    HasPendingIncoming,
    /// No remote description applied yet (answer idempotency)
    RemoteDescriptionNotApplied,
    /// A peer negotiation object exists
    HasPeerNegotiation,
    /// The signaling document is not terminal
    SessionNotTerminal,
}

/// Side effects executed during a transition, in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    // Call setup
    PrepareOutgoing,
    StorePendingIncoming,
    VerifyStillRinging,
    AcquireLocalMedia,
    CreatePeerNegotiation,
    CreateOffer,
    CreateSessionDocument,
    SubscribeSessionDocument,
    ApplyRemoteOffer,
    CreateAnswer,
    WriteAnswer,
    ApplyRemoteAnswer,

    // Candidate relay
    PublishLocalCandidate,
    ApplyRemoteCandidates,
    ReplayBufferedCandidates,

    // Status writes
    WriteDeclined,
    MarkIncomingBusy,
    RecordRemoteStatus,

    // Timers and ringtone
    StartRingtone,
    StopRingtone,
    StartRingTimer,
    CancelRingTimer,
    StartDurationTimer,
    StopDurationTimer,

    // Teardown
    ReleaseLocalMedia,
    ClosePeerNegotiation,
    StopSubscriptions,
    WriteEnded,
    ResetSession,

    // Application callbacks
    SurfaceIncomingCall,
    PublishMediaConnected,
    Notify(NotifyKind),
}

/// User-visible notifications the table can raise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyKind {
    Calling,
    Connected,
    CallDeclined,
    RemoteTerminated,
    NoAnswer,
    MissedCall,
    Disconnected,
    CallEnded,
}

/// Transition definition: what happens when an event occurs in a state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transition {
    /// Conditions that must be true for this transition
    pub guards: Vec<Guard>,

    /// Actions to execute
    pub actions: Vec<Action>,

    /// Next state (if changing)
    pub next_state: Option<CallState>,

    /// Internal event processed right after this transition completes
    pub follow_up: Option<EventType>,
}

/// States that must always have exit transitions
const CORE_STATES_REQUIRING_EXITS: &[CallState] = &[
    CallState::Idle,
    CallState::Placing,
    CallState::OutgoingRinging,
    CallState::IncomingRinging,
    CallState::Connecting,
    CallState::Connected,
    CallState::Ended,
];

/// Master state table containing all transitions
pub struct MasterStateTable {
    transitions: HashMap<StateKey, Transition>,
    /// Transitions that apply to any state without an exact entry
    wildcard_transitions: HashMap<EventType, Transition>,
}

impl MasterStateTable {
    pub fn new() -> Self {
        Self {
            transitions: HashMap::new(),
            wildcard_transitions: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: StateKey, transition: Transition) {
        self.transitions.insert(key, transition);
    }

    pub fn insert_wildcard(&mut self, event: EventType, transition: Transition) {
        self.wildcard_transitions.insert(event, transition);
    }

    /// Exact match first, then the wildcard for the event
    pub fn get(&self, key: &StateKey) -> Option<&Transition> {
        self.transitions
            .get(key)
            .or_else(|| self.wildcard_transitions.get(&key.event))
    }

    pub fn has_transition(&self, key: &StateKey) -> bool {
        self.get(key).is_some()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len() + self.wildcard_transitions.len()
    }

    /// Collect all states referenced in this table
    pub fn collect_used_states(&self) -> HashSet<CallState> {
        let mut states = HashSet::new();
        for (key, transition) in &self.transitions {
            states.insert(key.state);
            if let Some(next_state) = transition.next_state {
                states.insert(next_state);
            }
        }
        for transition in self.wildcard_transitions.values() {
            if let Some(next_state) = transition.next_state {
                states.insert(next_state);
            }
        }
        states
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for state in CORE_STATES_REQUIRING_EXITS {
            let has_exact_exit = self.transitions.keys().any(|k| k.state == *state);
            if !has_exact_exit && self.wildcard_transitions.is_empty() {
                errors.push(format!("Core state {:?} has no exit transitions", state));
            }
        }

        // Ended must always drain back to Idle or the call slot never frees up
        let drains = self
            .transitions
            .get(&StateKey::new(CallState::Ended, EventType::CleanupComplete))
            .and_then(|t| t.next_state);
        if drains != Some(CallState::Idle) {
            errors.push("Ended must return to Idle on CleanupComplete".to_string());
        }

        // Anything that enters Ended has to schedule the cleanup
        let mut all = self
            .transitions
            .iter()
            .map(|(k, t)| (format!("{:?}/{:?}", k.state, k.event), t))
            .collect::<Vec<_>>();
        all.extend(
            self.wildcard_transitions
                .iter()
                .map(|(e, t)| (format!("*/{:?}", e), t)),
        );
        for (name, transition) in all {
            if transition.next_state == Some(CallState::Ended)
                && transition.follow_up != Some(EventType::CleanupComplete)
            {
                errors.push(format!("{} enters Ended without CleanupComplete", name));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for MasterStateTable {
    fn default() -> Self {
        Self::new()
    }
}
