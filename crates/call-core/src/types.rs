//! Core types for call-core
//!
//! Identifiers, the values exchanged through the signaling document and the
//! events the coordinator publishes to the application.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Identity of a participant (the authenticated user id)
#[derive(Debug, Clone, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Identifier of a call, also the document id under the calls collection
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub String);

impl CallId {
    /// Build a call id from caller, callee and creation time
    pub fn generate(caller: &ParticipantId, callee: &ParticipantId) -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        Self(format!("{}_{}_{}", caller, callee, millis))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CallId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Kind of call
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Audio,
    Video,
}

impl CallType {
    pub fn wants_video(&self) -> bool {
        matches!(self, CallType::Video)
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallType::Audio => write!(f, "Audio call"),
            CallType::Video => write!(f, "Video call"),
        }
    }
}

/// Status field of the signaling document
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Ringing,
    Connected,
    Ended,
    Declined,
    Busy,
}

impl CallStatus {
    /// Terminal statuses admit no further document mutation
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallStatus::Ended | CallStatus::Declined | CallStatus::Busy)
    }

    /// Whether the document may move from `self` to `next`
    pub fn can_transition_to(&self, next: CallStatus) -> bool {
        match (self, next) {
            (CallStatus::Ringing, CallStatus::Connected)
            | (CallStatus::Ringing, CallStatus::Declined)
            | (CallStatus::Ringing, CallStatus::Busy)
            | (CallStatus::Ringing, CallStatus::Ended)
            | (CallStatus::Connected, CallStatus::Ended) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Ringing => "ringing",
            CallStatus::Connected => "connected",
            CallStatus::Ended => "ended",
            CallStatus::Declined => "declined",
            CallStatus::Busy => "busy",
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the call this coordinator plays
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Role {
    Caller,
    Callee,
}

/// Session description type
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// Opaque session description blob (type + payload)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self { sdp_type: SdpType::Offer, sdp: sdp.into() }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self { sdp_type: SdpType::Answer, sdp: sdp.into() }
    }
}

/// A single ICE candidate as relayed through the document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>, sdp_mid: Option<&str>, sdp_m_line_index: Option<u16>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: sdp_mid.map(str::to_string),
            sdp_m_line_index,
        }
    }
}

/// STUN/TURN server entry handed to the transport layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self { urls: vec![url.into()], username: None, credential: None }
    }
}

/// Display information about a participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantProfile {
    pub id: ParticipantId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl ParticipantProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: ParticipantId::new(id), name: None, photo_url: None }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_photo(mut self, url: impl Into<String>) -> Self {
        self.photo_url = Some(url.into());
        self
    }

    /// Name shown to the other side; "User" when unset
    pub fn display_name(&self) -> &str {
        self.name.as_deref().filter(|n| !n.is_empty()).unwrap_or("User")
    }

    pub fn photo(&self) -> &str {
        self.photo_url.as_deref().unwrap_or("")
    }
}

/// Connection state reported by the peer negotiation
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    /// States that tear the call down
    pub fn is_degraded(&self) -> bool {
        matches!(self, ConnectionState::Disconnected | ConnectionState::Failed)
    }
}

/// Severity of a user notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

/// Incoming call surfaced for an accept/decline decision
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingCall {
    pub call_id: CallId,
    pub caller: ParticipantProfile,
    pub call_type: CallType,
}

/// Events published by the coordinator for the application layer
#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    /// Local state machine moved
    StateChanged {
        call_id: Option<CallId>,
        old_state: crate::state_table::CallState,
        new_state: crate::state_table::CallState,
    },
    /// A new incoming call waits for accept/decline
    IncomingCall(IncomingCall),
    /// An incoming call arrived while busy and was rejected
    RejectedBusy { call_id: CallId, caller: ParticipantId },
    /// Toast-style message for the user
    Notification { level: NotificationLevel, message: String },
    RingtoneStarted,
    RingtoneStopped,
    /// The transport reports media flowing
    MediaConnected { call_id: CallId },
    /// Elapsed connected time, once per tick
    DurationTick { call_id: CallId, elapsed: Duration },
    /// The local call was torn down
    CallEnded { call_id: Option<CallId>, reason: EndReason },
}

/// Why a call ended locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    LocalHangup,
    Declined,
    RemoteStatus(CallStatus),
    RingTimeout,
    TransportDegraded(ConnectionState),
    Failed(String),
}

/// Render an elapsed duration the way the call screen shows it (`mm:ss`)
pub fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
