//! Error types for call-core

use crate::state_table::{CallState, EventType};
use crate::types::CallId;
use thiserror::Error;

/// Result type for call coordination
pub type Result<T> = std::result::Result<T, CallError>;

/// Errors surfaced by the call coordinator
#[derive(Debug, Error)]
pub enum CallError {
    /// Capture device denied or unavailable
    #[error("Could not access camera/microphone: {message}")]
    MediaAccess { message: String },

    /// The document store rejected a signaling write
    #[error("Signaling write failed during {operation}: {message}")]
    SignalingWrite { operation: String, message: String },

    /// Applying a description or candidate failed
    #[error("Negotiation error: {message}")]
    Negotiation { message: String },

    /// The peer connection reported disconnected/failed
    #[error("Transport degraded: {message}")]
    TransportDegraded { message: String },

    /// No transition exists for this event in the current state
    #[error("Event {event:?} not allowed in state {state:?}")]
    InvalidState { state: CallState, event: EventType },

    #[error("No incoming call is pending")]
    NoPendingCall,

    #[error("A call is already active")]
    CallInProgress,

    /// Calling nobody, or yourself
    #[error("Invalid callee: {0}")]
    InvalidCallee(String),

    /// Mute/camera toggles need captured media of that kind
    #[error("No local {0} track")]
    NoLocalTrack(String),

    /// The document reached a terminal status before the operation completed
    #[error("Call {call_id} already {status}")]
    SessionTerminated { call_id: CallId, status: String },

    /// Reading or subscribing to the store failed
    #[error("Document store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CallError {
    pub fn media_access(message: impl Into<String>) -> Self {
        Self::MediaAccess { message: message.into() }
    }

    pub fn signaling_write(operation: impl Into<String>, source: impl std::fmt::Display) -> Self {
        Self::SignalingWrite {
            operation: operation.into(),
            message: source.to_string(),
        }
    }

    pub fn negotiation(message: impl Into<String>) -> Self {
        Self::Negotiation { message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Message shown to the user when this error aborts a call
    pub fn user_message(&self) -> String {
        match self {
            CallError::MediaAccess { .. } => "Could not access camera/microphone".to_string(),
            CallError::SignalingWrite { .. } => "Could not reach the other side".to_string(),
            CallError::Negotiation { .. } => "Call setup failed".to_string(),
            CallError::TransportDegraded { .. } => "Call disconnected".to_string(),
            CallError::SessionTerminated { status, .. } => format!("Call {}", status),
            CallError::InvalidCallee(_) => "Select a user first to call".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<murmur_infra_common::Error> for CallError {
    fn from(err: murmur_infra_common::Error) -> Self {
        CallError::Config { message: err.to_string() }
    }
}

impl From<MediaError> for CallError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::AccessDenied(msg) | MediaError::DeviceUnavailable(msg) => {
                CallError::MediaAccess { message: msg }
            }
            MediaError::Negotiation(msg) => CallError::Negotiation { message: msg },
            MediaError::Closed => CallError::Negotiation {
                message: "peer negotiation already closed".to_string(),
            },
        }
    }
}

/// Errors raised by a [`crate::adapters::DocumentStore`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Document {0} not found")]
    NotFound(String),

    #[error("Document {0} already exists")]
    AlreadyExists(String),

    #[error("Write rejected: {0}")]
    Rejected(String),

    #[error("Invalid field path: {0}")]
    InvalidPath(String),

    #[error("Malformed document {path}: {message}")]
    Malformed { path: String, message: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by a [`crate::adapters::MediaTransport`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("Permission denied: {0}")]
    AccessDenied(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    #[error("Peer negotiation closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_error_mapping() {
        let err: CallError = MediaError::AccessDenied("camera".into()).into();
        assert!(matches!(err, CallError::MediaAccess { .. }));

        let err: CallError = MediaError::Negotiation("bad sdp".into()).into();
        assert!(matches!(err, CallError::Negotiation { .. }));
    }

    #[test]
    fn test_user_message() {
        let err = CallError::media_access("NotAllowedError");
        assert_eq!(err.user_message(), "Could not access camera/microphone");

        let err = CallError::SessionTerminated { call_id: "c1".into(), status: "ended".into() };
        assert_eq!(err.user_message(), "Call ended");
    }
}
