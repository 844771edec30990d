//! Typed view of `calls/{callId}`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::adapters::DocumentPath;
use crate::errors::StoreError;
use crate::types::{
    CallStatus, CallType, IceCandidate, ParticipantId, ParticipantProfile, Role,
    SessionDescription,
};

/// The shared signaling document both participants read and write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallDocument {
    pub caller_id: ParticipantId,
    #[serde(default)]
    pub caller_name: String,
    #[serde(default)]
    pub caller_photo: String,
    pub receiver_id: ParticipantId,
    #[serde(default)]
    pub receiver_name: String,
    #[serde(default)]
    pub receiver_photo: String,
    #[serde(rename = "type")]
    pub call_type: CallType,
    pub status: CallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer: Option<SessionDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<SessionDescription>,
    /// Append-only candidate lists keyed by the participant that gathered them
    #[serde(default)]
    pub candidates: HashMap<String, Vec<IceCandidate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl CallDocument {
    /// Fresh ringing document as the caller creates it
    pub fn ringing(
        caller: &ParticipantProfile,
        receiver: &ParticipantProfile,
        call_type: CallType,
        offer: SessionDescription,
    ) -> Self {
        Self {
            caller_id: caller.id.clone(),
            caller_name: caller.display_name().to_string(),
            caller_photo: caller.photo().to_string(),
            receiver_id: receiver.id.clone(),
            receiver_name: receiver.display_name().to_string(),
            receiver_photo: receiver.photo().to_string(),
            call_type,
            status: CallStatus::Ringing,
            offer: Some(offer),
            answer: None,
            candidates: HashMap::new(),
            timestamp: Some(Utc::now()),
            accepted_at: None,
            ended_at: None,
        }
    }

    pub fn from_value(path: &DocumentPath, value: &Value) -> Result<Self, StoreError> {
        serde_json::from_value(value.clone()).map_err(|e| StoreError::Malformed {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    pub fn to_value(&self) -> Result<Value, StoreError> {
        serde_json::to_value(self).map_err(|e| StoreError::Malformed {
            path: "<new call>".to_string(),
            message: e.to_string(),
        })
    }

    /// Candidates appended by `participant`, in append order
    pub fn candidates_of(&self, participant: &ParticipantId) -> &[IceCandidate] {
        self.candidates
            .get(participant.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The other participant from `role`'s point of view
    pub fn peer_of(&self, role: Role) -> &ParticipantId {
        match role {
            Role::Caller => &self.receiver_id,
            Role::Callee => &self.caller_id,
        }
    }

    pub fn caller_profile(&self) -> ParticipantProfile {
        ParticipantProfile {
            id: self.caller_id.clone(),
            name: Some(self.caller_name.clone()).filter(|n| !n.is_empty()),
            photo_url: Some(self.caller_photo.clone()).filter(|p| !p.is_empty()),
        }
    }
}
