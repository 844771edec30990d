//! Event payloads fed to the state machine

use crate::signaling::CallDocument;
use crate::state_table::EventType;
use crate::types::{
    CallId, CallStatus, CallType, ConnectionState, IceCandidate, ParticipantProfile, Role,
    SessionDescription,
};

/// An event with its payload; the table keys on [`SessionEvent::event_type`]
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    MakeCall { callee: ParticipantProfile, call_type: CallType },
    AcceptCall,
    DeclineCall,
    HangupCall,

    IncomingCall { call_id: CallId, document: CallDocument },
    AnswerReceived { answer: SessionDescription },
    /// The peer's candidate list in the latest snapshot may have grown
    RemoteCandidatesReceived,
    RemoteTerminated { status: CallStatus },

    LocalCandidateGathered { candidate: IceCandidate },
    TransportConnected,
    TransportDegraded { state: ConnectionState },

    RingTimeout,

    OfferPublished,
    AnswerPublished,
    CleanupComplete,
}

impl SessionEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            SessionEvent::MakeCall { .. } => EventType::MakeCall,
            SessionEvent::AcceptCall => EventType::AcceptCall,
            SessionEvent::DeclineCall => EventType::DeclineCall,
            SessionEvent::HangupCall => EventType::HangupCall,
            SessionEvent::IncomingCall { .. } => EventType::IncomingCall,
            SessionEvent::AnswerReceived { .. } => EventType::AnswerReceived,
            SessionEvent::RemoteCandidatesReceived => EventType::RemoteCandidatesReceived,
            SessionEvent::RemoteTerminated { .. } => EventType::RemoteTerminated,
            SessionEvent::LocalCandidateGathered { .. } => EventType::LocalCandidateGathered,
            SessionEvent::TransportConnected => EventType::TransportConnected,
            SessionEvent::TransportDegraded { .. } => EventType::TransportDegraded,
            SessionEvent::RingTimeout => EventType::RingTimeout,
            SessionEvent::OfferPublished => EventType::OfferPublished,
            SessionEvent::AnswerPublished => EventType::AnswerPublished,
            SessionEvent::CleanupComplete => EventType::CleanupComplete,
        }
    }

    /// Internal follow-up event for a table entry
    pub fn follow_up(event: EventType) -> Option<Self> {
        match event {
            EventType::OfferPublished => Some(SessionEvent::OfferPublished),
            EventType::AnswerPublished => Some(SessionEvent::AnswerPublished),
            EventType::CleanupComplete => Some(SessionEvent::CleanupComplete),
            _ => None,
        }
    }

    /// Break a document snapshot into events, in processing order.
    ///
    /// A terminal status short-circuits everything else. Otherwise the
    /// answer (caller side only) comes before the candidates so that
    /// candidates find a remote description when possible.
    pub fn from_document(role: Role, document: &CallDocument) -> Vec<SessionEvent> {
        if document.status.is_terminal() {
            return vec![SessionEvent::RemoteTerminated { status: document.status }];
        }

        let mut events = Vec::new();
        if role == Role::Caller {
            if let Some(answer) = &document.answer {
                events.push(SessionEvent::AnswerReceived { answer: answer.clone() });
            }
        }
        if !document.candidates_of(document.peer_of(role)).is_empty() {
            events.push(SessionEvent::RemoteCandidatesReceived);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn document() -> CallDocument {
        CallDocument::ringing(
            &ParticipantProfile::new("alice"),
            &ParticipantProfile::new("bob"),
            CallType::Video,
            SessionDescription::offer("v=0"),
        )
    }

    #[test]
    fn test_terminal_short_circuits() {
        let mut doc = document();
        doc.answer = Some(SessionDescription::answer("v=0"));
        doc.candidates.insert("bob".into(), vec![IceCandidate::new("c", None, None)]);
        doc.status = CallStatus::Busy;

        assert_eq!(
            SessionEvent::from_document(Role::Caller, &doc),
            vec![SessionEvent::RemoteTerminated { status: CallStatus::Busy }]
        );
    }

    #[test]
    fn test_answer_before_candidates() {
        let mut doc = document();
        doc.status = CallStatus::Connected;
        doc.answer = Some(SessionDescription::answer("v=0"));
        doc.candidates.insert("bob".into(), vec![IceCandidate::new("c", None, None)]);

        let events = SessionEvent::from_document(Role::Caller, &doc);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type(), EventType::AnswerReceived);
        assert_eq!(events[1].event_type(), EventType::RemoteCandidatesReceived);
    }

    #[test]
    fn test_callee_ignores_answer_and_own_candidates() {
        let mut doc = document();
        doc.answer = Some(SessionDescription::answer("v=0"));
        doc.candidates.insert("bob".into(), vec![IceCandidate::new("c", None, None)]);
        assert!(SessionEvent::from_document(Role::Callee, &doc).is_empty());

        doc.candidates.insert("alice".into(), vec![IceCandidate::new("c", None, None)]);
        assert_eq!(
            SessionEvent::from_document(Role::Callee, &doc),
            vec![SessionEvent::RemoteCandidatesReceived]
        );
    }
}
