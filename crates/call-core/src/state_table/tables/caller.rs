use crate::state_table::{
    Action, CallState, EventType, Guard, NotifyKind, StateTableBuilder, Transition,
};

use super::common::ending;

/// Add all caller-side transitions to the table
pub fn add_caller_transitions(builder: &mut StateTableBuilder) {
    // Idle -> Placing: acquire media, publish the offer document
    builder.add_transition(
        CallState::Idle,
        EventType::MakeCall,
        Transition {
            guards: vec![],
            actions: vec![
                Action::PrepareOutgoing,
                Action::AcquireLocalMedia,
                Action::CreatePeerNegotiation,
                Action::CreateOffer,
                Action::CreateSessionDocument,
                Action::SubscribeSessionDocument,
            ],
            next_state: Some(CallState::Placing),
            follow_up: Some(EventType::OfferPublished),
        },
    );

    // Placing -> OutgoingRinging: document is visible to the callee
    builder.add_transition(
        CallState::Placing,
        EventType::OfferPublished,
        Transition {
            actions: vec![Action::StartRingTimer, Action::Notify(NotifyKind::Calling)],
            next_state: Some(CallState::OutgoingRinging),
            ..Default::default()
        },
    );

    // OutgoingRinging -> Connected: first delivery of the answer
    builder.add_transition(
        CallState::OutgoingRinging,
        EventType::AnswerReceived,
        Transition {
            guards: vec![Guard::HasPeerNegotiation, Guard::RemoteDescriptionNotApplied],
            actions: vec![
                Action::CancelRingTimer,
                Action::ApplyRemoteAnswer,
                Action::ReplayBufferedCandidates,
                Action::StartDurationTimer,
                Action::Notify(NotifyKind::Connected),
            ],
            next_state: Some(CallState::Connected),
            follow_up: None,
        },
    );

    // Unanswered: give up and mark the document ended
    builder.add_transition(
        CallState::OutgoingRinging,
        EventType::RingTimeout,
        ending(vec![Action::Notify(NotifyKind::NoAnswer)]),
    );
}
