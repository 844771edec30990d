use crate::state_table::{
    Action, CallState, EventType, Guard, NotifyKind, StateTableBuilder, Transition,
};

use super::common::{ending, ending_without_write};

/// Add all callee-side transitions to the table
pub fn add_callee_transitions(builder: &mut StateTableBuilder) {
    // Idle -> IncomingRinging: surface the call for a decision
    builder.add_transition(
        CallState::Idle,
        EventType::IncomingCall,
        Transition {
            guards: vec![],
            actions: vec![
                Action::StorePendingIncoming,
                Action::SubscribeSessionDocument,
                Action::StartRingtone,
                Action::StartRingTimer,
                Action::SurfaceIncomingCall,
            ],
            next_state: Some(CallState::IncomingRinging),
            follow_up: None,
        },
    );

    // IncomingRinging -> Connecting: answer the offer
    builder.add_transition(
        CallState::IncomingRinging,
        EventType::AcceptCall,
        Transition {
            guards: vec![Guard::HasPendingIncoming],
            actions: vec![
                Action::StopRingtone,
                Action::CancelRingTimer,
                Action::VerifyStillRinging,
                Action::AcquireLocalMedia,
                Action::CreatePeerNegotiation,
                Action::ApplyRemoteOffer,
                Action::CreateAnswer,
                Action::WriteAnswer,
                Action::ApplyRemoteCandidates,
            ],
            next_state: Some(CallState::Connecting),
            follow_up: Some(EventType::AnswerPublished),
        },
    );

    // Connecting -> Connected: answer is in the document
    builder.add_transition(
        CallState::Connecting,
        EventType::AnswerPublished,
        Transition {
            actions: vec![Action::StartDurationTimer, Action::Notify(NotifyKind::Connected)],
            next_state: Some(CallState::Connected),
            ..Default::default()
        },
    );

    // IncomingRinging -> Idle: decline, nothing acquired yet
    let mut decline = ending(vec![
        Action::StopRingtone,
        Action::CancelRingTimer,
        Action::WriteDeclined,
        Action::Notify(NotifyKind::CallDeclined),
    ]);
    decline.guards = vec![Guard::HasPendingIncoming];
    builder.add_transition(CallState::IncomingRinging, EventType::DeclineCall, decline);

    // Unanswered on our side: dismiss locally, the caller owns the document
    builder.add_transition(
        CallState::IncomingRinging,
        EventType::RingTimeout,
        ending_without_write(vec![Action::Notify(NotifyKind::MissedCall)]),
    );
}
