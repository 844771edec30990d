use crate::state_table::{
    Action, CallState, EventType, Guard, NotifyKind, StateTableBuilder, Transition,
};

/// Release everything a call holds; the document write comes last
pub fn teardown_actions() -> Vec<Action> {
    let mut actions = local_release_actions();
    actions.push(Action::WriteEnded);
    actions
}

fn local_release_actions() -> Vec<Action> {
    vec![
        Action::StopRingtone,
        Action::CancelRingTimer,
        Action::StopDurationTimer,
        Action::StopSubscriptions,
        Action::ReleaseLocalMedia,
        Action::ClosePeerNegotiation,
    ]
}

/// Transition into Ended running `prefix` and then the full teardown
pub fn ending(prefix: Vec<Action>) -> Transition {
    let mut actions = prefix;
    actions.extend(teardown_actions());
    Transition {
        guards: vec![],
        actions,
        next_state: Some(CallState::Ended),
        follow_up: Some(EventType::CleanupComplete),
    }
}

/// Like [`ending`] but leaves the document untouched
pub fn ending_without_write(prefix: Vec<Action>) -> Transition {
    let mut actions = prefix;
    actions.extend(local_release_actions());
    Transition {
        guards: vec![],
        actions,
        next_state: Some(CallState::Ended),
        follow_up: Some(EventType::CleanupComplete),
    }
}

const LIVE_STATES: &[CallState] = &[
    CallState::OutgoingRinging,
    CallState::Connecting,
    CallState::Connected,
];

pub fn add_common_transitions(builder: &mut StateTableBuilder) {
    // Candidate relay while a negotiation exists
    builder.add_for_states(
        LIVE_STATES,
        EventType::LocalCandidateGathered,
        Transition {
            guards: vec![Guard::HasPeerNegotiation, Guard::SessionNotTerminal],
            actions: vec![Action::PublishLocalCandidate],
            ..Default::default()
        },
    );
    builder.add_for_states(
        LIVE_STATES,
        EventType::RemoteCandidatesReceived,
        Transition {
            guards: vec![Guard::HasPeerNegotiation],
            actions: vec![Action::ApplyRemoteCandidates],
            ..Default::default()
        },
    );

    builder.add_for_states(
        &[CallState::Connecting, CallState::Connected],
        EventType::TransportConnected,
        Transition {
            actions: vec![Action::PublishMediaConnected],
            ..Default::default()
        },
    );

    // Peer gave up, declined or was busy: tear down without rewriting the document
    builder.add_for_states(
        &[
            CallState::OutgoingRinging,
            CallState::IncomingRinging,
            CallState::Connecting,
            CallState::Connected,
        ],
        EventType::RemoteTerminated,
        ending(vec![
            Action::RecordRemoteStatus,
            Action::Notify(NotifyKind::RemoteTerminated),
        ]),
    );

    builder.add_for_states(
        LIVE_STATES,
        EventType::TransportDegraded,
        ending(vec![Action::Notify(NotifyKind::Disconnected)]),
    );

    // End() from an idle coordinator does nothing
    builder.add_no_op(CallState::Idle, EventType::HangupCall);

    builder.add_wildcard(
        EventType::HangupCall,
        ending(vec![Action::Notify(NotifyKind::CallEnded)]),
    );

    // First active call wins: anything arriving while occupied is busy
    builder.add_wildcard(
        EventType::IncomingCall,
        Transition {
            actions: vec![Action::MarkIncomingBusy],
            ..Default::default()
        },
    );

    builder.add_transition(
        CallState::Ended,
        EventType::CleanupComplete,
        Transition {
            actions: vec![Action::ResetSession],
            next_state: Some(CallState::Idle),
            ..Default::default()
        },
    );
}
