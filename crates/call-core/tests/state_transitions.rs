use murmur_call_core::state_table::*;

fn transition(state: CallState, event: EventType) -> &'static Transition {
    MASTER_TABLE
        .get(&StateKey::new(state, event))
        .unwrap_or_else(|| panic!("missing {:?} + {:?}", state, event))
}

#[test]
fn test_default_table_validates() {
    assert!(MASTER_TABLE.validate().is_ok());
    assert!(MASTER_TABLE.transition_count() > 20);
}

#[test]
fn test_caller_flow() {
    // Idle -> Placing -> OutgoingRinging -> Connected
    let make = transition(CallState::Idle, EventType::MakeCall);
    assert_eq!(make.next_state, Some(CallState::Placing));
    assert_eq!(make.follow_up, Some(EventType::OfferPublished));
    let create = make.actions.iter().position(|a| *a == Action::CreateSessionDocument).unwrap();
    let offer = make.actions.iter().position(|a| *a == Action::CreateOffer).unwrap();
    assert!(offer < create, "offer must exist before the document is written");

    let published = transition(CallState::Placing, EventType::OfferPublished);
    assert_eq!(published.next_state, Some(CallState::OutgoingRinging));
    assert!(published.actions.contains(&Action::StartRingTimer));

    let answered = transition(CallState::OutgoingRinging, EventType::AnswerReceived);
    assert_eq!(answered.next_state, Some(CallState::Connected));
    assert!(answered.guards.contains(&Guard::RemoteDescriptionNotApplied));
    let apply = answered.actions.iter().position(|a| *a == Action::ApplyRemoteAnswer).unwrap();
    let replay = answered
        .actions
        .iter()
        .position(|a| *a == Action::ReplayBufferedCandidates)
        .unwrap();
    assert!(apply < replay);
}

#[test]
fn test_callee_flow() {
    let incoming = transition(CallState::Idle, EventType::IncomingCall);
    assert_eq!(incoming.next_state, Some(CallState::IncomingRinging));
    assert!(incoming.actions.contains(&Action::SurfaceIncomingCall));

    let accept = transition(CallState::IncomingRinging, EventType::AcceptCall);
    assert_eq!(accept.next_state, Some(CallState::Connecting));
    assert_eq!(accept.follow_up, Some(EventType::AnswerPublished));
    assert_eq!(accept.guards, vec![Guard::HasPendingIncoming]);
    assert_eq!(accept.actions.first(), Some(&Action::StopRingtone));

    let published = transition(CallState::Connecting, EventType::AnswerPublished);
    assert_eq!(published.next_state, Some(CallState::Connected));

    let decline = transition(CallState::IncomingRinging, EventType::DeclineCall);
    assert_eq!(decline.next_state, Some(CallState::Ended));
    assert!(decline.actions.contains(&Action::WriteDeclined));
}

#[test]
fn test_busy_while_active() {
    for state in [
        CallState::OutgoingRinging,
        CallState::IncomingRinging,
        CallState::Connecting,
        CallState::Connected,
    ] {
        let t = transition(state, EventType::IncomingCall);
        assert_eq!(t.actions, vec![Action::MarkIncomingBusy]);
        assert_eq!(t.next_state, None, "busy rejection must not move {:?}", state);
    }
}

#[test]
fn test_hangup_everywhere() {
    let idle = transition(CallState::Idle, EventType::HangupCall);
    assert!(idle.actions.is_empty());
    assert_eq!(idle.next_state, None);

    for state in [
        CallState::OutgoingRinging,
        CallState::IncomingRinging,
        CallState::Connecting,
        CallState::Connected,
    ] {
        let t = transition(state, EventType::HangupCall);
        assert_eq!(t.next_state, Some(CallState::Ended));
        assert_eq!(t.follow_up, Some(EventType::CleanupComplete));
        assert_eq!(t.actions.last(), Some(&Action::WriteEnded));
    }

    let cleanup = transition(CallState::Ended, EventType::CleanupComplete);
    assert_eq!(cleanup.next_state, Some(CallState::Idle));
}

#[test]
fn test_remote_termination_and_timeouts() {
    let remote = transition(CallState::Connected, EventType::RemoteTerminated);
    assert_eq!(remote.actions.first(), Some(&Action::RecordRemoteStatus));

    let caller_timeout = transition(CallState::OutgoingRinging, EventType::RingTimeout);
    assert!(caller_timeout.actions.contains(&Action::WriteEnded));

    // Missing the call leaves the caller's document alone
    let callee_timeout = transition(CallState::IncomingRinging, EventType::RingTimeout);
    assert!(!callee_timeout.actions.contains(&Action::WriteEnded));
    assert!(callee_timeout.actions.contains(&Action::Notify(NotifyKind::MissedCall)));

    assert!(!MASTER_TABLE.has_transition(&StateKey::new(CallState::Connected, EventType::RingTimeout)));
    assert!(!MASTER_TABLE.has_transition(&StateKey::new(CallState::Connected, EventType::AnswerReceived)));
}

#[test]
fn test_candidate_publishing_is_guarded() {
    let publish = transition(CallState::Connected, EventType::LocalCandidateGathered);
    assert!(publish.guards.contains(&Guard::SessionNotTerminal));
    assert!(!MASTER_TABLE.has_transition(&StateKey::new(CallState::Idle, EventType::LocalCandidateGathered)));
}

#[test]
fn test_builder_validation_catches_missing_cleanup() {
    let mut builder = StateTableBuilder::new();
    builder.add_transition(
        CallState::Connected,
        EventType::HangupCall,
        Transition { next_state: Some(CallState::Ended), ..Default::default() },
    );
    let errors = builder.build().validate().unwrap_err();
    assert!(errors.iter().any(|e| e.contains("CleanupComplete")));
}
