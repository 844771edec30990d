use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::actions::execute_action;
use super::context::ActionContext;
use super::events::SessionEvent;
use super::guards::check_guard;
use super::session::SessionState;
use crate::errors::{CallError, Result};
use crate::state_table::tables::teardown_actions;
use crate::state_table::{Action, CallState, EventType, Guard, MasterStateTable, StateKey, MASTER_TABLE};
use crate::types::{CallEvent, EndReason, NotificationLevel};

/// Drives a [`SessionState`] through the state table
pub struct StateMachine {
    table: Arc<MasterStateTable>,
}

impl StateMachine {
    pub fn new(table: Arc<MasterStateTable>) -> Self {
        Self { table }
    }

    pub fn with_default_table() -> Self {
        Self::new(MASTER_TABLE.clone())
    }

    /// Process one event and any internal follow-ups it schedules.
    ///
    /// Unmatched user events are errors; unmatched store, transport and
    /// timer events are dropped. An action failure outside teardown rolls
    /// the call back to Idle before the error is returned. Failures during
    /// teardown are logged, the teardown completes and the first one is
    /// returned.
    pub async fn process_event(
        &self,
        session: &mut SessionState,
        ctx: &ActionContext,
        event: SessionEvent,
    ) -> Result<()> {
        let mut next = Some(event);
        let mut teardown_error: Option<CallError> = None;

        while let Some(event) = next.take() {
            let event_type = event.event_type();
            let key = StateKey::new(session.state, event_type);

            let Some(transition) = self.table.get(&key) else {
                if event_type.is_user_initiated() {
                    return Err(CallError::InvalidState { state: session.state, event: event_type });
                }
                debug!("No transition for {:?} in {:?}, dropping", event_type, session.state);
                return Ok(());
            };

            if let Some(failed) = transition.guards.iter().find(|g| !check_guard(g, session)) {
                if event_type.is_user_initiated() {
                    return Err(match failed {
                        Guard::HasPendingIncoming => CallError::NoPendingCall,
                        _ => CallError::InvalidState { state: session.state, event: event_type },
                    });
                }
                return Ok(());
            }

            let entering_end = transition.next_state == Some(CallState::Ended);
            if entering_end && session.end_reason.is_none() {
                session.end_reason = Some(end_reason_for(&event));
            }

            debug!(
                "{:?} + {:?}: {} actions, next {:?}",
                session.state,
                event_type,
                transition.actions.len(),
                transition.next_state
            );

            for action in &transition.actions {
                if let Err(e) = execute_action(action, &event, session, ctx).await {
                    if entering_end || session.state == CallState::Ended {
                        warn!("Teardown action {:?} failed: {}", action, e);
                        teardown_error.get_or_insert(e);
                        continue;
                    }
                    error!("Action {:?} failed in {:?}: {}", action, session.state, e);
                    return Err(self.fail(session, ctx, &event, e).await);
                }
            }

            if let Some(next_state) = transition.next_state {
                change_state(session, ctx, next_state);
            }

            next = transition.follow_up.and_then(SessionEvent::follow_up);
        }

        match teardown_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Roll the call back to Idle through the same path as a hangup
    async fn fail(
        &self,
        session: &mut SessionState,
        ctx: &ActionContext,
        event: &SessionEvent,
        error: CallError,
    ) -> CallError {
        session.end_reason = Some(EndReason::Failed(error.to_string()));

        for action in teardown_actions() {
            if let Err(e) = execute_action(&action, event, session, ctx).await {
                warn!("Cleanup action {:?} failed after {}: {}", action, error, e);
            }
        }
        if session.state != CallState::Idle {
            change_state(session, ctx, CallState::Ended);
        }

        if let Err(e) = execute_action(&Action::ResetSession, event, session, ctx).await {
            warn!("Session reset failed: {}", e);
        }
        change_state(session, ctx, CallState::Idle);

        ctx.notify(NotificationLevel::Error, error.user_message());
        error
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::with_default_table()
    }
}

fn change_state(session: &mut SessionState, ctx: &ActionContext, new_state: CallState) {
    let old_state = session.state;
    if old_state == new_state {
        return;
    }
    session.state = new_state;
    info!("Call state {:?} -> {:?}", old_state, new_state);
    ctx.publish(CallEvent::StateChanged {
        call_id: session.call_id.clone(),
        old_state,
        new_state,
    });
}

/// Why the call ends when `event` drives it into Ended
fn end_reason_for(event: &SessionEvent) -> EndReason {
    match event {
        SessionEvent::HangupCall => EndReason::LocalHangup,
        SessionEvent::DeclineCall => EndReason::Declined,
        SessionEvent::RemoteTerminated { status } => EndReason::RemoteStatus(*status),
        SessionEvent::RingTimeout => EndReason::RingTimeout,
        SessionEvent::TransportDegraded { state } => EndReason::TransportDegraded(*state),
        other => EndReason::Failed(format!("ended by {:?}", other.event_type())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CallStatus, ConnectionState};

    #[test]
    fn test_end_reasons() {
        assert_eq!(end_reason_for(&SessionEvent::HangupCall), EndReason::LocalHangup);
        assert_eq!(end_reason_for(&SessionEvent::DeclineCall), EndReason::Declined);
        assert_eq!(
            end_reason_for(&SessionEvent::RemoteTerminated { status: CallStatus::Busy }),
            EndReason::RemoteStatus(CallStatus::Busy)
        );
        assert_eq!(
            end_reason_for(&SessionEvent::TransportDegraded { state: ConnectionState::Failed }),
            EndReason::TransportDegraded(ConnectionState::Failed)
        );
        assert_eq!(end_reason_for(&SessionEvent::RingTimeout), EndReason::RingTimeout);
    }

    #[test]
    fn test_default_table_is_used() {
        let machine = StateMachine::default();
        assert!(machine.table.has_transition(&StateKey::new(CallState::Idle, EventType::MakeCall)));
    }
}
