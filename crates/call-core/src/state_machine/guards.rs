use tracing::debug;

use super::session::SessionState;
use crate::state_table::Guard;

/// Evaluate a transition guard against the current session
pub fn check_guard(guard: &Guard, session: &SessionState) -> bool {
    let passed = match guard {
        Guard::HasPendingIncoming => session.pending_incoming.is_some(),
        Guard::RemoteDescriptionNotApplied => !session.has_remote_description(),
        Guard::HasPeerNegotiation => session.negotiation.is_some(),
        Guard::SessionNotTerminal => !session.is_terminal(),
    };
    if !passed {
        debug!("Guard {:?} failed in state {:?}", guard, session.state);
    }
    passed
}
