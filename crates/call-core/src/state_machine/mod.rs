//! State machine executor
//!
//! Looks up `(state, event)` in the master table, checks guards, runs the
//! actions in order and applies the state change. Internal follow-up events
//! are processed before control returns.

pub mod actions;
pub mod context;
pub mod events;
pub mod executor;
pub mod guards;
pub mod session;

pub use context::ActionContext;
pub use events::SessionEvent;
pub use executor::StateMachine;
pub use session::{SessionState, SessionTasks};
