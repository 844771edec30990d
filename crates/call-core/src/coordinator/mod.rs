//! The call coordinator and its event plumbing

pub mod coordinator;
pub mod router;
pub mod timers;

pub use coordinator::CallCoordinator;
pub use router::{EventRouter, RoutedEvent};
