//! # murmur-call-core
//!
//! Peer-to-peer audio/video call coordination that uses a shared realtime
//! document as its signaling channel.
//!
//! The caller writes a `calls/{callId}` document carrying its offer, the
//! callee answers into the same document, and both sides append their
//! connectivity candidates under their own participant key. Each side runs
//! one [`CallCoordinator`], a table-driven state machine that owns at most
//! one call at a time.
//!
//! ## Layout
//!
//! - [`state_table`]: the `(state, event) -> transition` master table
//! - [`state_machine`]: executor, guards, actions and the session slot
//! - [`coordinator`]: public API, event router and timers
//! - [`signaling`]: typed document operations and candidate tracking
//! - [`adapters`]: document store and media transport contracts, with an
//!   in-memory store and a loopback media transport
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use murmur_call_core::prelude::*;
//!
//! # async fn example() -> murmur_call_core::Result<()> {
//! let store = Arc::new(MemoryDocumentStore::new());
//! let media = Arc::new(LoopbackMediaTransport::new());
//!
//! let config = CallConfig::new(ParticipantProfile::new("alice").with_name("Alice"));
//! let alice = CallCoordinator::new(config, store, media)?;
//! alice.start().await?;
//!
//! let call_id = alice.initiate(ParticipantProfile::new("bob"), CallType::Video).await?;
//! println!("ringing {}", call_id);
//! alice.end().await?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod signaling;
pub mod state_machine;
pub mod state_table;
pub mod types;

pub use config::CallConfig;
pub use coordinator::CallCoordinator;
pub use errors::{CallError, MediaError, Result, StoreError};
pub use state_table::CallState;
pub use types::*;

pub mod prelude {
    pub use crate::adapters::{
        DocumentStore, LoopbackMediaTransport, MediaTransport, MemoryDocumentStore,
    };
    pub use crate::config::CallConfig;
    pub use crate::coordinator::CallCoordinator;
    pub use crate::errors::{CallError, Result};
    pub use crate::state_table::CallState;
    pub use crate::types::{
        CallEvent, CallId, CallStatus, CallType, EndReason, ParticipantId, ParticipantProfile,
    };
}
