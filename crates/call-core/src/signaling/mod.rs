//! Signaling over the shared call document

pub mod candidates;
pub mod channel;
pub mod document;

pub use candidates::CandidateTracker;
pub use channel::CallSignaling;
pub use document::CallDocument;
