//! Collaborator contracts and the in-process implementations
//!
//! The coordinator only talks to the outside world through
//! [`DocumentStore`] and [`MediaTransport`].

pub mod loopback;
pub mod media;
pub mod memory_store;
pub mod store;

pub use loopback::{LoopbackMedia, LoopbackMediaTransport, LoopbackNegotiation, LoopbackOptions};
pub use media::{
    LocalMedia, MediaConstraints, MediaResult, MediaTrack, MediaTransport, PeerEvent,
    PeerNegotiation, TrackKind,
};
pub use memory_store::{MemoryDocumentStore, WriteRecord};
pub use store::{
    lookup_path, ChangeKind, DocumentChange, DocumentPath, DocumentSnapshot, DocumentStore,
    DocumentUpdate, FieldValue, Query, StoreResult,
};
