//! Media capture and peer negotiation contract

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::errors::MediaError;
use crate::types::{ConnectionState, IceCandidate, IceServer, SessionDescription};

pub type MediaResult<T> = std::result::Result<T, MediaError>;

/// What to capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl MediaConstraints {
    pub fn for_call(call_type: crate::types::CallType) -> Self {
        Self { audio: true, video: call_type.wants_video() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

/// A captured local track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    pub id: String,
    pub kind: TrackKind,
    pub enabled: bool,
}

/// Handle to captured local media
pub trait LocalMedia: Send + Sync {
    fn tracks(&self) -> Vec<MediaTrack>;

    /// Flip the first track of `kind`; returns the new enabled flag or
    /// `None` when there is no such track
    fn toggle_track(&mut self, kind: TrackKind) -> Option<bool>;

    /// Stop every track; further calls are no-ops
    fn stop(&mut self);

    fn is_stopped(&self) -> bool;
}

/// Events raised by a peer negotiation
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    LocalCandidate(IceCandidate),
    ConnectionStateChanged(ConnectionState),
}

/// One peer connection negotiation
#[async_trait]
pub trait PeerNegotiation: Send + Sync {
    async fn add_local_media(&self, media: &dyn LocalMedia) -> MediaResult<()>;

    async fn create_offer(&self) -> MediaResult<SessionDescription>;

    async fn create_answer(&self) -> MediaResult<SessionDescription>;

    async fn set_local_description(&self, description: SessionDescription) -> MediaResult<()>;

    async fn set_remote_description(&self, description: SessionDescription) -> MediaResult<()>;

    fn has_remote_description(&self) -> bool;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> MediaResult<()>;

    /// Event stream; can be taken once
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<PeerEvent>>;

    async fn close(&self);
}

/// Factory for local media and peer negotiations
#[async_trait]
pub trait MediaTransport: Send + Sync {
    async fn acquire_local_media(
        &self,
        constraints: MediaConstraints,
    ) -> MediaResult<Box<dyn LocalMedia>>;

    async fn create_peer_negotiation(
        &self,
        ice_servers: &[IceServer],
    ) -> MediaResult<Arc<dyn PeerNegotiation>>;
}
