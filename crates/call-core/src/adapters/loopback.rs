//! Simulated media transport
//!
//! No devices, no sockets: tracks are bookkeeping, descriptions are
//! synthetic SDP and every local description yields a few host candidates.
//! The connection reports `Connected` once both descriptions are set.
//! Used by the CLI scenarios and the integration tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

use super::media::{
    LocalMedia, MediaConstraints, MediaResult, MediaTrack, MediaTransport, PeerEvent,
    PeerNegotiation, TrackKind,
};
use crate::errors::MediaError;
use crate::types::{ConnectionState, IceCandidate, IceServer, SdpType, SessionDescription};

/// Captured tracks that exist only in memory
pub struct LoopbackMedia {
    tracks: Vec<MediaTrack>,
    stopped: Arc<AtomicBool>,
}

impl LoopbackMedia {
    fn new(constraints: MediaConstraints) -> Self {
        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(MediaTrack {
                id: format!("audio-{}", uuid::Uuid::new_v4()),
                kind: TrackKind::Audio,
                enabled: true,
            });
        }
        if constraints.video {
            tracks.push(MediaTrack {
                id: format!("video-{}", uuid::Uuid::new_v4()),
                kind: TrackKind::Video,
                enabled: true,
            });
        }
        Self { tracks, stopped: Arc::new(AtomicBool::new(false)) }
    }
}

impl LocalMedia for LoopbackMedia {
    fn tracks(&self) -> Vec<MediaTrack> {
        self.tracks.clone()
    }

    fn toggle_track(&mut self, kind: TrackKind) -> Option<bool> {
        let track = self.tracks.iter_mut().find(|t| t.kind == kind)?;
        track.enabled = !track.enabled;
        Some(track.enabled)
    }

    fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct NegotiationState {
    local: Option<SessionDescription>,
    remote: Option<SessionDescription>,
    remote_description_sets: usize,
    applied_candidates: Vec<IceCandidate>,
    track_kinds: Vec<TrackKind>,
    closed: bool,
    connected: bool,
}

/// Peer negotiation that only keeps the books
pub struct LoopbackNegotiation {
    state: Mutex<NegotiationState>,
    events_tx: mpsc::UnboundedSender<PeerEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<PeerEvent>>>,
    candidates_per_description: usize,
    reject_remote_descriptions: bool,
    next_port: AtomicUsize,
}

impl LoopbackNegotiation {
    fn new(candidates_per_description: usize, reject_remote_descriptions: bool) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            state: Mutex::new(NegotiationState::default()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            candidates_per_description,
            reject_remote_descriptions,
            next_port: AtomicUsize::new(50000),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NegotiationState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Remote candidates applied so far, in order
    pub fn applied_candidates(&self) -> Vec<IceCandidate> {
        self.lock().applied_candidates.clone()
    }

    /// How many times a remote description was applied
    pub fn remote_description_count(&self) -> usize {
        self.lock().remote_description_sets
    }

    pub fn remote_description(&self) -> Option<SessionDescription> {
        self.lock().remote.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Report a connection state as if the network changed
    pub fn simulate_connection_state(&self, state: ConnectionState) {
        let _ = self.events_tx.send(PeerEvent::ConnectionStateChanged(state));
    }

    /// Report a freshly gathered local candidate
    pub fn simulate_local_candidate(&self, candidate: IceCandidate) {
        let _ = self.events_tx.send(PeerEvent::LocalCandidate(candidate));
    }

    fn synthetic_sdp(&self, sdp_type: SdpType) -> String {
        let state = self.lock();
        let mut sdp = format!(
            "v=0\r\no=- {} 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\na=type:{:?}\r\n",
            uuid::Uuid::new_v4().as_u128() % 1_000_000_000,
            sdp_type
        );
        for kind in &state.track_kinds {
            match kind {
                TrackKind::Audio => sdp.push_str("m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n"),
                TrackKind::Video => sdp.push_str("m=video 9 UDP/TLS/RTP/SAVPF 96\r\n"),
            }
        }
        sdp
    }

    fn gather_candidates(&self) {
        for index in 0..self.candidates_per_description {
            let port = self.next_port.fetch_add(1, Ordering::SeqCst);
            let candidate = IceCandidate::new(
                format!("candidate:{} 1 udp 2122260223 127.0.0.1 {} typ host", index, port),
                Some("0"),
                Some(0),
            );
            let _ = self.events_tx.send(PeerEvent::LocalCandidate(candidate));
        }
    }

    fn maybe_connect(&self) {
        let mut state = self.lock();
        if state.local.is_some() && state.remote.is_some() && !state.connected && !state.closed {
            state.connected = true;
            drop(state);
            let _ = self.events_tx.send(PeerEvent::ConnectionStateChanged(ConnectionState::Connecting));
            let _ = self.events_tx.send(PeerEvent::ConnectionStateChanged(ConnectionState::Connected));
        }
    }

    fn ensure_open(&self) -> MediaResult<()> {
        if self.lock().closed {
            return Err(MediaError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl PeerNegotiation for LoopbackNegotiation {
    async fn add_local_media(&self, media: &dyn LocalMedia) -> MediaResult<()> {
        self.ensure_open()?;
        let mut state = self.lock();
        state.track_kinds.extend(media.tracks().into_iter().map(|t| t.kind));
        Ok(())
    }

    async fn create_offer(&self) -> MediaResult<SessionDescription> {
        self.ensure_open()?;
        Ok(SessionDescription::offer(self.synthetic_sdp(SdpType::Offer)))
    }

    async fn create_answer(&self) -> MediaResult<SessionDescription> {
        self.ensure_open()?;
        if self.lock().remote.is_none() {
            return Err(MediaError::Negotiation("cannot answer without a remote offer".into()));
        }
        Ok(SessionDescription::answer(self.synthetic_sdp(SdpType::Answer)))
    }

    async fn set_local_description(&self, description: SessionDescription) -> MediaResult<()> {
        self.ensure_open()?;
        self.lock().local = Some(description);
        self.gather_candidates();
        self.maybe_connect();
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> MediaResult<()> {
        self.ensure_open()?;
        if self.reject_remote_descriptions {
            return Err(MediaError::Negotiation("remote description rejected".into()));
        }
        if description.sdp.trim().is_empty() {
            return Err(MediaError::Negotiation("empty remote description".into()));
        }
        {
            let mut state = self.lock();
            state.remote = Some(description);
            state.remote_description_sets += 1;
        }
        self.maybe_connect();
        Ok(())
    }

    fn has_remote_description(&self) -> bool {
        self.lock().remote.is_some()
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> MediaResult<()> {
        self.ensure_open()?;
        let mut state = self.lock();
        if state.remote.is_none() {
            return Err(MediaError::Negotiation("remote description not set".into()));
        }
        if candidate.candidate.is_empty() {
            return Err(MediaError::Negotiation("empty candidate".into()));
        }
        state.applied_candidates.push(candidate);
        Ok(())
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<PeerEvent>> {
        self.events_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    async fn close(&self) {
        let mut state = self.lock();
        if !state.closed {
            state.closed = true;
            debug!("Loopback negotiation closed");
        }
    }
}

/// Knobs for the simulated transport
#[derive(Debug, Clone)]
pub struct LoopbackOptions {
    pub candidates_per_description: usize,
    pub deny_devices: bool,
    pub reject_remote_descriptions: bool,
}

impl Default for LoopbackOptions {
    fn default() -> Self {
        Self {
            candidates_per_description: 2,
            deny_devices: false,
            reject_remote_descriptions: false,
        }
    }
}

/// [`MediaTransport`] backed by [`LoopbackMedia`] and [`LoopbackNegotiation`]
pub struct LoopbackMediaTransport {
    options: Mutex<LoopbackOptions>,
    negotiations: Mutex<Vec<Arc<LoopbackNegotiation>>>,
    media_stopped: Mutex<Vec<Arc<AtomicBool>>>,
}

impl LoopbackMediaTransport {
    pub fn new() -> Self {
        Self::with_options(LoopbackOptions::default())
    }

    pub fn with_options(options: LoopbackOptions) -> Self {
        Self {
            options: Mutex::new(options),
            negotiations: Mutex::new(Vec::new()),
            media_stopped: Mutex::new(Vec::new()),
        }
    }

    /// Deny (or allow again) device access
    pub fn set_deny_devices(&self, deny: bool) {
        self.options
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .deny_devices = deny;
    }

    /// Every negotiation created so far, oldest first
    pub fn negotiations(&self) -> Vec<Arc<LoopbackNegotiation>> {
        self.negotiations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn last_negotiation(&self) -> Option<Arc<LoopbackNegotiation>> {
        self.negotiations().last().cloned()
    }

    /// Number of captures whose tracks are still running
    pub fn live_media_count(&self) -> usize {
        self.media_stopped
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|stopped| !stopped.load(Ordering::SeqCst))
            .count()
    }

    fn options(&self) -> LoopbackOptions {
        self.options
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Default for LoopbackMediaTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaTransport for LoopbackMediaTransport {
    async fn acquire_local_media(
        &self,
        constraints: MediaConstraints,
    ) -> MediaResult<Box<dyn LocalMedia>> {
        if self.options().deny_devices {
            return Err(MediaError::AccessDenied("NotAllowedError: permission denied".into()));
        }
        if !constraints.audio && !constraints.video {
            return Err(MediaError::DeviceUnavailable("no tracks requested".into()));
        }
        let media = LoopbackMedia::new(constraints);
        self.media_stopped
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(media.stopped.clone());
        Ok(Box::new(media))
    }

    async fn create_peer_negotiation(
        &self,
        ice_servers: &[IceServer],
    ) -> MediaResult<Arc<dyn PeerNegotiation>> {
        let options = self.options();
        debug!("Creating loopback negotiation with {} ICE servers", ice_servers.len());
        let negotiation = Arc::new(LoopbackNegotiation::new(
            options.candidates_per_description,
            options.reject_remote_descriptions,
        ));
        self.negotiations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(negotiation.clone());
        Ok(negotiation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CallType;

    #[tokio::test]
    async fn test_candidates_require_remote_description() {
        let transport = LoopbackMediaTransport::new();
        let negotiation = transport.create_peer_negotiation(&[]).await.unwrap();
        let candidate = IceCandidate::new("candidate:0 1 udp 1 127.0.0.1 1 typ host", Some("0"), Some(0));

        assert!(negotiation.add_ice_candidate(candidate.clone()).await.is_err());
        negotiation
            .set_remote_description(SessionDescription::offer("v=0"))
            .await
            .unwrap();
        negotiation.add_ice_candidate(candidate).await.unwrap();
        assert_eq!(transport.last_negotiation().unwrap().applied_candidates().len(), 1);
    }

    #[tokio::test]
    async fn test_offer_answer_connects() {
        let transport = LoopbackMediaTransport::new();
        let media = transport
            .acquire_local_media(MediaConstraints::for_call(CallType::Video))
            .await
            .unwrap();
        assert_eq!(media.tracks().len(), 2);

        let caller = transport.create_peer_negotiation(&[]).await.unwrap();
        let callee = transport.create_peer_negotiation(&[]).await.unwrap();
        let mut caller_events = caller.take_events().unwrap();
        assert!(caller.take_events().is_none());

        caller.add_local_media(media.as_ref()).await.unwrap();
        let offer = caller.create_offer().await.unwrap();
        assert!(offer.sdp.contains("m=video"));
        caller.set_local_description(offer.clone()).await.unwrap();

        callee.set_remote_description(offer).await.unwrap();
        let answer = callee.create_answer().await.unwrap();
        caller.set_remote_description(answer).await.unwrap();

        let mut saw_connected = false;
        let mut candidates = 0;
        while let Ok(event) = caller_events.try_recv() {
            match event {
                PeerEvent::LocalCandidate(_) => candidates += 1,
                PeerEvent::ConnectionStateChanged(ConnectionState::Connected) => saw_connected = true,
                _ => {}
            }
        }
        assert_eq!(candidates, 2);
        assert!(saw_connected);
    }

    #[tokio::test]
    async fn test_denied_devices() {
        let transport = LoopbackMediaTransport::with_options(LoopbackOptions {
            deny_devices: true,
            ..Default::default()
        });
        let result = transport
            .acquire_local_media(MediaConstraints { audio: true, video: false })
            .await;
        assert!(matches!(result, Err(MediaError::AccessDenied(_))));
    }

    #[tokio::test]
    async fn test_stop_tracks_counts() {
        let transport = LoopbackMediaTransport::new();
        let mut media = transport
            .acquire_local_media(MediaConstraints { audio: true, video: false })
            .await
            .unwrap();
        assert_eq!(transport.live_media_count(), 1);
        assert_eq!(media.toggle_track(TrackKind::Audio), Some(false));
        assert_eq!(media.toggle_track(TrackKind::Video), None);
        media.stop();
        assert_eq!(transport.live_media_count(), 0);
    }
}
