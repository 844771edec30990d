use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::context::ActionContext;
use super::events::SessionEvent;
use super::session::SessionState;
use crate::adapters::{MediaConstraints, PeerNegotiation};
use crate::coordinator::timers;
use crate::errors::{CallError, Result};
use crate::signaling::CallDocument;
use crate::state_table::{Action, NotifyKind};
use crate::types::{
    CallEvent, CallId, CallStatus, CallType, IceCandidate, IncomingCall, NotificationLevel,
    ParticipantProfile, Role,
};

/// Execute an action from the state table
pub async fn execute_action(
    action: &Action,
    event: &SessionEvent,
    session: &mut SessionState,
    ctx: &ActionContext,
) -> Result<()> {
    debug!("Executing action: {:?}", action);

    match action {
        // Call setup
        Action::PrepareOutgoing => {
            let SessionEvent::MakeCall { callee, call_type } = event else {
                return Err(unexpected(action, event));
            };
            let call_id = CallId::generate(&ctx.config.local.id, &callee.id);
            info!("Placing {} {} to {}", call_type, call_id, callee.id);
            session.call_id = Some(call_id);
            session.role = Some(Role::Caller);
            session.call_type = Some(*call_type);
            session.peer = Some(callee.clone());
        }
        Action::StorePendingIncoming => {
            let SessionEvent::IncomingCall { call_id, document } = event else {
                return Err(unexpected(action, event));
            };
            info!("Incoming {} {} from {}", document.call_type, call_id, document.caller_id);
            session.call_id = Some(call_id.clone());
            session.role = Some(Role::Callee);
            session.call_type = Some(document.call_type);
            session.peer = Some(document.caller_profile());
            session.observed_status = Some(document.status);
            session.document_linked = true;
            session.pending_incoming = Some(document.clone());
            session.latest_document = Some(document.clone());
        }
        Action::VerifyStillRinging => {
            let call_id = current_call_id(session)?;
            let document = ctx.signaling.fetch(&call_id).await?;
            match document {
                Some(document) if document.status == CallStatus::Ringing => {
                    session.observed_status = Some(document.status);
                    session.latest_document = Some(document);
                }
                Some(document) => {
                    session.observed_status = Some(document.status);
                    return Err(CallError::SessionTerminated {
                        call_id,
                        status: document.status.to_string(),
                    });
                }
                None => {
                    session.document_linked = false;
                    return Err(CallError::SessionTerminated {
                        call_id,
                        status: CallStatus::Ended.to_string(),
                    });
                }
            }
        }
        Action::AcquireLocalMedia => {
            let call_type = session.call_type.unwrap_or(CallType::Audio);
            let media = ctx
                .media
                .acquire_local_media(MediaConstraints::for_call(call_type))
                .await?;
            info!("Acquired {} local tracks", media.tracks().len());
            session.local_media = Some(media);
        }
        Action::CreatePeerNegotiation => {
            let call_id = current_call_id(session)?;
            let negotiation = ctx.media.create_peer_negotiation(&ctx.config.ice_servers).await?;
            if let Some(media) = session.local_media.as_deref() {
                negotiation.add_local_media(media).await?;
            }
            if let Some(events) = negotiation.take_events() {
                session.tasks.peer_events = Some(ctx.router.forward_peer_events(call_id, events));
            }
            session.negotiation = Some(negotiation);
        }
        Action::CreateOffer => {
            let negotiation = current_negotiation(session)?;
            let offer = negotiation.create_offer().await?;
            negotiation.set_local_description(offer.clone()).await?;
            session.local_description = Some(offer);
        }
        Action::CreateSessionDocument => {
            let call_id = current_call_id(session)?;
            let offer = session
                .local_description
                .clone()
                .ok_or_else(|| CallError::internal("no local offer to publish"))?;
            let callee = session
                .peer
                .clone()
                .ok_or_else(|| CallError::internal("no callee recorded"))?;
            let call_type = session.call_type.unwrap_or(CallType::Audio);
            let document = CallDocument::ringing(&ctx.config.local, &callee, call_type, offer);

            ctx.signaling.create_call(&call_id, &document).await?;
            session.document_linked = true;
            session.observed_status = Some(CallStatus::Ringing);
            session.latest_document = Some(document);
        }
        Action::SubscribeSessionDocument => {
            let call_id = current_call_id(session)?;
            let snapshots = ctx.signaling.subscribe_call(&call_id).await?;
            session.tasks.document_subscription =
                Some(ctx.router.forward_snapshots(call_id, snapshots));
        }
        Action::ApplyRemoteOffer => {
            let negotiation = current_negotiation(session)?;
            let offer = session
                .latest_document
                .as_ref()
                .and_then(|d| d.offer.clone())
                .ok_or_else(|| CallError::negotiation("call document carries no offer"))?;
            negotiation.set_remote_description(offer).await?;
        }
        Action::CreateAnswer => {
            let negotiation = current_negotiation(session)?;
            let answer = negotiation.create_answer().await?;
            negotiation.set_local_description(answer.clone()).await?;
            session.local_description = Some(answer);
        }
        Action::WriteAnswer => {
            let call_id = current_call_id(session)?;
            let answer = session
                .local_description
                .clone()
                .ok_or_else(|| CallError::internal("no local answer to publish"))?;
            ctx.signaling.write_answer(&call_id, &answer).await?;
            session.observed_status = Some(CallStatus::Connected);
            session.pending_incoming = None;
            info!("Answered call {}", call_id);
        }
        Action::ApplyRemoteAnswer => {
            let SessionEvent::AnswerReceived { answer } = event else {
                return Err(unexpected(action, event));
            };
            let negotiation = current_negotiation(session)?;
            negotiation.set_remote_description(answer.clone()).await?;
            session.observed_status = Some(CallStatus::Connected);
            info!("Applied remote answer");
        }

        // Candidate relay
        Action::PublishLocalCandidate => {
            let SessionEvent::LocalCandidateGathered { candidate } = event else {
                return Err(unexpected(action, event));
            };
            let call_id = current_call_id(session)?;
            if let Err(e) = ctx
                .signaling
                .append_candidate(&call_id, &ctx.config.local.id, candidate)
                .await
            {
                warn!("Dropping local candidate for {}: {}", call_id, e);
            }
        }
        Action::ApplyRemoteCandidates => {
            let (Some(document), Some(role)) = (session.latest_document.as_ref(), session.role) else {
                return Ok(());
            };
            let fresh = session
                .candidates
                .take_new(document.candidates_of(document.peer_of(role)));
            if fresh.is_empty() {
                return Ok(());
            }
            match session.negotiation.clone() {
                Some(negotiation) if negotiation.has_remote_description() => {
                    apply_candidates(negotiation.as_ref(), fresh).await;
                }
                _ => {
                    debug!("Buffering {} remote candidates until the remote description is set", fresh.len());
                    session.candidates.buffer(fresh);
                }
            }
        }
        Action::ReplayBufferedCandidates => {
            let negotiation = current_negotiation(session)?;
            let buffered = session.candidates.drain_buffered();
            if !buffered.is_empty() {
                debug!("Replaying {} buffered remote candidates", buffered.len());
                apply_candidates(negotiation.as_ref(), buffered).await;
            }
        }

        // Status writes
        Action::WriteDeclined => {
            let call_id = current_call_id(session)?;
            session.pending_incoming = None;
            if session.can_write_document() {
                ctx.signaling.write_status(&call_id, CallStatus::Declined).await?;
                session.observed_status = Some(CallStatus::Declined);
            }
        }
        Action::MarkIncomingBusy => {
            let SessionEvent::IncomingCall { call_id, document } = event else {
                return Err(unexpected(action, event));
            };
            if session.is_current(call_id) {
                debug!("Ignoring re-delivered incoming call {}", call_id);
                return Ok(());
            }
            // The caller may have given up since the query fired
            match ctx.signaling.fetch(call_id).await {
                Ok(Some(current)) if current.status == CallStatus::Ringing => {}
                Ok(current) => {
                    debug!(
                        "Not marking {} busy, status is {}",
                        call_id,
                        current.map_or("gone".to_string(), |d| d.status.to_string())
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!("Could not re-read {} before marking busy: {}", call_id, e);
                    return Ok(());
                }
            }
            info!("Rejecting {} from {} as busy", call_id, document.caller_id);
            // The active call must not suffer from a failed busy write
            if let Err(e) = ctx.signaling.mark_busy(call_id).await {
                warn!("Could not mark {} busy: {}", call_id, e);
                return Ok(());
            }
            ctx.publish(CallEvent::RejectedBusy {
                call_id: call_id.clone(),
                caller: document.caller_id.clone(),
            });
        }
        Action::RecordRemoteStatus => {
            if let SessionEvent::RemoteTerminated { status } = event {
                info!("Peer moved the call to {}", status);
                session.observed_status = Some(*status);
            }
        }

        // Timers and ringtone
        Action::StartRingtone => {
            if !session.ringtone_playing {
                session.ringtone_playing = true;
                ctx.publish(CallEvent::RingtoneStarted);
            }
        }
        Action::StopRingtone => {
            if session.ringtone_playing {
                session.ringtone_playing = false;
                ctx.publish(CallEvent::RingtoneStopped);
            }
        }
        Action::StartRingTimer => {
            let call_id = current_call_id(session)?;
            session.tasks.cancel_ring_timer();
            session.tasks.ring_timer = Some(timers::spawn_ring_timer(
                call_id,
                ctx.config.ring_timeout(),
                ctx.router.clone(),
            ));
        }
        Action::CancelRingTimer => {
            session.tasks.cancel_ring_timer();
        }
        Action::StartDurationTimer => {
            let call_id = current_call_id(session)?;
            let started = Instant::now();
            session.connected_at = Some(started);
            session.tasks.cancel_duration_timer();
            session.tasks.duration_timer = Some(timers::spawn_duration_ticker(
                call_id,
                started,
                ctx.config.duration_tick(),
                ctx.events.clone(),
            ));
        }
        Action::StopDurationTimer => {
            session.tasks.cancel_duration_timer();
        }

        // Teardown
        Action::ReleaseLocalMedia => {
            if let Some(mut media) = session.local_media.take() {
                media.stop();
                debug!("Stopped local media");
            }
        }
        Action::ClosePeerNegotiation => {
            if let Some(negotiation) = session.negotiation.take() {
                negotiation.close().await;
            }
        }
        Action::StopSubscriptions => {
            session.tasks.cancel_subscriptions();
        }
        Action::WriteEnded => {
            if session.can_write_document() {
                let call_id = current_call_id(session)?;
                ctx.signaling.write_status(&call_id, CallStatus::Ended).await?;
                session.observed_status = Some(CallStatus::Ended);
                info!("Marked call {} ended", call_id);
            }
        }
        Action::ResetSession => {
            let reason = session
                .end_reason
                .clone()
                .unwrap_or(crate::types::EndReason::LocalHangup);
            ctx.publish(CallEvent::CallEnded { call_id: session.call_id.clone(), reason });
            session.reset();
        }

        // Application callbacks
        Action::SurfaceIncomingCall => {
            let (Some(call_id), Some(document)) = (session.call_id.clone(), session.pending_incoming.as_ref()) else {
                return Err(CallError::NoPendingCall);
            };
            ctx.publish(CallEvent::IncomingCall(IncomingCall {
                call_id,
                caller: document.caller_profile(),
                call_type: document.call_type,
            }));
        }
        Action::PublishMediaConnected => {
            let call_id = current_call_id(session)?;
            info!("Media connected for {}", call_id);
            ctx.publish(CallEvent::MediaConnected { call_id });
        }
        Action::Notify(kind) => {
            let (level, message) = notification(*kind, event, session.peer.as_ref());
            ctx.notify(level, message);
        }
    }

    Ok(())
}

/// Apply candidates one by one; a bad candidate never fails the call
async fn apply_candidates(negotiation: &dyn PeerNegotiation, candidates: Vec<IceCandidate>) {
    for candidate in candidates {
        if let Err(e) = negotiation.add_ice_candidate(candidate.clone()).await {
            warn!("Dropping remote candidate {:?}: {}", candidate.candidate, e);
        }
    }
}

fn notification(
    kind: NotifyKind,
    event: &SessionEvent,
    peer: Option<&ParticipantProfile>,
) -> (NotificationLevel, String) {
    match kind {
        NotifyKind::Calling => (NotificationLevel::Info, "Calling...".to_string()),
        NotifyKind::Connected => (NotificationLevel::Success, "Connected".to_string()),
        NotifyKind::CallDeclined => (NotificationLevel::Info, "Call declined".to_string()),
        NotifyKind::RemoteTerminated => match event {
            SessionEvent::RemoteTerminated { status: CallStatus::Busy } => {
                (NotificationLevel::Info, "Line busy".to_string())
            }
            SessionEvent::RemoteTerminated { status } => {
                (NotificationLevel::Info, format!("Call {}", status))
            }
            _ => (NotificationLevel::Info, "Call ended".to_string()),
        },
        NotifyKind::NoAnswer => (NotificationLevel::Info, "No answer".to_string()),
        NotifyKind::MissedCall => (
            NotificationLevel::Info,
            format!("Missed call from {}", peer.map_or("User", |p| p.display_name())),
        ),
        NotifyKind::Disconnected => (NotificationLevel::Error, "Call disconnected".to_string()),
        NotifyKind::CallEnded => (NotificationLevel::Info, "Call ended".to_string()),
    }
}

fn current_call_id(session: &SessionState) -> Result<CallId> {
    session
        .call_id
        .clone()
        .ok_or_else(|| CallError::internal("no call in progress"))
}

fn current_negotiation(session: &SessionState) -> Result<Arc<dyn PeerNegotiation>> {
    session
        .negotiation
        .clone()
        .ok_or_else(|| CallError::negotiation("no peer negotiation"))
}

fn unexpected(action: &Action, event: &SessionEvent) -> CallError {
    CallError::internal(format!("{:?} cannot run for {:?}", action, event.event_type()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{
        DocumentStore, DocumentUpdate, LoopbackMediaTransport, MemoryDocumentStore,
    };
    use crate::config::CallConfig;
    use crate::coordinator::router::EventRouter;
    use crate::signaling::CallSignaling;
    use crate::state_table::CallState;
    use crate::types::SessionDescription;
    use tokio::sync::broadcast;

    fn busy_bob(store: Arc<MemoryDocumentStore>) -> (ActionContext, SessionState, broadcast::Receiver<CallEvent>) {
        let (router, _rx) = EventRouter::new(8);
        let (events, events_rx) = broadcast::channel(16);
        let ctx = ActionContext {
            config: CallConfig::new(ParticipantProfile::new("bob")),
            signaling: CallSignaling::new(store, "calls"),
            media: Arc::new(LoopbackMediaTransport::new()),
            events,
            router,
        };
        let mut session = SessionState::new();
        session.state = CallState::Connected;
        session.call_id = Some(CallId::from("carol_bob_1"));
        (ctx, session, events_rx)
    }

    async fn incoming_from_alice(ctx: &ActionContext) -> SessionEvent {
        let call_id = CallId::from("alice_bob_2");
        let document = CallDocument::ringing(
            &ParticipantProfile::new("alice"),
            &ParticipantProfile::new("bob"),
            CallType::Audio,
            SessionDescription::offer("v=0"),
        );
        ctx.signaling.create_call(&call_id, &document).await.unwrap();
        SessionEvent::IncomingCall { call_id, document }
    }

    #[tokio::test]
    async fn test_busy_written_while_still_ringing() {
        let store = Arc::new(MemoryDocumentStore::new());
        let (ctx, mut session, mut events) = busy_bob(store.clone());
        let event = incoming_from_alice(&ctx).await;

        execute_action(&Action::MarkIncomingBusy, &event, &mut session, &ctx).await.unwrap();

        let doc = ctx.signaling.fetch(&"alice_bob_2".into()).await.unwrap().unwrap();
        assert_eq!(doc.status, CallStatus::Busy);
        assert!(matches!(events.try_recv(), Ok(CallEvent::RejectedBusy { .. })));
        assert_eq!(session.call_id, Some(CallId::from("carol_bob_1")));
    }

    #[tokio::test]
    async fn test_busy_skipped_once_caller_gave_up() {
        let store = Arc::new(MemoryDocumentStore::new());
        let (ctx, mut session, mut events) = busy_bob(store.clone());
        let event = incoming_from_alice(&ctx).await;

        // Caller hangs up between the query firing and the busy write
        let path = ctx.signaling.path(&"alice_bob_2".into());
        store.update(&path, DocumentUpdate::new().set("status", "ended")).await.unwrap();
        let writes_before = store.writes_for(&path).await.len();

        execute_action(&Action::MarkIncomingBusy, &event, &mut session, &ctx).await.unwrap();

        let doc = ctx.signaling.fetch(&"alice_bob_2".into()).await.unwrap().unwrap();
        assert_eq!(doc.status, CallStatus::Ended);
        assert_eq!(store.writes_for(&path).await.len(), writes_before);
        assert!(events.try_recv().is_err());
    }
}
