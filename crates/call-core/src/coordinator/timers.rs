//! Ring timeout and connected-duration ticker

use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::router::{EventRouter, RoutedEvent};
use crate::state_machine::SessionEvent;
use crate::types::{CallEvent, CallId};

/// Deliver `RingTimeout` for `call_id` once `timeout` elapses
pub fn spawn_ring_timer(call_id: CallId, timeout: Duration, router: EventRouter) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        info!("Call {} rang for {:?} without an answer", call_id, timeout);
        router
            .send(RoutedEvent::Call { call_id, event: SessionEvent::RingTimeout })
            .await;
    })
}

/// Publish the elapsed connected time every `tick`
pub fn spawn_duration_ticker(
    call_id: CallId,
    started: Instant,
    tick: Duration,
    events: broadcast::Sender<CallEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let event = CallEvent::DurationTick {
                call_id: call_id.clone(),
                elapsed: started.elapsed(),
            };
            if events.send(event).is_err() {
                debug!("No listeners for duration ticks of {}", call_id);
            }
        }
    })
}
