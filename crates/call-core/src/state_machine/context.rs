use std::sync::Arc;
use tokio::sync::broadcast;

use crate::adapters::MediaTransport;
use crate::config::CallConfig;
use crate::coordinator::router::EventRouter;
use crate::signaling::CallSignaling;
use crate::types::{CallEvent, NotificationLevel};

/// What actions may touch besides the session itself
pub struct ActionContext {
    pub config: CallConfig,
    pub signaling: CallSignaling,
    pub media: Arc<dyn MediaTransport>,
    pub events: broadcast::Sender<CallEvent>,
    pub router: EventRouter,
}

impl ActionContext {
    /// Publish to the application; nobody listening is fine
    pub fn publish(&self, event: CallEvent) {
        let _ = self.events.send(event);
    }

    pub fn notify(&self, level: NotificationLevel, message: impl Into<String>) {
        self.publish(CallEvent::Notification { level, message: message.into() });
    }
}
