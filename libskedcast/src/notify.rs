//! Best-effort sync fan-out for publish outcomes
//!
//! Downstream consumers (chatbot knowledge sync, search index, a TUI) learn
//! about terminal transitions through a [`SyncNotifier`]. Notification runs on
//! a detached task; its failures are logged and never reach the post.
//!
//! ```
//! use libskedcast::notify::{EventBus, SyncEvent};
//!
//! let bus = EventBus::new(100);
//! let mut receiver = bus.subscribe();
//! bus.emit(SyncEvent::PublishStarted {
//!     post_id: "abc123".to_string(),
//!     platform: "facebook".to_string(),
//! });
//! assert!(receiver.try_recv().is_ok());
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::http::{HttpRequest, HttpTransport};

pub type EventReceiver = broadcast::Receiver<SyncEvent>;

/// Publish lifecycle events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    PublishStarted {
        post_id: String,
        platform: String,
    },

    Published {
        post_id: String,
        user_id: String,
        platform: String,
        platform_post_id: String,
        post_url: String,
    },

    Failed {
        post_id: String,
        user_id: String,
        platform: String,
        error: String,
    },
}

impl SyncEvent {
    pub fn post_id(&self) -> &str {
        match self {
            SyncEvent::PublishStarted { post_id, .. }
            | SyncEvent::Published { post_id, .. }
            | SyncEvent::Failed { post_id, .. } => post_id,
        }
    }
}

#[async_trait]
pub trait SyncNotifier: Send + Sync {
    async fn notify(&self, event: &SyncEvent) -> Result<()>;
}

/// In-process broadcast of sync events
///
/// Emitting never blocks: with no subscribers the event is dropped, and a
/// lagging subscriber loses the oldest events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: SyncEvent) {
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl SyncNotifier for EventBus {
    async fn notify(&self, event: &SyncEvent) -> Result<()> {
        self.emit(event.clone());
        Ok(())
    }
}

/// POSTs each event as JSON to a configured endpoint
pub struct WebhookNotifier {
    transport: Arc<dyn HttpTransport>,
    url: String,
}

impl WebhookNotifier {
    pub fn new(transport: Arc<dyn HttpTransport>, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
        }
    }
}

#[async_trait]
impl SyncNotifier for WebhookNotifier {
    async fn notify(&self, event: &SyncEvent) -> Result<()> {
        let body = serde_json::to_value(event).unwrap_or_default();
        self.transport
            .send(HttpRequest::post(&self.url).json(body))
            .await?
            .ensure_success("Sync webhook")?;
        Ok(())
    }
}

/// Delivers to every inner notifier; one failing does not stop the rest
#[derive(Default, Clone)]
pub struct FanoutNotifier {
    notifiers: Vec<Arc<dyn SyncNotifier>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: Arc<dyn SyncNotifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

#[async_trait]
impl SyncNotifier for FanoutNotifier {
    async fn notify(&self, event: &SyncEvent) -> Result<()> {
        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify(event).await {
                tracing::warn!(post_id = %event.post_id(), error = %e, "Sync notification failed");
            }
        }
        Ok(())
    }
}

/// Notify on a detached task, logging any failure
pub fn spawn_notify(notifier: Arc<dyn SyncNotifier>, event: SyncEvent) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&event).await {
            tracing::warn!(post_id = %event.post_id(), error = %e, "Sync notification failed");
        }
    })
}
