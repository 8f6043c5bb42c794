// ABOUTME: Progress and error events published by pipeline runs.
// ABOUTME: Bounded broadcast bus; publishing never blocks and drops when nobody listens.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

use crate::types::DeploymentId;

/// Default number of events buffered per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Progress,
    Error,
}

/// A single stage notification for one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployEvent {
    pub deployment_id: DeploymentId,
    pub subdomain: String,
    pub kind: EventKind,
    pub message: String,
}

impl DeployEvent {
    pub fn progress(id: &DeploymentId, subdomain: &str, message: impl Into<String>) -> Self {
        Self {
            deployment_id: id.clone(),
            subdomain: subdomain.to_string(),
            kind: EventKind::Progress,
            message: message.into(),
        }
    }

    pub fn error(id: &DeploymentId, subdomain: &str, message: impl Into<String>) -> Self {
        Self {
            deployment_id: id.clone(),
            subdomain: subdomain.to_string(),
            kind: EventKind::Error,
            message: message.into(),
        }
    }

    /// Server-sent-events data line: `update:<payload>` or `error:<payload>`.
    pub fn sse_frame(&self) -> String {
        let prefix = match self.kind {
            EventKind::Progress => "update",
            EventKind::Error => "error",
        };
        format!("{}:{}", prefix, self)
    }
}

impl fmt::Display for DeployEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.deployment_id, self.subdomain, self.message
        )
    }
}

/// Publish/subscribe topic for deploy events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DeployEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event without waiting on subscribers.
    pub fn publish(&self, event: DeployEvent) {
        match event.kind {
            EventKind::Progress => tracing::info!("{}", event),
            EventKind::Error => tracing::error!("{}", event),
        }
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            tracing::debug!("no subscribers, dropped event {}", event);
        }
    }

    /// Receive events for every deployment.
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
            filter: None,
        }
    }

    /// Receive events for one deployment only.
    pub fn subscribe_to(&self, id: &DeploymentId) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
            filter: Some(id.clone()),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiving end of an [`EventBus`].
#[derive(Debug)]
pub struct EventSubscription {
    receiver: broadcast::Receiver<DeployEvent>,
    filter: Option<DeploymentId>,
}

impl EventSubscription {
    /// Next matching event, or `None` once every publisher is gone.
    ///
    /// A subscriber that falls behind skips the oldest events.
    pub async fn recv(&mut self) -> Option<DeployEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self
                        .filter
                        .as_ref()
                        .is_none_or(|id| *id == event.deployment_id)
                    {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("event subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
