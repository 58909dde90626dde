//! Best-effort customer notifications.
//!
//! Delivery runs on its own task. A failed delivery is logged and never
//! reaches the order operation that triggered it.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::order::{Order, OrderStatus};

/// A message owed to an order's owner.
#[derive(Debug, Clone)]
pub enum Notification {
    /// The order was placed.
    OrderPlaced(Order),
    /// The order moved from `previous` to its current status.
    StatusChanged { order: Order, previous: OrderStatus },
}

impl Notification {
    pub fn order(&self) -> &Order {
        match self {
            Notification::OrderPlaced(order) => order,
            Notification::StatusChanged { order, .. } => order,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::OrderPlaced(_) => "order_placed",
            Notification::StatusChanged { .. } => "status_changed",
        }
    }
}

#[derive(Debug, Error)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Delivery channel (email, SMS, ...).
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Hands notifications to a [`Notifier`] without waiting for the outcome.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(notifier: impl Notifier) -> Self {
        Self {
            notifier: Arc::new(notifier),
        }
    }

    /// Spawns delivery of `notification`. Callers normally drop the handle.
    pub fn dispatch(&self, notification: Notification) -> JoinHandle<()> {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            let order_id = notification.order().id();
            let kind = notification.kind();
            match notifier.deliver(&notification).await {
                Ok(()) => {
                    tracing::debug!(%order_id, kind, "notification delivered");
                    metrics::counter!("notifications_sent_total", "kind" => kind).increment(1);
                }
                Err(e) => {
                    tracing::warn!(%order_id, kind, error = %e, "notification failed");
                    metrics::counter!("notifications_failed_total", "kind" => kind).increment(1);
                }
            }
        })
    }
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new(LogNotifier)
    }
}

/// Writes each notification to the log instead of sending it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let order = notification.order();
        match notification {
            Notification::OrderPlaced(_) => tracing::info!(
                order_number = %order.order_number(),
                owner = %order.owner(),
                total = %order.total_amount(),
                "order confirmation"
            ),
            Notification::StatusChanged { previous, .. } => tracing::info!(
                order_number = %order.order_number(),
                owner = %order.owner(),
                from = %previous,
                to = %order.status(),
                "order status update"
            ),
        }
        Ok(())
    }
}

#[derive(Default)]
struct Recorded {
    sent: Vec<Notification>,
    fail: bool,
}

/// Keeps delivered notifications in memory. Can be told to fail.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    state: Arc<Mutex<Recorded>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every delivery fails.
    pub fn failing() -> Self {
        Self {
            state: Arc::new(Mutex::new(Recorded {
                sent: Vec::new(),
                fail: true,
            })),
        }
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.state.lock().await.sent.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut state = self.state.lock().await;
        if state.fail {
            return Err(NotifyError("mail server unavailable".into()));
        }
        state.sent.push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::order::model::fixtures::order_for;

    #[tokio::test]
    async fn dispatch_delivers_in_background() {
        let notifier = RecordingNotifier::new();
        let dispatcher = NotificationDispatcher::new(notifier.clone());
        let order = order_for("alice", 100, Utc::now());

        dispatcher
            .dispatch(Notification::OrderPlaced(order.clone()))
            .await
            .unwrap();

        let sent = notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].order().id(), order.id());
    }

    #[tokio::test]
    async fn failed_delivery_is_swallowed() {
        let notifier = RecordingNotifier::failing();
        let dispatcher = NotificationDispatcher::new(notifier.clone());
        let order = order_for("alice", 100, Utc::now());

        let handle = dispatcher.dispatch(Notification::StatusChanged {
            order,
            previous: OrderStatus::Pending,
        });

        assert!(handle.await.is_ok());
        assert!(notifier.sent().await.is_empty());
    }
}
