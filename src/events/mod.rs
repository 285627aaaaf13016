use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events published by the services after a successful write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Event {
    UserRegistered {
        user_id: Uuid,
        email: String,
    },
    OrderCreated {
        order_id: Uuid,
        order_number: String,
        total_amount: Decimal,
    },
    OrderCancelled {
        order_id: Uuid,
        reason: Option<String>,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    PaymentCaptured {
        order_id: Uuid,
        gateway_payment_id: String,
    },
    PaymentFailed {
        order_id: Uuid,
        reason: Option<String>,
    },
    ReturnRequested {
        order_id: Uuid,
        requested_at: DateTime<Utc>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::UserRegistered { .. } => "user_registered",
            Event::OrderCreated { .. } => "order_created",
            Event::OrderCancelled { .. } => "order_cancelled",
            Event::OrderStatusChanged { .. } => "order_status_changed",
            Event::PaymentCaptured { .. } => "payment_captured",
            Event::PaymentFailed { .. } => "payment_failed",
            Event::ReturnRequested { .. } => "return_requested",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender and the receiver to hand to [`process_events`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Publishes without waiting; a full or closed channel only logs.
    pub fn send_or_log(&self, event: Event) {
        let name = event.name();
        if let Err(err) = self.sender.try_send(event) {
            warn!(event = name, error = %err, "dropping domain event");
        }
    }
}

/// Logs every event until all senders are dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::UserRegistered { user_id, email } => {
                info!(event = event.name(), %user_id, %email, "user registered");
            }
            Event::OrderCreated {
                order_id,
                order_number,
                total_amount,
            } => {
                info!(event = event.name(), %order_id, %order_number, %total_amount, "order created");
            }
            Event::OrderCancelled { order_id, reason } => {
                info!(event = event.name(), %order_id, reason = reason.as_deref().unwrap_or(""), "order cancelled");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(event = event.name(), %order_id, %old_status, %new_status, "order status changed");
            }
            Event::PaymentCaptured {
                order_id,
                gateway_payment_id,
            } => {
                info!(event = event.name(), %order_id, %gateway_payment_id, "payment captured");
            }
            Event::PaymentFailed { order_id, reason } => {
                warn!(event = event.name(), %order_id, reason = reason.as_deref().unwrap_or(""), "payment failed");
            }
            Event::ReturnRequested {
                order_id,
                requested_at,
            } => {
                info!(event = event.name(), %order_id, %requested_at, "return requested");
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_or_log_delivers_to_the_receiver() {
        let (sender, mut rx) = EventSender::channel(4);
        let order_id = Uuid::new_v4();
        sender.send_or_log(Event::OrderCancelled {
            order_id,
            reason: Some("changed my mind".into()),
        });

        let received = rx.recv().await.unwrap();
        assert_eq!(received.name(), "order_cancelled");
        assert_eq!(
            received,
            Event::OrderCancelled {
                order_id,
                reason: Some("changed my mind".into())
            }
        );
    }

    #[tokio::test]
    async fn send_or_log_never_blocks_on_a_full_channel() {
        let (sender, _rx) = EventSender::channel(1);
        let event = Event::PaymentFailed {
            order_id: Uuid::new_v4(),
            reason: None,
        };
        sender.send_or_log(event.clone());
        sender.send_or_log(event);
    }

    #[tokio::test]
    async fn process_events_exits_when_senders_drop() {
        let (sender, rx) = EventSender::channel(8);
        sender.send_or_log(Event::UserRegistered {
            user_id: Uuid::new_v4(),
            email: "a@example.com".into(),
        });
        drop(sender);
        process_events(rx).await;
    }
}
