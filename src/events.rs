//! Live update channel
//!
//! A one-way, best-effort push of order-state changes so subscribed clients
//! can refresh their order lists without polling. Delivery is not
//! exactly-once: a lagging subscriber loses the oldest events, and a client
//! that cares must fall back to an explicit reload. Publishing with no
//! subscribers is not an error.

use jiff::Timestamp;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::orders::{OrderKey, OrderStatus};

/// Buffered events per subscriber before the oldest are dropped.
const CHANNEL_CAPACITY: usize = 64;

/// A single order status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderEvent {
    /// The order that changed.
    pub order: OrderKey,

    /// Status before the transition.
    pub from: OrderStatus,

    /// Status after the transition.
    pub to: OrderStatus,

    /// When the transition was recorded.
    pub at: Timestamp,
}

/// Broadcast channel for order status transitions.
#[derive(Debug, Clone)]
pub struct OrderEvents {
    tx: broadcast::Sender<OrderEvent>,
}

impl OrderEvents {
    /// Creates a channel with the default buffer.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);

        Self { tx }
    }

    /// Subscribes to all transitions published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.tx.subscribe()
    }

    /// Publishes a transition. Best-effort: a channel with no subscribers
    /// simply drops the event.
    pub fn publish(&self, event: OrderEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!(
                order = ?event.order,
                from = ?event.from,
                to = ?event.to,
                "no subscribers for order event"
            );
        }
    }
}

impl Default for OrderEvents {
    fn default() -> Self {
        Self::new()
    }
}
