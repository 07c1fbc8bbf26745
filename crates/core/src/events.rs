//! Product change notifications.
//!
//! External cache/index layers subscribe to these events instead of
//! intercepting store operations; the store side only publishes.

use tokio::sync::broadcast;
use uuid::Uuid;

/// A product lifecycle notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProductEvent {
    Created { uuid: Uuid, store: String },
    Updated { uuid: Uuid, store: String },
    Deleted { uuid: Uuid, store: String },
}

impl ProductEvent {
    pub fn uuid(&self) -> Uuid {
        match self {
            Self::Created { uuid, .. } | Self::Updated { uuid, .. } | Self::Deleted { uuid, .. } => {
                *uuid
            }
        }
    }
}

/// Broadcast bus for product events.
///
/// Publishing never fails: events published with no live subscriber are
/// dropped, and slow subscribers observe `Lagged` on their own receiver.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ProductEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProductEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: ProductEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
