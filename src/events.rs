//! Domain events published after a transaction commits.
//!
//! The processor is handed an [`EventSink`] at construction and never knows
//! how events travel further. Delivery problems are logged, never surfaced
//! to the submitter: by the time an event is emitted its transaction has
//! already committed.

use crate::model::{ArtWorkId, Holder, MerchantId, ParticipantId};
use crate::transaction::TransactionId;
use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, SendError, Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum DomainEvent {
    ArtWorkListed {
        transaction_id: TransactionId,
        art_work_id: ArtWorkId,
        owner: MerchantId,
        token_name: String,
        token_count: u64,
        timestamp: DateTime<Utc>,
    },
    TokensTransferred {
        transaction_id: TransactionId,
        art_work_id: ArtWorkId,
        from: Holder,
        to: ParticipantId,
        amount: u64,
        price_per_token: u64,
        total_price: u64,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::ArtWorkListed { .. } => "ArtWorkListed",
            DomainEvent::TokensTransferred { .. } => "TokensTransferred",
        }
    }

    pub fn transaction_id(&self) -> &TransactionId {
        match self {
            DomainEvent::ArtWorkListed { transaction_id, .. }
            | DomainEvent::TokensTransferred { transaction_id, .. } => transaction_id,
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &DomainEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &DomainEvent) {}
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<DomainEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().clone()
    }

    pub fn drain(&self) -> Vec<DomainEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &DomainEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Relays events over a bounded crossbeam channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<DomainEvent>,
    block_when_full: bool,
}

impl ChannelSink {
    /// Lossy sink: when `capacity` events are waiting, further events are
    /// dropped with a warning. The receiver must be drained by the platform
    /// for delivery to be complete.
    pub fn bounded(capacity: usize) -> (Self, Receiver<DomainEvent>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity.max(1));
        (
            Self {
                sender,
                block_when_full: false,
            },
            receiver,
        )
    }

    /// Lossless sink: a full channel blocks the emitting transaction, which
    /// still holds its lock stripes, until the receiver makes room.
    pub fn blocking(capacity: usize) -> (Self, Receiver<DomainEvent>) {
        let (sink, receiver) = Self::bounded(capacity);
        (
            Self {
                block_when_full: true,
                ..sink
            },
            receiver,
        )
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &DomainEvent) {
        if self.block_when_full {
            if let Err(SendError(ev)) = self.sender.send(event.clone()) {
                warn!(
                    "event channel disconnected, dropping {} for transaction {}",
                    ev.name(),
                    ev.transaction_id()
                );
            }
            return;
        }

        match self.sender.try_send(event.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(ev)) => {
                warn!(
                    "event channel full, dropping {} for transaction {}",
                    ev.name(),
                    ev.transaction_id()
                );
            }
            Err(TrySendError::Disconnected(ev)) => {
                warn!(
                    "event channel disconnected, dropping {} for transaction {}",
                    ev.name(),
                    ev.transaction_id()
                );
            }
        }
    }
}
