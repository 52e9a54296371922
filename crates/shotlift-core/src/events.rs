//! Backend notification channel.
//!
//! Every backend publishes on a shared `TransferEvents` hub; any number of
//! subscribers (UI, clipboard glue, tests) receive their own copy. Sends
//! with no subscribers are dropped silently.

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::duplicate::DuplicateDecision;
use crate::error::TransferError;
use crate::item::TransferItem;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum TransferEvent {
    UploadSucceeded {
        item: Arc<TransferItem>,
        remote_path: String,
    },
    UploadFailed {
        item: Arc<TransferItem>,
        cause: TransferError,
    },
    DeleteSucceeded {
        item: Arc<TransferItem>,
        remote_path: String,
    },
    DeleteFailed {
        item: Arc<TransferItem>,
        cause: TransferError,
    },
    /// Published after the resolver answered.
    DuplicateFound {
        item: Arc<TransferItem>,
        hostname: String,
        candidate_name: String,
        decision: DuplicateDecision,
    },
}

impl TransferEvent {
    pub fn item(&self) -> &Arc<TransferItem> {
        match self {
            TransferEvent::UploadSucceeded { item, .. }
            | TransferEvent::UploadFailed { item, .. }
            | TransferEvent::DeleteSucceeded { item, .. }
            | TransferEvent::DeleteFailed { item, .. }
            | TransferEvent::DuplicateFound { item, .. } => item,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransferEvents {
    tx: broadcast::Sender<TransferEvent>,
}

impl TransferEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: TransferEvent) {
        if self.tx.send(event).is_err() {
            log::trace!("transfer event dropped, no subscribers");
        }
    }
}

impl Default for TransferEvents {
    fn default() -> Self {
        Self::new()
    }
}
