use shotlift_core::TransferItem;
use std::sync::{Arc, Mutex, MutexGuard};

/// Successful uploads, most recent last.
///
/// Concurrent uploads push in completion order, not dispatch order.
#[derive(Debug, Default)]
pub struct HistoryStack {
    items: Mutex<Vec<Arc<TransferItem>>>,
}

impl HistoryStack {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> MutexGuard<'_, Vec<Arc<TransferItem>>> {
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, item: Arc<TransferItem>) {
        self.items().push(item);
    }

    pub fn pop(&self) -> Option<Arc<TransferItem>> {
        self.items().pop()
    }

    pub fn peek(&self) -> Option<Arc<TransferItem>> {
        self.items().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }
}
