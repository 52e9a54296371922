use log::{info, warn};
use shotlift_core::{TransferError, TransferItem};

/// Receives the result of every dispatched transfer.
///
/// Called from worker tasks; implementations must not block for long.
pub trait NotificationSink: Send + Sync {
    /// `url` is the public link when an HTTP base is configured, the
    /// remote path otherwise.
    fn upload_succeeded(&self, item: &TransferItem, url: &str);

    fn upload_failed(&self, item: &TransferItem, hostname: &str, error: &TransferError);

    fn delete_succeeded(&self, item: &TransferItem);

    fn delete_failed(&self, item: &TransferItem, hostname: &str);
}

/// Sink that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn upload_succeeded(&self, item: &TransferItem, url: &str) {
        info!("Upload {} finished: {}", item.id(), url);
    }

    fn upload_failed(&self, item: &TransferItem, hostname: &str, error: &TransferError) {
        warn!("Upload {} to {} failed: {}", item.id(), hostname, error);
    }

    fn delete_succeeded(&self, item: &TransferItem) {
        info!("Upload {} undone", item.id());
    }

    fn delete_failed(&self, item: &TransferItem, hostname: &str) {
        warn!("Could not undo upload {} on {}", item.id(), hostname);
    }
}
