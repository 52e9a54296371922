//! The protocol-agnostic transfer contract.
//!
//! Backends report ordinary transfer failures through `UploadOutcome` and
//! the event hub. Only conditions the caller must handle differently are
//! returned as `Err`: a session that could not be established, and an
//! undo on an item that was never uploaded.

use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;

use crate::duplicate::{find_duplicate, DuplicateDecision, DuplicateRequest, DuplicateResolver};
use crate::error::{TransferError, TransferResult};
use crate::events::{TransferEvent, TransferEvents};
use crate::item::TransferItem;
use crate::paths;
use crate::types::{Protocol, UploadOutcome};

#[async_trait]
pub trait TransferBackend: Send + Sync {
    fn protocol(&self) -> Protocol;

    /// Host named in connection errors and duplicate requests.
    fn hostname(&self) -> String;

    /// Move `item` to `target`, a forward-slash path below the server root.
    async fn upload(&self, item: Arc<TransferItem>, target: &str) -> TransferResult<UploadOutcome>;

    /// Delete the remote copy of a previously uploaded item.
    async fn undo_upload(&self, item: Arc<TransferItem>) -> TransferResult<bool>;

    /// Release long-lived resources. Per-call backends have none.
    async fn close(&self) {}
}

// ─── Options ─────────────────────────────────────────────────────────

/// Behaviour shared by every backend, fixed at construction.
#[derive(Clone, Default)]
pub struct BackendOptions {
    pub check_for_duplicates: bool,
    pub resolver: Option<Arc<dyn DuplicateResolver>>,
    pub events: TransferEvents,
}

impl BackendOptions {
    pub fn new(events: TransferEvents) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }

    pub fn with_duplicate_check(mut self, resolver: Arc<dyn DuplicateResolver>) -> Self {
        self.check_for_duplicates = true;
        self.resolver = Some(resolver);
        self
    }
}

// ─── Shared helpers ──────────────────────────────────────────────────

/// Notification and duplicate-resolution logic every backend embeds.
#[derive(Clone)]
pub struct BackendShared {
    hostname: String,
    options: BackendOptions,
}

impl BackendShared {
    pub fn new(hostname: impl Into<String>, options: BackendOptions) -> Self {
        Self {
            hostname: hostname.into(),
            options,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn events(&self) -> &TransferEvents {
        &self.options.events
    }

    /// Whether the target directory must be listed before uploading `item`.
    ///
    /// Requires the setting, a registered resolver and an item that came
    /// from a file on disk.
    pub fn wants_duplicate_check(&self, item: &TransferItem) -> bool {
        self.options.check_for_duplicates
            && self.options.resolver.is_some()
            && item.original_file_name().is_some()
    }

    /// Run the duplicate protocol against a listing of `target`'s directory.
    ///
    /// Returns the path to upload to, or `None` when the resolver aborted.
    pub async fn resolve_target(
        &self,
        item: &Arc<TransferItem>,
        target: &str,
        listing: &[String],
    ) -> Option<String> {
        let (resolver, original) = match (&self.options.resolver, item.original_file_name()) {
            (Some(r), Some(name)) => (Arc::clone(r), name),
            _ => return Some(target.to_string()),
        };

        let candidate = match find_duplicate(listing, &original) {
            Some(c) => c.to_string(),
            None => return Some(target.to_string()),
        };

        let directory = paths::remote_parent(target);
        let request = DuplicateRequest {
            item: Arc::clone(item),
            hostname: self.hostname.clone(),
            candidate_path: paths::uri_combine(&[&directory, &candidate]),
            candidate_name: candidate,
        };

        info!(
            "Duplicate of '{}' found on {}: {}",
            original, self.hostname, request.candidate_path
        );

        let pending = request.clone();
        let decision = match tokio::task::spawn_blocking(move || resolver.resolve(&pending)).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!("Duplicate resolver failed, ignoring duplicate: {}", e);
                DuplicateDecision::Ignore
            }
        };

        self.options.events.emit(TransferEvent::DuplicateFound {
            item: Arc::clone(item),
            hostname: self.hostname.clone(),
            candidate_name: request.candidate_name.clone(),
            decision: decision.clone(),
        });

        match decision {
            DuplicateDecision::Ignore => Some(target.to_string()),
            DuplicateDecision::Replace(path) => {
                let path = if path.is_empty() {
                    request.candidate_path
                } else {
                    path
                };
                info!("Changed upload target to {}", path);
                Some(path)
            }
            DuplicateDecision::Abort => None,
        }
    }

    // ── Notifications ────────────────────────────────────────────

    /// Record the remote path and publish success.
    pub fn upload_succeeded(&self, item: &Arc<TransferItem>, remote_path: &str) -> UploadOutcome {
        item.set_remote_path(remote_path);
        info!("Uploaded {} to {}:{}", item.id(), self.hostname, remote_path);
        self.options.events.emit(TransferEvent::UploadSucceeded {
            item: Arc::clone(item),
            remote_path: remote_path.to_string(),
        });
        UploadOutcome::Success {
            remote_path: remote_path.to_string(),
        }
    }

    pub fn upload_failed(&self, item: &Arc<TransferItem>, cause: TransferError) -> UploadOutcome {
        let cause = cause.with_host(self.hostname.clone());
        warn!("Upload of {} failed: {}", item.id(), cause);
        self.options.events.emit(TransferEvent::UploadFailed {
            item: Arc::clone(item),
            cause: cause.clone(),
        });
        UploadOutcome::Failure { cause }
    }

    /// Failure outcome for an aborted duplicate; nothing is published.
    pub fn upload_aborted(&self, item: &Arc<TransferItem>) -> UploadOutcome {
        info!("Upload of {} aborted by duplicate resolution", item.id());
        UploadOutcome::Failure {
            cause: TransferError::aborted("Upload aborted: duplicate file on server")
                .with_host(self.hostname.clone()),
        }
    }

    /// Clear the remote path and publish success.
    pub fn delete_succeeded(&self, item: &Arc<TransferItem>) -> bool {
        let remote_path = item.clear_remote_path().unwrap_or_default();
        info!("Deleted {}:{}", self.hostname, remote_path);
        self.options.events.emit(TransferEvent::DeleteSucceeded {
            item: Arc::clone(item),
            remote_path,
        });
        true
    }

    pub fn delete_failed(&self, item: &Arc<TransferItem>, cause: TransferError) -> bool {
        let cause = cause.with_host(self.hostname.clone());
        warn!("Delete of {} failed: {}", item.id(), cause);
        self.options.events.emit(TransferEvent::DeleteFailed {
            item: Arc::clone(item),
            cause,
        });
        false
    }
}

// ─── Precondition checks ─────────────────────────────────────────────

pub fn validate_target(target: &str) -> TransferResult<()> {
    if target.trim().is_empty() {
        return Err(TransferError::invalid_operation("Upload target must not be empty"));
    }
    Ok(())
}

/// Remote path of an uploaded item, or an invalid-operation error.
pub fn require_remote_path(item: &TransferItem) -> TransferResult<String> {
    item.remote_path()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            TransferError::invalid_operation(format!(
                "Item {} has not been uploaded (no remote path)",
                item.id()
            ))
        })
}
