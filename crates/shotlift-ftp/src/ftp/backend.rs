//! `TransferBackend` over FTP.
//!
//! Each call opens its own logged-in session and quits it before
//! returning, so the backend can be shared by concurrent uploads.
//! Only the immediate parent of the target is ever created: `MKD` is
//! single-level and deeper trees must already exist on the server.

use crate::ftp::session::{FtpConnector, FtpSession, TcpConnector};
use async_trait::async_trait;
use log::{debug, warn};
use shotlift_core::backend::{require_remote_path, validate_target};
use shotlift_core::paths::remote_parent;
use shotlift_core::{
    BackendOptions, BackendShared, ConnectionInfo, Protocol, TransferBackend, TransferError, TransferItem,
    TransferResult, UploadOutcome,
};
use std::sync::Arc;

pub struct FtpBackend {
    info: ConnectionInfo,
    shared: BackendShared,
    connector: Arc<dyn FtpConnector>,
}

impl FtpBackend {
    pub fn new(info: ConnectionInfo, options: BackendOptions) -> Self {
        Self::with_connector(info, options, Arc::new(TcpConnector))
    }

    pub fn with_connector(info: ConnectionInfo, options: BackendOptions, connector: Arc<dyn FtpConnector>) -> Self {
        let shared = BackendShared::new(info.host(), options);
        Self {
            info,
            shared,
            connector,
        }
    }

    async fn open(&self) -> TransferResult<Box<dyn FtpSession>> {
        self.connector.connect(&self.info).await.map_err(|e| {
            let host = self.info.host().to_string();
            if e.is_connection_error() {
                e.with_host(host)
            } else {
                TransferError::connection_failed(host, e.message)
            }
        })
    }

    async fn upload_with(
        &self,
        session: &mut dyn FtpSession,
        item: &Arc<TransferItem>,
        target: &str,
    ) -> UploadOutcome {
        let parent = remote_parent(target);
        let mut created_parent = false;
        if !parent.is_empty() && parent != "/" {
            match session.directory_exists(&parent).await {
                Ok(true) => {}
                Ok(false) => {
                    created_parent = true;
                    if let Err(e) = session.make_directory(&parent).await {
                        warn!("Could not create {} on {}: {}", parent, self.shared.hostname(), e);
                    }
                }
                Err(e) => debug!("Directory check for {} failed: {}", parent, e),
            }
        }

        let target = if self.shared.wants_duplicate_check(item) {
            let listing = session.list_names(&parent).await.unwrap_or_else(|e| {
                debug!("Listing {} failed, skipping duplicate check: {}", parent, e);
                Vec::new()
            });
            match self.shared.resolve_target(item, target, &listing).await {
                Some(t) => t,
                None => return self.shared.upload_aborted(item),
            }
        } else {
            target.to_string()
        };

        let data = match item.to_bytes() {
            Ok(data) => data,
            Err(e) => return self.shared.upload_failed(item, TransferError::from(e)),
        };

        let mut result = session.store(&target, &data).await;
        if let Err(e) = &result {
            if e.is_directory_missing() {
                let dir = remote_parent(&target);
                debug!("STOR {} failed ({}), creating {} and retrying once", target, e, dir);
                if !created_parent {
                    if let Err(e) = session.make_directory(&dir).await {
                        warn!("Could not create {} on {}: {}", dir, self.shared.hostname(), e);
                    }
                }
                result = session.store(&target, &data).await;
            }
        }

        match result {
            Ok(()) => self.shared.upload_succeeded(item, &target),
            Err(e) => self.shared.upload_failed(item, e),
        }
    }
}

#[async_trait]
impl TransferBackend for FtpBackend {
    fn protocol(&self) -> Protocol {
        Protocol::Ftp
    }

    fn hostname(&self) -> String {
        self.shared.hostname().to_string()
    }

    async fn upload(&self, item: Arc<TransferItem>, target: &str) -> TransferResult<UploadOutcome> {
        validate_target(target)?;
        let mut session = self.open().await?;
        let outcome = self.upload_with(session.as_mut(), &item, target).await;
        if let Err(e) = session.quit().await {
            debug!("QUIT failed: {}", e);
        }
        Ok(outcome)
    }

    async fn undo_upload(&self, item: Arc<TransferItem>) -> TransferResult<bool> {
        let remote_path = require_remote_path(&item)?;
        let mut session = self.open().await?;
        let deleted = match session.delete(&remote_path).await {
            Ok(()) => self.shared.delete_succeeded(&item),
            Err(e) => self.shared.delete_failed(&item, e),
        };
        if let Err(e) = session.quit().await {
            debug!("QUIT failed: {}", e);
        }
        Ok(deleted)
    }
}
