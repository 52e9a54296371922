//! `TransferBackend` over SFTP.
//!
//! Every call opens a fresh session and disconnects when it returns,
//! whatever the outcome. Missing directories are created recursively
//! before the transfer is attempted. All session I/O, including the
//! disconnect, runs on the blocking pool.

use crate::sftp::remote::{RemoteFs, SftpConnector, Ssh2Connector};
use async_trait::async_trait;
use log::debug;
use shotlift_core::backend::{require_remote_path, validate_target};
use shotlift_core::paths::remote_parent;
use shotlift_core::{
    BackendOptions, BackendShared, ConnectionInfo, Protocol, TransferBackend, TransferError, TransferItem,
    TransferResult, UploadOutcome,
};
use std::sync::Arc;

/// Disconnects the session when dropped.
struct Connected(Box<dyn RemoteFs>);

impl Drop for Connected {
    fn drop(&mut self) {
        self.0.close();
    }
}

impl Connected {
    /// Run `work` against the session on the blocking pool and hand the
    /// session back with its result.
    async fn run<T, F>(mut self, work: F) -> TransferResult<(Connected, T)>
    where
        F: FnOnce(&mut dyn RemoteFs) -> T + Send + 'static,
        T: Send + 'static,
    {
        tokio::task::spawn_blocking(move || {
            let out = work(self.0.as_mut());
            (self, out)
        })
        .await
        .map_err(|e| TransferError::transfer_failed(format!("SFTP task failed: {}", e)))
    }

    /// Disconnect on the blocking pool.
    async fn release(self) {
        if let Err(e) = tokio::task::spawn_blocking(move || drop(self)).await {
            debug!("SFTP disconnect task failed: {}", e);
        }
    }
}

pub struct SftpBackend {
    info: ConnectionInfo,
    shared: BackendShared,
    connector: Arc<dyn SftpConnector>,
}

impl SftpBackend {
    pub fn new(info: ConnectionInfo, options: BackendOptions) -> Self {
        Self::with_connector(info, options, Arc::new(Ssh2Connector))
    }

    pub fn with_connector(info: ConnectionInfo, options: BackendOptions, connector: Arc<dyn SftpConnector>) -> Self {
        let shared = BackendShared::new(info.host(), options);
        Self {
            info,
            shared,
            connector,
        }
    }

    async fn open(&self) -> TransferResult<Connected> {
        let host = self.info.host().to_string();
        let connector = Arc::clone(&self.connector);
        let info = self.info.clone();

        let fs = tokio::task::spawn_blocking(move || connector.connect(&info))
            .await
            .map_err(|e| TransferError::connection_failed(host.clone(), format!("Connect task failed: {}", e)))?
            .map_err(|e| {
                if e.is_connection_error() {
                    e.with_host(host.clone())
                } else {
                    TransferError::connection_failed(host.clone(), e.message)
                }
            })?;
        Ok(Connected(fs))
    }

    async fn upload_with(&self, conn: Connected, item: &Arc<TransferItem>, target: &str) -> UploadOutcome {
        let dir = remote_parent(target);
        let list = self.shared.wants_duplicate_check(item);

        // Directory creation and the listing share one trip to the pool.
        let prepared = conn
            .run(move |fs| -> TransferResult<Option<Vec<String>>> {
                ensure_directory(fs, &dir)?;
                if !list {
                    return Ok(None);
                }
                let listing_dir = if dir.is_empty() { "." } else { dir.as_str() };
                Ok(Some(fs.list_names(listing_dir).unwrap_or_else(|e| {
                    debug!("Listing {} failed, skipping duplicate check: {}", listing_dir, e);
                    Vec::new()
                })))
            })
            .await;
        let (conn, listing) = match prepared {
            Ok((conn, Ok(listing))) => (conn, listing),
            Ok((conn, Err(e))) => {
                conn.release().await;
                return self.shared.upload_failed(item, e);
            }
            Err(e) => return self.shared.upload_failed(item, e),
        };

        let target = match listing {
            Some(listing) => match self.shared.resolve_target(item, target, &listing).await {
                Some(t) => t,
                None => {
                    conn.release().await;
                    return self.shared.upload_aborted(item);
                }
            },
            None => target.to_string(),
        };

        let payload = Arc::clone(item);
        let path = target.clone();
        let written = conn
            .run(move |fs| {
                payload
                    .to_bytes()
                    .map_err(TransferError::from)
                    .and_then(|data| fs.write(&path, &data))
            })
            .await;
        let result = match written {
            Ok((conn, result)) => {
                conn.release().await;
                result
            }
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => self.shared.upload_succeeded(item, &target),
            Err(e) => self.shared.upload_failed(item, e),
        }
    }
}

/// Create `dir` and any missing ancestors, outermost first.
///
/// Walks upward until an existing ancestor (or the root) is found.
pub fn ensure_directory(fs: &mut dyn RemoteFs, dir: &str) -> TransferResult<()> {
    let mut missing = Vec::new();
    let mut current = dir.trim_end_matches('/').to_string();
    while !current.is_empty() && current != "/" {
        if fs.exists(&current)? {
            break;
        }
        missing.push(current.clone());
        current = remote_parent(&current);
    }
    for path in missing.iter().rev() {
        fs.mkdir(path)?;
    }
    Ok(())
}

#[async_trait]
impl TransferBackend for SftpBackend {
    fn protocol(&self) -> Protocol {
        Protocol::Sftp
    }

    fn hostname(&self) -> String {
        self.shared.hostname().to_string()
    }

    async fn upload(&self, item: Arc<TransferItem>, target: &str) -> TransferResult<UploadOutcome> {
        validate_target(target)?;
        let conn = self.open().await?;
        Ok(self.upload_with(conn, &item, target).await)
    }

    async fn undo_upload(&self, item: Arc<TransferItem>) -> TransferResult<bool> {
        let remote_path = require_remote_path(&item)?;
        let conn = self.open().await?;
        let result = match conn.run(move |fs| fs.unlink(&remote_path)).await {
            Ok((conn, result)) => {
                conn.release().await;
                result
            }
            Err(e) => Err(e),
        };
        Ok(match result {
            Ok(()) => self.shared.delete_succeeded(&item),
            Err(e) => self.shared.delete_failed(&item, e),
        })
    }
}
