//! The upload orchestrator.
//!
//! Owns at most one live backend, built lazily from the current settings
//! and discarded when a configuration change affects the connection.
//! Every upload and undo runs on its own tokio task; the caller gets a
//! ticket back immediately and may ignore the join handle.

use crate::manager::factory::{BackendFactory, DefaultBackendFactory};
use crate::manager::history::HistoryStack;
use crate::manager::sink::NotificationSink;
use log::{info, warn};
use shotlift_core::paths::{self, remove_invalid_filename_chars, uri_combine};
use shotlift_core::{
    BackendOptions, DuplicateResolver, Settings, TransferBackend, TransferError, TransferEvent,
    TransferEvents, TransferItem, TransferResult, UploadOutcome,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Extensions accepted by [`UploadManager::upload_files`].
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "gif"];

/// Returned by [`UploadManager::upload`] before the transfer starts.
#[derive(Debug)]
pub struct UploadTicket {
    pub item: Arc<TransferItem>,
    /// Requested remote path. Duplicate resolution may redirect it.
    pub target: String,
    /// Public link for `target`, when an HTTP base is configured.
    pub public_url: Option<String>,
    pub handle: JoinHandle<TransferResult<UploadOutcome>>,
}

pub struct UploadManager {
    settings: RwLock<Settings>,
    backend: Mutex<Option<Arc<dyn TransferBackend>>>,
    factory: Arc<dyn BackendFactory>,
    history: HistoryStack,
    sink: Arc<dyn NotificationSink>,
    resolver: Option<Arc<dyn DuplicateResolver>>,
    events: TransferEvents,
}

impl UploadManager {
    pub fn new(settings: Settings, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            settings: RwLock::new(settings),
            backend: Mutex::new(None),
            factory: Arc::new(DefaultBackendFactory),
            history: HistoryStack::new(),
            sink,
            resolver: None,
            events: TransferEvents::new(),
        }
    }

    /// Responder for duplicate files. Without one the duplicate check is
    /// skipped even when enabled in the settings.
    pub fn with_resolver(mut self, resolver: Arc<dyn DuplicateResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_factory(mut self, factory: Arc<dyn BackendFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn settings(&self) -> Settings {
        self.settings.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Backend notifications, including duplicate decisions.
    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.events.subscribe()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn last_uploaded(&self) -> Option<Arc<TransferItem>> {
        self.history.peek()
    }

    // ─── Backend lifecycle ───────────────────────────────────────

    async fn backend(&self) -> TransferResult<Arc<dyn TransferBackend>> {
        let mut slot = self.backend.lock().await;
        if let Some(backend) = slot.as_ref() {
            return Ok(Arc::clone(backend));
        }

        let settings = self.settings();
        let mut options = BackendOptions::new(self.events.clone());
        if settings.check_for_duplicate_files {
            if let Some(resolver) = &self.resolver {
                options = options.with_duplicate_check(Arc::clone(resolver));
            }
        }

        let built = self.factory.build(&settings, options).await?;
        info!("Using {} backend for {}", built.protocol(), built.hostname());
        *slot = Some(Arc::clone(&built));
        Ok(built)
    }

    /// Replace the settings. A change to anything a backend captured
    /// closes the live backend; the next transfer builds a new one.
    pub async fn configuration_changed(&self, settings: Settings) {
        let differs = {
            let mut current = self.settings.write().unwrap_or_else(|e| e.into_inner());
            let differs = current.connection_differs(&settings);
            *current = settings;
            differs
        };
        if differs {
            if let Some(old) = self.backend.lock().await.take() {
                info!("Connection settings changed, discarding {} backend", old.protocol());
                old.close().await;
            }
        }
    }

    /// Close the live backend, if any.
    pub async fn shutdown(&self) {
        if let Some(backend) = self.backend.lock().await.take() {
            backend.close().await;
        }
    }

    // ─── Upload ──────────────────────────────────────────────────

    /// Dispatch an upload and return at once. Must be called within a
    /// tokio runtime.
    ///
    /// Fails only when the file name template cannot be expanded.
    pub fn upload(self: &Arc<Self>, item: Arc<TransferItem>) -> TransferResult<UploadTicket> {
        let settings = self.settings();
        let file_name = item.file_name(&settings.filename_format)?;
        let target = uri_combine(&[&settings.server_path, &file_name]);
        let public_url = if settings.http_base_uri.is_empty() {
            None
        } else {
            paths::public_url(&settings.http_base_uri, &file_name).ok()
        };

        let span = tracing::info_span!("upload", item = %item.id(), target = %target);
        let manager = Arc::clone(self);
        let task_item = Arc::clone(&item);
        let task_target = target.clone();
        let handle = tokio::spawn(async move { manager.run_upload(task_item, task_target).await }.instrument(span));

        Ok(UploadTicket {
            item,
            target,
            public_url,
            handle,
        })
    }

    /// Dispatch every image file in `paths`; other files are skipped.
    pub fn upload_files(self: &Arc<Self>, paths: &[PathBuf]) -> Vec<UploadTicket> {
        paths
            .iter()
            .filter(|p| is_image_file(p))
            .filter_map(|p| match self.upload(TransferItem::from_file(p.clone())) {
                Ok(ticket) => Some(ticket),
                Err(e) => {
                    warn!("Skipping {}: {}", p.display(), e);
                    None
                }
            })
            .collect()
    }

    async fn run_upload(&self, item: Arc<TransferItem>, target: String) -> TransferResult<UploadOutcome> {
        let backend = match self.backend().await {
            Ok(b) => b,
            Err(e) => {
                let host = self.settings().host;
                self.report_failure(&item, &host, &e);
                return Err(e);
            }
        };

        let result = backend.upload(Arc::clone(&item), &target).await;
        match &result {
            Ok(UploadOutcome::Success { remote_path }) => {
                self.history.push(Arc::clone(&item));
                let url = self.public_url_for(remote_path);
                self.sink.upload_succeeded(&item, &url);
            }
            Ok(UploadOutcome::Failure { cause }) => self.report_failure(&item, &backend.hostname(), cause),
            Err(e) => self.report_failure(&item, &backend.hostname(), e),
        }
        result
    }

    /// Public link of an uploaded file, or its remote path.
    fn public_url_for(&self, remote_path: &str) -> String {
        let settings = self.settings();
        if settings.http_base_uri.is_empty() {
            return remote_path.to_string();
        }
        paths::translate_server_path(remote_path, &settings.server_path, &settings.http_base_uri)
            .or_else(|e| {
                warn!("{}", e);
                paths::public_url(&settings.http_base_uri, paths::remote_file_name(remote_path))
            })
            .unwrap_or_else(|_| remote_path.to_string())
    }

    /// Back the artifact up locally and notify the sink.
    fn report_failure(&self, item: &TransferItem, hostname: &str, error: &TransferError) {
        let hostname = error.host.as_deref().unwrap_or(hostname);
        warn!("Upload of {} to {} failed: {}", item.id(), hostname, error);

        let settings = self.settings();
        if let Some(folder) = settings.failed_uploads_folder.as_deref() {
            match backup_failed_upload(item, folder, &settings.filename_format) {
                Ok(path) => info!("Saved failed upload to {}", path.display()),
                Err(e) => warn!("Could not save failed upload to {}: {}", folder.display(), e),
            }
        }
        self.sink.upload_failed(item, hostname, error);
    }

    // ─── Undo ────────────────────────────────────────────────────

    /// Undo the most recent upload. `None` when there is nothing to undo.
    pub fn undo_last(self: &Arc<Self>) -> Option<JoinHandle<TransferResult<bool>>> {
        let item = match self.history.pop() {
            Some(item) => item,
            None => {
                info!("Nothing to undo");
                return None;
            }
        };
        let span = tracing::info_span!("undo", item = %item.id());
        let manager = Arc::clone(self);
        Some(tokio::spawn(async move { manager.run_undo(item).await }.instrument(span)))
    }

    async fn run_undo(&self, item: Arc<TransferItem>) -> TransferResult<bool> {
        let backend = match self.backend().await {
            Ok(b) => b,
            Err(e) => {
                warn!("Undo of {} failed: {}", item.id(), e);
                self.sink.delete_failed(&item, &self.settings().host);
                return Err(e);
            }
        };
        match backend.undo_upload(Arc::clone(&item)).await {
            Ok(true) => {
                self.sink.delete_succeeded(&item);
                Ok(true)
            }
            Ok(false) => {
                self.sink.delete_failed(&item, &backend.hostname());
                Ok(false)
            }
            Err(e) => {
                warn!("Undo of {} failed: {}", item.id(), e);
                self.sink.delete_failed(&item, &backend.hostname());
                Err(e)
            }
        }
    }
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |ext| IMAGE_EXTENSIONS.iter().any(|i| i.eq_ignore_ascii_case(ext)))
}

/// Write `item` to `folder` under a sanitized name, creating the folder.
fn backup_failed_upload(item: &TransferItem, folder: &Path, template: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(folder)?;
    let name = item
        .original_file_name()
        .or_else(|| item.file_name(template).ok())
        .unwrap_or_else(|| format!("{}.{}", item.id(), item.extension()));
    let path = folder.join(remove_invalid_filename_chars(&name));
    item.save_to(&path)?;
    Ok(path)
}
