//! `TransferBackend` through an external SCP tool.
//!
//! Unlike the FTP and SFTP backends the session lives as long as the
//! backend: it is opened by [`ScpBackend::connect`] and closed by
//! [`TransferBackend::close`] or on drop. Concurrent uploads through one
//! instance are not supported; callers must serialize them.

use crate::scp::tool::{shell_escape, OpenSshTool, ScpTool};
use async_trait::async_trait;
use log::{debug, warn};
use shotlift_core::backend::{require_remote_path, validate_target};
use shotlift_core::paths::remote_parent;
use shotlift_core::{
    BackendOptions, BackendShared, ConnectionInfo, Protocol, TransferBackend, TransferError, TransferItem,
    TransferResult, UploadOutcome,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

pub struct ScpBackend {
    shared: BackendShared,
    tool: Arc<dyn ScpTool>,
}

/// The file handed to the tool: the item's own file, or a temporary copy.
enum LocalSource {
    Original(PathBuf),
    Temporary(NamedTempFile),
}

impl LocalSource {
    fn path(&self) -> &Path {
        match self {
            LocalSource::Original(p) => p,
            LocalSource::Temporary(f) => f.path(),
        }
    }
}

impl ScpBackend {
    /// Open the tool session for `info`.
    pub async fn connect(info: ConnectionInfo, options: BackendOptions, tool_dir: Option<PathBuf>) -> TransferResult<Self> {
        let host = info.host().to_string();
        let tool = OpenSshTool::open(info, tool_dir).await?;
        Ok(Self::with_tool(host, options, Arc::new(tool)))
    }

    pub fn with_tool(hostname: impl Into<String>, options: BackendOptions, tool: Arc<dyn ScpTool>) -> Self {
        Self {
            shared: BackendShared::new(hostname, options),
            tool,
        }
    }

    fn local_source(item: &TransferItem) -> TransferResult<LocalSource> {
        if let Some(path) = item.original_path() {
            return Ok(LocalSource::Original(path.to_path_buf()));
        }
        let mut file = tempfile::Builder::new()
            .prefix("shotlift-")
            .suffix(&format!(".{}", item.extension()))
            .tempfile()?;
        file.write_all(&item.to_bytes()?)?;
        file.flush()?;
        Ok(LocalSource::Temporary(file))
    }

    async fn list_directory(&self, dir: &str) -> Vec<String> {
        let dir = if dir.is_empty() { "." } else { dir };
        match self.tool.exec(&format!("ls -1a {}", shell_escape(dir))).await {
            Ok(out) => out.lines().map(str::to_string).collect(),
            Err(e) => {
                debug!("Listing {} failed, skipping duplicate check: {}", dir, e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl TransferBackend for ScpBackend {
    fn protocol(&self) -> Protocol {
        Protocol::Scp
    }

    fn hostname(&self) -> String {
        self.shared.hostname().to_string()
    }

    async fn upload(&self, item: Arc<TransferItem>, target: &str) -> TransferResult<UploadOutcome> {
        validate_target(target)?;

        let target = if self.shared.wants_duplicate_check(&item) {
            let listing = self.list_directory(&remote_parent(target)).await;
            match self.shared.resolve_target(&item, target, &listing).await {
                Some(t) => t,
                None => return Ok(self.shared.upload_aborted(&item)),
            }
        } else {
            target.to_string()
        };

        let source = match Self::local_source(&item) {
            Ok(s) => s,
            Err(e) => return Ok(self.shared.upload_failed(&item, e)),
        };

        let mut result = self.tool.put(source.path(), &target).await;
        if let Err(e) = &result {
            let dir = remote_parent(&target);
            debug!("scp to {} failed ({}), creating {} and retrying once", target, e, dir);
            if !dir.is_empty() && dir != "/" {
                if let Err(e) = self.tool.exec(&format!("mkdir -p {}", shell_escape(&dir))).await {
                    warn!("mkdir -p {} on {} failed: {}", dir, self.shared.hostname(), e);
                }
            }
            result = self.tool.put(source.path(), &target).await;
        }

        Ok(match result {
            Ok(()) => self.shared.upload_succeeded(&item, &target),
            Err(e) => self.shared.upload_failed(&item, e),
        })
    }

    async fn undo_upload(&self, item: Arc<TransferItem>) -> TransferResult<bool> {
        let remote_path = require_remote_path(&item)?;
        Ok(match self.tool.exec(&format!("rm -- {}", shell_escape(&remote_path))).await {
            Ok(_) => self.shared.delete_succeeded(&item),
            Err(e) => self.shared.delete_failed(&item, e),
        })
    }

    async fn close(&self) {
        self.tool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shotlift_core::{
        CaptureSource, DuplicateDecision, DuplicateRequest, MemoryArtifact, TransferErrorKind, TransferEvents,
    };
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ToolLog {
        puts: Vec<(PathBuf, String, Option<Vec<u8>>)>,
        execs: Vec<String>,
        put_failures: VecDeque<TransferError>,
        listing: String,
        closed: bool,
    }

    #[derive(Clone, Default)]
    struct FakeTool(Arc<Mutex<ToolLog>>);

    impl FakeTool {
        fn fail_puts(&self, n: usize) {
            let mut log = self.0.lock().unwrap();
            for _ in 0..n {
                log.put_failures
                    .push_back(TransferError::transfer_failed("scp: /a/b/x.png: No such file or directory"));
            }
        }

        fn mkdirs(&self) -> Vec<String> {
            self.0
                .lock()
                .unwrap()
                .execs
                .iter()
                .filter(|c| c.starts_with("mkdir"))
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl ScpTool for FakeTool {
        async fn put(&self, local: &Path, remote: &str) -> TransferResult<()> {
            let mut log = self.0.lock().unwrap();
            log.puts
                .push((local.to_path_buf(), remote.to_string(), std::fs::read(local).ok()));
            match log.put_failures.pop_front() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        async fn exec(&self, command: &str) -> TransferResult<String> {
            let mut log = self.0.lock().unwrap();
            log.execs.push(command.to_string());
            if command.starts_with("ls") {
                return Ok(log.listing.clone());
            }
            Ok(String::new())
        }

        async fn close(&self) {
            self.0.lock().unwrap().closed = true;
        }
    }

    fn backend(tool: &FakeTool, options: BackendOptions) -> ScpBackend {
        ScpBackend::with_tool("scp.example.com", options, Arc::new(tool.clone()))
    }

    fn capture() -> Arc<TransferItem> {
        TransferItem::new(MemoryArtifact::png(b"pixels".to_vec(), CaptureSource::Desktop))
    }

    #[tokio::test]
    async fn failed_put_creates_directory_and_retries_once() {
        let tool = FakeTool::default();
        tool.fail_puts(1);

        let outcome = backend(&tool, BackendOptions::default())
            .upload(capture(), "/a/b/x.png")
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(tool.mkdirs(), vec!["mkdir -p '/a/b'".to_string()]);
        assert_eq!(tool.0.lock().unwrap().puts.len(), 2);
    }

    #[tokio::test]
    async fn second_failure_is_not_retried_again() {
        let tool = FakeTool::default();
        tool.fail_puts(2);
        let item = capture();

        let outcome = backend(&tool, BackendOptions::default())
            .upload(Arc::clone(&item), "/a/b/x.png")
            .await
            .unwrap();

        assert!(!outcome.is_success());
        assert!(!item.is_uploaded());
        assert_eq!(tool.mkdirs().len(), 1);
        assert_eq!(tool.0.lock().unwrap().puts.len(), 2);
    }

    #[tokio::test]
    async fn first_success_issues_no_mkdir() {
        let tool = FakeTool::default();
        backend(&tool, BackendOptions::default())
            .upload(capture(), "/a/b/x.png")
            .await
            .unwrap();
        assert!(tool.mkdirs().is_empty());
    }

    #[tokio::test]
    async fn original_file_is_sent_without_copying() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        std::fs::write(&path, b"on disk").unwrap();

        let tool = FakeTool::default();
        backend(&tool, BackendOptions::default())
            .upload(TransferItem::from_file(&path), "/up/shot.png")
            .await
            .unwrap();

        let log = tool.0.lock().unwrap();
        assert_eq!(log.puts[0].0, path);
    }

    #[tokio::test]
    async fn capture_is_staged_in_a_temporary_file() {
        let tool = FakeTool::default();
        backend(&tool, BackendOptions::default())
            .upload(capture(), "/up/x.png")
            .await
            .unwrap();

        let log = tool.0.lock().unwrap();
        let (local, remote, bytes) = &log.puts[0];
        assert_eq!(remote, "/up/x.png");
        assert_eq!(bytes.as_deref(), Some(&b"pixels"[..]));
        assert_eq!(local.extension().and_then(|e| e.to_str()), Some("png"));
        assert!(!local.exists(), "temporary copy must be removed after upload");
    }

    #[tokio::test]
    async fn abort_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        std::fs::write(&path, b"x").unwrap();
        let tool = FakeTool::default();
        tool.0.lock().unwrap().listing = ".\n..\nshot.png\n".into();
        let options = BackendOptions::new(TransferEvents::new())
            .with_duplicate_check(Arc::new(|_: &DuplicateRequest| DuplicateDecision::Abort));

        let outcome = backend(&tool, options)
            .upload(TransferItem::from_file(&path), "/up/shot.png")
            .await
            .unwrap();

        match outcome {
            UploadOutcome::Failure { cause } => assert_eq!(cause.kind, TransferErrorKind::Aborted),
            UploadOutcome::Success { .. } => panic!("abort must fail the upload"),
        }
        assert!(tool.0.lock().unwrap().puts.is_empty());
        assert_eq!(tool.0.lock().unwrap().execs, vec!["ls -1a '/up'".to_string()]);
    }

    #[tokio::test]
    async fn undo_removes_remote_file() {
        let tool = FakeTool::default();
        let scp = backend(&tool, BackendOptions::default());
        let item = capture();

        assert_eq!(
            scp.undo_upload(Arc::clone(&item)).await.unwrap_err().kind,
            TransferErrorKind::InvalidOperation
        );

        scp.upload(Arc::clone(&item), "/up/it's.png").await.unwrap();
        assert!(scp.undo_upload(Arc::clone(&item)).await.unwrap());
        assert!(!item.is_uploaded());
        assert_eq!(
            tool.0.lock().unwrap().execs.last().map(String::as_str),
            Some("rm -- '/up/it'\\''s.png'")
        );
    }

    #[tokio::test]
    async fn close_ends_the_tool_session() {
        let tool = FakeTool::default();
        backend(&tool, BackendOptions::default()).close().await;
        assert!(tool.0.lock().unwrap().closed);
    }
}
