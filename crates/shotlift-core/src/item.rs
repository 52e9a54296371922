//! Artifact sources and the `TransferItem` that backends move around.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::error::TransferResult;
use crate::paths;

// ─── Capture metadata ────────────────────────────────────────────────

/// Where an artifact came from; feeds the `{source}` placeholder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CaptureSource {
    Desktop,
    Clipboard,
    Capture,
    Window,
    File,
}

impl fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CaptureSource::Desktop => "Desktop",
            CaptureSource::Clipboard => "Clipboard",
            CaptureSource::Capture => "Capture",
            CaptureSource::Window => "Window",
            CaptureSource::File => "File",
        };
        f.write_str(s)
    }
}

/// Values available to filename templates.
#[derive(Debug, Clone, Default)]
pub struct FilenameContext {
    pub machine: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub window: Option<String>,
    pub process: Option<String>,
    /// Original file name without extension, for file-sourced artifacts.
    pub file: Option<String>,
    pub source: Option<CaptureSource>,
}

impl FilenameContext {
    /// Build the placeholder table for `paths::format_filename`.
    pub fn to_args(&self, time: DateTime<Local>) -> HashMap<String, String> {
        let mut args = HashMap::new();
        let size = |v: Option<u32>| v.map(|n| n.to_string()).unwrap_or_default();
        let dimensions = format!("{}x{}", size(self.width), size(self.height));

        args.insert("machine".to_string(), self.machine.clone());
        args.insert("width".to_string(), size(self.width));
        args.insert("height".to_string(), size(self.height));
        args.insert("window".to_string(), self.window.clone().unwrap_or_default());
        args.insert("process".to_string(), self.process.clone().unwrap_or_default());
        args.insert("file".to_string(), self.file.clone().unwrap_or_default());
        args.insert("time".to_string(), paths::compact_timestamp(time));
        args.insert("unix".to_string(), time.timestamp().to_string());

        if let Some(source) = self.source {
            let name = match source {
                CaptureSource::Window => self.process.clone().unwrap_or_default(),
                CaptureSource::File => self.file.clone().unwrap_or_default(),
                _ => dimensions,
            };
            args.insert("source".to_string(), source.to_string());
            args.insert("name".to_string(), name);
        }

        args
    }
}

/// Best-effort machine name for the `{machine}` placeholder.
pub fn machine_name() -> String {
    std::env::var("COMPUTERNAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| "localhost".to_string())
}

// ─── Artifact contract ───────────────────────────────────────────────

/// A byte-producing source handed over by the capture subsystem.
pub trait Artifact: Send + Sync {
    /// Serialize the artifact into `out`.
    fn write_to(&self, out: &mut dyn Write) -> io::Result<()>;

    /// Present only when the artifact is an existing file on disk.
    fn original_path(&self) -> Option<&Path> {
        None
    }

    /// File extension without the dot.
    fn extension(&self) -> String;

    fn filename_context(&self) -> FilenameContext;
}

/// An existing file, uploaded verbatim.
#[derive(Debug, Clone)]
pub struct FileArtifact {
    path: PathBuf,
}

impl FileArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Artifact for FileArtifact {
    fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        let mut file = std::fs::File::open(&self.path)?;
        io::copy(&mut file, out)?;
        Ok(())
    }

    fn original_path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn extension(&self) -> String {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    fn filename_context(&self) -> FilenameContext {
        FilenameContext {
            machine: machine_name(),
            file: self
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string()),
            source: Some(CaptureSource::File),
            ..Default::default()
        }
    }
}

/// Encoded bytes produced by a screen capture.
#[derive(Debug, Clone)]
pub struct MemoryArtifact {
    bytes: Arc<Vec<u8>>,
    extension: String,
    context: FilenameContext,
}

impl MemoryArtifact {
    pub fn new(bytes: Vec<u8>, extension: impl Into<String>, source: CaptureSource) -> Self {
        Self {
            bytes: Arc::new(bytes),
            extension: extension.into(),
            context: FilenameContext {
                machine: machine_name(),
                source: Some(source),
                ..Default::default()
            },
        }
    }

    pub fn png(bytes: Vec<u8>, source: CaptureSource) -> Self {
        Self::new(bytes, "png", source)
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.context.width = Some(width);
        self.context.height = Some(height);
        self
    }

    pub fn with_window(mut self, title: impl Into<String>, process: impl Into<String>) -> Self {
        self.context.window = Some(title.into());
        self.context.process = Some(process.into());
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Artifact for MemoryArtifact {
    fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(&self.bytes)
    }

    fn extension(&self) -> String {
        self.extension.clone()
    }

    fn filename_context(&self) -> FilenameContext {
        self.context.clone()
    }
}

// ─── TransferItem ────────────────────────────────────────────────────

/// The unit of work for a backend.
///
/// `remote_path` is set only by a successful upload and cleared by a
/// successful undo; it is the single piece of mutable state an item has.
pub struct TransferItem {
    id: Uuid,
    created_at: DateTime<Local>,
    artifact: Box<dyn Artifact>,
    remote_path: Mutex<Option<String>>,
}

impl TransferItem {
    pub fn new(artifact: impl Artifact + 'static) -> Arc<Self> {
        Self::from_boxed(Box::new(artifact))
    }

    pub fn from_boxed(artifact: Box<dyn Artifact>) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            created_at: Local::now(),
            artifact,
            remote_path: Mutex::new(None),
        })
    }

    /// Convenience for file-sourced items.
    pub fn from_file(path: impl Into<PathBuf>) -> Arc<Self> {
        Self::new(FileArtifact::new(path))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    pub fn original_path(&self) -> Option<&Path> {
        self.artifact.original_path()
    }

    /// File name (with extension) of the original file, if any.
    pub fn original_file_name(&self) -> Option<String> {
        self.original_path()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .filter(|n| !n.is_empty())
    }

    pub fn extension(&self) -> String {
        self.artifact.extension()
    }

    /// Serialize into an in-memory buffer.
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.artifact.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Serialize into a local file, replacing it if present.
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        self.artifact.write_to(&mut file)?;
        file.flush()
    }

    /// Generate the upload file name from a template.
    pub fn file_name(&self, template: &str) -> TransferResult<String> {
        let args = self.artifact.filename_context().to_args(self.created_at);
        let stem = paths::format_filename(template, &args, self.created_at)?;
        let ext = self.extension();
        if ext.is_empty() {
            Ok(stem)
        } else {
            Ok(format!("{}.{}", stem, ext))
        }
    }

    // ── Remote path ──────────────────────────────────────────────

    pub fn remote_path(&self) -> Option<String> {
        self.remote_path
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_uploaded(&self) -> bool {
        self.remote_path().map_or(false, |p| !p.is_empty())
    }

    pub fn set_remote_path(&self, path: impl Into<String>) {
        *self.remote_path.lock().unwrap_or_else(|e| e.into_inner()) = Some(path.into());
    }

    pub fn clear_remote_path(&self) -> Option<String> {
        self.remote_path
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}

impl fmt::Debug for TransferItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferItem")
            .field("id", &self.id)
            .field("original_path", &self.original_path())
            .field("remote_path", &self.remote_path())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn memory_item_round_trips_bytes() {
        let item = TransferItem::new(MemoryArtifact::png(vec![1, 2, 3], CaptureSource::Desktop));
        assert_eq!(item.to_bytes().unwrap(), vec![1, 2, 3]);
        assert!(item.original_path().is_none());
        assert!(item.original_file_name().is_none());
        assert_eq!(item.extension(), "png");
    }

    #[test]
    fn file_item_keeps_original_name_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        std::fs::write(&path, b"img").unwrap();

        let item = TransferItem::from_file(&path);
        assert_eq!(item.original_file_name().as_deref(), Some("shot.png"));
        assert_eq!(item.file_name("{file}").unwrap(), "shot.png");
        assert_eq!(item.to_bytes().unwrap(), b"img");
    }

    #[test]
    fn remote_path_lifecycle() {
        let item = TransferItem::new(MemoryArtifact::png(vec![], CaptureSource::Clipboard));
        assert!(!item.is_uploaded());
        item.set_remote_path("/shots/a.png");
        assert!(item.is_uploaded());
        assert_eq!(item.clear_remote_path().as_deref(), Some("/shots/a.png"));
        assert!(!item.is_uploaded());
    }

    #[test]
    fn capture_name_is_dimensions() {
        let ctx = MemoryArtifact::png(vec![], CaptureSource::Capture)
            .with_dimensions(800, 600)
            .filename_context();
        let time = Local.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let args = ctx.to_args(time);
        assert_eq!(args["name"], "800x600");
        assert_eq!(args["source"], "Capture");
        assert_eq!(args["width"], "800");
    }

    #[test]
    fn window_name_is_process() {
        let ctx = MemoryArtifact::png(vec![], CaptureSource::Window)
            .with_window("Untitled - Notepad", "notepad")
            .filename_context();
        let args = ctx.to_args(Local::now());
        assert_eq!(args["name"], "notepad");
        assert_eq!(args["window"], "Untitled - Notepad");
    }
}
