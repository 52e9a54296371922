//! # shotlift-core: Shared Transfer Contract
//!
//! Everything the protocol crates and the orchestrator agree on:
//! - `error`: the transfer error taxonomy
//! - `types`: connection parameters, outcomes, protocol selection
//! - `item`: artifact sources and the `TransferItem` handed to backends
//! - `events`: the backend notification channel
//! - `duplicate`: duplicate-file resolution protocol
//! - `backend`: the `TransferBackend` trait and shared notification helpers
//! - `paths`: remote path, URL and filename-template helpers
//! - `settings`: persisted user configuration
//! - `logging`: subscriber bootstrap for binaries

pub mod error;
pub mod types;
pub mod item;
pub mod events;
pub mod duplicate;
pub mod backend;
pub mod paths;
pub mod settings;
pub mod logging;

pub use backend::{BackendOptions, BackendShared, TransferBackend};
pub use duplicate::{DuplicateDecision, DuplicateRequest, DuplicateResolver};
pub use error::{TransferError, TransferErrorKind, TransferResult};
pub use events::{TransferEvent, TransferEvents};
pub use item::{Artifact, CaptureSource, FileArtifact, FilenameContext, MemoryArtifact, TransferItem};
pub use settings::{Settings, SettingsError};
pub use types::{ConnectionInfo, Protocol, UploadOutcome};
