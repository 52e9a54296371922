//! # shotlift-manager: Upload Orchestration
//!
//! Architecture:
//! - `sink`: the notification collaborator driven by finished transfers
//! - `history`: LIFO of successful uploads for "undo last upload"
//! - `factory`: builds the protocol backend selected in the settings
//! - `orchestrator`: `UploadManager`: dispatch, history, failure reporting

pub mod sink;
pub mod history;
pub mod factory;
pub mod orchestrator;
