//! # shotlift-scp: External-Tool SCP Backend
//!
//! Uploads through the system OpenSSH client instead of a native protocol
//! implementation. One `ssh` control-master connection is opened when the
//! backend is built and every `scp`/`ssh` invocation rides on it.
//!
//! Architecture:
//! - `hostkey`: `ssh-keyscan` based host-key pinning
//! - `tool`: the `ScpTool` seam and the OpenSSH subprocess implementation
//! - `backend`: `TransferBackend` implementation with mkdir-and-retry

pub mod hostkey;
pub mod tool;
pub mod backend;
