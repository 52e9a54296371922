//! # shotlift-sftp: SFTP Transfer Backend
//!
//! Architecture:
//! - `session`: TCP connect, SSH handshake, host-key pinning, authentication
//! - `remote`: the remote-filesystem seam and its libssh2 implementation
//! - `backend`: `TransferBackend` implementation, one session per call

pub mod session;
pub mod remote;
pub mod backend;
