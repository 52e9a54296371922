//! # shotlift-ftp: FTP Transfer Backend
//!
//! Just enough of RFC 959 (plus the RFC 2389 FEAT and RFC 2428 EPSV
//! extensions) to upload, list and delete:
//!
//! Architecture:
//! - `types`: replies, listing entries, server features
//! - `protocol`: low-level command/response codec
//! - `connection`: TCP transport and greeting
//! - `transfer`: passive data channel (PASV/EPSV)
//! - `client`: logged-in client session (USER/PASS, TYPE, CWD, MKD, STOR, DELE, LIST)
//! - `parser`: Unix/Windows/MLSD LIST response parsing
//! - `session`: the seam the backend talks to, so tests can script a server
//! - `backend`: `TransferBackend` implementation, one connection per call

pub mod types;
pub mod protocol;
pub mod connection;
pub mod transfer;
pub mod client;
pub mod parser;
pub mod session;
pub mod backend;

pub use types::*;
