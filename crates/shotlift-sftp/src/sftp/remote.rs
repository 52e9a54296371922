//! The remote-filesystem seam the backend drives, and its libssh2
//! implementation.

use crate::sftp::session;
use log::debug;
use shotlift_core::{ConnectionInfo, TransferError, TransferErrorKind, TransferResult};
use ssh2::{ErrorCode, Session, Sftp};
use std::io::Write;
use std::path::Path;

// libssh2 SFTP status codes.
const FX_NO_SUCH_FILE: i32 = 2;
const FX_PERMISSION_DENIED: i32 = 3;
const FX_NO_SUCH_PATH: i32 = 10;

/// Blocking filesystem operations on one open SFTP session.
pub trait RemoteFs: Send {
    fn exists(&mut self, path: &str) -> TransferResult<bool>;
    fn mkdir(&mut self, path: &str) -> TransferResult<()>;
    fn list_names(&mut self, dir: &str) -> TransferResult<Vec<String>>;
    fn write(&mut self, path: &str, data: &[u8]) -> TransferResult<()>;
    fn unlink(&mut self, path: &str) -> TransferResult<()>;
    /// Disconnect. Called exactly once per session.
    fn close(&mut self);
}

/// Opens sessions. Blocking.
pub trait SftpConnector: Send + Sync {
    fn connect(&self, info: &ConnectionInfo) -> TransferResult<Box<dyn RemoteFs>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Ssh2Connector;

impl SftpConnector for Ssh2Connector {
    fn connect(&self, info: &ConnectionInfo) -> TransferResult<Box<dyn RemoteFs>> {
        let session = session::open_session(info)?;
        let sftp = session
            .sftp()
            .map_err(|e| TransferError::connection_failed(info.host(), format!("SFTP subsystem unavailable: {}", e)))?;
        Ok(Box::new(Ssh2Fs { session, sftp }))
    }
}

pub struct Ssh2Fs {
    session: Session,
    sftp: Sftp,
}

impl RemoteFs for Ssh2Fs {
    fn exists(&mut self, path: &str) -> TransferResult<bool> {
        match self.sftp.stat(Path::new(path)) {
            Ok(_) => Ok(true),
            Err(e) if is_missing(&e) => Ok(false),
            Err(e) => Err(map_sftp_error("stat", path, e)),
        }
    }

    fn mkdir(&mut self, path: &str) -> TransferResult<()> {
        self.sftp
            .mkdir(Path::new(path), 0o755)
            .map_err(|e| map_sftp_error("mkdir", path, e))?;
        debug!("SFTP mkdir: {}", path);
        Ok(())
    }

    fn list_names(&mut self, dir: &str) -> TransferResult<Vec<String>> {
        let entries = self
            .sftp
            .readdir(Path::new(dir))
            .map_err(|e| map_sftp_error("readdir", dir, e))?;
        Ok(entries
            .into_iter()
            .filter_map(|(path, _)| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect())
    }

    fn write(&mut self, path: &str, data: &[u8]) -> TransferResult<()> {
        let mut file = self
            .sftp
            .create(Path::new(path))
            .map_err(|e| map_sftp_error("create", path, e))?;
        file.write_all(data)
            .map_err(|e| TransferError::transfer_failed(format!("write '{}' failed: {}", path, e)))?;
        Ok(())
    }

    fn unlink(&mut self, path: &str) -> TransferResult<()> {
        self.sftp
            .unlink(Path::new(path))
            .map_err(|e| map_sftp_error("unlink", path, e))
    }

    fn close(&mut self) {
        if let Err(e) = self.session.disconnect(None, "shotlift done", None) {
            debug!("SFTP disconnect failed: {}", e);
        }
    }
}

fn is_missing(e: &ssh2::Error) -> bool {
    matches!(e.code(), ErrorCode::SFTP(FX_NO_SUCH_FILE) | ErrorCode::SFTP(FX_NO_SUCH_PATH))
}

fn map_sftp_error(op: &str, path: &str, e: ssh2::Error) -> TransferError {
    let message = format!("{} '{}' failed: {}", op, path, e);
    match e.code() {
        ErrorCode::SFTP(FX_NO_SUCH_FILE) | ErrorCode::SFTP(FX_NO_SUCH_PATH) => TransferError::not_found(message),
        ErrorCode::SFTP(FX_PERMISSION_DENIED) => TransferError::new(TransferErrorKind::PermissionDenied, message),
        _ => TransferError::transfer_failed(message),
    }
}
