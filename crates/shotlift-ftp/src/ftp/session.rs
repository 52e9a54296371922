//! The narrow command surface the backend drives.
//!
//! `FtpClient` is the production session; tests substitute a scripted one.

use crate::ftp::client::FtpClient;
use async_trait::async_trait;
use shotlift_core::{ConnectionInfo, TransferResult};

#[async_trait]
pub trait FtpSession: Send {
    async fn directory_exists(&mut self, path: &str) -> TransferResult<bool>;
    async fn make_directory(&mut self, path: &str) -> TransferResult<()>;
    async fn list_names(&mut self, dir: &str) -> TransferResult<Vec<String>>;
    async fn store(&mut self, path: &str, data: &[u8]) -> TransferResult<()>;
    async fn delete(&mut self, path: &str) -> TransferResult<()>;
    async fn quit(&mut self) -> TransferResult<()>;
}

/// Opens logged-in sessions.
#[async_trait]
pub trait FtpConnector: Send + Sync {
    async fn connect(&self, info: &ConnectionInfo) -> TransferResult<Box<dyn FtpSession>>;
}

/// Plain TCP connector backed by [`FtpClient`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

#[async_trait]
impl FtpConnector for TcpConnector {
    async fn connect(&self, info: &ConnectionInfo) -> TransferResult<Box<dyn FtpSession>> {
        let client = FtpClient::connect(info).await?;
        Ok(Box::new(client))
    }
}

#[async_trait]
impl FtpSession for FtpClient {
    async fn directory_exists(&mut self, path: &str) -> TransferResult<bool> {
        FtpClient::directory_exists(self, path).await
    }

    async fn make_directory(&mut self, path: &str) -> TransferResult<()> {
        FtpClient::make_directory(self, path).await
    }

    async fn list_names(&mut self, dir: &str) -> TransferResult<Vec<String>> {
        FtpClient::list_names(self, dir).await
    }

    async fn store(&mut self, path: &str, data: &[u8]) -> TransferResult<()> {
        FtpClient::store(self, path, data).await
    }

    async fn delete(&mut self, path: &str) -> TransferResult<()> {
        FtpClient::delete(self, path).await
    }

    async fn quit(&mut self) -> TransferResult<()> {
        FtpClient::quit(self).await
    }
}
