use async_trait::async_trait;
use log::info;
use shotlift_core::{BackendOptions, Protocol, Settings, TransferBackend, TransferError, TransferResult};
use shotlift_ftp::FtpBackend;
use shotlift_scp::ScpBackend;
use shotlift_sftp::SftpBackend;
use std::sync::Arc;

/// Builds the backend for the current settings.
#[async_trait]
pub trait BackendFactory: Send + Sync {
    async fn build(&self, settings: &Settings, options: BackendOptions) -> TransferResult<Arc<dyn TransferBackend>>;
}

/// Picks FTP, SFTP or SCP from `settings.protocol`.
///
/// The SCP backend connects while being built; the others connect per call.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBackendFactory;

#[async_trait]
impl BackendFactory for DefaultBackendFactory {
    async fn build(&self, settings: &Settings, options: BackendOptions) -> TransferResult<Arc<dyn TransferBackend>> {
        settings
            .validate()
            .map_err(|e| TransferError::invalid_config(e.to_string()))?;
        let info = settings.connection_info();
        info!("Creating {} backend for {}", settings.protocol, info.address());

        Ok(match settings.protocol {
            Protocol::Ftp => Arc::new(FtpBackend::new(info, options)),
            Protocol::Sftp => Arc::new(SftpBackend::new(info, options)),
            Protocol::Scp => {
                Arc::new(ScpBackend::connect(info, options, settings.scp_tool_directory.clone()).await?)
            }
        })
    }
}
