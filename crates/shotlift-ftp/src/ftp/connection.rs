//! TCP transport for the FTP control connection.

use crate::ftp::protocol::FtpCodec;
use crate::ftp::types::FtpReply;
use shotlift_core::{ConnectionInfo, TransferError, TransferResult};
use std::net::IpAddr;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// An open control connection plus what the greeting told us.
pub struct ControlConnection {
    pub codec: FtpCodec,
    pub banner: FtpReply,
    /// Peer address, used when a PASV reply advertises an unusable host.
    pub peer_ip: Option<IpAddr>,
}

/// Establish the control connection and read the server greeting.
///
/// Every failure here is a connection error carrying the hostname.
pub async fn connect(info: &ConnectionInfo) -> TransferResult<ControlConnection> {
    let addr = info.address();
    let host = info.host();

    let tcp = timeout(info.timeout(), TcpStream::connect(&addr))
        .await
        .map_err(|_| TransferError::connection_failed(host, format!("TCP connect to {} timed out", addr)))?
        .map_err(|e| TransferError::connection_failed(host, format!("TCP connect to {}: {}", addr, e)))?;

    tcp.set_nodelay(true).ok();
    let peer_ip = tcp.peer_addr().ok().map(|a| a.ip());

    let mut codec = FtpCodec::from_tcp(tcp, info.timeout());
    let banner = codec
        .read_reply()
        .await
        .map_err(|e| TransferError::connection_failed(host, format!("No greeting from {}: {}", addr, e.message)))?;

    if !banner.is_completion() {
        return Err(TransferError::connection_failed(
            host,
            format!("Server refused connection: {}", banner.text()),
        )
        .with_code(banner.code));
    }

    Ok(ControlConnection {
        codec,
        banner,
        peer_ip,
    })
}
