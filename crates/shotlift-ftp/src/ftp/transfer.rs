//! Passive data-channel management (RFC 959 PASV, RFC 2428 EPSV).
//!
//! Active mode is not offered: uploads from desktops sit behind NAT far
//! more often than servers do.

use crate::ftp::protocol::FtpCodec;
use regex::Regex;
use shotlift_core::{TransferError, TransferResult};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Which passive command to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassiveMode {
    Passive,
    ExtendedPassive,
}

/// Open a passive data channel. EPSV falls back to PASV when refused.
pub async fn open_data_channel(
    codec: &mut FtpCodec,
    mode: PassiveMode,
    host: &str,
    peer_ip: Option<IpAddr>,
    data_timeout: Duration,
) -> TransferResult<TcpStream> {
    if mode == PassiveMode::ExtendedPassive {
        match open_epsv(codec, host, peer_ip, data_timeout).await {
            Ok(tcp) => return Ok(tcp),
            Err(e) => log::debug!("EPSV failed ({}), falling back to PASV", e),
        }
    }
    open_pasv(codec, peer_ip, data_timeout).await
}

// ─── PASV ────────────────────────────────────────────────────────────

/// Issue `PASV`, parse the response, connect to the returned address.
///
/// Response format: `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)`
async fn open_pasv(
    codec: &mut FtpCodec,
    peer_ip: Option<IpAddr>,
    data_timeout: Duration,
) -> TransferResult<TcpStream> {
    let resp = codec.expect_ok("PASV").await?;
    let mut addr = parse_pasv_response(&resp.text())?;

    // Servers behind NAT sometimes advertise 0.0.0.0 or a private address
    // that differs from the one we reached; prefer the control peer then.
    if let Some(peer) = peer_ip {
        if addr.ip().is_unspecified() || (is_private(addr.ip()) && !is_private(peer)) {
            addr.set_ip(peer);
        }
    }

    timeout(data_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| TransferError::data_channel("PASV data connect timed out"))?
        .map_err(|e| TransferError::data_channel(format!("PASV data connect: {}", e)))
}

/// Parse `(h1,h2,h3,h4,p1,p2)` from a 227 response.
fn parse_pasv_response(text: &str) -> TransferResult<SocketAddr> {
    let re = Regex::new(r"\((\d+),(\d+),(\d+),(\d+),(\d+),(\d+)\)")
        .map_err(|e| TransferError::protocol_error(e.to_string()))?;
    let caps = re
        .captures(text)
        .ok_or_else(|| TransferError::protocol_error(format!("Cannot parse PASV: {}", text)))?;

    let nums: Vec<u8> = (1..=6)
        .map(|i| {
            caps[i]
                .parse::<u8>()
                .map_err(|_| TransferError::protocol_error("PASV number out of range"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let ip = IpAddr::from([nums[0], nums[1], nums[2], nums[3]]);
    let port = u16::from(nums[4]) * 256 + u16::from(nums[5]);
    Ok(SocketAddr::new(ip, port))
}

fn is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback(),
    }
}

// ─── EPSV ────────────────────────────────────────────────────────────

/// Issue `EPSV`, parse port, connect to the *same host* on that port.
///
/// Response format: `229 Entering Extended Passive Mode (|||port|)`
async fn open_epsv(
    codec: &mut FtpCodec,
    host: &str,
    peer_ip: Option<IpAddr>,
    data_timeout: Duration,
) -> TransferResult<TcpStream> {
    let resp = codec.expect_ok("EPSV").await?;
    let port = parse_epsv_response(&resp.text())?;
    let connect = async {
        match peer_ip {
            Some(ip) => TcpStream::connect(SocketAddr::new(ip, port)).await,
            None => TcpStream::connect((host, port)).await,
        }
    };
    timeout(data_timeout, connect)
        .await
        .map_err(|_| TransferError::data_channel("EPSV data connect timed out"))?
        .map_err(|e| TransferError::data_channel(format!("EPSV data connect: {}", e)))
}

fn parse_epsv_response(text: &str) -> TransferResult<u16> {
    let re = Regex::new(r"\|\|\|(\d+)\|").map_err(|e| TransferError::protocol_error(e.to_string()))?;
    let caps = re
        .captures(text)
        .ok_or_else(|| TransferError::protocol_error(format!("Cannot parse EPSV: {}", text)))?;
    caps[1]
        .parse::<u16>()
        .map_err(|_| TransferError::protocol_error("EPSV port out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pasv_reply() {
        let addr = parse_pasv_response("227 Entering Passive Mode (192,168,1,2,19,137)").unwrap();
        assert_eq!(addr, "192.168.1.2:5001".parse().unwrap());
    }

    #[test]
    fn rejects_out_of_range_pasv() {
        assert!(parse_pasv_response("227 (300,1,1,1,1,1)").is_err());
        assert!(parse_pasv_response("227 nothing here").is_err());
    }

    #[test]
    fn parses_epsv_reply() {
        assert_eq!(
            parse_epsv_response("229 Entering Extended Passive Mode (|||6446|)").unwrap(),
            6446
        );
    }

    #[test]
    fn private_detection() {
        assert!(is_private("10.0.0.1".parse().unwrap()));
        assert!(!is_private("93.184.216.34".parse().unwrap()));
    }
}
