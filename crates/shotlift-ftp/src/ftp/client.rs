//! Logged-in FTP client owning the control connection.
//!
//! Lifecycle: `connect()` → authenticate → FEAT query → `TYPE I` → PWD.
//! Every operation after that works with absolute paths, so the working
//! directory only changes transiently inside `directory_exists`.

use crate::ftp::connection;
use crate::ftp::parser;
use crate::ftp::protocol::FtpCodec;
use crate::ftp::transfer::{self, PassiveMode};
use crate::ftp::types::{ReplyClass, ServerFeatures};
use shotlift_core::{ConnectionInfo, TransferError, TransferResult};
use std::net::IpAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// A logged-in FTP session.
pub struct FtpClient {
    codec: FtpCodec,
    host: String,
    timeout: Duration,
    features: ServerFeatures,
    peer_ip: Option<IpAddr>,
    home: String,
}

impl FtpClient {
    /// Connect and log in.
    ///
    /// A rejected login is reported as an authentication error tagged with
    /// the host, which callers treat as a connection error.
    pub async fn connect(info: &ConnectionInfo) -> TransferResult<Self> {
        if info.host().is_empty() {
            return Err(TransferError::invalid_config("Host must not be empty"));
        }
        let host = info.host().to_string();
        let conn = connection::connect(info).await?;
        let mut codec = conn.codec;
        log::debug!("Connected to {}: {}", host, conn.banner.text());

        // ── Authenticate ─────────────────────────────────────────
        let user_resp = codec
            .execute(&format!("USER {}", info.username()))
            .await
            .map_err(|e| TransferError::connection_failed(host.clone(), e.message))?;
        if user_resp.class() == ReplyClass::Intermediate {
            let pass_resp = codec
                .execute(&format!("PASS {}", info.password().unwrap_or_default()))
                .await
                .map_err(|e| TransferError::connection_failed(host.clone(), e.message))?;
            if !pass_resp.is_completion() {
                return Err(TransferError::auth_failed(format!("Login failed: {}", pass_resp.text()))
                    .with_code(pass_resp.code)
                    .with_host(host));
            }
        } else if !user_resp.is_completion() {
            return Err(TransferError::auth_failed(format!("USER rejected: {}", user_resp.text()))
                .with_code(user_resp.code)
                .with_host(host));
        }

        // ── FEAT ─────────────────────────────────────────────────
        let features = Self::query_features(&mut codec).await;
        if features.utf8 {
            let _ = codec.execute("OPTS UTF8 ON").await;
        }

        // ── TYPE ─────────────────────────────────────────────────
        codec.expect_ok("TYPE I").await?;

        // ── PWD ──────────────────────────────────────────────────
        let home = match codec.expect_ok("PWD").await {
            Ok(resp) => parse_pwd(&resp.text()).unwrap_or_else(|_| "/".into()),
            Err(_) => "/".into(),
        };

        Ok(Self {
            codec,
            host,
            timeout: info.timeout(),
            features,
            peer_ip: conn.peer_ip,
            home,
        })
    }

    // ─── FEAT query ──────────────────────────────────────────────

    async fn query_features(codec: &mut FtpCodec) -> ServerFeatures {
        let resp = match codec.execute("FEAT").await {
            Ok(r) if r.is_completion() => r,
            _ => return ServerFeatures::default(),
        };

        let advertised: Vec<String> = resp
            .lines
            .iter()
            .skip(1)
            .filter(|l| !l.starts_with("211"))
            .map(|l| l.trim().to_uppercase())
            .collect();
        let has = |feat: &str| advertised.iter().any(|l| l.starts_with(feat));

        ServerFeatures {
            epsv: has("EPSV"),
            utf8: has("UTF8"),
            mlsd: has("MLSD"),
        }
    }

    // ─── Directories ─────────────────────────────────────────────

    /// Check a directory by changing into it, then return home.
    pub async fn directory_exists(&mut self, path: &str) -> TransferResult<bool> {
        let resp = self.codec.execute(&format!("CWD {}", path)).await?;
        if !resp.is_completion() {
            return Ok(false);
        }
        let home = self.home.clone();
        self.codec.expect_ok(&format!("CWD {}", home)).await?;
        Ok(true)
    }

    /// Create a single directory (MKD is not recursive).
    pub async fn make_directory(&mut self, path: &str) -> TransferResult<()> {
        self.codec.expect_ok(&format!("MKD {}", path)).await?;
        Ok(())
    }

    /// Names in `dir`, from MLSD when offered, LIST otherwise.
    pub async fn list_names(&mut self, dir: &str) -> TransferResult<Vec<String>> {
        let verb = if self.features.mlsd { "MLSD" } else { "LIST" };
        let body = self.retrieve_text(&format!("{} {}", verb, dir)).await?;
        Ok(parser::file_names(&body))
    }

    // ─── Files ───────────────────────────────────────────────────

    /// Upload `data` to `path` with STOR.
    pub async fn store(&mut self, path: &str, data: &[u8]) -> TransferResult<()> {
        let mut tcp = self.open_data_channel().await?;
        self.begin_transfer(&format!("STOR {}", path)).await?;

        tcp.write_all(data)
            .await
            .map_err(|e| TransferError::data_channel(format!("STOR {}: {}", path, e)))?;
        tcp.shutdown().await?;
        drop(tcp);

        self.finish_transfer().await?;
        log::debug!("Stored {} bytes at {}:{}", data.len(), self.host, path);
        Ok(())
    }

    pub async fn delete(&mut self, path: &str) -> TransferResult<()> {
        self.codec.expect_ok(&format!("DELE {}", path)).await?;
        Ok(())
    }

    /// Gracefully close the session.
    pub async fn quit(&mut self) -> TransferResult<()> {
        let _ = self.codec.execute("QUIT").await;
        Ok(())
    }

    // ─── Data channel helpers ────────────────────────────────────

    async fn open_data_channel(&mut self) -> TransferResult<TcpStream> {
        let mode = if self.features.epsv {
            PassiveMode::ExtendedPassive
        } else {
            PassiveMode::Passive
        };
        transfer::open_data_channel(&mut self.codec, mode, &self.host, self.peer_ip, self.timeout).await
    }

    /// Send a transfer command and require a 1xx/2xx preliminary reply.
    async fn begin_transfer(&mut self, cmd: &str) -> TransferResult<()> {
        let resp = self.codec.execute(cmd).await?;
        if !resp.is_preliminary() && !resp.is_completion() {
            return Err(TransferError::from_ftp_reply(resp.code, &resp.text()));
        }
        Ok(())
    }

    /// Read the 226 completion reply.
    async fn finish_transfer(&mut self) -> TransferResult<()> {
        let done = self.codec.read_reply().await?;
        if !done.is_completion() {
            return Err(TransferError::from_ftp_reply(done.code, &done.text()));
        }
        Ok(())
    }

    async fn retrieve_text(&mut self, cmd: &str) -> TransferResult<String> {
        let mut tcp = self.open_data_channel().await?;
        self.begin_transfer(cmd).await?;

        let mut buf = Vec::new();
        tcp.read_to_end(&mut buf)
            .await
            .map_err(|e| TransferError::data_channel(format!("{}: {}", cmd, e)))?;
        drop(tcp);

        self.finish_transfer().await?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

/// Parse `257 "/some/path"` into the path string.
fn parse_pwd(text: &str) -> TransferResult<String> {
    if let Some(start) = text.find('"') {
        if let Some(end) = text[start + 1..].find('"') {
            return Ok(text[start + 1..start + 1 + end].to_string());
        }
    }
    Err(TransferError::protocol_error(format!("Cannot parse PWD: {}", text)))
}
