//! Low-level FTP command/response codec (RFC 959 §4).
//!
//! Handles:
//! - Sending FTP commands terminated with `\r\n`
//! - Reading single-line and multi-line replies
//! - Parsing the 3-digit reply code

use crate::ftp::types::FtpReply;
use shotlift_core::{TransferError, TransferResult};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

type BoxedReader = BufReader<Box<dyn AsyncRead + Send + Unpin>>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// The FTP command/response codec operating on split halves.
pub struct FtpCodec {
    reader: BoxedReader,
    writer: BoxedWriter,
    reply_timeout: Duration,
}

impl FtpCodec {
    /// Create a codec from a plain TCP stream.
    pub fn from_tcp(stream: TcpStream, reply_timeout: Duration) -> Self {
        let (rd, wr) = stream.into_split();
        Self::from_halves(rd, wr, reply_timeout)
    }

    /// Create a codec from any pair of byte streams.
    pub fn from_halves<R, W>(reader: R, writer: W, reply_timeout: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: BufReader::new(Box::new(reader)),
            writer: Box::new(writer),
            reply_timeout,
        }
    }

    /// Send a raw FTP command; CRLF is appended here.
    pub async fn send_command(&mut self, cmd: &str) -> TransferResult<()> {
        let line = format!("{}\r\n", cmd);
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        log::trace!(">>> {}", mask_secret(cmd));
        Ok(())
    }

    /// Read a single line from the control channel (including CRLF).
    async fn read_line_raw(&mut self) -> TransferResult<String> {
        let mut buf = String::new();
        let n = timeout(self.reply_timeout, self.reader.read_line(&mut buf))
            .await
            .map_err(|_| TransferError::timeout("Timed out waiting for server reply"))??;
        if n == 0 {
            return Err(TransferError::transfer_failed("Server closed connection"));
        }
        Ok(buf)
    }

    /// Read a complete FTP response (possibly multi-line).
    ///
    /// Multi-line responses look like:
    /// ```text
    /// 220-Welcome to my FTP server
    /// 220-This is line 2
    /// 220 End of greeting
    /// ```
    pub async fn read_reply(&mut self) -> TransferResult<FtpReply> {
        let first = self.read_line_raw().await?;
        let first_trimmed = first.trim_end_matches(['\r', '\n']);

        let code = parse_code(first_trimmed)?;
        let mut lines = vec![first_trimmed.to_string()];

        // "NNN-" means more lines follow until "NNN " is seen.
        let is_multi = first_trimmed.as_bytes().get(3) == Some(&b'-');
        if is_multi {
            let terminator = format!("{} ", code);
            loop {
                let next = self.read_line_raw().await?;
                let next_trimmed = next.trim_end_matches(['\r', '\n']);
                lines.push(next_trimmed.to_string());
                if next_trimmed.starts_with(&terminator) || next_trimmed == code.to_string() {
                    break;
                }
            }
        }

        let resp = FtpReply { code, lines };
        log::trace!("<<< {}", resp.lines.last().map(String::as_str).unwrap_or(""));
        Ok(resp)
    }

    /// Send a command and return the reply, whatever its class.
    pub async fn execute(&mut self, cmd: &str) -> TransferResult<FtpReply> {
        self.send_command(cmd).await?;
        self.read_reply().await
    }

    /// Send a command; anything but a 2xx reply is an error.
    pub async fn expect_ok(&mut self, cmd: &str) -> TransferResult<FtpReply> {
        let reply = self.execute(cmd).await?;
        if !reply.is_completion() {
            return Err(TransferError::from_ftp_reply(reply.code, &reply.text()));
        }
        Ok(reply)
    }
}

/// Parse the 3-digit reply code from the start of a line.
fn parse_code(line: &str) -> TransferResult<u16> {
    line.get(..3)
        .filter(|c| c.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|c| c.parse::<u16>().ok())
        .ok_or_else(|| TransferError::protocol_error(format!("Invalid reply code in: '{}'", line)))
}

/// Hide the argument of `PASS` in logs.
fn mask_secret(cmd: &str) -> &str {
    if cmd.get(..4).map_or(false, |verb| verb.eq_ignore_ascii_case("PASS")) {
        "PASS ***"
    } else {
        cmd
    }
}
