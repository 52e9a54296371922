//! The external-tool seam and its OpenSSH implementation.
//!
//! `OpenSshTool` starts `ssh -M` once, in the background, and points every
//! later `scp`/`ssh` at its control socket, so authentication and the key
//! exchange happen a single time per backend.

use crate::scp::hostkey;
use async_trait::async_trait;
use log::{debug, info, warn};
use shotlift_core::{ConnectionInfo, TransferError, TransferErrorKind, TransferResult};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;

/// A long-lived remote session driven through external tools.
#[async_trait]
pub trait ScpTool: Send + Sync {
    /// Copy a local file to `remote`.
    async fn put(&self, local: &Path, remote: &str) -> TransferResult<()>;

    /// Run a shell command on the remote host and return its stdout.
    async fn exec(&self, command: &str) -> TransferResult<String>;

    /// Tear the session down. Further calls fail.
    async fn close(&self);
}

pub struct OpenSshTool {
    info: ConnectionInfo,
    tool_dir: Option<PathBuf>,
    control_path: PathBuf,
    known_hosts: Option<PathBuf>,
    closed: AtomicBool,
    // Holds the control socket and known-hosts file; removed on drop.
    _runtime_dir: TempDir,
}

impl OpenSshTool {
    /// Pin the host key (when a fingerprint is configured) and start the
    /// control master. Failures are connection errors carrying the host.
    pub async fn open(info: ConnectionInfo, tool_dir: Option<PathBuf>) -> TransferResult<Self> {
        let host = info.host().to_string();
        let runtime_dir = tempfile::Builder::new()
            .prefix("shotlift-ssh-")
            .tempdir()
            .map_err(|e| TransferError::io_error(format!("Cannot create control directory: {}", e)))?;

        let mut tool = Self {
            control_path: runtime_dir.path().join("ctl"),
            known_hosts: None,
            closed: AtomicBool::new(false),
            _runtime_dir: runtime_dir,
            info,
            tool_dir,
        };

        if let Some(expected) = tool.info.host_key_fingerprint().map(str::to_string) {
            tool.known_hosts = Some(tool.pin_host_key(&expected).await?);
        }

        tool.start_master().await.map_err(|e| match e.kind {
            TransferErrorKind::ToolNotFound => e.with_host(host.clone()),
            _ => TransferError::connection_failed(host.clone(), e.message),
        })?;
        info!("SSH control master to {} established", tool.destination());
        Ok(tool)
    }

    fn program(&self, name: &str) -> PathBuf {
        let file = if cfg!(windows) {
            format!("{}.exe", name)
        } else {
            name.to_string()
        };
        match &self.tool_dir {
            Some(dir) => dir.join(file),
            None => PathBuf::from(file),
        }
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.info.username(), self.info.host())
    }

    fn timeout(&self) -> Duration {
        self.info.timeout()
    }

    /// `-o` options shared by every `ssh`/`scp` invocation.
    fn common_options(&self, batch: bool) -> Vec<String> {
        let mut opts = vec![
            "-o".to_string(),
            format!("ControlPath={}", self.control_path.display()),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.timeout().as_secs().max(1)),
        ];
        if batch {
            opts.extend(["-o".to_string(), "BatchMode=yes".to_string()]);
        }
        match &self.known_hosts {
            Some(file) => opts.extend([
                "-o".to_string(),
                "StrictHostKeyChecking=yes".to_string(),
                "-o".to_string(),
                format!("UserKnownHostsFile={}", file.display()),
            ]),
            None => opts.extend(["-o".to_string(), "StrictHostKeyChecking=accept-new".to_string()]),
        }
        if let Some(key) = self.info.private_key_path() {
            opts.extend([
                "-i".to_string(),
                key.display().to_string(),
                "-o".to_string(),
                "IdentitiesOnly=yes".to_string(),
            ]);
        }
        opts
    }

    fn uses_sshpass(&self) -> bool {
        self.info.private_key_path().is_none() && self.info.password().map_or(false, |p| !p.is_empty())
    }

    // ─── Setup ───────────────────────────────────────────────────

    async fn pin_host_key(&self, expected: &str) -> TransferResult<PathBuf> {
        let host = self.info.host();
        let mut cmd = Command::new(self.program("ssh-keyscan"));
        cmd.args(["-p", &self.info.port().to_string()])
            .args(["-T", &self.timeout().as_secs().max(1).to_string()])
            .arg(host);
        let scan = self.run(cmd, "ssh-keyscan", Some(self.timeout())).await?;

        let lines = hostkey::matching_known_hosts(&scan, expected);
        if lines.is_empty() {
            return Err(TransferError::connection_failed(
                host,
                format!("No host key offered by {} matches {}", host, expected),
            ));
        }

        let path = self.control_path.with_file_name("known_hosts");
        std::fs::write(&path, lines.join("\n") + "\n")
            .map_err(|e| TransferError::io_error(format!("Cannot write {}: {}", path.display(), e)))?;
        debug!("Pinned host key for {} in {}", host, path.display());
        Ok(path)
    }

    async fn start_master(&self) -> TransferResult<()> {
        let use_sshpass = self.uses_sshpass();
        let mut cmd = if use_sshpass {
            let mut c = Command::new(self.program("sshpass"));
            c.arg("-e").arg(self.program("ssh"));
            c.env("SSHPASS", self.info.password().unwrap_or_default());
            c
        } else {
            Command::new(self.program("ssh"))
        };
        cmd.args(["-M", "-N", "-f", "-o", "ControlPersist=yes"])
            .args(self.common_options(!use_sshpass))
            .args(["-p", &self.info.port().to_string()])
            .arg(self.destination());
        self.run(cmd, if use_sshpass { "sshpass" } else { "ssh" }, Some(self.timeout()))
            .await
            .map(|_| ())
    }

    // ─── Execution ───────────────────────────────────────────────

    /// Run `cmd` to completion. `deadline` bounds setup steps only;
    /// transfers are limited by `ConnectTimeout` alone.
    async fn run(&self, mut cmd: Command, tool: &str, deadline: Option<Duration>) -> TransferResult<String> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        debug!("Running {}: {:?}", tool, cmd.as_std().get_args().collect::<Vec<_>>());

        let output = match deadline {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| TransferError::timeout(format!("{} timed out", tool)))?,
            None => cmd.output().await,
        };
        let output = match output {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TransferError::tool_not_found(format!(
                    "'{}' not found; install OpenSSH or set scpToolDirectory",
                    tool
                )))
            }
            Err(e) => return Err(TransferError::io_error(format!("Failed to execute {}: {}", tool, e))),
            Ok(output) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransferError::transfer_failed(format!(
                "{} exited with {}: {}",
                tool,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn ensure_open(&self) -> TransferResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransferError::invalid_operation("SSH session already closed"));
        }
        Ok(())
    }

    fn exit_master_args(&self) -> Vec<String> {
        vec![
            "-o".to_string(),
            format!("ControlPath={}", self.control_path.display()),
            "-O".to_string(),
            "exit".to_string(),
            self.destination(),
        ]
    }
}

#[async_trait]
impl ScpTool for OpenSshTool {
    async fn put(&self, local: &Path, remote: &str) -> TransferResult<()> {
        self.ensure_open()?;
        let mut cmd = Command::new(self.program("scp"));
        cmd.args(["-q", "-B"])
            .args(self.common_options(true))
            .args(["-P", &self.info.port().to_string()])
            .arg(local)
            .arg(format!("{}:{}", self.destination(), remote));
        self.run(cmd, "scp", None).await.map(|_| ())
    }

    async fn exec(&self, command: &str) -> TransferResult<String> {
        self.ensure_open()?;
        let mut cmd = Command::new(self.program("ssh"));
        cmd.args(self.common_options(true))
            .args(["-p", &self.info.port().to_string()])
            .arg(self.destination())
            .arg("--")
            .arg(command);
        self.run(cmd, "ssh", None).await
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut cmd = Command::new(self.program("ssh"));
        cmd.args(self.exit_master_args());
        match self.run(cmd, "ssh", Some(self.timeout())).await {
            Ok(_) => debug!("SSH control master to {} closed", self.destination()),
            Err(e) => warn!("Closing SSH control master failed: {}", e),
        }
    }
}

impl Drop for OpenSshTool {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Best effort; the master would otherwise outlive the process.
        let _ = std::process::Command::new(self.program("ssh"))
            .args(self.exit_master_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
}

/// Quote `s` for a POSIX shell.
pub fn shell_escape(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}
