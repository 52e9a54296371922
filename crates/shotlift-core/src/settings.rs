//! Persisted user configuration.
//!
//! Stored as camelCase JSON. Missing fields fall back to their defaults so
//! files written by older versions keep loading.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::{ConnectionInfo, Protocol};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("settings file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    /// `SHA256:<base64>` host-key fingerprint to pin (SSH protocols).
    #[serde(default)]
    pub host_key_fingerprint: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u32,
    /// Remote directory uploads land in.
    #[serde(default = "default_server_path")]
    pub server_path: String,
    /// Public URL that maps onto `server_path`.
    #[serde(default)]
    pub http_base_uri: String,
    #[serde(default = "default_filename_format")]
    pub filename_format: String,
    #[serde(default)]
    pub check_for_duplicate_files: bool,
    /// Local folder that receives a copy of every failed upload.
    #[serde(default)]
    pub failed_uploads_folder: Option<PathBuf>,
    /// Directory containing `ssh`/`scp`; `PATH` lookup when absent.
    #[serde(default)]
    pub scp_tool_directory: Option<PathBuf>,
}

fn default_port() -> u16 {
    21
}

fn default_timeout_ms() -> u32 {
    30_000
}

fn default_server_path() -> String {
    "/".to_string()
}

fn default_filename_format() -> String {
    "{time}".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            protocol: Protocol::default(),
            host: String::new(),
            port: default_port(),
            username: String::new(),
            password: None,
            private_key_path: None,
            host_key_fingerprint: None,
            timeout_ms: default_timeout_ms(),
            server_path: default_server_path(),
            http_base_uri: String::new(),
            filename_format: default_filename_format(),
            check_for_duplicate_files: false,
            failed_uploads_folder: None,
            scp_tool_directory: None,
        }
    }
}

impl Settings {
    /// `<config dir>/shotlift/settings.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("shotlift").join("settings.json"))
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(io_err)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.host.trim().is_empty() {
            return Err(SettingsError::Invalid("host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(SettingsError::Invalid("port must not be zero".into()));
        }
        if self.timeout_ms == 0 {
            return Err(SettingsError::Invalid("timeoutMs must be positive".into()));
        }
        Ok(())
    }

    pub fn connection_info(&self) -> ConnectionInfo {
        let mut info = ConnectionInfo::new(self.host.trim(), self.port, self.username.clone())
            .with_timeout_ms(self.timeout_ms);
        if let Some(ref password) = self.password {
            info = info.with_password(password.clone());
        }
        if let Some(ref key) = self.private_key_path {
            info = info.with_private_key(key.clone());
        }
        if let Some(ref fingerprint) = self.host_key_fingerprint {
            info = info.with_host_key_fingerprint(fingerprint.clone());
        }
        info
    }

    /// Whether switching from `self` to `other` invalidates a built backend.
    pub fn connection_differs(&self, other: &Settings) -> bool {
        self.protocol != other.protocol
            || self.connection_info() != other.connection_info()
            || self.check_for_duplicate_files != other.check_for_duplicate_files
            || self.scp_tool_directory != other.scp_tool_directory
    }
}
