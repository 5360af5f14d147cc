//! Admin shell configuration system
//!
//! This crate provides centralized configuration management for the admin
//! shell, loading settings from `shell.toml` with environment variables as
//! overrides.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "shell.toml";

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid TOML for [`ShellConfig`].
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Main configuration structure for the admin shell
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ShellConfig {
    /// Admin server settings
    pub server: ServerConfig,
    /// Navigation protocol headers
    pub protocol: ProtocolConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Admin server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Origin the admin is served from; relative URLs resolve against it
    pub base_url: String,
    /// Path prefix of navigable admin URLs
    pub admin_root: String,
    /// Per-request timeout for navigation fetches, in seconds
    pub request_timeout_secs: u64,
    /// User agent sent with every navigation fetch
    pub user_agent: String,
}

/// Headers used to tag navigation fetches and recognise shell responses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Request header marking a fetch as a shell navigation
    pub request_header: String,
    /// Value sent in `request_header`
    pub request_header_value: String,
    /// Response header the server echoes on shell responses
    pub status_header: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// `env_logger` filter directive (e.g. "info,shell_nav=debug"); `RUST_LOG` wins when set
    pub filter: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            admin_root: "/admin/".to_string(),
            request_timeout_secs: 30,
            user_agent: "AdminShell/0.1".to_string(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            request_header: "X-Requested-With".to_string(),
            request_header_value: "WagtailShell".to_string(),
            status_header: "X-WagtailShellStatus".to_string(),
        }
    }
}

impl ShellConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load configuration from the default location (shell.toml in the current directory)
    /// or return default configuration if file doesn't exist. A file that
    /// exists but cannot be read or parsed is an error.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        Self::load_or_default_from(DEFAULT_CONFIG_FILE)
    }

    fn load_or_default_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match Self::load_from_file(path) {
            Err(ConfigError::Read { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Merge configuration with environment variables
    ///
    /// Environment variables take precedence over configuration file values.
    pub fn merge_with_env(&mut self) {
        self.merge_with(|key| std::env::var(key).ok());
    }

    fn merge_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Server settings
        if let Some(url) = lookup("SHELL_BASE_URL") {
            self.server.base_url = url;
        }
        if let Some(root) = lookup("SHELL_ADMIN_ROOT") {
            self.server.admin_root = root;
        }
        if let Some(val) = lookup("SHELL_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                self.server.request_timeout_secs = secs;
            }
        }
        if let Some(agent) = lookup("SHELL_USER_AGENT") {
            self.server.user_agent = agent;
        }

        // Protocol settings
        if let Some(name) = lookup("SHELL_REQUEST_HEADER") {
            self.protocol.request_header = name;
        }
        if let Some(value) = lookup("SHELL_REQUEST_HEADER_VALUE") {
            self.protocol.request_header_value = value;
        }
        if let Some(name) = lookup("SHELL_STATUS_HEADER") {
            self.protocol.status_header = name;
        }

        if let Some(filter) = lookup("SHELL_LOG") {
            self.logging.filter = Some(filter);
        }
    }

    /// Load configuration with environment variable overrides
    ///
    /// 1. Load from `path`, or shell.toml (defaults if not found)
    /// 2. Override with environment variables if present
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load_or_default()?,
        };
        config.merge_with_env();
        Ok(config)
    }

    /// Admin root normalised to start and end with `/`.
    pub fn admin_root(&self) -> String {
        let trimmed = self.server.admin_root.trim().trim_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{trimmed}/")
        }
    }
}
