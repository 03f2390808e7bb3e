//! Server configuration.

use crate::error::{ServerError, ServerResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default port, shared with the client.
pub const DEFAULT_PORT: u16 = 27017;

/// Configuration for the DigitoolDB server.
///
/// Every key is optional when loading from a file; missing keys take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Data directory served by this process.
    pub data_dir: PathBuf,
    /// Log filter used when no `RUST_LOG` is set.
    pub log_level: String,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Largest accepted request frame in bytes.
    pub max_request_bytes: usize,
    /// Whether every artifact write is synced to disk.
    pub sync_writes: bool,
}

/// Returns `~/.digitooldb/data`, or a relative path without a home
/// directory.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".digitooldb")
        .join("data")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
            max_connections: 100,
            timeout: 30,
            max_request_bytes: 16 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl ServerConfig {
    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if the file cannot be read or parsed,
    /// or if a value is out of range.
    pub fn from_file(path: &Path) -> ServerResult<Self> {
        let bytes = fs::read(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_slice(&bytes)
    }

    /// Parses a configuration from JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> ServerResult<Self> {
        let config: Self =
            serde_json::from_slice(bytes).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that limits are usable.
    pub fn validate(&self) -> ServerResult<()> {
        if self.max_connections == 0 {
            return Err(ServerError::Config(
                "max_connections must be positive".into(),
            ));
        }
        if self.timeout == 0 {
            return Err(ServerError::Config("timeout must be positive".into()));
        }
        if self.max_request_bytes == 0 {
            return Err(ServerError::Config(
                "max_request_bytes must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Returns the `host:port` address to bind.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Sets the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the data directory.
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Sets the maximum concurrent connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the request timeout in seconds.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    /// Sets the largest accepted request frame.
    pub fn with_max_request_bytes(mut self, bytes: usize) -> Self {
        self.max_request_bytes = bytes;
        self
    }

    /// Enables or disables synced writes.
    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }
}
