//! Service configuration.
//!
//! A [`Config`] is built from the command line (see [`crate::cli`]) and
//! validated once at start-up. Everything downstream receives the pieces it
//! needs by value, so no component reads the environment on its own.

use anyhow::{Result, bail};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default bind host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 5000;

/// Default retention window, in minutes.
pub const DEFAULT_RETENTION_MINUTES: u64 = 120;

/// Longest accepted retention window.
pub const MAX_RETENTION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Default sweeper interval, in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 600;

/// Default request body limit, in MiB.
pub const DEFAULT_MAX_UPLOAD_MB: usize = 50;

/// How long stored files stay retrievable.
///
/// The same window applies to staged uploads and to results. A file whose
/// age is exactly equal to the window is still live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    window: Duration,
}

impl RetentionPolicy {
    /// Create a policy with the given window.
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Create a policy from a number of minutes.
    pub fn from_minutes(minutes: u64) -> Self {
        Self::new(Duration::from_secs(minutes.saturating_mul(60)))
    }

    /// The retention window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Check whether a file of the given age has expired.
    pub fn is_expired(&self, age: Duration) -> bool {
        age > self.window
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from_minutes(DEFAULT_RETENTION_MINUTES)
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,

    /// Port to bind.
    pub port: u16,

    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Resolve the socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is not a valid IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        match addr.parse() {
            Ok(addr) => Ok(addr),
            Err(e) => bail!("Invalid listen address '{addr}': {e}"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        }
    }
}

/// Locations of the two storage areas.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory for staged uploads.
    pub staging_dir: PathBuf,

    /// Directory for transformation results.
    pub results_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("uploads"),
            results_dir: PathBuf::from("outputs"),
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listener settings.
    pub server: ServerConfig,

    /// Storage directories.
    pub storage: StorageConfig,

    /// Retention window shared by both areas.
    pub retention: RetentionPolicy,

    /// Time between two sweeper passes.
    pub sweep_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            retention: RetentionPolicy::default(),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

impl Config {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The retention window or sweep interval is zero
    /// - The retention window exceeds [`MAX_RETENTION`]
    /// - The upload limit is zero
    /// - Staging and results share a directory
    /// - The host is not an IP address
    pub fn validate(&self) -> Result<()> {
        if self.retention.window().is_zero() {
            bail!("Retention window must be at least one minute");
        }

        if self.retention.window() > MAX_RETENTION {
            bail!(
                "Retention window must not exceed {} minutes",
                MAX_RETENTION.as_secs() / 60
            );
        }

        if self.sweep_interval.is_zero() {
            bail!("Sweep interval must be at least one second");
        }

        if self.server.max_upload_bytes == 0 {
            bail!("Upload limit must be at least 1 MiB");
        }

        if self.storage.staging_dir == self.storage.results_dir {
            bail!(
                "Staging and results directories must differ: {}",
                self.storage.staging_dir.display()
            );
        }

        self.server.socket_addr()?;

        Ok(())
    }
}
