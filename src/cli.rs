//! CLI argument parsing for pdfcraft.
//!
//! Every flag can also be supplied through a `PDFCRAFT_*` environment
//! variable, which is how the service is usually configured in containers.
//!
//! # Examples
//!
//! ```no_run
//! use pdfcraft::cli::Cli;
//! use clap::Parser;
//!
//! let cli = Cli::parse();
//! let config = cli.to_config().expect("Invalid configuration");
//! println!("Listening on port {}", config.server.port);
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{
    Config, DEFAULT_HOST, DEFAULT_MAX_UPLOAD_MB, DEFAULT_PORT, DEFAULT_RETENTION_MINUTES,
    DEFAULT_SWEEP_INTERVAL_SECS, RetentionPolicy, ServerConfig, StorageConfig,
};
use crate::error::{PdfCraftError, Result};

/// Serve one-shot PDF and image transformations over HTTP.
///
/// Uploaded files are staged, transformed, and the result kept for
/// re-download until the retention window elapses.
#[derive(Parser, Debug, Clone)]
#[command(name = "pdfcraft")]
#[command(version)]
#[command(about = "Serve one-shot PDF and image transformations over HTTP", long_about = None)]
#[command(author)]
pub struct Cli {
    /// Interface to bind
    #[arg(long, env = "PDFCRAFT_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PDFCRAFT_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Directory for staged uploads
    ///
    /// Created on start-up if missing. Files here are removed as soon as
    /// the request that uploaded them completes.
    #[arg(long, env = "PDFCRAFT_STAGING_DIR", value_name = "DIR", default_value = "uploads")]
    pub staging_dir: PathBuf,

    /// Directory for transformation results
    ///
    /// Results stay here until the retention window elapses.
    #[arg(long, env = "PDFCRAFT_RESULTS_DIR", value_name = "DIR", default_value = "outputs")]
    pub results_dir: PathBuf,

    /// Minutes a stored file remains retrievable
    #[arg(long, env = "PDFCRAFT_RETENTION_MINUTES", value_name = "MINUTES")]
    #[arg(default_value_t = DEFAULT_RETENTION_MINUTES)]
    pub retention_minutes: u64,

    /// Seconds between two expiry sweeps
    #[arg(long, env = "PDFCRAFT_SWEEP_INTERVAL_SECS", value_name = "SECONDS")]
    #[arg(default_value_t = DEFAULT_SWEEP_INTERVAL_SECS)]
    pub sweep_interval_secs: u64,

    /// Largest accepted request body, in MiB
    #[arg(long, env = "PDFCRAFT_MAX_UPLOAD_MB", value_name = "MIB")]
    #[arg(default_value_t = DEFAULT_MAX_UPLOAD_MB)]
    pub max_upload_mb: usize,
}

impl Cli {
    /// Convert CLI arguments into a validated Config.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the resulting configuration is
    /// inconsistent (see [`Config::validate`]).
    pub fn to_config(&self) -> Result<Config> {
        Config::try_from(self)
    }
}

impl TryFrom<&Cli> for Config {
    type Error = PdfCraftError;

    fn try_from(cli: &Cli) -> Result<Self> {
        let config = Config {
            server: ServerConfig {
                host: cli.host.clone(),
                port: cli.port,
                max_upload_bytes: cli.max_upload_mb.saturating_mul(1024 * 1024),
            },
            storage: StorageConfig {
                staging_dir: cli.staging_dir.clone(),
                results_dir: cli.results_dir.clone(),
            },
            retention: RetentionPolicy::from_minutes(cli.retention_minutes),
            sweep_interval: Duration::from_secs(cli.sweep_interval_secs),
        };

        config.validate().map_err(|e| {
            PdfCraftError::validation(format!("Configuration validation failed: {e}"))
        })?;

        Ok(config)
    }
}
