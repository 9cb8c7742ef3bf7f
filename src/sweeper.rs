//! Background deletion of expired files.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use crate::storage::{Storage, SweepReport};

/// Periodically removes files that have outlived the retention window.
pub struct Sweeper {
    storage: Arc<dyn Storage>,
    period: Duration,
}

impl Sweeper {
    pub fn new(storage: Arc<dyn Storage>, period: Duration) -> Self {
        Self { storage, period }
    }

    /// Run one pass. Failures are logged and reported as `None`.
    pub async fn sweep_once(&self) -> Option<SweepReport> {
        match self.storage.sweep().await {
            Ok(report) => {
                if report.failed > 0 {
                    warn!(
                        removed = report.removed,
                        failed = report.failed,
                        "Sweep could not delete every expired file"
                    );
                } else if report.removed > 0 {
                    info!(removed = report.removed, examined = report.examined, "Swept expired files");
                } else {
                    debug!(examined = report.examined, "Nothing to sweep");
                }
                Some(report)
            }
            Err(e) => {
                error!(error = %e, "Sweep failed");
                None
            }
        }
    }

    /// Sweep immediately, then every period until `shutdown` turns true or
    /// its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            period_secs = self.period.as_secs(),
            retention_secs = self.storage.retention().window().as_secs(),
            "Sweeper started"
        );
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Sweeper stopped");
    }

    /// Run on a new task.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
