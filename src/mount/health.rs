//! Periodic probing of the mounted path.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::platform;

const PROBE_TIMEOUT: Duration = Duration::from_secs(20);

/// Checks one mount point.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    mount_path: PathBuf,
    read_only: bool,
}

impl HealthProbe {
    pub fn new(mount_path: impl Into<PathBuf>, read_only: bool) -> Self {
        Self {
            mount_path: mount_path.into(),
            read_only,
        }
    }

    /// Run every check; an empty list means healthy.
    pub async fn check(&self) -> Vec<String> {
        match tokio::time::timeout(PROBE_TIMEOUT, self.run_checks()).await {
            Ok(failures) => failures,
            Err(_) => vec![format!(
                "health check did not finish within {}s",
                PROBE_TIMEOUT.as_secs()
            )],
        }
    }

    async fn run_checks(&self) -> Vec<String> {
        let mut failures = Vec::new();
        let path = &self.mount_path;

        match tokio::fs::read_dir(path).await {
            Ok(mut entries) => {
                if let Err(e) = entries.next_entry().await {
                    failures.push(format!("cannot list {}: {}", path.display(), e));
                }
            }
            Err(e) => {
                failures.push(format!("cannot open {}: {}", path.display(), e));
                return failures;
            }
        }

        let probe_path = path.clone();
        match tokio::task::spawn_blocking(move || platform::is_mount_point(&probe_path)).await {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => failures.push(format!("{} is not a mount point", path.display())),
            Ok(Err(e)) => failures.push(format!("cannot stat {}: {}", path.display(), e)),
            Err(e) => failures.push(format!("mount point check aborted: {}", e)),
        }

        if !self.read_only {
            let probe = path.join(format!(".sts-wire-probe-{}", uuid::Uuid::new_v4()));
            match tokio::fs::write(&probe, b"probe").await {
                Ok(()) => {
                    if let Err(e) = tokio::fs::remove_file(&probe).await {
                        failures.push(format!("cannot delete {}: {}", probe.display(), e));
                    }
                }
                Err(e) => failures.push(format!("cannot write in {}: {}", path.display(), e)),
            }
        }

        failures
    }
}

/// The live mount process, as published to the health checker.
///
/// Failures are handed to the process's watcher, which owns the signal.
#[derive(Debug, Clone)]
pub struct HealthTarget {
    pub pid: u32,
    unhealthy_tx: mpsc::Sender<Vec<String>>,
}

impl HealthTarget {
    pub fn new(pid: u32, unhealthy_tx: mpsc::Sender<Vec<String>>) -> Self {
        Self { pid, unhealthy_tx }
    }

    fn report(&self, failures: Vec<String>) {
        match self.unhealthy_tx.try_send(failures) {
            Ok(()) => debug!(pid = self.pid, "health failure sent to watcher"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(pid = self.pid, "stop already requested")
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(pid = self.pid, "mount process already gone")
            }
        }
    }
}

/// Probe every `interval` while a mount process is published on `target_rx`.
///
/// A failing probe is reported to the watcher of the process that was
/// probed, which stops it and reports an unexpected exit. The first round
/// after a new pid is skipped to give the mount time to come up.
pub fn spawn_health_checker(
    probe: HealthProbe,
    interval: Duration,
    mut target_rx: watch::Receiver<Option<HealthTarget>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut checked_pid: Option<u32> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = target_rx.changed() => {
                    if changed.is_err() {
                        debug!("health checker stopping");
                        return;
                    }
                    continue;
                }
            }

            let Some(pid) = target_rx.borrow().as_ref().map(|t| t.pid) else {
                continue;
            };
            if checked_pid != Some(pid) {
                checked_pid = Some(pid);
                continue;
            }

            let failures = probe.check().await;
            if failures.is_empty() {
                debug!(pid, "mount healthy");
                continue;
            }
            for failure in &failures {
                warn!(pid, failure = %failure, "mount health check failed");
            }

            // the process may have ended or been replaced while the probe ran
            let current = target_rx.borrow().as_ref().filter(|t| t.pid == pid).cloned();
            match current {
                Some(target) => target.report(failures),
                None => debug!(pid, "mount process changed during health check"),
            }
        }
    })
}
