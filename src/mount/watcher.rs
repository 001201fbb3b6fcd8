//! Ownership of a running mount process.
//!
//! The watcher task is the only owner of the child. It moves through
//! `Running → ShuttingDown → Stopped`; a shutdown is requested explicitly
//! over a oneshot, so the exit it reports is unambiguous. A failed health
//! check arrives as a message too; the process it stops is reported as an
//! unexpected exit, the same as a crash.

use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::exit_code::ExitCategory;
use super::platform;
use crate::error::{MountError, WireResult};

/// How long an interrupted process gets to unmount before it is killed.
pub const STOP_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Running,
    ShuttingDown,
    Stopped,
}

/// How a mount process ended, as reported by its watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountExit {
    /// Ended after a requested shutdown.
    Stopped(ExitCategory),
    /// Ended on its own while running.
    Unexpected(ExitCategory),
    WaitFailed(String),
}

/// One launch of the mount process, from the orchestrator's side.
#[derive(Debug)]
pub struct MountSession {
    pub pid: Option<u32>,
    pub log_path: PathBuf,
    pub config_dir: PathBuf,
    /// Log line to resume error scanning from.
    pub line_cursor: usize,
    exit_rx: oneshot::Receiver<MountExit>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MountSession {
    pub fn new(
        pid: Option<u32>,
        log_path: PathBuf,
        config_dir: PathBuf,
        exit_rx: oneshot::Receiver<MountExit>,
        shutdown_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            pid,
            log_path,
            config_dir,
            line_cursor: 0,
            exit_rx,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Wait for the process to end.
    ///
    /// A watcher that disappears without reporting is an error.
    pub async fn exited(&mut self) -> WireResult<MountExit> {
        (&mut self.exit_rx)
            .await
            .map_err(|_| MountError::WatcherLost.into())
    }

    /// Ask the watcher to stop the process and wait for it.
    pub async fn shutdown(&mut self) -> WireResult<MountExit> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.exited().await
    }
}

/// Start watching `child`. Health failures for it arrive on `unhealthy_rx`.
pub fn spawn_watcher(
    child: Child,
    stop_grace: Duration,
    unhealthy_rx: mpsc::Receiver<Vec<String>>,
) -> (oneshot::Receiver<MountExit>, oneshot::Sender<()>, JoinHandle<()>) {
    let (exit_tx, exit_rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        let exit = watch(child, shutdown_rx, unhealthy_rx, stop_grace).await;
        let _ = exit_tx.send(exit);
    });
    (exit_rx, shutdown_tx, handle)
}

async fn watch(
    mut child: Child,
    shutdown_rx: oneshot::Receiver<()>,
    mut unhealthy_rx: mpsc::Receiver<Vec<String>>,
    stop_grace: Duration,
) -> MountExit {
    let pid = child.id();
    let mut state = WatchState::Running;
    let mut unhealthy = false;

    let status = tokio::select! {
        status = child.wait() => status,
        _ = shutdown_rx => {
            state = WatchState::ShuttingDown;
            stop(&mut child, pid, stop_grace).await
        }
        Some(failures) = unhealthy_rx.recv() => {
            warn!(?pid, failures = %failures.join("; "), "mount unhealthy, stopping it");
            unhealthy = true;
            state = WatchState::ShuttingDown;
            stop(&mut child, pid, stop_grace).await
        }
    };
    let was = state;
    state = WatchState::Stopped;
    debug!(?pid, from = ?was, to = ?state, "mount watcher finished");

    let status = match status {
        Ok(status) => status,
        Err(e) => {
            error!(?pid, error = %e, "waiting on mount process failed");
            return MountExit::WaitFailed(e.to_string());
        }
    };

    let category = ExitCategory::from_status(status);
    match was {
        WatchState::ShuttingDown if !unhealthy => {
            info!(?pid, exit = %category, "mount process stopped");
            MountExit::Stopped(category)
        }
        _ => {
            if category.is_success() {
                warn!(?pid, exit = %category, "mount process exited");
            } else {
                error!(?pid, exit = %category, code = ?status.code(), "mount process exited");
            }
            MountExit::Unexpected(category)
        }
    }
}

async fn stop(
    child: &mut Child,
    pid: Option<u32>,
    grace: Duration,
) -> std::io::Result<std::process::ExitStatus> {
    if let Some(pid) = pid {
        if let Err(e) = platform::interrupt(pid) {
            warn!(pid, error = %e, "could not interrupt mount process");
        }
    }
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            warn!(?pid, "mount process ignored interrupt, killing");
            child.kill().await?;
            child.wait().await
        }
    }
}
