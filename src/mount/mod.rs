//! Supervision of the external rclone mount process.
//!
//! [`MountSupervisor`] prepares the cached executable, launches rclone with
//! the instance's storage config, hands the running process to a watcher
//! task and cleans up after it. Health probing and log rotation run on the
//! orchestrator's schedule.

pub mod command;
pub mod executable;
pub mod exit_code;
pub mod health;
pub mod log_rotate;
pub mod log_scan;
pub mod platform;
pub mod watcher;

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub use command::MountArgs;
pub use executable::{cached_path, ExecutableCache, ExecutableSource};
pub use exit_code::ExitCategory;
pub use health::{spawn_health_checker, HealthProbe, HealthTarget};
pub use log_scan::{scan_errors, LogErrorEntry, LogScan};
pub use watcher::{spawn_watcher, MountExit, MountSession, WatchState, STOP_GRACE};

use crate::error::{classify_io_error, MountError, WireResult};
use crate::startup::SessionConfig;
use crate::traits::MountDriver;

pub struct MountSupervisor {
    args: MountArgs,
    executable: ExecutableCache,
    target_tx: watch::Sender<Option<HealthTarget>>,
    health_interval: Option<Duration>,
    rotate_threshold: u64,
    stop_grace: Duration,
}

impl MountSupervisor {
    pub fn new(args: MountArgs, executable: ExecutableCache) -> Self {
        let (target_tx, _) = watch::channel(None);
        Self {
            args,
            executable,
            target_tx,
            health_interval: None,
            rotate_threshold: crate::startup::DEFAULT_LOG_ROTATE_THRESHOLD,
            stop_grace: STOP_GRACE,
        }
    }

    /// Supervisor for the instance described by `config`.
    pub fn from_config(
        config: &SessionConfig,
        instance_dir: &Path,
        executable: ExecutableCache,
    ) -> Self {
        let args = MountArgs {
            config_path: instance_dir.join(crate::startup::STORAGE_CONFIG_FILE),
            log_path: instance_dir.join(crate::startup::MOUNT_LOG_FILE),
            instance: config.instance.clone(),
            remote_path: config.remote_path.clone(),
            local_path: config.local_mount_path.clone(),
            read_only: config.read_only,
            no_modtime: config.no_modtime,
            custom_flags: config.mount_flags.clone(),
        };
        Self::new(args, executable)
            .with_health_interval(config.health_interval)
            .with_rotate_threshold(config.log_rotate_threshold)
    }

    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = Some(interval).filter(|d| !d.is_zero());
        self
    }

    pub fn with_rotate_threshold(mut self, bytes: u64) -> Self {
        self.rotate_threshold = bytes;
        self
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn args(&self) -> &MountArgs {
        &self.args
    }

    /// The live mount process, for the health checker.
    pub fn subscribe_target(&self) -> watch::Receiver<Option<HealthTarget>> {
        self.target_tx.subscribe()
    }

    fn log_line_count(path: &Path) -> usize {
        scan_errors(path, 0).map(|scan| scan.next_line).unwrap_or(0)
    }

    fn config_dir(&self) -> PathBuf {
        self.args
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}

/// Spawn, retrying briefly while the freshly written executable is busy.
async fn spawn_retrying_busy(command: &mut Command) -> std::io::Result<tokio::process::Child> {
    let mut attempt = 0;
    loop {
        match command.spawn() {
            Err(e) if platform::is_file_busy(&e) && attempt < 5 => {
                attempt += 1;
                debug!(attempt, "mount executable busy, retrying spawn");
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            other => return other,
        }
    }
}

#[async_trait]
impl MountDriver for MountSupervisor {
    async fn mount(&mut self) -> WireResult<MountSession> {
        let exe = self.executable.prepare().await?;

        let local = &self.args.local_path;
        if !local.exists() {
            debug!(path = %local.display(), "creating mount point");
            tokio::fs::create_dir_all(local)
                .await
                .map_err(|e| classify_io_error(e, Some(local.clone()), "create mount point"))?;
        }

        let line_cursor = Self::log_line_count(&self.args.log_path);
        let argv = self.args.to_args();
        debug!(exe = %exe.display(), args = ?argv, "starting mount process");

        let mut command = Command::new(&exe);
        command
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        // keep terminal Ctrl+C away from rclone; shutdown is ours to send
        #[cfg(unix)]
        command.process_group(0);

        let child = spawn_retrying_busy(&mut command).await.map_err(|e| {
            MountError::SpawnFailed {
                message: format!("{}: {}", exe.display(), e),
            }
        })?;
        let pid = child.id();
        let (unhealthy_tx, unhealthy_rx) = mpsc::channel(1);
        let (exit_rx, shutdown_tx, _watcher) = spawn_watcher(child, self.stop_grace, unhealthy_rx);
        self.target_tx
            .send_replace(pid.map(|pid| HealthTarget::new(pid, unhealthy_tx)));

        let mut session = MountSession::new(
            pid,
            self.args.log_path.clone(),
            self.config_dir(),
            exit_rx,
            shutdown_tx,
        );
        session.line_cursor = line_cursor;

        info!(
            pid = ?pid,
            remote = %self.args.remote(),
            local = %local.display(),
            "volume mounted"
        );
        Ok(session)
    }

    async fn unmount_stale(&mut self) {
        let local = self.args.local_path.clone();
        let result = tokio::task::spawn_blocking(move || {
            if platform::is_mount_point(&local)? {
                platform::unmount(&local)?;
                return Ok(true);
            }
            Ok::<bool, std::io::Error>(false)
        })
        .await;

        match result {
            Ok(Ok(true)) => info!(path = %self.args.local_path.display(), "stale mount removed"),
            Ok(Ok(false)) => debug!("no stale mount to remove"),
            Ok(Err(e)) => warn!(error = %e, "unmount failed"),
            Err(e) => warn!(error = %e, "unmount task failed"),
        }
    }

    fn on_exit(&mut self, session: &mut MountSession, exit: &MountExit) -> Vec<LogErrorEntry> {
        self.target_tx.send_replace(None);
        if matches!(exit, MountExit::Stopped(_)) {
            return Vec::new();
        }

        match scan_errors(&session.log_path, session.line_cursor) {
            Ok(scan) => {
                session.line_cursor = scan.next_line;
                for entry in &scan.errors {
                    error!(
                        line = entry.line_number,
                        lookup = entry.lookup.as_deref().unwrap_or(""),
                        "rclone: {}",
                        entry.line
                    );
                }
                scan.errors
            }
            Err(e) => {
                warn!(path = %session.log_path.display(), error = %e, "cannot scan mount log");
                Vec::new()
            }
        }
    }

    fn rotate_logs(&mut self, session: &mut MountSession) {
        match log_rotate::rotate_if_needed(&session.log_path, self.rotate_threshold) {
            Ok(Some(archive)) => {
                session.line_cursor = 0;
                info!(archive = %archive.display(), "mount log rotated");
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "mount log rotation failed"),
        }
    }

    fn spawn_health_checker(&self) -> Option<JoinHandle<()>> {
        let interval = self.health_interval?;
        let probe = HealthProbe::new(&self.args.local_path, self.args.read_only);
        Some(spawn_health_checker(probe, interval, self.subscribe_target()))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn supervisor(dir: &Path, script: &str) -> MountSupervisor {
        let args = MountArgs {
            config_path: dir.join("rclone.conf"),
            log_path: dir.join("rclone.log"),
            instance: "test".into(),
            remote_path: "/bucket".into(),
            local_path: dir.join("mnt"),
            read_only: true,
            no_modtime: false,
            custom_flags: None,
        };
        let exe = ExecutableSource::Bytes(format!("#!/bin/sh\n{}\n", script).into_bytes());
        let cache = ExecutableCache::new(exe, &dir.join("cache"))
            .with_retry(3, Duration::from_millis(20));
        MountSupervisor::new(args, cache).with_stop_grace(Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_mount_creates_mount_point_and_reports_exit() {
        let dir = tempfile::tempdir().unwrap();
        let mut sup = supervisor(dir.path(), "exit 7");
        let mut target_rx = sup.subscribe_target();

        let mut session = sup.mount().await.unwrap();
        assert!(dir.path().join("mnt").is_dir());
        assert!(session.pid.is_some());
        assert_eq!(
            target_rx.borrow_and_update().as_ref().map(|t| t.pid),
            session.pid
        );

        let exit = session.exited().await.unwrap();
        assert_eq!(exit, MountExit::Unexpected(ExitCategory::Fatal));
        sup.on_exit(&mut session, &exit);
        assert!(target_rx.borrow().is_none());
    }

    #[tokio::test]
    async fn test_on_exit_scans_log_from_cursor() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rclone.log"), "ERROR : from an earlier run\n").unwrap();
        let mut sup = supervisor(
            dir.path(),
            &format!(
                "echo 'ERROR : bucket gone' >> {}\nexit 3",
                dir.path().join("rclone.log").display()
            ),
        );

        let mut session = sup.mount().await.unwrap();
        assert_eq!(session.line_cursor, 1);
        let exit = session.exited().await.unwrap();
        let errors = sup.on_exit(&mut session, &exit);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].line.contains("bucket gone"));
        assert_eq!(session.line_cursor, 2);
    }

    #[tokio::test]
    async fn test_shutdown_of_running_mount() {
        let dir = tempfile::tempdir().unwrap();
        let mut sup = supervisor(dir.path(), "trap 'exit 0' INT\nwhile true; do sleep 0.05; done");
        let mut session = sup.mount().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(matches!(session.shutdown().await.unwrap(), MountExit::Stopped(_)));
    }

    #[tokio::test]
    async fn test_unmount_stale_on_plain_directory_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("mnt")).unwrap();
        let mut sup = supervisor(dir.path(), "exit 0");
        sup.unmount_stale().await;
        assert!(dir.path().join("mnt").is_dir());
    }

    #[tokio::test]
    async fn test_rotate_resets_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let mut sup = supervisor(dir.path(), "exit 0").with_rotate_threshold(4);
        let mut session = sup.mount().await.unwrap();
        let _ = session.exited().await;

        std::fs::write(dir.path().join("rclone.log"), "line one\nline two\n").unwrap();
        session.line_cursor = 2;
        sup.rotate_logs(&mut session);
        assert_eq!(session.line_cursor, 0);
        assert!(dir.path().join("rclone1.log.gz").exists());
    }
}
