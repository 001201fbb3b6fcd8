//! Session loop with a real child process standing in for rclone.
//!
//! The mount executable is a shell script, so these run on unix only.

#![cfg(unix)]

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sts_wire::error::{MountError, WireError, WireResult};
use sts_wire::mount::{ExecutableCache, ExecutableSource, MountArgs, MountSupervisor};
use sts_wire::session::{Interrupt, RemountPolicy, SessionOrchestrator};
use sts_wire::startup::SessionConfig;
use sts_wire::traits::CredentialRefresher;

struct CountingRefresher {
    calls: Arc<AtomicU32>,
    interval: Duration,
}

#[async_trait]
impl CredentialRefresher for CountingRefresher {
    async fn refresh(&mut self) -> WireResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn refresh_interval(&self) -> Duration {
        self.interval
    }
}

fn refresher(interval: Duration) -> (CountingRefresher, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    (
        CountingRefresher {
            calls: calls.clone(),
            interval,
        },
        calls,
    )
}

fn supervisor(dir: &Path, script: &str) -> MountSupervisor {
    let args = MountArgs {
        config_path: dir.join("rclone.conf"),
        log_path: dir.join("rclone.log"),
        instance: "infn".into(),
        remote_path: "/bucket".into(),
        local_path: dir.join("mnt"),
        read_only: true,
        no_modtime: false,
        custom_flags: None,
    };
    let exe = ExecutableSource::Bytes(format!("#!/bin/sh\n{}\n", script).into_bytes());
    let cache =
        ExecutableCache::new(exe, &dir.join("cache")).with_retry(3, Duration::from_millis(20));
    MountSupervisor::new(args, cache).with_stop_grace(Duration::from_secs(2))
}

/// Session rooted in `dir` whose packaged mount executable is `script`.
fn script_config(dir: &Path, script: &str) -> SessionConfig {
    let exe = dir.join("rclone-script");
    std::fs::write(&exe, format!("#!/bin/sh\n{}\n", script)).unwrap();
    SessionConfig::new("infn", "https://s3.example.org", "/bucket", dir.join("mnt"))
        .with_base_dir(dir)
        .with_cache_dir(dir.join("cache"))
        .with_read_only(true)
        .with_mount_executable(exe)
        .with_remount_delay(Duration::from_millis(10))
}

fn supervisor_from(config: &SessionConfig, instance_dir: &Path) -> MountSupervisor {
    let source = ExecutableSource::File(config.mount_executable.clone().unwrap());
    let cache =
        ExecutableCache::new(source, &config.cache_dir).with_retry(3, Duration::from_millis(20));
    MountSupervisor::from_config(config, instance_dir, cache)
        .with_stop_grace(Duration::from_secs(2))
}

fn policy(enabled: bool, max_attempts: u32) -> RemountPolicy {
    RemountPolicy {
        enabled,
        max_attempts,
        delay: Duration::from_millis(10),
    }
}

#[tokio::test]
async fn test_crashing_mount_is_remounted_until_budget() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("rclone.log");
    let script = format!(
        "echo 'ERROR : connection reset' >> {}\nexit 5",
        log.display()
    );
    let (refresher, _) = refresher(Duration::from_secs(3600));
    let mut orchestrator = SessionOrchestrator::new(
        refresher,
        supervisor(dir.path(), &script),
        Interrupt::manual(),
        policy(true, 2),
    );

    let err = tokio::time::timeout(Duration::from_secs(20), orchestrator.run())
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(
        err,
        WireError::Mount(MountError::RemountBudgetExhausted { attempts: 2 })
    ));
    assert_eq!(orchestrator.remount_attempts(), 2);

    let lines = std::fs::read_to_string(&log).unwrap();
    assert_eq!(lines.lines().count(), 3);
}

#[tokio::test]
async fn test_usage_error_is_not_remounted() {
    let dir = tempfile::tempdir().unwrap();
    let (refresher, _) = refresher(Duration::from_secs(3600));
    let mut orchestrator = SessionOrchestrator::new(
        refresher,
        supervisor(dir.path(), "exit 1"),
        Interrupt::manual(),
        policy(true, 10),
    );

    let err = tokio::time::timeout(Duration::from_secs(20), orchestrator.run())
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, WireError::Mount(MountError::NotRemountable { .. })));
    assert_eq!(orchestrator.remount_attempts(), 0);
}

#[tokio::test]
async fn test_interrupt_stops_running_mount() {
    let dir = tempfile::tempdir().unwrap();
    let (refresher, calls) = refresher(Duration::from_millis(50));
    let interrupt = Interrupt::manual();
    let mut orchestrator = SessionOrchestrator::new(
        refresher,
        supervisor(dir.path(), "trap 'exit 0' INT\nwhile true; do sleep 0.05; done"),
        interrupt.clone(),
        policy(true, 10),
    );

    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        interrupt.trigger();
    });
    tokio::time::timeout(Duration::from_secs(20), orchestrator.run())
        .await
        .unwrap()
        .unwrap();
    trigger.await.unwrap();

    assert!(calls.load(Ordering::SeqCst) >= 1);
    assert_eq!(orchestrator.remount_attempts(), 0);
}

#[tokio::test]
async fn test_failed_health_check_goes_through_remount() {
    let dir = tempfile::tempdir().unwrap();
    // mnt stays a plain directory, so every health check fails
    let config = script_config(
        dir.path(),
        "trap 'exit 0' INT\nwhile true; do sleep 0.05; done",
    )
    .with_health_interval(Duration::from_millis(100))
    .with_max_remount_attempts(1);
    let (refresher, _) = refresher(Duration::from_secs(3600));
    let mut orchestrator = SessionOrchestrator::new(
        refresher,
        supervisor_from(&config, dir.path()),
        Interrupt::manual(),
        RemountPolicy::from_config(&config),
    );

    let err = tokio::time::timeout(Duration::from_secs(30), orchestrator.run())
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(
        err,
        WireError::Mount(MountError::RemountBudgetExhausted { attempts: 1 })
    ));
    assert_eq!(orchestrator.remount_attempts(), 1);
}

#[tokio::test]
async fn test_mount_log_rotates_while_running() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("rclone.log");
    let script = format!(
        "trap 'exit 0' INT\nwhile true; do echo 'INFO : transferred chunk' >> {}; sleep 0.02; done",
        log.display()
    );
    let config = script_config(dir.path(), &script)
        .with_health_interval(Duration::ZERO)
        .with_log_rotate_threshold(64);
    let (refresher, _) = refresher(Duration::from_secs(3600));
    let interrupt = Interrupt::manual();
    let mut orchestrator = SessionOrchestrator::new(
        refresher,
        supervisor_from(&config, dir.path()),
        interrupt.clone(),
        RemountPolicy::from_config(&config),
    )
    .with_rotate_interval(Duration::from_millis(50));

    let archive = dir.path().join("rclone1.log.gz");
    let seen = archive.clone();
    let trigger = tokio::spawn(async move {
        for _ in 0..200 {
            if seen.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        interrupt.trigger();
    });
    tokio::time::timeout(Duration::from_secs(30), orchestrator.run())
        .await
        .unwrap()
        .unwrap();
    trigger.await.unwrap();

    assert!(archive.exists());
    assert_eq!(orchestrator.remount_attempts(), 0);
}
