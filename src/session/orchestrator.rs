//! The session control loop.
//!
//! One loop owns the live [`MountSession`] and reacts to whichever comes
//! first: an interrupt, the refresh deadline, the log rotation tick, or the
//! mount process ending on its own.

use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::interrupt::Interrupt;
use crate::error::{ErrorContext, MountError, WireError, WireResult};
use crate::mount::{MountExit, MountSession};
use crate::startup::SessionConfig;
use crate::traits::{CredentialRefresher, MountDriver};

/// How often the mount log size is checked.
pub const LOG_ROTATE_INTERVAL: Duration = Duration::from_secs(60);

/// What to do when the mount process dies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemountPolicy {
    pub enabled: bool,
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RemountPolicy {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            enabled: config.try_remount,
            max_attempts: config.max_remount_attempts,
            delay: config.remount_delay,
        }
    }
}

pub struct SessionOrchestrator<R, M> {
    refresher: R,
    driver: M,
    interrupt: Interrupt,
    policy: RemountPolicy,
    rotate_interval: Duration,
    remount_attempts: u32,
}

impl<R, M> SessionOrchestrator<R, M>
where
    R: CredentialRefresher,
    M: MountDriver,
{
    pub fn new(refresher: R, driver: M, interrupt: Interrupt, policy: RemountPolicy) -> Self {
        Self {
            refresher,
            driver,
            interrupt,
            policy,
            rotate_interval: LOG_ROTATE_INTERVAL,
            remount_attempts: 0,
        }
    }

    pub fn with_rotate_interval(mut self, interval: Duration) -> Self {
        self.rotate_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Remounts performed so far.
    pub fn remount_attempts(&self) -> u32 {
        self.remount_attempts
    }

    pub fn refresher(&self) -> &R {
        &self.refresher
    }

    pub fn driver(&self) -> &M {
        &self.driver
    }

    /// Mount and supervise until interrupted or until the session fails.
    pub async fn run(&mut self) -> WireResult<()> {
        let session = self.driver.mount().await?;
        self.supervise(session).await
    }

    /// Supervise an already mounted session.
    pub async fn supervise(&mut self, session: MountSession) -> WireResult<()> {
        let health = self.driver.spawn_health_checker();
        self.interrupt.arm();
        let result = self.control_loop(session).await;
        if let Some(handle) = health {
            handle.abort();
        }
        result
    }

    async fn control_loop(&mut self, mut session: MountSession) -> WireResult<()> {
        let refresh_every = self.refresher.refresh_interval().max(Duration::from_millis(1));
        let mut refresh_tick = interval_at(Instant::now() + refresh_every, refresh_every);
        refresh_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut rotate_tick = interval_at(
            Instant::now() + self.rotate_interval,
            self.rotate_interval,
        );
        rotate_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            refresh_secs = refresh_every.as_secs(),
            remount = self.policy.enabled,
            "session running"
        );

        loop {
            tokio::select! {
                _ = self.interrupt.wait() => {
                    info!("interrupt received, stopping mount");
                    let exit = session.shutdown().await?;
                    self.driver.on_exit(&mut session, &exit);
                    debug!(?exit, "mount stopped");
                    return Ok(());
                }
                _ = refresh_tick.tick() => {
                    // an in-flight refresh finishes before an interrupt is seen
                    if let Err(e) = self.refresher.refresh().await {
                        error!(error = %e, "credential refresh failed, stopping mount");
                        if let Ok(exit) = session.shutdown().await {
                            self.driver.on_exit(&mut session, &exit);
                        }
                        return Err(e);
                    }
                }
                _ = rotate_tick.tick() => {
                    self.driver.rotate_logs(&mut session);
                }
                exit = session.exited() => {
                    let exit = exit?;
                    session = self.remount(session, exit).await?;
                }
            }
        }
    }

    async fn remount(
        &mut self,
        mut session: MountSession,
        exit: MountExit,
    ) -> WireResult<MountSession> {
        self.driver.on_exit(&mut session, &exit);

        let category = match exit {
            MountExit::Unexpected(category) | MountExit::Stopped(category) => category,
            MountExit::WaitFailed(message) => {
                return Err(MountError::WaitFailed { message }.into());
            }
        };
        warn!(%category, "mount process exited");

        if !category.is_remountable() {
            return Err(MountError::NotRemountable {
                category: category.to_string(),
            }
            .into());
        }
        if !self.policy.enabled {
            return Err(MountError::RemountDisabled {
                category: category.to_string(),
            }
            .into());
        }
        if self.remount_attempts >= self.policy.max_attempts {
            return Err(MountError::RemountBudgetExhausted {
                attempts: self.remount_attempts,
            }
            .into());
        }

        self.remount_attempts += 1;
        info!(
            attempt = self.remount_attempts,
            max = self.policy.max_attempts,
            "remounting"
        );
        self.driver.unmount_stale().await;
        tokio::time::sleep(self.policy.delay).await;

        self.driver.mount().await.map_err(|e: WireError| {
            e.with_context(
                ErrorContext::new("remount")
                    .with_attempt(self.remount_attempts)
                    .with_component("mount"),
            )
        })
    }
}
