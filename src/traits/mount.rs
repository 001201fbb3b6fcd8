//! Mount process trait abstraction.

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::error::WireResult;
use crate::mount::{LogErrorEntry, MountExit, MountSession};

/// Launches the mount process and cleans up after it.
///
/// At most one [`MountSession`] is live at a time; the orchestrator owns it
/// and hands it back here when it ends.
#[async_trait]
pub trait MountDriver: Send {
    /// Start a new mount process.
    async fn mount(&mut self) -> WireResult<MountSession>;

    /// Unmount whatever a dead process left behind. Failures are logged.
    async fn unmount_stale(&mut self);

    /// Bookkeeping after a session ended. Returns the errors found in the
    /// mount log for an unexpected exit.
    fn on_exit(&mut self, session: &mut MountSession, exit: &MountExit) -> Vec<LogErrorEntry>;

    /// Rotate the mount log if it grew too large.
    fn rotate_logs(&mut self, session: &mut MountSession);

    /// Start periodic health checks, if the driver supports them.
    fn spawn_health_checker(&self) -> Option<JoinHandle<()>> {
        None
    }
}
