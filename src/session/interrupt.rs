//! Ctrl+C handling for the session loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::debug;

use crate::error::{SystemError, WireResult};

/// A latched interrupt request.
///
/// Interrupts that arrive before [`Interrupt::arm`] are dropped: until the
/// first mount is up there is nothing to shut down, and the login flow
/// keeps its own timeout.
#[derive(Clone, Default)]
pub struct Interrupt {
    armed: Arc<AtomicBool>,
    fired: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Interrupt {
    /// Interrupt that only fires through [`Interrupt::trigger`].
    pub fn manual() -> Self {
        Self::default()
    }

    /// Install the process-wide Ctrl+C handler.
    pub fn install() -> WireResult<Self> {
        let interrupt = Self::default();
        let handle = interrupt.clone();
        ctrlc::set_handler(move || handle.trigger()).map_err(|e| {
            SystemError::SignalHandler {
                message: e.to_string(),
            }
        })?;
        Ok(interrupt)
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    pub fn trigger(&self) {
        if !self.is_armed() {
            debug!("interrupt ignored, session not running yet");
            return;
        }
        self.fired.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_triggered(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Resolve once an armed interrupt has fired.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_unarmed_trigger_is_ignored() {
        let interrupt = Interrupt::manual();
        interrupt.trigger();
        assert!(!interrupt.is_triggered());
        let waited = tokio::time::timeout(Duration::from_millis(50), interrupt.wait()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_trigger_before_wait_is_latched() {
        let interrupt = Interrupt::manual();
        interrupt.arm();
        interrupt.trigger();
        tokio::time::timeout(Duration::from_secs(1), interrupt.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_trigger_wakes_waiter() {
        let interrupt = Interrupt::manual();
        interrupt.arm();
        let waiter = {
            let interrupt = interrupt.clone();
            tokio::spawn(async move { interrupt.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        interrupt.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
