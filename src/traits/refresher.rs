//! Credential refresh trait abstraction.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::WireResult;

/// Something that keeps session credentials fresh.
///
/// `refresh` takes `&mut self`, so two refreshes for the same session can
/// never overlap.
#[async_trait]
pub trait CredentialRefresher: Send {
    /// Renew the access token and everything derived from it.
    ///
    /// An error is fatal to the session.
    async fn refresh(&mut self) -> WireResult<()>;

    /// How often `refresh` must run.
    fn refresh_interval(&self) -> Duration;
}
