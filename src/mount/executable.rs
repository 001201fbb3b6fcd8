//! Cached copy of the rclone executable.
//!
//! The packaged binary is copied once into the user cache directory and
//! verified (SHA-256 and mode 0750) before every mount. A copy that is busy
//! because an earlier session is still executing it cannot be rewritten, so
//! verification is retried for a while instead.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::platform::{self, EXE_MODE};
use crate::error::{MountError, SystemError, WireResult};

pub const EXE_NAME: &str = "rclone";
pub const CHECK_ATTEMPTS: u32 = 10;
pub const CHECK_BACKOFF: Duration = Duration::from_secs(1);

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Location of the cached executable under `cache_dir`.
pub fn cached_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("sts-wire").join(EXE_NAME)
}

/// Where the mount executable bytes come from.
#[derive(Debug, Clone)]
pub enum ExecutableSource {
    /// Packaged binary on disk.
    File(PathBuf),
    Bytes(Vec<u8>),
}

impl ExecutableSource {
    /// `rclone` from `PATH`.
    pub fn from_path_env() -> Option<Self> {
        let paths = std::env::var_os("PATH")?;
        std::env::split_paths(&paths)
            .map(|dir| dir.join(EXE_NAME))
            .find(|candidate| candidate.is_file())
            .map(ExecutableSource::File)
    }

    async fn load(&self) -> WireResult<Vec<u8>> {
        match self {
            ExecutableSource::Bytes(bytes) => Ok(bytes.clone()),
            ExecutableSource::File(path) => tokio::fs::read(path).await.map_err(|e| {
                MountError::ExecutableIo {
                    path: path.clone(),
                    message: e.to_string(),
                }
                .into()
            }),
        }
    }
}

/// `<cache dir>/sts-wire/rclone`
#[derive(Debug, Clone)]
pub struct ExecutableCache {
    source: ExecutableSource,
    path: PathBuf,
    attempts: u32,
    backoff: Duration,
}

impl ExecutableCache {
    pub fn new(source: ExecutableSource, cache_dir: &Path) -> Self {
        Self {
            source,
            path: cached_path(cache_dir),
            attempts: CHECK_ATTEMPTS,
            backoff: CHECK_BACKOFF,
        }
    }

    pub fn with_retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.backoff = backoff;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make sure a verified copy exists and return its path.
    pub async fn prepare(&self) -> WireResult<PathBuf> {
        let data = self.source.load().await?;
        let expected = sha256_hex(&data);
        debug!(path = %self.path.display(), len = data.len(), "preparing mount executable");

        let dir = self.path.parent().ok_or(SystemError::NoCacheDirectory)?;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| self.io_error(e))?;

        if self.verify(&expected).is_err() {
            self.materialize(&data).await?;
        }
        self.verify_with_retries(&expected).await?;
        Ok(self.path.clone())
    }

    async fn materialize(&self, data: &[u8]) -> WireResult<()> {
        match tokio::fs::write(&self.path, data).await {
            Ok(()) => {
                platform::set_executable(&self.path).map_err(|e| self.io_error(e))?;
                info!(path = %self.path.display(), "mount executable cached");
                Ok(())
            }
            Err(e) if platform::is_file_busy(&e) => {
                warn!(
                    path = %self.path.display(),
                    "mount executable busy, verifying existing copy"
                );
                Ok(())
            }
            Err(e) => Err(self.io_error(e).into()),
        }
    }

    /// Checksum and mode of the cached copy.
    pub fn verify(&self, expected: &str) -> Result<(), MountError> {
        let meta = std::fs::metadata(&self.path).map_err(|e| self.io_error(e))?;
        if let Some(mode) = platform::file_mode(&meta) {
            if mode != EXE_MODE {
                return Err(MountError::NotExecutable {
                    path: self.path.clone(),
                    mode,
                });
            }
        }
        let bytes = std::fs::read(&self.path).map_err(|e| self.io_error(e))?;
        let actual = sha256_hex(&bytes);
        if actual != expected {
            return Err(MountError::ChecksumMismatch {
                path: self.path.clone(),
                expected: expected.to_string(),
                actual,
            });
        }
        Ok(())
    }

    async fn verify_with_retries(&self, expected: &str) -> Result<(), MountError> {
        let mut last = String::new();
        for attempt in 1..=self.attempts {
            match self.verify(expected) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(attempt, error = %e, "mount executable verification failed");
                    last = e.to_string();
                }
            }
            if attempt < self.attempts {
                tokio::time::sleep(self.backoff).await;
            }
        }
        Err(MountError::VerificationExhausted {
            path: self.path.clone(),
            attempts: self.attempts,
            last,
        })
    }

    fn io_error(&self, e: std::io::Error) -> MountError {
        MountError::ExecutableIo {
            path: self.path.clone(),
            message: e.to_string(),
        }
    }
}
