//! Everything a session needs before the first login.
//!
//! # Components
//!
//! - [`config`] - Session configuration from flags, config file and env
//! - [`instance`] - Per-instance directory layout and metadata
//! - [`logging`] - Tracing subscriber setup

pub mod config;
pub mod instance;
pub mod logging;

pub use config::{
    EnvOverrides, FileConfig, LogTarget, SessionConfig, DEFAULT_IAM_SERVER,
    DEFAULT_LOG_ROTATE_THRESHOLD, DEFAULT_MAX_REMOUNT_ATTEMPTS,
};
pub use instance::{
    pick_free_port, resolve_callback_port, write_private, InstanceInfo, InstancePaths,
    INFO_FILE, INSTANCE_LOG_FILE, MOUNT_LOG_FILE, STORAGE_CONFIG_FILE, TOKEN_FILE,
};
pub use logging::init_logging;
