//! Tracing subscriber setup.
//!
//! Two sinks: the operator log (stderr, or the global log file) and the
//! per-instance log that ends up in diagnostic reports.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::config::LogTarget;
use crate::error::{classify_io_error, SystemError, WireResult};

/// Filter used when `RUST_LOG` is not set.
pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        "sts_wire=debug,warn"
    } else {
        "sts_wire=info,warn"
    }
}

fn open_append(path: &Path) -> WireResult<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .map_err(|e| classify_io_error(e, Some(dir.to_path_buf()), "create log directory"))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| classify_io_error(e, Some(path.to_path_buf()), "open log file"))?;
    Ok(file)
}

/// Install the global subscriber. `--debug` forces the operator log to
/// stderr.
pub fn init_logging(target: &LogTarget, debug: bool, instance_log: &Path) -> WireResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(debug)));

    let to_stderr = debug || matches!(target, LogTarget::Stderr);
    let stderr_layer = to_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });
    let file_layer = match target {
        LogTarget::File(path) if !to_stderr => Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(open_append(path)?)),
        ),
        _ => None,
    };
    let instance_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(open_append(instance_log)?));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .with(instance_layer)
        .try_init()
        .map_err(|e| SystemError::IoError {
            operation: "install logger".to_string(),
            path: None,
            message: e.to_string(),
        })?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting sts-wire");
    Ok(())
}
