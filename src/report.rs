//! Diagnostic report written when a session ends with an error.
//!
//! ```text
//! | Version          build metadata block
//! | Parameters       session configuration as JSON (no secrets)
//! | Instance log     contents of instance.log
//! | Error            code, category, message, context, hint
//! ```

use std::io;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::cli::version::{version_block, DIVIDER};
use crate::error::{classify_io_error, WireError, WireResult};
use crate::startup::{write_private, InstancePaths, SessionConfig};

fn instance_log(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => format!("cannot read instance log: {}", e),
    }
}

fn error_section(err: &WireError) -> String {
    let mut section = format!(
        "code:     {}\ncategory: {}\nmessage:  {}\n",
        err.error_code(),
        err.category().as_str(),
        err,
    );
    if let Some(context) = err.context() {
        section.push_str(&format!("context:  {}\n", context.to_log_string()));
    }
    section.push_str(&format!("hint:     {}\n", err.recovery_hint()));
    section
}

/// Render the report text.
pub fn render_report(config: &SessionConfig, instance_log_path: &Path, err: &WireError) -> String {
    let parameters = serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("unable to serialize parameters: {}", e));

    let mut report = String::new();
    report.push_str(DIVIDER);
    report.push_str("\n| Version\n");
    report.push_str(&version_block());
    report.push_str("| Parameters\n");
    report.push_str(DIVIDER);
    report.push('\n');
    report.push_str(&parameters);
    report.push('\n');
    report.push_str(DIVIDER);
    report.push_str("\n| Instance log\n");
    report.push_str(DIVIDER);
    report.push('\n');
    report.push_str(&instance_log(instance_log_path));
    report.push('\n');
    report.push_str(DIVIDER);
    report.push_str("\n| Error\n");
    report.push_str(DIVIDER);
    report.push('\n');
    report.push_str(&error_section(err));
    report
}

/// Write `report_<unix ts>.out` into the instance directory.
pub fn write_report(
    paths: &InstancePaths,
    config: &SessionConfig,
    err: &WireError,
) -> WireResult<PathBuf> {
    let path = paths.report_file(chrono::Utc::now().timestamp());
    let report = render_report(config, &paths.instance_log(), err);
    write_private(&path, report.as_bytes())
        .map_err(|e| classify_io_error(e, Some(path.clone()), "write report"))?;

    error!(code = err.error_code(), "{}", err);
    info!(report = %path.display(), "report created");
    warn!("please use the report to have more details");
    Ok(path)
}

/// `report_*.out` files of every instance folder under `base_dir`.
pub fn find_reports(base_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut reports = Vec::new();
    for entry in std::fs::read_dir(base_dir)? {
        let dir = entry?.path();
        let hidden = dir
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if !hidden || !dir.is_dir() {
            continue;
        }
        let Ok(files) = std::fs::read_dir(&dir) else {
            continue;
        };
        for file in files.flatten() {
            let path = file.path();
            let is_report = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("report_") && n.ends_with(".out"));
            if is_report {
                reports.push(path);
            }
        }
    }
    reports.sort();
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorContext, MountError};

    fn config() -> SessionConfig {
        SessionConfig::new("infn", "https://s3.example.org", "/bucket", "/tmp/mnt")
    }

    #[test]
    fn test_render_report_sections() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("instance.log");
        std::fs::write(&log, "INFO session running\n").unwrap();
        let err = WireError::from(MountError::RemountBudgetExhausted { attempts: 10 })
            .with_context(ErrorContext::new("remount").with_instance("infn"));

        let report = render_report(&config(), &log, &err);
        for section in ["| Version", "| Parameters", "| Instance log", "| Error"] {
            assert!(report.contains(section), "missing {section}");
        }
        assert!(report.contains("\"instance\": \"infn\""));
        assert!(report.contains("INFO session running"));
        assert!(report.contains("operation=remount"));
        assert!(report.contains(err.error_code()));
    }

    #[test]
    fn test_render_report_without_instance_log() {
        let err = WireError::from(MountError::WatcherLost);
        let report = render_report(&config(), Path::new("/nonexistent/instance.log"), &err);
        assert!(report.contains("cannot read instance log"));
    }

    #[test]
    fn test_write_and_find_reports() {
        let base = tempfile::tempdir().unwrap();
        let paths = InstancePaths::new(base.path(), "infn");
        paths.ensure().unwrap();

        let written = write_report(&paths, &config(), &MountError::WatcherLost.into()).unwrap();
        assert!(written.starts_with(&paths.dir));

        let found = find_reports(base.path()).unwrap();
        assert_eq!(found, vec![written]);
    }
}
