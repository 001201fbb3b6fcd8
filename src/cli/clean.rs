//! Clean command for sts-wire.
//!
//! Removes the cached mount executable, every instance folder under the
//! working directory and the global log files.

use std::io;
use std::path::{Path, PathBuf};

use color_eyre::Result;

use crate::mount::cached_path;
use crate::startup::INFO_FILE;

/// Instance folders (`.<name>/` holding `instance.info`) under `base_dir`.
pub fn instance_dirs(base_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(base_dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if hidden && path.join(INFO_FILE).is_file() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn log_files(base_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut logs = Vec::new();
    for entry in std::fs::read_dir(base_dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "log") {
            logs.push(path);
        }
    }
    logs.sort();
    Ok(logs)
}

/// Remove everything sts-wire left in `base_dir` and `cache_dir`.
///
/// Returns what was removed, in removal order.
pub fn clean(base_dir: &Path, cache_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut removed = Vec::new();

    let exe = cached_path(cache_dir);
    match std::fs::remove_file(&exe) {
        Ok(()) => removed.push(exe),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    for dir in instance_dirs(base_dir)? {
        std::fs::remove_dir_all(&dir)?;
        removed.push(dir);
    }
    for log in log_files(base_dir)? {
        std::fs::remove_file(&log)?;
        removed.push(log);
    }
    Ok(removed)
}

/// Handle the `clean` command.
pub fn handle_clean_command(base_dir: &Path, cache_dir: &Path) -> Result<()> {
    println!("=> Cleaning sts-wire files in {}", base_dir.display());
    for path in clean(base_dir, cache_dir)? {
        println!("==> Removed {}", path.display());
    }
    println!("==> sts-wire env cleaned!");
    Ok(())
}
