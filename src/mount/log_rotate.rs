//! Size-based rotation of the rclone log into gzip archives.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;

/// Highest N among `<stem>N.log.gz` siblings; 0 when there is none.
pub fn last_archive_index(log_path: &Path) -> io::Result<u32> {
    let (dir, stem) = split(log_path);
    let mut last = 0;
    for entry in std::fs::read_dir(dir)? {
        let name = entry?.file_name();
        let Some(name) = name.to_str() else { continue };
        let index = name
            .strip_prefix(stem)
            .and_then(|rest| rest.strip_suffix(".log.gz"))
            .and_then(|n| n.parse::<u32>().ok());
        if let Some(n) = index {
            last = last.max(n);
        }
    }
    Ok(last)
}

fn split(log_path: &Path) -> (&Path, &str) {
    let dir = match log_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let stem = log_path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.strip_suffix(".log").unwrap_or(n))
        .unwrap_or("rclone");
    (dir, stem)
}

/// Rotate when the live log is at least `threshold` bytes.
///
/// Returns the archive written, if any. The live file is truncated in
/// place so the running process keeps its handle.
pub fn rotate_if_needed(log_path: &Path, threshold: u64) -> io::Result<Option<PathBuf>> {
    let size = match std::fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    if size < threshold {
        return Ok(None);
    }
    rotate(log_path).map(Some)
}

pub fn rotate(log_path: &Path) -> io::Result<PathBuf> {
    let next = last_archive_index(log_path)? + 1;
    let (dir, stem) = split(log_path);
    let archive = dir.join(format!("{}{}.log.gz", stem, next));

    let mut source = File::open(log_path)?;
    let mut encoder = GzEncoder::new(File::create(&archive)?, Compression::best());
    io::copy(&mut source, &mut encoder)?;
    encoder.finish()?;

    File::options().write(true).open(log_path)?.set_len(0)?;
    debug!(archive = %archive.display(), "mount log rotated");
    Ok(archive)
}
