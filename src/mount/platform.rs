//! OS glue: mount point detection, unmount, signals, file modes.

use std::io;
use std::path::Path;

use tracing::debug;

/// Mode of the cached mount executable.
pub const EXE_MODE: u32 = 0o750;

/// True when `path` sits on a different device than its parent.
///
/// Bind mounts on the same device are not detected.
#[cfg(unix)]
pub fn is_mount_point(path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    let parent_meta = std::fs::symlink_metadata(&parent)?;
    debug!(dev = meta.dev(), parent_dev = parent_meta.dev(), "mount point check");
    Ok(meta.dev() != parent_meta.dev())
}

#[cfg(not(unix))]
pub fn is_mount_point(path: &Path) -> io::Result<bool> {
    Ok(path.exists())
}

/// Unmount `path`. Not being a mount point is not an error.
#[cfg(target_os = "linux")]
pub fn unmount(path: &Path) -> io::Result<()> {
    use nix::errno::Errno;

    match nix::mount::umount(path) {
        Ok(()) | Err(Errno::EINVAL) => Ok(()),
        Err(e) => Err(io::Error::from(e)),
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
pub fn unmount(path: &Path) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::mount::MntFlags;

    match nix::mount::unmount(path, MntFlags::empty()) {
        Ok(()) | Err(Errno::EINVAL) => Ok(()),
        Err(e) => Err(io::Error::from(e)),
    }
}

#[cfg(not(unix))]
pub fn unmount(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Send SIGINT, the signal rclone treats as "unmount and exit".
#[cfg(unix)]
pub fn interrupt(pid: u32) -> io::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGINT).map_err(io::Error::from)
}

#[cfg(not(unix))]
pub fn interrupt(_pid: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "signals are not supported on this platform",
    ))
}

/// ETXTBSY: the file is being executed.
#[cfg(unix)]
pub fn is_file_busy(err: &io::Error) -> bool {
    err.raw_os_error() == Some(nix::errno::Errno::ETXTBSY as i32)
}

#[cfg(not(unix))]
pub fn is_file_busy(_err: &io::Error) -> bool {
    false
}

#[cfg(unix)]
pub fn set_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(EXE_MODE))
}

#[cfg(not(unix))]
pub fn set_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Permission bits, or `None` where they do not apply.
#[cfg(unix)]
pub fn file_mode(meta: &std::fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(meta.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
pub fn file_mode(_meta: &std::fs::Metadata) -> Option<u32> {
    None
}
