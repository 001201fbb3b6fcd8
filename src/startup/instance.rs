//! Per-instance directory layout and metadata.
//!
//! ```text
//! <base>/.<instance>/
//!   <instance>.json     encrypted client registration
//!   .token              current access token
//!   rclone.conf         storage configuration for the mount process
//!   rclone.log          mount process log (+ rcloneN.log.gz archives)
//!   instance.log        session log
//!   instance.info       name, log file, callback port, password flag
//!   report_<ts>.out     diagnostic reports
//! ```

use std::io::Write;
use std::net::TcpListener;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{classify_io_error, WireResult};

pub const INFO_FILE: &str = "instance.info";
pub const TOKEN_FILE: &str = ".token";
pub const STORAGE_CONFIG_FILE: &str = "rclone.conf";
pub const MOUNT_LOG_FILE: &str = "rclone.log";
pub const INSTANCE_LOG_FILE: &str = "instance.log";

/// Paths of everything that belongs to one named instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstancePaths {
    pub instance: String,
    pub dir: PathBuf,
}

impl InstancePaths {
    pub fn new(base_dir: &Path, instance: &str) -> Self {
        Self {
            instance: instance.to_string(),
            dir: base_dir.join(format!(".{}", instance)),
        }
    }

    /// Create the instance directory if missing.
    pub fn ensure(&self) -> WireResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            classify_io_error(e, Some(self.dir.clone()), "create instance directory")
        })?;
        Ok(())
    }

    pub fn registration_file(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.instance))
    }

    pub fn token_file(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }

    pub fn storage_config(&self) -> PathBuf {
        self.dir.join(STORAGE_CONFIG_FILE)
    }

    pub fn mount_log(&self) -> PathBuf {
        self.dir.join(MOUNT_LOG_FILE)
    }

    pub fn instance_log(&self) -> PathBuf {
        self.dir.join(INSTANCE_LOG_FILE)
    }

    pub fn info_file(&self) -> PathBuf {
        self.dir.join(INFO_FILE)
    }

    pub fn report_file(&self, unix_ts: i64) -> PathBuf {
        self.dir.join(format!("report_{}.out", unix_ts))
    }
}

/// Contents of `instance.info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub name: String,
    pub log_file: String,
    pub port: u16,
    pub password: bool,
}

impl InstanceInfo {
    pub fn load(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn save(&self, path: &Path) -> WireResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| classify_io_error(e, Some(path.to_path_buf()), "write instance info"))?;
        Ok(())
    }
}

/// Choose the OAuth callback port.
///
/// A password-protected registration embeds its redirect port, so a stored
/// port wins over the configured one. Otherwise the configured port is used,
/// or a free one is picked.
pub fn resolve_callback_port(
    info: Option<&InstanceInfo>,
    registration_exists: bool,
    configured: Option<u16>,
) -> WireResult<u16> {
    if let Some(info) = info {
        if info.password && registration_exists && info.port != 0 {
            debug!(port = info.port, "reusing callback port of the stored registration");
            return Ok(info.port);
        }
    }
    match configured {
        Some(port) => Ok(port),
        None => pick_free_port(),
    }
}

/// Ask the OS for a free local port.
pub fn pick_free_port() -> WireResult<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .map_err(|e| classify_io_error(e, None, "pick callback port"))?;
    let port = listener
        .local_addr()
        .map_err(|e| classify_io_error(e, None, "pick callback port"))?
        .port();
    Ok(port)
}

/// Write `bytes` to `path`, replacing it, readable by the owner only.
pub fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_layout() {
        let paths = InstancePaths::new(Path::new("/work"), "demo");
        assert_eq!(paths.dir, PathBuf::from("/work/.demo"));
        assert_eq!(paths.registration_file(), PathBuf::from("/work/.demo/demo.json"));
        assert_eq!(paths.token_file(), PathBuf::from("/work/.demo/.token"));
        assert_eq!(paths.storage_config(), PathBuf::from("/work/.demo/rclone.conf"));
        assert_eq!(paths.mount_log(), PathBuf::from("/work/.demo/rclone.log"));
        assert_eq!(
            paths.report_file(1700000000),
            PathBuf::from("/work/.demo/report_1700000000.out")
        );
    }

    #[test]
    fn test_info_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let paths = InstancePaths::new(dir.path(), "demo");
        paths.ensure().unwrap();

        let info = InstanceInfo {
            name: "demo".into(),
            log_file: "sts-wire.log".into(),
            port: 40123,
            password: true,
        };
        info.save(&paths.info_file()).unwrap();
        assert_eq!(InstanceInfo::load(&paths.info_file()), Some(info));
    }

    #[test]
    fn test_stored_port_reused_only_with_password_registration() {
        let info = InstanceInfo {
            name: "demo".into(),
            log_file: String::new(),
            port: 40123,
            password: true,
        };
        assert_eq!(resolve_callback_port(Some(&info), true, Some(3128)).unwrap(), 40123);
        assert_eq!(resolve_callback_port(Some(&info), false, Some(3128)).unwrap(), 3128);

        let no_pw = InstanceInfo { password: false, ..info };
        assert_eq!(resolve_callback_port(Some(&no_pw), true, Some(3128)).unwrap(), 3128);
    }

    #[test]
    fn test_free_port_when_unconfigured() {
        let port = resolve_callback_port(None, false, None).unwrap();
        assert_ne!(port, 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_private_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".token");
        std::fs::write(&path, "old-and-longer").unwrap();

        write_private(&path, b"new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
