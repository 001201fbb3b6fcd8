//! rclone mount command line.

use std::path::PathBuf;

/// Inputs of one mount invocation.
#[derive(Debug, Clone)]
pub struct MountArgs {
    pub config_path: PathBuf,
    pub log_path: PathBuf,
    pub instance: String,
    pub remote_path: String,
    pub local_path: PathBuf,
    pub read_only: bool,
    pub no_modtime: bool,
    /// Replaces every argument below when set.
    pub custom_flags: Option<String>,
}

impl MountArgs {
    /// `<instance>:<remote path>`
    pub fn remote(&self) -> String {
        format!("{}:{}", self.instance, self.remote_path)
    }

    pub fn to_args(&self) -> Vec<String> {
        if let Some(custom) = self.custom_flags.as_deref().filter(|f| !f.trim().is_empty()) {
            return custom.split_whitespace().map(str::to_string).collect();
        }

        let mut args: Vec<String> = vec![
            "--config".into(),
            self.config_path.display().to_string(),
            "--log-file".into(),
            self.log_path.display().to_string(),
            "--log-level".into(),
            "DEBUG".into(),
            "--use-json-log".into(),
            "--no-check-certificate".into(),
            "--cache-db-purge".into(),
            // S3 does not keep modtimes natively; read them from metadata
            "--use-server-modtime".into(),
            "--no-update-modtime".into(),
            "--checksum".into(),
            "mount".into(),
            self.remote(),
            self.local_path.display().to_string(),
            "--attr-timeout".into(),
            "30s".into(),
            "--vfs-write-wait".into(),
            "2s".into(),
            "--vfs-cache-mode".into(),
            "writes".into(),
        ];
        if self.no_modtime {
            args.push("--no-modtime".into());
        }
        if self.read_only {
            args.push("--read-only".into());
        }
        args
    }
}
