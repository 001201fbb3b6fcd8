//! Session configuration.
//!
//! One [`SessionConfig`] is built at startup from defaults, the optional JSON
//! config file, the command line and the environment, then handed by
//! reference to every component.

use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{classify_reqwest_error, ConfigError, WireResult};

/// Default IAM server offered when none is configured.
pub const DEFAULT_IAM_SERVER: &str = "https://iam-demo.cloud.cnaf.infn.it";

/// Default remount budget.
pub const DEFAULT_MAX_REMOUNT_ATTEMPTS: u32 = 10;

/// Default size at which the mount log is archived.
pub const DEFAULT_LOG_ROTATE_THRESHOLD: u64 = 8 * 1024 * 1024;

static INSTANCE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w-]+$").expect("invalid instance name regex"));
static REMOTE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/[\w\-./]*$").expect("invalid remote path regex"));

/// Where operator logs go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

impl LogTarget {
    /// `stderr` selects the terminal, anything else is a file path.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("stderr") {
            LogTarget::Stderr
        } else {
            LogTarget::File(PathBuf::from(value))
        }
    }
}

/// Configuration for one sts-wire session.
///
/// Secrets never live here, so the serialized form is safe for reports.
///
/// ```ignore
/// use sts_wire::startup::SessionConfig;
///
/// let config = SessionConfig::new("demo", "https://s3.example.org", "/bucket", "./mnt")
///     .with_iam_server("https://iam.example.org")
///     .with_read_only(true);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct SessionConfig {
    /// IAM server; asked interactively when missing
    pub iam_server: Option<String>,
    /// Instance name, also the rclone remote name
    pub instance: String,
    /// S3-compatible endpoint, also used for the STS call
    pub s3_endpoint: String,
    /// Path inside the remote
    pub remote_path: String,
    /// Local mount point
    pub local_mount_path: PathBuf,
    /// Directory holding `.<instance>/` directories (default: working dir)
    pub base_dir: PathBuf,
    /// Per-user cache directory for the mount executable
    pub cache_dir: PathBuf,
    /// Host used in the OAuth redirect URI
    pub callback_host: String,
    /// Callback port; `None` picks a free one
    pub callback_port: Option<u16>,
    /// Lifetime of STS credentials and refresh cadence, in minutes
    pub refresh_renew_minutes: u64,
    /// Refresh this long before the credentials run out
    pub refresh_margin: Duration,
    /// Transport-level retries for one refresh
    pub refresh_retries: u32,
    /// Skip the registration password (registration is not persisted)
    pub no_password: bool,
    pub no_modtime: bool,
    pub read_only: bool,
    /// Remount automatically after an unexpected exit
    pub try_remount: bool,
    pub max_remount_attempts: u32,
    /// Pause before each remount
    pub remount_delay: Duration,
    /// Full replacement for the mount flags
    pub mount_flags: Option<String>,
    /// Skip TLS certificate verification
    pub insecure_tls: bool,
    pub log_target: LogTarget,
    pub debug: bool,
    /// Upper bound on the browser login
    pub login_timeout: Duration,
    /// Interval between mount health checks
    pub health_interval: Duration,
    /// Mount log size that triggers rotation
    pub log_rotate_threshold: u64,
    /// Packaged mount executable to install into the cache
    pub mount_executable: Option<PathBuf>,
}

impl SessionConfig {
    pub fn new(
        instance: impl Into<String>,
        s3_endpoint: impl Into<String>,
        remote_path: impl Into<String>,
        local_mount_path: impl Into<PathBuf>,
    ) -> Self {
        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let cache_dir = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            iam_server: None,
            instance: instance.into(),
            s3_endpoint: s3_endpoint.into(),
            remote_path: remote_path.into(),
            local_mount_path: local_mount_path.into(),
            log_target: LogTarget::File(base_dir.join("sts-wire.log")),
            base_dir,
            cache_dir,
            callback_host: "localhost".to_string(),
            callback_port: None,
            refresh_renew_minutes: 15,
            refresh_margin: Duration::from_secs(30),
            refresh_retries: 3,
            no_password: false,
            no_modtime: false,
            read_only: false,
            try_remount: true,
            max_remount_attempts: DEFAULT_MAX_REMOUNT_ATTEMPTS,
            remount_delay: Duration::from_secs(1),
            mount_flags: None,
            insecure_tls: false,
            debug: false,
            login_timeout: Duration::from_secs(300),
            health_interval: Duration::from_secs(30),
            log_rotate_threshold: DEFAULT_LOG_ROTATE_THRESHOLD,
            mount_executable: None,
        }
    }

    pub fn with_iam_server(mut self, server: impl Into<String>) -> Self {
        self.iam_server = Some(server.into());
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_callback_port(mut self, port: u16) -> Self {
        self.callback_port = Some(port);
        self
    }

    pub fn with_refresh_renew_minutes(mut self, minutes: u64) -> Self {
        self.refresh_renew_minutes = minutes;
        self
    }

    pub fn with_refresh_retries(mut self, retries: u32) -> Self {
        self.refresh_retries = retries;
        self
    }

    pub fn with_no_password(mut self, no_password: bool) -> Self {
        self.no_password = no_password;
        self
    }

    pub fn with_no_modtime(mut self, no_modtime: bool) -> Self {
        self.no_modtime = no_modtime;
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_try_remount(mut self, try_remount: bool) -> Self {
        self.try_remount = try_remount;
        self
    }

    pub fn with_max_remount_attempts(mut self, attempts: u32) -> Self {
        self.max_remount_attempts = attempts;
        self
    }

    pub fn with_remount_delay(mut self, delay: Duration) -> Self {
        self.remount_delay = delay;
        self
    }

    pub fn with_mount_flags(mut self, flags: impl Into<String>) -> Self {
        self.mount_flags = Some(flags.into());
        self
    }

    pub fn with_insecure_tls(mut self, insecure: bool) -> Self {
        self.insecure_tls = insecure;
        self
    }

    pub fn with_log_target(mut self, target: LogTarget) -> Self {
        self.log_target = target;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    pub fn with_log_rotate_threshold(mut self, bytes: u64) -> Self {
        self.log_rotate_threshold = bytes;
        self
    }

    pub fn with_mount_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.mount_executable = Some(path.into());
        self
    }

    /// `IAM_SERVER` overrides whatever the flags and file said.
    pub fn apply_env(mut self) -> Self {
        if let Ok(server) = std::env::var("IAM_SERVER") {
            if !server.trim().is_empty() {
                self.iam_server = Some(server.trim().to_string());
            }
        }
        self
    }

    /// Lifetime requested for STS credentials.
    pub fn sts_duration_secs(&self) -> u64 {
        self.refresh_renew_minutes * 60
    }

    /// Cadence of the refresh loop: the renewal interval minus the margin,
    /// never below one second.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.sts_duration_secs())
            .saturating_sub(self.refresh_margin)
            .max(Duration::from_secs(1))
    }

    /// Check the fields the session cannot run without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instance.trim().is_empty() {
            return Err(ConfigError::MissingArgument { name: "instance name" });
        }
        if !INSTANCE_NAME.is_match(&self.instance) {
            return Err(ConfigError::InvalidValue {
                field: "instance name".to_string(),
                message: "only letters, digits, '-' and '_' are allowed".to_string(),
            });
        }
        if !REMOTE_PATH.is_match(&self.remote_path) {
            return Err(ConfigError::InvalidValue {
                field: "remote path".to_string(),
                message: format!("'{}' must be an absolute bucket path", self.remote_path),
            });
        }
        if !self.s3_endpoint.starts_with("http://") && !self.s3_endpoint.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue {
                field: "s3 endpoint".to_string(),
                message: format!("'{}' is not an http(s) URL", self.s3_endpoint),
            });
        }
        if self.refresh_renew_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "refreshTokenRenew".to_string(),
                message: "must be at least one minute".to_string(),
            });
        }
        Ok(())
    }

    /// HTTP client shared by every outbound call of the session.
    pub fn http_client(&self) -> WireResult<reqwest::Client> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .danger_accept_invalid_certs(self.insecure_tls)
            .build()
            .map_err(|e| classify_reqwest_error(&e, "client builder"))?;
        Ok(client)
    }
}

/// The JSON config file accepted by `--config`.
///
/// Key names match the configuration files users already have.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(rename = "IAM_Server")]
    pub iam_server: Option<String>,
    #[serde(rename = "instance_name")]
    pub instance: Option<String>,
    pub s3_endpoint: Option<String>,
    #[serde(rename = "rclone_remote_path")]
    pub remote_path: Option<String>,
    #[serde(rename = "local_mount_point")]
    pub local_mount_point: Option<String>,
    #[serde(rename = "refreshTokenRenew")]
    pub refresh_token_renew: Option<u64>,
    #[serde(rename = "noPassword")]
    pub no_password: Option<bool>,
    #[serde(rename = "noModtime")]
    pub no_modtime: Option<bool>,
    #[serde(rename = "readOnly")]
    pub read_only: Option<bool>,
    #[serde(rename = "tryRemount")]
    pub try_remount: Option<bool>,
    #[serde(rename = "insecureConn")]
    pub insecure_conn: Option<bool>,
    #[serde(rename = "rcloneMountFlags")]
    pub rclone_mount_flags: Option<String>,
    #[serde(rename = "IAMAuthURL")]
    pub iam_auth_url: Option<String>,
    #[serde(rename = "IAMAuthURLPort")]
    pub iam_auth_url_port: Option<u16>,
    pub log: Option<String>,
    #[serde(rename = "mountExecutable")]
    pub mount_executable: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::FileParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Overlay the file's settings on `config`.
    pub fn apply(&self, mut config: SessionConfig) -> SessionConfig {
        if let Some(ref v) = self.iam_server {
            config.iam_server = Some(v.clone());
        }
        if let Some(ref v) = self.instance {
            config.instance = v.clone();
        }
        if let Some(ref v) = self.s3_endpoint {
            config.s3_endpoint = v.clone();
        }
        if let Some(ref v) = self.remote_path {
            config.remote_path = v.clone();
        }
        if let Some(ref v) = self.local_mount_point {
            config.local_mount_path = PathBuf::from(v);
        }
        if let Some(v) = self.refresh_token_renew {
            config.refresh_renew_minutes = v;
        }
        if let Some(v) = self.no_password {
            config.no_password = v;
        }
        if let Some(v) = self.no_modtime {
            config.no_modtime = v;
        }
        if let Some(v) = self.read_only {
            config.read_only = v;
        }
        if let Some(v) = self.try_remount {
            config.try_remount = v;
        }
        if let Some(v) = self.insecure_conn {
            config.insecure_tls = v;
        }
        if let Some(ref v) = self.rclone_mount_flags {
            if !v.trim().is_empty() {
                config.mount_flags = Some(v.clone());
            }
        }
        if let Some(ref v) = self.iam_auth_url {
            config.callback_host = v.clone();
        }
        if let Some(v) = self.iam_auth_url_port {
            config.callback_port = Some(v);
        }
        if let Some(ref v) = self.log {
            config.log_target = LogTarget::parse(v);
        }
        if let Some(ref v) = self.mount_executable {
            config.mount_executable = Some(PathBuf::from(v));
        }
        config
    }
}

/// Tokens and client credentials supplied through the environment.
#[derive(Clone, Default)]
pub struct EnvOverrides {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl EnvOverrides {
    /// Read `ACCESS_TOKEN`, `REFRESH_TOKEN`, `IAM_CLIENT_ID` and
    /// `IAM_CLIENT_SECRET`; empty values count as absent.
    pub fn from_env() -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            access_token: read("ACCESS_TOKEN"),
            refresh_token: read("REFRESH_TOKEN"),
            client_id: read("IAM_CLIENT_ID"),
            client_secret: read("IAM_CLIENT_SECRET"),
        }
    }

    /// A refresh token in the environment skips the browser login.
    pub fn is_non_interactive(&self) -> bool {
        self.refresh_token.is_some()
    }
}

impl std::fmt::Debug for EnvOverrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvOverrides")
            .field("access_token", &self.access_token.as_ref().map(|_| "<set>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<set>"))
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<set>"))
            .finish()
    }
}
