//! Command-line argument parsing for sts-wire.
//!
//! ```text
//! sts-wire <IAM server> <instance name> <s3 endpoint> <remote path> <local mount point> [flags]
//! sts-wire version | clean | report [path]
//! ```

use std::path::PathBuf;

use crate::error::ConfigError;
use crate::startup::{FileConfig, LogTarget, SessionConfig};

/// Config file read when `--config` is not given, if it exists.
pub const DEFAULT_CONFIG_FILE: &str = "./config.json";

pub const USAGE: &str = "\
Usage:
  sts-wire <IAM server> <instance name> <s3 endpoint> <remote path> <local mount point> [flags]
  sts-wire version
  sts-wire clean
  sts-wire report [path]

Flags:
  --config <path>              JSON config file (default ./config.json)
  --log <path|stderr>          where to write the session log
  --rcloneMountFlags \"<flags>\" replace every rclone mount flag
  --debug                      debug logging to stderr
  --insecureConn               skip TLS certificate checks
  --refreshTokenRenew <min>    credential lifetime in minutes (default 15)
  --noPassword                 do not store the client registration
  --noModtime                  mount with --no-modtime
  --readOnly                   mount read-only
  --tryRemount[=false]         remount after a crash (default true)
  --mountExecutable <path>     rclone binary to install";

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Show version information
    Version,
    /// Remove the cached executable, instance folders and logs
    Clean,
    /// List reports, or print the given one
    Report(Option<PathBuf>),
    Help,
    /// Run a session (default)
    Run(RunArgs),
}

/// Arguments of a session run, before they are merged into a
/// [`SessionConfig`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunArgs {
    pub positional: Vec<String>,
    pub config_file: Option<PathBuf>,
    pub log: Option<String>,
    pub mount_flags: Option<String>,
    pub debug: bool,
    pub insecure_conn: bool,
    pub refresh_token_renew: Option<u64>,
    pub no_password: bool,
    pub no_modtime: bool,
    pub read_only: bool,
    pub try_remount: Option<bool>,
    pub mount_executable: Option<PathBuf>,
}

fn parse_bool(flag: &str, value: Option<&str>) -> Result<bool, ConfigError> {
    match value {
        None => Ok(true),
        Some(v) => v.parse::<bool>().map_err(|_| ConfigError::InvalidValue {
            field: flag.to_string(),
            message: format!("'{}' is not true or false", v),
        }),
    }
}

/// Parse command-line arguments and return the appropriate command.
///
/// `args` includes the program name, as `std::env::args()` does.
///
/// # Examples
///
/// ```
/// use sts_wire::cli::args::{parse_args, CliCommand};
///
/// let args = vec!["sts-wire".to_string(), "version".to_string()];
/// assert_eq!(parse_args(args.into_iter()).unwrap(), CliCommand::Version);
/// ```
pub fn parse_args<I>(args: I) -> Result<CliCommand, ConfigError>
where
    I: Iterator<Item = String>,
{
    let mut run = RunArgs::default();
    let mut args = args.skip(1).peekable();

    match args.peek().map(String::as_str) {
        Some("version") | Some("--version") | Some("-V") => return Ok(CliCommand::Version),
        Some("clean") => return Ok(CliCommand::Clean),
        Some("help") | Some("--help") | Some("-h") => return Ok(CliCommand::Help),
        Some("report") => {
            args.next();
            return Ok(CliCommand::Report(args.next().map(PathBuf::from)));
        }
        _ => {}
    }

    while let Some(arg) = args.next() {
        if !arg.starts_with("--") {
            run.positional.push(arg);
            continue;
        }

        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg.clone(), None),
        };
        let mut value = |name: &'static str| -> Result<String, ConfigError> {
            inline
                .clone()
                .or_else(|| args.next())
                .ok_or(ConfigError::MissingArgument { name })
        };

        match flag.as_str() {
            "--config" => run.config_file = Some(PathBuf::from(value("--config")?)),
            "--log" => run.log = Some(value("--log")?),
            "--rcloneMountFlags" => run.mount_flags = Some(value("--rcloneMountFlags")?),
            "--mountExecutable" => {
                run.mount_executable = Some(PathBuf::from(value("--mountExecutable")?))
            }
            "--refreshTokenRenew" => {
                let raw = value("--refreshTokenRenew")?;
                let minutes = raw.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                    field: "refreshTokenRenew".to_string(),
                    message: format!("'{}' is not a number of minutes", raw),
                })?;
                run.refresh_token_renew = Some(minutes);
            }
            "--debug" => run.debug = parse_bool(&flag, inline.as_deref())?,
            "--insecureConn" => run.insecure_conn = parse_bool(&flag, inline.as_deref())?,
            "--noPassword" => run.no_password = parse_bool(&flag, inline.as_deref())?,
            "--noModtime" => run.no_modtime = parse_bool(&flag, inline.as_deref())?,
            "--readOnly" => run.read_only = parse_bool(&flag, inline.as_deref())?,
            "--tryRemount" => run.try_remount = Some(parse_bool(&flag, inline.as_deref())?),
            _ => return Err(ConfigError::UnknownFlag { flag }),
        }
    }

    Ok(CliCommand::Run(run))
}

impl RunArgs {
    fn config_path(&self) -> Option<PathBuf> {
        match self.config_file {
            Some(ref path) => Some(path.clone()),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                default.exists().then_some(default)
            }
        }
    }

    /// Merge defaults, the config file, the command line and the
    /// environment, in that order.
    pub fn into_config(self) -> Result<SessionConfig, ConfigError> {
        let mut config = SessionConfig::new("", "", "", "");
        if let Some(path) = self.config_path() {
            config = FileConfig::load(&path)?.apply(config);
        }

        if self.positional.len() > 5 {
            return Err(ConfigError::InvalidValue {
                field: "arguments".to_string(),
                message: format!("expected at most 5, got {}", self.positional.len()),
            });
        }
        let mut positional = self.positional.into_iter();
        if let Some(server) = positional.next() {
            config.iam_server = Some(server).filter(|s| !s.trim().is_empty());
        }
        if let Some(instance) = positional.next() {
            config.instance = instance;
        }
        if let Some(endpoint) = positional.next() {
            config.s3_endpoint = endpoint;
        }
        if let Some(remote) = positional.next() {
            config.remote_path = remote;
        }
        if let Some(local) = positional.next() {
            config.local_mount_path = PathBuf::from(local);
        }

        if let Some(log) = self.log {
            config.log_target = LogTarget::parse(&log);
        }
        if let Some(flags) = self.mount_flags.filter(|f| !f.trim().is_empty()) {
            config.mount_flags = Some(flags);
        }
        if let Some(minutes) = self.refresh_token_renew {
            config.refresh_renew_minutes = minutes;
        }
        if let Some(try_remount) = self.try_remount {
            config.try_remount = try_remount;
        }
        if let Some(exe) = self.mount_executable {
            config = config.with_mount_executable(exe);
        }
        // switches only ever turn a file setting on
        if self.debug {
            config = config.with_debug(true);
        }
        if self.insecure_conn {
            config = config.with_insecure_tls(true);
        }
        if self.no_password {
            config = config.with_no_password(true);
        }
        if self.no_modtime {
            config = config.with_no_modtime(true);
        }
        if self.read_only {
            config = config.with_read_only(true);
        }

        let config = config.apply_env();
        if config.local_mount_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingArgument {
                name: "local mount point",
            });
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> impl Iterator<Item = String> {
        std::iter::once("sts-wire".to_string())
            .chain(args.iter().map(|a| a.to_string()))
            .collect::<Vec<_>>()
            .into_iter()
    }

    fn run_args(args: &[&str]) -> RunArgs {
        match parse_args(argv(args)).unwrap() {
            CliCommand::Run(run) => run,
            other => panic!("expected run, got {other:?}"),
        }
    }

    const POSITIONAL: [&str; 5] = [
        "https://iam.example.org",
        "infn",
        "https://s3.example.org",
        "/bucket",
        "./mnt",
    ];

    #[test]
    fn test_parse_subcommands() {
        assert_eq!(parse_args(argv(&["version"])).unwrap(), CliCommand::Version);
        assert_eq!(parse_args(argv(&["-V"])).unwrap(), CliCommand::Version);
        assert_eq!(parse_args(argv(&["clean"])).unwrap(), CliCommand::Clean);
        assert_eq!(parse_args(argv(&["--help"])).unwrap(), CliCommand::Help);
        assert_eq!(parse_args(argv(&["report"])).unwrap(), CliCommand::Report(None));
        assert_eq!(
            parse_args(argv(&["report", ".infn/report_1.out"])).unwrap(),
            CliCommand::Report(Some(PathBuf::from(".infn/report_1.out")))
        );
    }

    #[test]
    fn test_parse_run_flags() {
        let mut args = POSITIONAL.to_vec();
        args.extend([
            "--readOnly",
            "--tryRemount=false",
            "--refreshTokenRenew",
            "30",
            "--rcloneMountFlags",
            "--read-only --vfs-cache-mode full",
            "--log=stderr",
        ]);
        let run = run_args(&args);
        assert_eq!(run.positional.len(), 5);
        assert!(run.read_only);
        assert_eq!(run.try_remount, Some(false));
        assert_eq!(run.refresh_token_renew, Some(30));
        assert_eq!(run.mount_flags.as_deref(), Some("--read-only --vfs-cache-mode full"));
        assert_eq!(run.log.as_deref(), Some("stderr"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_args(argv(&["--bogus"])),
            Err(ConfigError::UnknownFlag { .. })
        ));
        assert!(matches!(
            parse_args(argv(&["--config"])),
            Err(ConfigError::MissingArgument { .. })
        ));
        assert!(matches!(
            parse_args(argv(&["--refreshTokenRenew", "soon"])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            parse_args(argv(&["--readOnly=maybe"])),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    #[serial_test::serial]
    fn test_into_config_from_positionals() {
        std::env::remove_var("IAM_SERVER");
        let mut args = POSITIONAL.to_vec();
        args.extend(["--config", "/nonexistent/never.json"]);
        assert!(matches!(
            run_args(&args).into_config(),
            Err(ConfigError::FileRead { .. })
        ));

        let mut args = POSITIONAL.to_vec();
        args.extend([
            "--noModtime",
            "--tryRemount=false",
            "--log",
            "stderr",
            "--debug",
            "--insecureConn",
            "--mountExecutable",
            "/opt/rclone/rclone",
        ]);
        let config = run_args(&args).into_config().unwrap();
        assert_eq!(config.iam_server.as_deref(), Some("https://iam.example.org"));
        assert_eq!(config.instance, "infn");
        assert_eq!(config.s3_endpoint, "https://s3.example.org");
        assert_eq!(config.remote_path, "/bucket");
        assert_eq!(config.local_mount_path, PathBuf::from("./mnt"));
        assert!(config.no_modtime);
        assert!(!config.try_remount);
        assert_eq!(config.log_target, LogTarget::Stderr);
        assert!(config.debug);
        assert!(config.insecure_tls);
        assert!(!config.read_only);
        assert_eq!(
            config.mount_executable,
            Some(PathBuf::from("/opt/rclone/rclone"))
        );
    }

    #[test]
    #[serial_test::serial]
    fn test_into_config_file_then_flags() {
        std::env::remove_var("IAM_SERVER");
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.json");
        std::fs::write(
            &file,
            r#"{"instance_name":"fromfile","s3_endpoint":"https://s3.example.org",
                "rclone_remote_path":"/data","local_mount_point":"/tmp/mnt","readOnly":true}"#,
        )
        .unwrap();

        let config = run_args(&["--config", file.to_str().unwrap(), "--refreshTokenRenew", "20"])
            .into_config()
            .unwrap();
        assert_eq!(config.instance, "fromfile");
        assert_eq!(config.remote_path, "/data");
        assert!(config.read_only);
        assert_eq!(config.refresh_renew_minutes, 20);
    }

    #[test]
    #[serial_test::serial]
    fn test_into_config_requires_mount_point() {
        std::env::remove_var("IAM_SERVER");
        let config = run_args(&POSITIONAL[..4]).into_config();
        assert!(matches!(
            config,
            Err(ConfigError::MissingArgument { name: "local mount point" })
        ));
    }
}
