use std::path::PathBuf;
use std::sync::Arc;

use color_eyre::Result;
use tracing::{info, warn};

use sts_wire::broker::CredentialBroker;
use sts_wire::cli::{parse_args, run_cli_command, CliCommand, USAGE};
use sts_wire::error::{MountError, WireResult};
use sts_wire::identity::IdentityClient;
use sts_wire::mount::{ExecutableCache, ExecutableSource, MountSupervisor};
use sts_wire::report::write_report;
use sts_wire::session::{Interrupt, RemountPolicy, SessionOrchestrator};
use sts_wire::startup::{
    init_logging, resolve_callback_port, EnvOverrides, InstanceInfo, InstancePaths, LogTarget,
    SessionConfig,
};
use sts_wire::vault::{SecretVault, TerminalPrompter};

fn mount_source(config: &SessionConfig) -> WireResult<ExecutableSource> {
    match config.mount_executable {
        Some(ref path) => Ok(ExecutableSource::File(path.clone())),
        None => ExecutableSource::from_path_env().ok_or_else(|| {
            MountError::ExecutableIo {
                path: PathBuf::from(sts_wire::mount::executable::EXE_NAME),
                message: "not found in PATH, use --mountExecutable".to_string(),
            }
            .into()
        }),
    }
}

/// Login, first credentials, then supervise the mount until Ctrl+C.
async fn run_session(config: &SessionConfig, paths: &InstancePaths) -> WireResult<()> {
    let env = EnvOverrides::from_env();
    let http = config.http_client()?;

    let stored = InstanceInfo::load(&paths.info_file());
    let port = resolve_callback_port(
        stored.as_ref(),
        paths.registration_file().exists(),
        config.callback_port,
    )?;

    let identity = IdentityClient::new(
        http.clone(),
        SecretVault::for_host(),
        Arc::new(TerminalPrompter),
        &paths.dir,
    )
    .with_callback(&config.callback_host, port)
    .with_iam_server(config.iam_server.clone())
    .with_no_password(config.no_password)
    .with_non_interactive(env.is_non_interactive());
    let client = identity.init_client(&config.instance).await?;

    let log_file = match config.log_target {
        LogTarget::Stderr => "stderr".to_string(),
        LogTarget::File(ref path) => path.display().to_string(),
    };
    InstanceInfo {
        name: config.instance.clone(),
        log_file,
        port,
        password: client.passphrase.is_some(),
    }
    .save(&paths.info_file())?;

    let registration = client.registration.with_overrides(&env);
    let mut broker = CredentialBroker::new(
        config,
        http,
        &client.endpoint,
        &registration,
        paths,
        env,
        port,
    );
    broker.start().await?;

    let executable = ExecutableCache::new(mount_source(config)?, &config.cache_dir);
    let supervisor = MountSupervisor::from_config(config, &paths.dir, executable);
    let interrupt = Interrupt::install()?;

    let mut orchestrator = SessionOrchestrator::new(
        broker,
        supervisor,
        interrupt,
        RemountPolicy::from_config(config),
    );
    orchestrator.run().await
}

fn main() -> Result<()> {
    let command = match parse_args(std::env::args()) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    let base_dir = std::env::current_dir()?;
    let cache_dir = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
    if let Some(result) = run_cli_command(&command, &base_dir, &cache_dir) {
        return result;
    }
    let CliCommand::Run(run) = command else {
        return Ok(());
    };

    color_eyre::install()?;

    let config = match run.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    let paths = InstancePaths::new(&config.base_dir, &config.instance);
    paths.ensure()?;
    init_logging(&config.log_target, config.debug, &paths.instance_log())?;

    let runtime = tokio::runtime::Runtime::new()?;
    match runtime.block_on(run_session(&config, &paths)) {
        Ok(()) => {
            info!(instance = %config.instance, "session ended");
            Ok(())
        }
        Err(e) => {
            match write_report(&paths, &config, &e) {
                Ok(report) => eprintln!("Report written to {}", report.display()),
                Err(report_err) => warn!(error = %report_err, "cannot write report"),
            }
            eprintln!("Error: {}\n{}", e.user_message(), e.recovery_hint());
            std::process::exit(1);
        }
    }
}
