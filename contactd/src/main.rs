mod config;
mod logging;
mod statsd;

use clap::{Parser, Subcommand};
use config::Config;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "contactd", version, about = "Relays contact form submissions to Telegram")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Start the contact relay and its admin listener
    Run {
        #[arg(long, short, default_value = "contactd.yaml")]
        config: PathBuf,
    },
    /// Load and validate a config file, then print it with secrets redacted
    CheckConfig {
        #[arg(long, short, default_value = "contactd.yaml")]
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match &cli.command {
        CliCommand::Run { config } => run(config),
        CliCommand::CheckConfig { config } => check_config(config),
    }
}

fn load_config(path: &Path) -> Result<Config, config::ConfigError> {
    let mut config = Config::from_file(path)?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

fn run(path: &Path) -> ExitCode {
    // Logging is not up yet, so config errors go straight to stderr
    let config = match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    };

    let _sentry_guard = logging::init(&config.common.logging);

    if let Some(metrics_config) = &config.common.metrics {
        if let Err(e) = statsd::init(metrics_config) {
            tracing::error!(error = %e, "Failed to initialize metrics");
            return ExitCode::FAILURE;
        }
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        listener = %format!("{}:{}", config.relay.listener.host, config.relay.listener.port),
        path = %config.relay.endpoint.path,
        recipients = config.relay.telegram.recipients().len(),
        "Starting contact relay"
    );

    match runtime.block_on(contact_relay::run(config.relay)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Contact relay stopped");
            ExitCode::FAILURE
        }
    }
}

fn check_config(path: &Path) -> ExitCode {
    match load_config(path) {
        Ok(config) => {
            println!("{:#?}", config.relay);
            println!("metrics: {:?}", config.common.metrics);
            println!("logging format: {:?}", config.common.logging.format);
            println!(
                "sentry: {}",
                if config.common.logging.sentry_dsn.is_some() { "enabled" } else { "disabled" }
            );
            println!("ready: {}", config.relay.telegram.is_configured());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {e}", path.display());
            ExitCode::FAILURE
        }
    }
}
