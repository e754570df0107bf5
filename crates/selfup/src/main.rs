mod cli;
mod logging;
mod settings;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{debug, info, warn};
use selfup_core::{
    CheckSchedule, ExecutableApplier, HttpFetcher, UpdateError, UpdateOutcome, Updater,
    UpdaterConfig,
};
use thiserror::Error;

use crate::cli::{Cli, Command};
use crate::settings::Settings;

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Update(#[from] UpdateError),

    #[error("failed to {context}: {source}")]
    Io {
        context: &'static str,
        source: std::io::Error,
    },

    #[error("no release server configured, pass --api-url or set api_url in the settings file")]
    MissingApiUrl,

    #[error("background update task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let (mut settings, load_error) = match Settings::load() {
        Ok(settings) => (settings, None),
        Err(error) => (Settings::default(), Some(error)),
    };
    cli.apply_to(&mut settings);

    logging::init_logging(settings.debug_logging, settings.max_log_size_bytes);
    if let Some(error) = load_error {
        warn!("{error}");
        eprintln!("warning: {error}, using defaults");
    }
    debug!("Running {:?} with version {}", cli.command, cli.current_version);

    match run(&cli, &settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::error!("{error}");
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, settings: &Settings) -> Result<(), AppError> {
    let config = settings.to_config(&cli.current_version);

    match &cli.command {
        Command::Settings { write } => print_settings(settings, *write),
        Command::Status => print_status(&config),
        Command::Check => {
            let updater = build_updater(settings, config)?;
            match updater.check().await? {
                Some(manifest) => println!(
                    "Update available: {} -> {}",
                    updater.config().current_version,
                    manifest.version
                ),
                None => println!("Up to date ({})", updater.config().current_version),
            }
            Ok(())
        }
        Command::Update => {
            let updater = build_updater(settings, config)?;
            report(&updater.update().await?);
            Ok(())
        }
        Command::Background => {
            let updater = build_updater(settings, config)?;
            let handle = tokio::spawn(async move { updater.background_run().await });
            report(&handle.await??);
            Ok(())
        }
    }
}

fn build_updater(settings: &Settings, config: UpdaterConfig) -> Result<Updater, AppError> {
    if settings.api_url.trim().is_empty() {
        return Err(AppError::MissingApiUrl);
    }

    let fetcher = HttpFetcher::with_timeouts(
        Duration::from_secs(settings.read_timeout_secs),
        Duration::from_secs(settings.connect_timeout_secs),
    )?;
    let applier = ExecutableApplier::current()?;
    applier.remove_stale_backup();

    info!(
        "Using manifest {} for {}",
        config.manifest_url(),
        applier.target().display()
    );
    Ok(Updater::with_parts(
        config,
        Arc::new(fetcher),
        Arc::new(applier),
    ))
}

fn report(outcome: &UpdateOutcome) {
    match outcome {
        UpdateOutcome::NotDue => println!("No update check due"),
        UpdateOutcome::UpToDate => println!("Already up to date"),
        UpdateOutcome::Patched { version } => println!("Updated to {version} (patch)"),
        UpdateOutcome::Replaced { version } => println!("Updated to {version} (full binary)"),
    }
}

fn print_status(config: &UpdaterConfig) -> Result<(), AppError> {
    let state_dir = config.resolved_state_dir().map_err(|source| AppError::Io {
        context: "resolve state directory",
        source,
    })?;
    let schedule = CheckSchedule::in_dir(&state_dir);

    println!("Version:    {}", config.current_version);
    println!("Platform:   {}", config.platform);
    println!("Manifest:   {}", config.manifest_url());
    println!("Schedule:   {}", schedule.path().display());
    match schedule.next_check() {
        Some(next) => println!("Next check: {}", next.to_rfc3339()),
        None => println!("Next check: due now"),
    }
    Ok(())
}

fn print_settings(settings: &Settings, write: bool) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(settings)?);
    if write {
        let path = settings.save().map_err(|source| AppError::Io {
            context: "save settings",
            source,
        })?;
        println!("Saved to {}", path.display());
    }
    Ok(())
}
