//! AC Server Manager - configuration and launcher for Assetto Corsa dedicated servers
//!
//! Main entry point for the session shell.
//!
//! # Overview
//!
//! This binary crate provides the command line front end for acsm. It initializes:
//! - Tool settings ([`SettingsManager`], `ac_manager_config.json`)
//! - Logging infrastructure (file rotation, console output in debug mode)
//! - Tokio async runtime (server process supervision, release downloads)
//! - Session state ([`SessionManager`])
//! - Session controller and shell
//!
//! # Execution Flow
//!
//! 1. Parse the command line
//! 2. Load the settings file (defaults when missing or invalid)
//! 3. Initialize logging → logs/acsm.<date>
//! 4. Create tokio runtime with 2 worker threads
//! 5. Build the session: defaults → settings → server cfg files → content scan
//! 6. Run the interactive shell, or the `exec` script
//! 7. Log the session summary and shut down the runtime with a 5s timeout
//!
//! # Usage
//!
//! ```text
//! acsm                               # interactive shell
//! acsm --debug shell                 # shell with debug logging on stderr
//! acsm exec "track ks_monza" "save"  # run commands and exit
//! ```

use acsm::config::SETTINGS_FILE;
use acsm::metrics::Metrics;
use acsm::ui::{SessionController, Shell};
use acsm::{APP_NAME, SessionManager, SettingsManager, VERSION};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;

const WORKER_THREADS: usize = 2;

#[derive(Parser, Debug)]
#[command(name = "acsm", version, about = "Configure and run an Assetto Corsa dedicated server")]
struct Cli {
    /// Settings file of the tool
    #[arg(long, default_value = SETTINGS_FILE)]
    settings: String,

    /// Debug logging, also printed to stderr
    #[arg(long)]
    debug: bool,

    /// Directory for log files
    #[arg(long, default_value = "logs")]
    log_dir: String,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Interactive session (default)
    Shell,

    /// Run session commands in order and exit, stopping at the first failure
    Exec {
        #[arg(required = true)]
        commands: Vec<String>,
    },
}

/// Main entry point for the acsm shell
///
/// # Errors
///
/// This function can fail if:
/// - The settings file exists but cannot be read
/// - Logging initialization fails (disk space, permissions)
/// - Tokio runtime creation fails (system resources)
/// - A command of an `exec` script fails
fn main() -> Result<()> {
    let cli = Cli::parse();

    // Settings come first: their debug flag decides the log level
    let settings_manager = SettingsManager::new(&cli.settings);
    let settings = settings_manager.load()?;
    let debug_mode = cli.debug || settings.debug_mode;

    let _log_guard =
        acsm::logging::setup_logging_with_console(&cli.log_dir, acsm::logging::LOG_PREFIX, debug_mode, debug_mode)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    tracing::info!("Settings file: {}", settings_manager.path());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(WORKER_THREADS)
        .thread_name("acsm-worker")
        .build()?;

    tracing::info!("Tokio runtime initialized with {} worker threads", WORKER_THREADS);

    let session = Arc::new(SessionManager::new());
    let metrics = Arc::new(Metrics::new());

    // Subscribe before startup so its status lines reach the operator
    let controller = SessionController::new(session, settings_manager, metrics.clone());
    let mut shell = Shell::new(controller);
    shell.startup(settings)?;

    let result = runtime.block_on(async {
        match cli.mode {
            Some(Mode::Exec { commands }) => shell.run_script(&commands).await,
            Some(Mode::Shell) | None => shell.run_interactive().await,
        }
    });

    if let Err(e) = &result {
        tracing::error!("Session ended with an error: {:#}", e);
    }

    metrics.log_summary();

    // A pending stdin read would otherwise keep the runtime alive
    runtime.shutdown_timeout(Duration::from_secs(5));

    tracing::info!("Shutdown complete");
    result
}
