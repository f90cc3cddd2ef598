//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tracing::{info, warn};

use aoirelay_core::archive::archive_input;
use aoirelay_core::pipeline::{PipelineObserver, SilentObserver, process_file};
use aoirelay_core::poller::run_poller;
use aoirelay_shared::{
    AppConfig, RecordEvent, RelayError, RunContext, init_config, load_config, load_config_from,
    validate_config,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// AOI Relay — relay tester results into Valor GenericTester imports.
#[derive(Parser)]
#[command(
    name = "aoirelay",
    version,
    about = "Watch AOI result files, enrich them from the MES store, and emit XML reports.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Watch the input directory and relay every result file.
    Run {
        /// Configuration file (defaults to ~/.aoirelay/aoirelay.toml).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Run a single file through the relay sequence, then archive it.
    Process {
        /// Input file to process.
        file: PathBuf,

        /// Configuration file (defaults to ~/.aoirelay/aoirelay.toml).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "aoirelay=info",
        1 => "aoirelay=debug",
        _ => "aoirelay=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run { config } => cmd_run(config).await,
        Command::Process { file, config } => cmd_process(file, config).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Load and validate the configuration, from an explicit path if given.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    validate_config(&config)?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<PathBuf>) -> Result<()> {
    let config = resolve_config(config_path.as_deref())?;
    let ctx = Arc::new(RunContext::from(&config));
    ctx.ensure_directories()?;

    info!(
        machine = %ctx.machine_name,
        input = %ctx.input_dir.display(),
        output = %ctx.output_dir.display(),
        backup = %ctx.backup_dir.display(),
        store = %ctx.database,
        top_operation = %ctx.top_operation_id,
        bottom_operation = %ctx.bottom_operation_id,
        duration = %ctx.operation_duration,
        interval_secs = ctx.poll_interval.as_secs(),
        "starting relay"
    );

    let (ctx_tx, ctx_rx) = watch::channel(ctx);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let observer: Arc<dyn PipelineObserver> = Arc::new(CliObserver::new());
    let poller = tokio::spawn(run_poller(ctx_rx, shutdown_rx, observer));

    // SIGINT stops after the current cycle; SIGHUP reloads configuration,
    // which the poller picks up at the next cycle boundary.
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut hangup = signal(SignalKind::hangup())?;
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupt received, shutting down");
                    let _ = shutdown_tx.send(true);
                    break;
                }
                _ = hangup.recv() => {
                    match resolve_config(config_path.as_deref()) {
                        Ok(reloaded) => {
                            let fresh = Arc::new(RunContext::from(&reloaded));
                            if let Err(e) = fresh.ensure_directories() {
                                warn!(error = %e, "reloaded configuration rejected, keeping current");
                                continue;
                            }
                            let _ = ctx_tx.send(fresh);
                            info!("configuration reloaded");
                        }
                        Err(e) => {
                            warn!(error = %e, "configuration reload failed, keeping current");
                        }
                    }
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("interrupt received, shutting down");
        let _ = shutdown_tx.send(true);
    }

    poller.await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI observer
// ---------------------------------------------------------------------------

/// CLI observer using an indicatif spinner for cycle status and printed
/// lines for per-record outcomes and notices.
struct CliObserver {
    spinner: ProgressBar,
}

impl CliObserver {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl PipelineObserver for CliObserver {
    fn cycle_started(&self, candidates: usize) {
        if candidates == 0 {
            self.spinner.set_message("Waiting for input files");
        } else {
            self.spinner
                .set_message(format!("Processing {candidates} file(s)"));
        }
    }

    fn record_processed(&self, event: &RecordEvent) {
        self.spinner.println(format!(
            "  {} {} [{}] {} {}",
            event.serial_number,
            event.status,
            event.side,
            event.program,
            event.work_order.as_deref().unwrap_or("-"),
        ));
    }

    fn file_failed(&self, file_name: &str, error: &RelayError) {
        self.spinner.println(format!("  {file_name}: {error}"));
    }

    fn notice(&self, message: &str) {
        self.spinner.println(format!("  ! {message}"));
    }
}

// ---------------------------------------------------------------------------
// process
// ---------------------------------------------------------------------------

async fn cmd_process(file: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let config = resolve_config(config_path.as_deref())?;
    let ctx = RunContext::from(&config);
    ctx.ensure_directories()?;

    if !file.is_file() {
        return Err(eyre!("input file '{}' not found", file.display()));
    }

    info!(file = %file.display(), "processing single file");

    // Same per-file sequence the loop runs: process, then archive
    // regardless of the outcome.
    let outcome = process_file(&ctx, &file, &SilentObserver).await;
    let archived = archive_input(&ctx.backup_dir, &file);

    match &outcome {
        Ok(processed) => println!("Report written: {}", processed.report_path.display()),
        Err(error) => println!("Processing failed: {error}"),
    }
    match archived {
        Ok(path) => println!("Input archived: {}", path.display()),
        Err(error) => println!("Archive failed: {error}"),
    }

    outcome.map(|_| ()).map_err(Into::into)
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
