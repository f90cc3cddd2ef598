//! Application configuration for AOI Relay.
//!
//! User config lives at `~/.aoirelay/aoirelay.toml`. A reload builds a
//! fresh [`RunContext`]; the polling worker picks it up atomically between
//! cycles and never observes a half-updated set of paths or identifiers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};
use crate::types::Side;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "aoirelay.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".aoirelay";

// ---------------------------------------------------------------------------
// Config structs (matching aoirelay.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Watched and emitted directory paths.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Per-side operation identifiers and the reported duration.
    #[serde(default)]
    pub operations: OperationsConfig,

    /// Enrichment store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Machine identity.
    #[serde(default)]
    pub machine: MachineConfig,

    /// Polling cadence and per-file bound.
    #[serde(default)]
    pub poll: PollConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory watched for inbound result files.
    #[serde(default = "default_input_dir")]
    pub input_dir: String,

    /// Directory receiving generated reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Directory receiving processed input files.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            backup_dir: default_backup_dir(),
        }
    }
}

fn default_input_dir() -> String {
    "var/aoi/input".into()
}
fn default_output_dir() -> String {
    "var/aoi/output".into()
}
fn default_backup_dir() -> String {
    "var/aoi/backup".into()
}

/// `[operations]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationsConfig {
    /// Operation identifier reported for TOP-side programs.
    #[serde(default)]
    pub top_id: String,

    /// Operation identifier reported for bottom-side programs.
    #[serde(default)]
    pub bottom_id: String,

    /// Operation duration string copied verbatim into every report.
    #[serde(default = "default_duration")]
    pub duration: String,
}

fn default_duration() -> String {
    "0".into()
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Connection descriptor for the enrichment database.
    #[serde(default = "default_database")]
    pub database: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
        }
    }
}

fn default_database() -> String {
    "var/aoi/mes.db".into()
}

/// `[machine]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Machine name shown in the status display and logged at startup.
    #[serde(default = "default_machine_name")]
    pub name: String,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            name: default_machine_name(),
        }
    }
}

fn default_machine_name() -> String {
    "Unknown".into()
}

/// `[poll]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds between polling cycles.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Bound on a single file's processing time, in seconds.
    #[serde(default = "default_file_timeout_secs")]
    pub file_timeout_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            file_timeout_secs: default_file_timeout_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    5
}
fn default_file_timeout_secs() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Run context (runtime snapshot, published to the worker)
// ---------------------------------------------------------------------------

/// Immutable snapshot of configuration for the polling worker.
///
/// Constructed once at startup and on each reload; published whole through
/// a watch channel so the worker swaps contexts only at cycle boundaries.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Directory listed for candidate input files.
    pub input_dir: PathBuf,
    /// Directory reports are written into.
    pub output_dir: PathBuf,
    /// Directory processed inputs are moved into.
    pub backup_dir: PathBuf,
    /// Operation identifier for TOP-side programs.
    pub top_operation_id: String,
    /// Operation identifier for bottom-side programs.
    pub bottom_operation_id: String,
    /// Operation duration string for reports.
    pub operation_duration: String,
    /// Connection descriptor for the enrichment store.
    pub database: String,
    /// Machine identity for display and logs.
    pub machine_name: String,
    /// Wait between polling cycles.
    pub poll_interval: Duration,
    /// Bound on a single file's processing time.
    pub file_timeout: Duration,
}

impl RunContext {
    /// The configured operation identifier for a side.
    pub fn operation_id(&self, side: Side) -> &str {
        match side {
            Side::Bottom => &self.bottom_operation_id,
            Side::Top => &self.top_operation_id,
        }
    }

    /// Create the input/output/backup directories if absent.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.input_dir, &self.output_dir, &self.backup_dir] {
            std::fs::create_dir_all(dir).map_err(|e| RelayError::io(dir, e))?;
        }
        Ok(())
    }
}

impl From<&AppConfig> for RunContext {
    fn from(config: &AppConfig) -> Self {
        Self {
            input_dir: PathBuf::from(&config.paths.input_dir),
            output_dir: PathBuf::from(&config.paths.output_dir),
            backup_dir: PathBuf::from(&config.paths.backup_dir),
            top_operation_id: config.operations.top_id.clone(),
            bottom_operation_id: config.operations.bottom_id.clone(),
            operation_duration: config.operations.duration.clone(),
            database: config.store.database.clone(),
            machine_name: config.machine.name.clone(),
            poll_interval: Duration::from_secs(config.poll.interval_secs),
            file_timeout: Duration::from_secs(config.poll.file_timeout_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.aoirelay/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| RelayError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.aoirelay/aoirelay.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| RelayError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| RelayError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| RelayError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| RelayError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| RelayError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check the fields that have no usable defaults.
///
/// The operation identifiers are site-specific; running with them empty
/// would stamp every report with a blank `OperationId`.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.operations.top_id.trim().is_empty()
        || config.operations.bottom_id.trim().is_empty()
    {
        return Err(RelayError::config(
            "operation identifiers are not configured. Set [operations] top_id and bottom_id in aoirelay.toml.",
        ));
    }
    Ok(())
}
