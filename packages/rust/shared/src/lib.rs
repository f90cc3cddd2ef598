//! Shared types, error model, and configuration for AOI Relay.
//!
//! This crate is the foundation depended on by all other AOI Relay crates.
//! It provides:
//! - [`RelayError`] — the unified error taxonomy
//! - Domain types ([`InputRecord`], [`Enrichment`], [`Side`], [`TestStatus`], [`RecordEvent`])
//! - Configuration ([`AppConfig`], [`RunContext`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, MachineConfig, OperationsConfig, PathsConfig, PollConfig, RunContext,
    StoreConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    validate_config,
};
pub use error::{RelayError, Result};
pub use types::{Enrichment, InputRecord, RecordEvent, Side, TestStatus};
