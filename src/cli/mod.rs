//! Command-line interface definitions.

pub mod check;
pub mod output;
pub mod rehearse;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

/// Ignition - Phased application bootstrap orchestration.
#[derive(Parser, Debug)]
#[command(name = "ignition")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a boot configuration and run the preflight report
    Check(ConfigPathArg),

    /// Run a full boot rehearsal against simulated modules
    Rehearse(RehearseArgs),
}

/// Shared argument for commands that only need a config path.
#[derive(Parser, Debug)]
pub struct ConfigPathArg {
    /// Path to configuration file
    #[arg(short, long, default_value = "ignition.toml")]
    pub config: PathBuf,
}

/// Arguments for the `rehearse` subcommand.
#[derive(Parser, Debug)]
pub struct RehearseArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "ignition.toml")]
    pub config: PathBuf,

    /// Override log level (debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Use JSON log format instead of pretty
    #[arg(long)]
    pub json_logs: bool,
}

/// Resolve the config path, falling back to the per-user config directory
/// when the default relative path does not exist.
#[must_use]
pub fn resolve_config_path(path: &Path) -> PathBuf {
    if path.exists() {
        return path.to_path_buf();
    }
    if path == Path::new("ignition.toml") {
        if let Some(dir) = dirs::config_dir() {
            let fallback = dir.join("ignition").join("ignition.toml");
            if fallback.exists() {
                return fallback;
            }
        }
    }
    path.to_path_buf()
}
