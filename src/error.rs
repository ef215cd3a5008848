use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

/// Module lifecycle errors raised by the loader.
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("module '{name}' is not registered")]
    NotRegistered { name: String },

    #[error("module '{name}' never became available after {waited_ms}ms")]
    ProbeTimeout { name: String, waited_ms: u64 },

    #[error("module '{name}' initialization exceeded {timeout_ms}ms")]
    InitTimeout { name: String, timeout_ms: u64 },

    #[error("module '{name}' initialization failed: {source}")]
    Init {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("module '{name}' failed after {attempts} attempts")]
    RetriesExhausted { name: String, attempts: u32 },
}

/// Boot-level errors surfaced by the orchestrator.
#[derive(Error, Debug)]
pub enum BootError {
    #[error("preflight check '{check}' failed: {reason}")]
    PreflightFailed { check: &'static str, reason: String },

    #[error("required modules failed in phase '{phase}': {modules:?}")]
    RequiredModulesFailed { phase: String, modules: Vec<String> },

    #[error("boot exceeded the {limit_ms}ms budget")]
    BudgetExceeded { limit_ms: u64 },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Boot(#[from] BootError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
