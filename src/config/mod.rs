//! Boot configuration loading and validation.
//!
//! Configuration is loaded from a TOML file: global settings, the phase
//! list, per-module load policies, and the monitor/logging sections.
//!
//! # Example
//!
//! ```no_run
//! use ignition::config::BootConfig;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BootConfig::load("ignition.toml")?;
//!     config.logging.init();
//!     Ok(())
//! }
//! ```

mod logging;

pub use logging::LoggingConfig;

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, Result};
use crate::module::sim::SimModule;
use crate::module::ModuleDescriptor;
use crate::phase::BootPhase;

/// Runtime mode; controls how uncaught failures propagate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Failures stay loud: the previously installed panic hook still runs.
    #[default]
    Development,
    /// Uncaught failures are recorded and suppressed from default
    /// propagation.
    Production,
}

/// Global orchestration settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base delay for exponential retry backoff
    /// (`retry_delay_base_ms * 2^attempt`).
    pub retry_delay_base_ms: u64,
    /// Loads slower than this are logged as warnings, not errors.
    pub slow_module_threshold_ms: u64,
    /// Hard budget for the whole boot sequence.
    pub max_boot_time_ms: u64,
    /// Availability polling interval.
    pub probe_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            retry_delay_base_ms: 250,
            slow_module_threshold_ms: 2_000,
            max_boot_time_ms: 30_000,
            probe_interval_ms: 100,
        }
    }
}

impl Settings {
    #[must_use]
    pub fn max_boot_time(&self) -> Duration {
        Duration::from_millis(self.max_boot_time_ms)
    }
}

/// Health monitor settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub enabled: bool,
    pub interval_ms: u64,
    /// Max-RSS above this emits a memory-pressure flag.
    pub memory_threshold_kb: u64,
    /// Error count above this emits an error-rate flag.
    pub error_threshold: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 5_000,
            memory_threshold_kb: 512 * 1024,
            error_threshold: 25,
        }
    }
}

/// Simulated module behavior, consumed only by `ignition rehearse`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SimSpec {
    pub available_after_ms: u64,
    pub init_duration_ms: u64,
    /// Fail this many initialization attempts before succeeding.
    pub fail_first: u32,
    pub never_available: bool,
    pub fail_always: bool,
}

impl SimSpec {
    /// Build a scripted module from this spec.
    #[must_use]
    pub fn build(&self) -> SimModule {
        let mut module = SimModule::new()
            .available_after(Duration::from_millis(self.available_after_ms))
            .with_init_delay(Duration::from_millis(self.init_duration_ms))
            .with_init_failures(self.fail_first);
        if self.never_available {
            module = module.never_available();
        }
        if self.fail_always {
            module = module.failing_always();
        }
        module
    }
}

/// One `[[modules]]` table: the load policy plus optional rehearsal
/// behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleEntry {
    #[serde(flatten)]
    pub descriptor: ModuleDescriptor,
    pub sim: Option<SimSpec>,
}

/// Main boot configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BootConfig {
    #[serde(default)]
    pub mode: Mode,

    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Phases in execution order.
    #[serde(default)]
    pub phases: Vec<BootPhase>,

    #[serde(default)]
    pub modules: Vec<ModuleEntry>,
}

impl BootConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&raw)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural validation beyond what serde enforces.
    pub fn validate(&self) -> Result<()> {
        if self.settings.probe_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "settings.probe_interval_ms",
                reason: "must be greater than zero".into(),
            }
            .into());
        }

        let mut module_names = std::collections::HashSet::new();
        for entry in &self.modules {
            let name = &entry.descriptor.name;
            if name.is_empty() {
                return Err(ConfigError::MissingField {
                    field: "modules.name",
                }
                .into());
            }
            if name.contains('.') {
                return Err(ConfigError::InvalidValue {
                    field: "modules.name",
                    reason: format!("'{name}' must not contain '.'"),
                }
                .into());
            }
            if !module_names.insert(name.clone()) {
                return Err(ConfigError::InvalidValue {
                    field: "modules.name",
                    reason: format!("duplicate module '{name}'"),
                }
                .into());
            }
            if entry.descriptor.timeout_ms == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "modules.timeout_ms",
                    reason: format!("module '{name}' must have a non-zero timeout"),
                }
                .into());
            }
        }

        let mut phase_names = std::collections::HashSet::new();
        for phase in &self.phases {
            if phase.name.is_empty() {
                return Err(ConfigError::MissingField { field: "phases.name" }.into());
            }
            if !phase_names.insert(phase.name.clone()) {
                return Err(ConfigError::InvalidValue {
                    field: "phases.name",
                    reason: format!("duplicate phase '{}'", phase.name),
                }
                .into());
            }
            for module in &phase.modules {
                if !module_names.contains(module) {
                    return Err(ConfigError::InvalidValue {
                        field: "phases.modules",
                        reason: format!(
                            "phase '{}' references unknown module '{module}'",
                            phase.name
                        ),
                    }
                    .into());
                }
            }
        }

        Ok(())
    }

    /// The `[[modules]]` entry for `name`, if declared.
    #[must_use]
    pub fn module(&self, name: &str) -> Option<&ModuleEntry> {
        self.modules.iter().find(|m| m.descriptor.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::PhasePolicy;

    const MINIMAL: &str = r#"
        mode = "production"

        [[phases]]
        name = "core"
        policy = "blocking_required"
        modules = ["store"]

        [[modules]]
        name = "store"
        required = true
    "#;

    #[test]
    fn parses_minimal_config() {
        let config = BootConfig::parse_toml(MINIMAL).unwrap();
        assert_eq!(config.mode, Mode::Production);
        assert_eq!(config.phases.len(), 1);
        assert_eq!(config.phases[0].policy, PhasePolicy::BlockingRequired);
        assert!(config.module("store").unwrap().descriptor.required);
    }

    #[test]
    fn defaults_are_applied() {
        let config = BootConfig::parse_toml("").unwrap();
        assert_eq!(config.mode, Mode::Development);
        assert_eq!(config.settings.retry_delay_base_ms, 250);
        assert_eq!(config.settings.probe_interval_ms, 100);
        assert!(config.monitor.enabled);
    }

    #[test]
    fn rejects_unknown_phase_module() {
        let raw = r#"
            [[phases]]
            name = "core"
            policy = "blocking_required"
            modules = ["ghost"]
        "#;
        assert!(BootConfig::parse_toml(raw).is_err());
    }

    #[test]
    fn rejects_duplicate_module_names() {
        let raw = r#"
            [[modules]]
            name = "twin"
            [[modules]]
            name = "twin"
        "#;
        assert!(BootConfig::parse_toml(raw).is_err());
    }

    #[test]
    fn rejects_dotted_module_name() {
        let raw = r#"
            [[modules]]
            name = "bad.name"
        "#;
        assert!(BootConfig::parse_toml(raw).is_err());
    }

    #[test]
    fn sim_spec_defaults_to_instant_success() {
        let raw = r#"
            [[modules]]
            name = "demo"
            [modules.sim]
            init_duration_ms = 10
        "#;
        let config = BootConfig::parse_toml(raw).unwrap();
        let sim = config.module("demo").unwrap().sim.as_ref().unwrap();
        assert_eq!(sim.init_duration_ms, 10);
        assert_eq!(sim.fail_first, 0);
        assert!(!sim.never_available);
    }
}
