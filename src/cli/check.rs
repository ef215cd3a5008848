//! `ignition check` - validate configuration and run the preflight
//! report.

use crate::config::BootConfig;
use crate::error::Result;
use crate::orchestrator::{preflight, HealthStatus};

use super::output;
use super::ConfigPathArg;

/// Returns true when the configuration is valid and preflight is healthy.
pub fn run(args: &ConfigPathArg) -> Result<bool> {
    let path = super::resolve_config_path(&args.config);

    output::section("Configuration");
    output::key_value("File", path.display());

    let config = match BootConfig::load(&path) {
        Ok(config) => config,
        Err(err) => {
            output::error(&format!("configuration invalid: {err}"));
            return Ok(false);
        }
    };
    output::ok("configuration parsed and validated");
    output::key_value("Mode", format!("{:?}", config.mode));
    output::key_value("Phases", config.phases.len());
    output::key_value("Modules", config.modules.len());

    for phase in &config.phases {
        output::note(&format!(
            "  {} [{:?}]: {}",
            phase.name,
            phase.policy,
            phase.modules.join(", ")
        ));
    }

    output::section("Preflight");
    let report = preflight(&config);
    for check in report.checks() {
        match check.status() {
            HealthStatus::Healthy => output::ok(check.name()),
            HealthStatus::Unhealthy(reason) if check.critical() => {
                output::error(&format!("{}: {reason}", check.name()));
            }
            HealthStatus::Unhealthy(reason) => {
                output::warn(&format!("{}: {reason}", check.name()));
            }
        }
    }

    if report.is_healthy() {
        output::ok("preflight healthy");
        Ok(true)
    } else {
        output::error("preflight failed");
        Ok(false)
    }
}
