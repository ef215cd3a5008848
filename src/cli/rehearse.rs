//! `ignition rehearse` - run a full boot against simulated modules.
//!
//! Every module referenced by a phase is stood in by a scripted module
//! built from its `[modules.sim]` table (instant success when the table
//! is omitted), so boot policies can be exercised without the real
//! subsystems.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use crate::config::{BootConfig, SimSpec};
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::state::paths;

use super::output;
use super::RehearseArgs;

/// Returns true when the rehearsal boot reached readiness.
pub async fn run(args: &RehearseArgs) -> Result<bool> {
    let path = super::resolve_config_path(&args.config);
    let mut config = BootConfig::load(&path)?;

    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.format = "json".into();
    }
    config.logging.init();

    let referenced: BTreeSet<String> = config
        .phases
        .iter()
        .flat_map(|p| p.modules.iter().cloned())
        .collect();

    let mut builder = Orchestrator::builder(config.clone());
    for name in &referenced {
        let sim = config
            .module(name)
            .and_then(|entry| entry.sim.clone())
            .unwrap_or_else(SimSpec::default);
        builder = builder.module(name, Arc::new(sim.build()))?;
    }
    let orchestrator = builder.build();

    info!(modules = referenced.len(), "rehearsal starting");
    let report = tokio::select! {
        report = orchestrator.boot() => report,
        _ = tokio::signal::ctrl_c() => {
            info!("rehearsal interrupted");
            return Ok(false);
        }
    };
    orchestrator.shutdown().await;

    output::section("Rehearsal");
    output::key_value(
        "Outcome",
        if report.is_ready() { "ready" } else { "failed" },
    );
    output::key_value("Duration", format!("{}ms", report.boot_duration.as_millis()));
    output::key_value("Loaded", report.loaded_modules.join(", "));
    output::key_value("Failed", report.failed_modules.join(", "));

    let store = orchestrator.store();
    if let Some(smoke) = store.get(paths::SMOKE_REPORT) {
        let passed = smoke.get("passed").and_then(|v| v.as_u64()).unwrap_or(0);
        let total = smoke.get("total").and_then(|v| v.as_u64()).unwrap_or(0);
        output::key_value("Smoke", format!("{passed}/{total} checks passed"));
    }

    if report.is_ready() {
        output::ok("boot rehearsal succeeded");
    } else {
        output::error("boot rehearsal failed");
    }
    Ok(report.is_ready())
}
