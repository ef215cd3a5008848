//! Ordered boot phases and their fan-out/fan-in execution.

use futures_util::future::join_all;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::module::{LoadOutcome, ModuleLoader};

/// Blocking/required policy shared by the modules of one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhasePolicy {
    /// Every required module must load; a terminal required failure is
    /// fatal to boot.
    BlockingRequired,
    /// The phase blocks until terminal states, but failures degrade in
    /// place instead of aborting boot.
    BlockingDegradable,
    /// Loads are started and not awaited; failures are permanent and only
    /// recorded.
    NonBlocking,
}

/// An ordered, named group of modules with a phase-level policy.
#[derive(Debug, Clone, Deserialize)]
pub struct BootPhase {
    pub name: String,
    pub policy: PhasePolicy,
    pub modules: Vec<String>,
}

impl BootPhase {
    #[must_use]
    pub fn new(name: impl Into<String>, policy: PhasePolicy, modules: Vec<String>) -> Self {
        Self {
            name: name.into(),
            policy,
            modules,
        }
    }
}

/// Result of running one blocking phase to its synchronization point.
#[derive(Debug, Clone)]
pub struct PhaseOutcome {
    pub name: String,
    pub loaded: Vec<String>,
    pub failed: Vec<String>,
    /// Required modules among `failed`; non-empty means the phase is
    /// fatal under a blocking-required policy.
    pub failed_required: Vec<String>,
}

impl PhaseOutcome {
    #[must_use]
    pub fn is_fatal(&self, policy: PhasePolicy) -> bool {
        policy == PhasePolicy::BlockingRequired && !self.failed_required.is_empty()
    }
}

/// Run a blocking phase: start every module load together, then wait for
/// all of them to reach a terminal state. Completion order within the
/// phase is unconstrained; the return is the synchronization point.
///
/// A fatal required failure does not abort in-flight siblings; they are
/// independent and may still succeed.
pub async fn run_blocking(loader: &ModuleLoader, phase: &BootPhase) -> Result<PhaseOutcome> {
    info!(phase = %phase.name, modules = phase.modules.len(), "phase starting");

    let loads = phase.modules.iter().map(|name| {
        let loader = loader.clone();
        let name = name.clone();
        async move {
            let outcome = loader.load(&name).await;
            (name, outcome)
        }
    });

    let mut outcome = PhaseOutcome {
        name: phase.name.clone(),
        loaded: Vec::new(),
        failed: Vec::new(),
        failed_required: Vec::new(),
    };

    for (name, result) in join_all(loads).await {
        match result? {
            LoadOutcome::Loaded { .. } => outcome.loaded.push(name),
            LoadOutcome::Failed { .. } => {
                let required = loader
                    .descriptor(&name)
                    .map(|d| d.required)
                    .unwrap_or(false);
                if required {
                    outcome.failed_required.push(name.clone());
                }
                outcome.failed.push(name);
            }
        }
    }

    if outcome.failed.is_empty() {
        info!(phase = %phase.name, loaded = outcome.loaded.len(), "phase complete");
    } else {
        warn!(
            phase = %phase.name,
            loaded = outcome.loaded.len(),
            failed = ?outcome.failed,
            "phase complete with failures"
        );
    }
    Ok(outcome)
}

/// Start a non-blocking phase: loads are spawned and never awaited.
/// Failures after this point are permanent; the loader records them and
/// leaves the readiness flag false.
pub fn start_non_blocking(loader: &ModuleLoader, phase: &BootPhase) {
    info!(phase = %phase.name, modules = phase.modules.len(), "phase starting (non-blocking)");
    for name in &phase.modules {
        let loader = loader.clone();
        let name = name.clone();
        tokio::spawn(async move {
            match loader.load(&name).await {
                Ok(LoadOutcome::Failed { error, .. }) => {
                    warn!(module = %name, error = %error, "optional module failed");
                }
                Ok(LoadOutcome::Loaded { .. }) => {}
                Err(err) => {
                    warn!(module = %name, error = %err, "optional module load error");
                }
            }
        });
    }
}
