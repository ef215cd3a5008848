//! Top-level boot sequencing.
//!
//! The orchestrator drives the phase sequence: preflight, blocking phases
//! in declared order, fire-and-forget feature loads, the smoke battery,
//! and finally the readiness signal. Boot is idempotent: repeated or
//! concurrent requests attach to the same outcome instead of re-running.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::{timeout, Duration, Instant};
use tracing::{error, info, warn};

use crate::config::BootConfig;
use crate::error::{BootError, Error, Result};
use crate::module::fallback::FallbackRegistry;
use crate::module::{Module, ModuleDescriptor, ModuleLoader};
use crate::monitor::{HealthMonitor, MonitorHandle};
use crate::phase::{self, PhasePolicy};
use crate::recovery::{DegradedAction, EmergencyPresenter, RecoveryCoordinator};
use crate::smoke::SmokeSuite;
use crate::state::{paths, BootStatus, FailureRecord, StateSnapshot, StateStore};

/// Terminal outcome of a boot request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootOutcome {
    Ready,
    Failed { error: String },
}

/// The readiness signal payload.
#[derive(Debug, Clone)]
pub struct BootReport {
    pub outcome: BootOutcome,
    pub boot_duration: Duration,
    pub loaded_modules: Vec<String>,
    pub failed_modules: Vec<String>,
}

impl BootReport {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.outcome, BootOutcome::Ready)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy(String),
}

/// One preflight configuration check.
#[derive(Debug, Clone)]
pub struct HealthCheck {
    name: &'static str,
    critical: bool,
    status: HealthStatus,
}

impl HealthCheck {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn critical(&self) -> bool {
        self.critical
    }

    pub fn status(&self) -> &HealthStatus {
        &self.status
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.status, HealthStatus::Healthy)
    }
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    checks: Vec<HealthCheck>,
}

impl HealthReport {
    pub fn checks(&self) -> &[HealthCheck] {
        &self.checks
    }

    pub fn is_healthy(&self) -> bool {
        self.checks
            .iter()
            .filter(|check| check.critical())
            .all(HealthCheck::is_healthy)
    }

    /// First failing critical check, if any.
    pub fn first_critical_failure(&self) -> Option<&HealthCheck> {
        self.checks
            .iter()
            .find(|check| check.critical() && !check.is_healthy())
    }
}

/// Configuration-level checks run before any module is touched.
pub fn preflight(config: &BootConfig) -> HealthReport {
    let mut checks = Vec::new();

    checks.push(HealthCheck {
        name: "phases",
        critical: true,
        status: if config.phases.is_empty() {
            HealthStatus::Unhealthy("no phases declared".to_string())
        } else {
            HealthStatus::Healthy
        },
    });

    let missing: Vec<String> = config
        .phases
        .iter()
        .flat_map(|p| p.modules.iter())
        .filter(|m| config.module(m).is_none())
        .cloned()
        .collect();
    checks.push(HealthCheck {
        name: "phase_modules",
        critical: true,
        status: if missing.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy(format!("phases reference unknown modules: {missing:?}"))
        },
    });

    let unreferenced: Vec<&str> = config
        .modules
        .iter()
        .map(|m| m.descriptor.name.as_str())
        .filter(|name| {
            !config
                .phases
                .iter()
                .any(|p| p.modules.iter().any(|m| m == name))
        })
        .collect();
    checks.push(HealthCheck {
        name: "unreferenced_modules",
        critical: false,
        status: if unreferenced.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy(format!("declared but never loaded: {unreferenced:?}"))
        },
    });

    let over_budget: Vec<&str> = config
        .modules
        .iter()
        .filter(|m| m.descriptor.timeout_ms > config.settings.max_boot_time_ms)
        .map(|m| m.descriptor.name.as_str())
        .collect();
    checks.push(HealthCheck {
        name: "timeout_budget",
        critical: false,
        status: if over_budget.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy(format!(
                "module timeouts exceed the boot budget: {over_budget:?}"
            ))
        },
    });

    HealthReport { checks }
}

enum BootGuard {
    NotStarted,
    InProgress,
    Done(BootReport),
}

/// Builds an orchestrator from a boot configuration plus the module
/// implementations the embedding application provides.
pub struct OrchestratorBuilder {
    config: BootConfig,
    modules: Vec<(ModuleDescriptor, Arc<dyn Module>)>,
    fallbacks: FallbackRegistry,
    presenter: Option<Box<dyn EmergencyPresenter>>,
    degraded_actions: Vec<Box<dyn DegradedAction>>,
}

impl OrchestratorBuilder {
    #[must_use]
    pub fn new(config: BootConfig) -> Self {
        Self {
            config,
            modules: Vec::new(),
            fallbacks: FallbackRegistry::with_builtins(),
            presenter: None,
            degraded_actions: Vec::new(),
        }
    }

    /// Attach the implementation for a module declared in the config.
    pub fn module(mut self, name: &str, module: Arc<dyn Module>) -> Result<Self> {
        let descriptor = self
            .config
            .module(name)
            .map(|entry| entry.descriptor.clone())
            .ok_or_else(|| crate::error::ConfigError::InvalidValue {
                field: "modules",
                reason: format!("module '{name}' is not declared in the configuration"),
            })?;
        self.modules.push((descriptor, module));
        Ok(self)
    }

    /// Attach a module with an explicit descriptor, bypassing the config.
    #[must_use]
    pub fn module_with(mut self, descriptor: ModuleDescriptor, module: Arc<dyn Module>) -> Self {
        self.modules.push((descriptor, module));
        self
    }

    #[must_use]
    pub fn fallbacks(mut self, fallbacks: FallbackRegistry) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    #[must_use]
    pub fn presenter(mut self, presenter: Box<dyn EmergencyPresenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    #[must_use]
    pub fn degraded_action(mut self, action: Box<dyn DegradedAction>) -> Self {
        self.degraded_actions.push(action);
        self
    }

    #[must_use]
    pub fn build(self) -> Orchestrator {
        let store = Arc::new(StateStore::new());
        let loader = ModuleLoader::new(
            Arc::clone(&store),
            self.config.settings.clone(),
            self.fallbacks,
        );
        for (descriptor, module) in self.modules {
            loader.register(descriptor, module);
        }

        let mut recovery =
            RecoveryCoordinator::with_default_actions(Arc::clone(&store), self.config.mode);
        for action in self.degraded_actions {
            recovery.add_action(action);
        }
        if let Some(presenter) = self.presenter {
            recovery.set_presenter(presenter);
        }

        let smoke = SmokeSuite::with_store_battery(Arc::clone(&store));
        let (ready_tx, _) = watch::channel(None);

        Orchestrator {
            store,
            loader,
            recovery: Arc::new(recovery),
            smoke,
            config: self.config,
            boot_guard: tokio::sync::Mutex::new(BootGuard::NotStarted),
            ready_tx,
            monitor: Mutex::new(None),
        }
    }
}

/// The top-level boot driver.
pub struct Orchestrator {
    store: Arc<StateStore>,
    loader: ModuleLoader,
    recovery: Arc<RecoveryCoordinator>,
    smoke: SmokeSuite,
    config: BootConfig,
    boot_guard: tokio::sync::Mutex<BootGuard>,
    ready_tx: watch::Sender<Option<BootReport>>,
    monitor: Mutex<Option<MonitorHandle>>,
}

impl Orchestrator {
    #[must_use]
    pub fn builder(config: BootConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    /// The shared state store.
    #[must_use]
    pub fn store(&self) -> Arc<StateStore> {
        Arc::clone(&self.store)
    }

    /// The recovery coordinator (for panic-hook installation).
    #[must_use]
    pub fn recovery(&self) -> Arc<RecoveryCoordinator> {
        Arc::clone(&self.recovery)
    }

    /// Subscribe to the readiness signal; the channel yields `Some` once
    /// boot reaches its terminal outcome.
    #[must_use]
    pub fn subscribe_ready(&self) -> watch::Receiver<Option<BootReport>> {
        self.ready_tx.subscribe()
    }

    /// Run the boot sequence, or attach to the one already running.
    pub async fn boot(&self) -> BootReport {
        {
            let mut guard = self.boot_guard.lock().await;
            match &*guard {
                BootGuard::Done(report) => return report.clone(),
                BootGuard::InProgress => {
                    drop(guard);
                    return self.await_ready().await;
                }
                BootGuard::NotStarted => {
                    *guard = BootGuard::InProgress;
                }
            }
        }

        let report = self.run_boot().await;
        *self.boot_guard.lock().await = BootGuard::Done(report.clone());
        let _ = self.ready_tx.send(Some(report.clone()));
        report
    }

    async fn await_ready(&self) -> BootReport {
        let mut rx = self.ready_tx.subscribe();
        loop {
            let settled = rx.borrow_and_update().clone();
            if let Some(report) = settled {
                return report;
            }
            if rx.changed().await.is_err() {
                return BootReport {
                    outcome: BootOutcome::Failed {
                        error: "orchestrator dropped mid-boot".to_string(),
                    },
                    boot_duration: Duration::ZERO,
                    loaded_modules: Vec::new(),
                    failed_modules: Vec::new(),
                };
            }
        }
    }

    async fn run_boot(&self) -> BootReport {
        let start = Instant::now();
        info!(
            mode = ?self.config.mode,
            phases = self.config.phases.len(),
            "boot starting"
        );

        let report = preflight(&self.config);
        if let Some(check) = report.first_critical_failure() {
            let reason = match check.status() {
                HealthStatus::Unhealthy(reason) => reason.clone(),
                HealthStatus::Healthy => String::new(),
            };
            return self.fail(
                BootError::PreflightFailed {
                    check: check.name(),
                    reason,
                }
                .into(),
                start,
            );
        }
        for check in report.checks().iter().filter(|c| !c.is_healthy()) {
            warn!(check = check.name(), status = ?check.status(), "preflight warning");
        }

        if self.config.monitor.enabled {
            let handle = HealthMonitor::spawn(Arc::clone(&self.store), self.config.monitor.clone());
            *self.monitor.lock() = Some(handle);
        }

        self.store
            .set(paths::INIT_STATUS, BootStatus::Loading.as_str());

        let budget = self.config.settings.max_boot_time();
        match timeout(budget, self.run_phases()).await {
            Err(_) => self.fail(
                BootError::BudgetExceeded {
                    limit_ms: self.config.settings.max_boot_time_ms,
                }
                .into(),
                start,
            ),
            Ok(Err(err)) => self.fail(err, start),
            Ok(Ok(())) => {
                let summary = self.smoke.run();
                if let Ok(value) = serde_json::to_value(&summary) {
                    self.store.set(paths::SMOKE_REPORT, value);
                }
                info!(
                    passed = summary.passed,
                    failed = summary.failed,
                    total = summary.total,
                    "smoke battery complete"
                );

                let boot_duration = start.elapsed();
                self.store
                    .set(paths::BOOT_DURATION_MS, boot_duration.as_millis() as u64);
                self.store
                    .set(paths::INIT_STATUS, BootStatus::Ready.as_str());

                let snapshot = self.store.snapshot();
                info!(
                    duration_ms = boot_duration.as_millis() as u64,
                    loaded = snapshot.loaded_modules.len(),
                    failed = snapshot.failed_modules.len(),
                    "boot complete"
                );
                BootReport {
                    outcome: BootOutcome::Ready,
                    boot_duration,
                    loaded_modules: snapshot.loaded_modules,
                    failed_modules: snapshot.failed_modules,
                }
            }
        }
    }

    // Phases run strictly in declared order; the phase boundary is the
    // synchronization point for blocking policies.
    async fn run_phases(&self) -> Result<()> {
        for boot_phase in &self.config.phases {
            match boot_phase.policy {
                PhasePolicy::NonBlocking => {
                    phase::start_non_blocking(&self.loader, boot_phase);
                }
                policy => {
                    let outcome = phase::run_blocking(&self.loader, boot_phase).await?;
                    if outcome.is_fatal(policy) {
                        return Err(BootError::RequiredModulesFailed {
                            phase: boot_phase.name.clone(),
                            modules: outcome.failed_required,
                        }
                        .into());
                    }
                }
            }
        }
        Ok(())
    }

    fn fail(&self, err: Error, start: Instant) -> BootReport {
        error!(error = %err, "boot failed");
        self.store
            .set(paths::INIT_STATUS, BootStatus::Error.as_str());
        FailureRecord::global(err.to_string(), true).record(&self.store);

        if !self.recovery.attempt_graceful_degradation() {
            self.recovery.emergency_notice(&err.to_string());
        }

        let snapshot = self.store.snapshot();
        BootReport {
            outcome: BootOutcome::Failed {
                error: err.to_string(),
            },
            boot_duration: start.elapsed(),
            loaded_modules: snapshot.loaded_modules,
            failed_modules: snapshot.failed_modules,
        }
    }

    /// Current state snapshot (debug surface).
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        self.store.snapshot()
    }

    /// Modules currently in the loaded set (debug surface).
    #[must_use]
    pub fn loaded_modules(&self) -> Vec<String> {
        self.loader.loaded_modules()
    }

    /// Modules recorded as terminally failed (debug surface).
    #[must_use]
    pub fn failed_modules(&self) -> Vec<String> {
        self.store.snapshot().failed_modules
    }

    /// Manual re-load trigger for a named module (debug surface).
    pub async fn reload(&self, name: &str) -> Result<crate::module::LoadOutcome> {
        self.loader.reload(name).await
    }

    /// Stop the health monitor, if one is running.
    pub async fn shutdown(&self) {
        let handle = self.monitor.lock().take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BootConfig;

    fn config_with(raw: &str) -> BootConfig {
        BootConfig::parse_toml(raw).unwrap()
    }

    #[test]
    fn preflight_rejects_empty_phase_list() {
        let report = preflight(&BootConfig::default());
        assert!(!report.is_healthy());
        assert_eq!(report.first_critical_failure().unwrap().name(), "phases");
    }

    #[test]
    fn preflight_accepts_minimal_config() {
        let config = config_with(
            r#"
            [[phases]]
            name = "core"
            policy = "blocking_required"
            modules = ["store"]

            [[modules]]
            name = "store"
            required = true
        "#,
        );
        let report = preflight(&config);
        assert!(report.is_healthy(), "checks: {:?}", report.checks());
    }

    #[test]
    fn preflight_warns_on_unreferenced_module() {
        let config = config_with(
            r#"
            [[phases]]
            name = "core"
            policy = "blocking_required"
            modules = ["store"]

            [[modules]]
            name = "store"

            [[modules]]
            name = "orphan"
        "#,
        );
        let report = preflight(&config);
        // Unreferenced modules are a warning, not a boot blocker.
        assert!(report.is_healthy());
        let check = report
            .checks()
            .iter()
            .find(|c| c.name() == "unreferenced_modules")
            .unwrap();
        assert!(!check.is_healthy());
        assert!(!check.critical());
    }

    #[test]
    fn preflight_flags_timeout_over_budget() {
        let config = config_with(
            r#"
            [settings]
            max_boot_time_ms = 1000

            [[phases]]
            name = "core"
            policy = "blocking_required"
            modules = ["slow"]

            [[modules]]
            name = "slow"
            timeout_ms = 5000
        "#,
        );
        let check = preflight(&config)
            .checks()
            .iter()
            .find(|c| c.name() == "timeout_budget")
            .cloned()
            .unwrap();
        assert!(!check.is_healthy());
    }
}
