//! Post-boot smoke checks.
//!
//! A fixed, ordered battery of no-argument checks run once the blocking
//! phases have resolved. A failing or panicking check counts against its
//! own entry only; the battery reports, it never gates.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::state::StateStore;

type CheckFn = Box<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// One named smoke check.
pub struct SmokeCheck {
    name: &'static str,
    run: CheckFn,
}

/// Result of one check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: Option<String>,
}

/// Accumulated battery results.
#[derive(Debug, Clone, Serialize)]
pub struct SmokeSummary {
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
    pub details: Vec<CheckResult>,
}

impl SmokeSummary {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// The ordered battery.
#[derive(Default)]
pub struct SmokeSuite {
    checks: Vec<SmokeCheck>,
}

impl SmokeSuite {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Battery of store-level checks wired against the shared state.
    #[must_use]
    pub fn with_store_battery(store: Arc<StateStore>) -> Self {
        let mut suite = Self::new();

        let probe_store = Arc::clone(&store);
        suite.register("store_roundtrip", move || {
            let token = uuid::Uuid::new_v4().to_string();
            probe_store.set("diagnostics.roundtrip", token.clone());
            let read = probe_store
                .get("diagnostics.roundtrip")
                .and_then(|v| v.as_str().map(str::to_string));
            anyhow::ensure!(read == Some(token), "read back a different value");
            Ok(())
        });

        let pubsub_store = Arc::clone(&store);
        suite.register("pubsub_delivery", move || {
            use std::sync::atomic::{AtomicBool, Ordering};
            let delivered = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&delivered);
            pubsub_store.subscribe("diagnostics.pubsub", move |_| {
                flag.store(true, Ordering::SeqCst);
            });
            pubsub_store.set("diagnostics.pubsub", true);
            anyhow::ensure!(
                delivered.load(Ordering::SeqCst),
                "listener did not run before set returned"
            );
            Ok(())
        });

        let status_store = Arc::clone(&store);
        suite.register("status_is_sane", move || {
            let snapshot = status_store.snapshot();
            anyhow::ensure!(snapshot.status.is_some(), "status missing or unknown");
            Ok(())
        });

        let session_store = Arc::clone(&store);
        suite.register("session_present", move || {
            let snapshot = session_store.snapshot();
            let session = snapshot
                .session
                .ok_or_else(|| anyhow::anyhow!("session identity missing"))?;
            uuid::Uuid::parse_str(&session)?;
            Ok(())
        });

        let lifecycle_store = Arc::clone(&store);
        suite.register("lifecycle_consistency", move || {
            let snapshot = lifecycle_store.snapshot();
            for name in &snapshot.loaded_modules {
                anyhow::ensure!(
                    snapshot.feature_flags.get(name) == Some(&true),
                    "loaded module '{name}' has no ready flag"
                );
            }
            for name in &snapshot.failed_modules {
                anyhow::ensure!(
                    snapshot.feature_flags.get(name) != Some(&true),
                    "failed module '{name}' is marked ready"
                );
            }
            Ok(())
        });

        suite
    }

    pub fn register(
        &mut self,
        name: &'static str,
        check: impl Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    ) {
        self.checks.push(SmokeCheck {
            name,
            run: Box::new(check),
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Run every check in order and accumulate the summary.
    #[must_use]
    pub fn run(&self) -> SmokeSummary {
        let mut details = Vec::with_capacity(self.checks.len());
        for check in &self.checks {
            let outcome = catch_unwind(AssertUnwindSafe(|| (check.run)()));
            let result = match outcome {
                Ok(Ok(())) => CheckResult {
                    name: check.name.to_string(),
                    passed: true,
                    detail: None,
                },
                Ok(Err(err)) => CheckResult {
                    name: check.name.to_string(),
                    passed: false,
                    detail: Some(err.to_string()),
                },
                Err(_) => CheckResult {
                    name: check.name.to_string(),
                    passed: false,
                    detail: Some("check panicked".to_string()),
                },
            };
            if result.passed {
                info!(check = %result.name, "smoke check passed");
            } else {
                warn!(
                    check = %result.name,
                    detail = result.detail.as_deref().unwrap_or(""),
                    "smoke check failed"
                );
            }
            details.push(result);
        }

        let passed = details.iter().filter(|d| d.passed).count();
        SmokeSummary {
            passed,
            failed: details.len() - passed,
            total: details.len(),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failing_check_does_not_block_later_checks() {
        let mut suite = SmokeSuite::new();
        suite.register("boom", || anyhow::bail!("scripted failure"));
        suite.register("fine", || Ok(()));

        let summary = suite.run();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.passed, 1);
        assert!(!summary.details[0].passed);
        assert!(summary.details[1].passed);
    }

    #[test]
    fn panicking_check_counts_as_its_own_failure() {
        let mut suite = SmokeSuite::new();
        suite.register("panics", || panic!("check bug"));
        suite.register("fine", || Ok(()));

        let summary = suite.run();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.passed, 1);
        assert_eq!(
            summary.details[0].detail.as_deref(),
            Some("check panicked")
        );
    }

    #[test]
    fn store_battery_passes_on_fresh_store() {
        let store = Arc::new(StateStore::new());
        let suite = SmokeSuite::with_store_battery(store);

        let summary = suite.run();

        assert!(summary.is_clean(), "details: {:?}", summary.details);
        assert_eq!(summary.total, 5);
    }
}
