//! Named fallback strategies applied when a module's retries are
//! exhausted.
//!
//! A strategy is a fixed sequence of compensating actions. Actions are
//! individually best-effort: one action's failure is logged and does not
//! block the rest, mirroring the store's listener isolation.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::state::{paths, StateStore};

/// One compensating action inside a fallback strategy.
pub trait FallbackAction: Send + Sync {
    fn name(&self) -> &str;

    /// Apply the action against the shared store.
    fn apply(&self, store: &StateStore) -> anyhow::Result<()>;
}

/// A store-flag action: sets a preference/feature flag consumers react to.
struct FlagAction {
    name: &'static str,
    path: &'static str,
}

impl FallbackAction for FlagAction {
    fn name(&self) -> &str {
        self.name
    }

    fn apply(&self, store: &StateStore) -> anyhow::Result<()> {
        store.set(self.path, true);
        Ok(())
    }
}

/// An ordered, named sequence of compensating actions.
pub struct FallbackStrategy {
    name: String,
    actions: Vec<Box<dyn FallbackAction>>,
}

impl FallbackStrategy {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_action(mut self, action: Box<dyn FallbackAction>) -> Self {
        self.actions.push(action);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run every action in order; returns the number that failed.
    pub fn apply(&self, store: &StateStore) -> usize {
        let mut failures = 0;
        for action in &self.actions {
            match action.apply(store) {
                Ok(()) => {
                    info!(strategy = %self.name, action = action.name(), "fallback action applied");
                }
                Err(err) => {
                    failures += 1;
                    warn!(
                        strategy = %self.name,
                        action = action.name(),
                        error = %err,
                        "fallback action failed, continuing"
                    );
                }
            }
        }
        failures
    }
}

/// Registry resolving strategy names from module descriptors.
#[derive(Default)]
pub struct FallbackRegistry {
    strategies: HashMap<String, Arc<FallbackStrategy>>,
}

impl FallbackRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in degraded-surface
    /// strategies.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(FallbackStrategy::new("minimal_navigation").with_action(Box::new(
            FlagAction {
                name: "enable_minimal_navigation",
                path: paths::PREF_MINIMAL_NAVIGATION,
            },
        )));
        registry.register(FallbackStrategy::new("static_placeholders").with_action(Box::new(
            FlagAction {
                name: "enable_static_placeholders",
                path: paths::PREF_STATIC_PLACEHOLDERS,
            },
        )));
        registry.register(FallbackStrategy::new("low_fidelity").with_action(Box::new(
            FlagAction {
                name: "enable_low_fidelity",
                path: paths::PREF_LOW_FIDELITY,
            },
        )));
        registry
    }

    pub fn register(&mut self, strategy: FallbackStrategy) {
        self.strategies
            .insert(strategy.name().to_string(), Arc::new(strategy));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<FallbackStrategy>> {
        self.strategies.get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    struct CountingAction {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl FallbackAction for CountingAction {
        fn name(&self) -> &str {
            "counting"
        }

        fn apply(&self, _store: &StateStore) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("scripted failure");
            }
            Ok(())
        }
    }

    #[test]
    fn failing_action_does_not_block_later_actions() {
        let calls = Arc::new(AtomicUsize::new(0));
        let strategy = FallbackStrategy::new("mixed")
            .with_action(Box::new(CountingAction {
                calls: Arc::clone(&calls),
                fail: true,
            }))
            .with_action(Box::new(CountingAction {
                calls: Arc::clone(&calls),
                fail: false,
            }));

        let store = StateStore::new();
        let failures = strategy.apply(&store);

        assert_eq!(failures, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn builtin_strategies_flip_store_flags() {
        let registry = FallbackRegistry::with_builtins();
        let store = StateStore::new();

        let strategy = registry.get("low_fidelity").unwrap();
        assert_eq!(strategy.apply(&store), 0);
        assert_eq!(
            store.get(paths::PREF_LOW_FIDELITY),
            Some(serde_json::Value::Bool(true))
        );
    }

    #[test]
    fn unknown_strategy_is_absent() {
        let registry = FallbackRegistry::with_builtins();
        assert!(registry.get("no_such_strategy").is_none());
        assert!(registry.contains("minimal_navigation"));
    }
}
