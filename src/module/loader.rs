//! Module loading: availability probing, bounded retry with exponential
//! backoff, fallback execution, and store bookkeeping.
//!
//! The loader is the single writer of module lifecycle state: the
//! loaded/failed sets and per-module readiness flags are written here and
//! nowhere else.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{ModuleError, Result};
use crate::state::{paths, FailureRecord, StateStore};

use super::fallback::FallbackRegistry;
use super::{Module, ModuleDescriptor};

/// Terminal outcome of one load request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The module initialized; `attempts == 0` means it was already in the
    /// loaded set and nothing ran.
    Loaded { duration: Duration, attempts: u32 },
    /// Retries and fallback are exhausted.
    Failed { error: String, attempts: u32 },
}

impl LoadOutcome {
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Loaded { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }
}

#[derive(Clone)]
struct Registration {
    module: Arc<dyn Module>,
    descriptor: ModuleDescriptor,
}

struct Inner {
    store: Arc<StateStore>,
    settings: Settings,
    fallbacks: FallbackRegistry,
    modules: RwLock<HashMap<String, Registration>>,
    loaded: DashSet<String>,
    in_flight: DashMap<String, watch::Receiver<Option<LoadOutcome>>>,
}

/// Resolves module names to terminal load outcomes.
///
/// Cheap to clone; clones share the loaded set and in-flight table, so the
/// at-most-one-in-flight invariant holds across all handles.
#[derive(Clone)]
pub struct ModuleLoader {
    inner: Arc<Inner>,
}

impl ModuleLoader {
    #[must_use]
    pub fn new(store: Arc<StateStore>, settings: Settings, fallbacks: FallbackRegistry) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                settings,
                fallbacks,
                modules: RwLock::new(HashMap::new()),
                loaded: DashSet::new(),
                in_flight: DashMap::new(),
            }),
        }
    }

    /// Register a module under its descriptor's name. Re-registering a
    /// name replaces the previous module.
    pub fn register(&self, descriptor: ModuleDescriptor, module: Arc<dyn Module>) {
        self.inner.modules.write().insert(
            descriptor.name.clone(),
            Registration { module, descriptor },
        );
    }

    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<ModuleDescriptor> {
        self.inner
            .modules
            .read()
            .get(name)
            .map(|r| r.descriptor.clone())
    }

    #[must_use]
    pub fn is_loaded(&self, name: &str) -> bool {
        self.inner.loaded.contains(name)
    }

    #[must_use]
    pub fn loaded_modules(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .loaded
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Load `name` to a terminal outcome.
    ///
    /// Already loaded → immediate success. Already in flight → attach to
    /// the pending outcome; the initialization routine runs exactly once.
    /// Otherwise a driver task runs the attempt chain: probe, initialize
    /// under timeout, retry with exponential backoff, fallback on
    /// exhaustion.
    pub async fn load(&self, name: &str) -> Result<LoadOutcome> {
        if self.inner.loaded.contains(name) {
            return Ok(LoadOutcome::Loaded {
                duration: Duration::ZERO,
                attempts: 0,
            });
        }

        let registration = self.inner.modules.read().get(name).cloned();
        let Some(registration) = registration else {
            return Err(ModuleError::NotRegistered {
                name: name.to_string(),
            }
            .into());
        };

        let mut rx = match self.inner.in_flight.entry(name.to_string()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let (tx, rx) = watch::channel(None);
                entry.insert(rx.clone());
                let inner = Arc::clone(&self.inner);
                let name = name.to_string();
                tokio::spawn(async move {
                    Inner::drive(inner, name, registration, tx).await;
                });
                rx
            }
        };

        loop {
            let settled = rx.borrow_and_update().clone();
            if let Some(outcome) = settled {
                return Ok(outcome);
            }
            if rx.changed().await.is_err() {
                return Ok(LoadOutcome::Failed {
                    error: "load task dropped before settling".to_string(),
                    attempts: 0,
                });
            }
        }
    }

    /// Manual re-load trigger (debug surface): clears the loaded mark and
    /// runs a fresh attempt chain.
    pub async fn reload(&self, name: &str) -> Result<LoadOutcome> {
        self.inner.loaded.remove(name);
        self.load(name).await
    }
}

impl Inner {
    async fn drive(
        inner: Arc<Self>,
        name: String,
        registration: Registration,
        tx: watch::Sender<Option<LoadOutcome>>,
    ) {
        let outcome = inner.run_attempt_chain(&name, &registration).await;
        match &outcome {
            LoadOutcome::Loaded { duration, attempts } => {
                inner.loaded.insert(name.clone());
                inner.mark_loaded(&name, *duration);
                info!(
                    module = %name,
                    duration_ms = duration.as_millis() as u64,
                    attempts,
                    "module loaded"
                );
            }
            LoadOutcome::Failed { error, attempts } => {
                inner.mark_failed(&name);
                warn!(module = %name, attempts, error = %error, "module failed terminally");
            }
        }
        let _ = tx.send(Some(outcome));
        inner.in_flight.remove(&name);
    }

    async fn run_attempt_chain(&self, name: &str, registration: &Registration) -> LoadOutcome {
        let descriptor = &registration.descriptor;
        let total_attempts = descriptor.max_retries + 1;

        for attempt in 0..total_attempts {
            match self.run_attempt(name, registration).await {
                Ok(duration) => {
                    return LoadOutcome::Loaded {
                        duration,
                        attempts: attempt + 1,
                    };
                }
                Err(err) => {
                    warn!(module = %name, attempt, error = %err, "module load attempt failed");
                    FailureRecord::for_module(name, err.to_string(), descriptor.required)
                        .record(&self.store);
                    if attempt + 1 < total_attempts {
                        let factor = 1u64 << attempt.min(20);
                        let delay = Duration::from_millis(
                            self.settings.retry_delay_base_ms.saturating_mul(factor),
                        );
                        debug!(module = %name, delay_ms = delay.as_millis() as u64, "retrying after backoff");
                        sleep(delay).await;
                    }
                }
            }
        }

        if let Some(strategy_name) = &descriptor.fallback {
            match self.fallbacks.get(strategy_name) {
                Some(strategy) => {
                    info!(module = %name, strategy = %strategy_name, "applying fallback strategy");
                    strategy.apply(&self.store);
                }
                None => {
                    warn!(module = %name, strategy = %strategy_name, "unknown fallback strategy");
                }
            }
        }

        let error = ModuleError::RetriesExhausted {
            name: name.to_string(),
            attempts: total_attempts,
        };
        LoadOutcome::Failed {
            error: error.to_string(),
            attempts: total_attempts,
        }
    }

    // One attempt: availability probe then initialization, each bounded by
    // the descriptor's timeout. A timed-out future is dropped; whatever it
    // would eventually have produced is ignored.
    async fn run_attempt(
        &self,
        name: &str,
        registration: &Registration,
    ) -> std::result::Result<Duration, ModuleError> {
        let descriptor = &registration.descriptor;
        let budget = Duration::from_millis(descriptor.timeout_ms);
        let start = Instant::now();

        self.wait_available(name, &registration.module, budget)
            .await?;

        match timeout(budget, registration.module.initialize()).await {
            Ok(Ok(())) => Ok(start.elapsed()),
            Ok(Err(source)) => Err(ModuleError::Init {
                name: name.to_string(),
                source,
            }),
            Err(_) => Err(ModuleError::InitTimeout {
                name: name.to_string(),
                timeout_ms: descriptor.timeout_ms,
            }),
        }
    }

    async fn wait_available(
        &self,
        name: &str,
        module: &Arc<dyn Module>,
        budget: Duration,
    ) -> std::result::Result<(), ModuleError> {
        if module.is_available() {
            return Ok(());
        }

        let probe_timeout = ModuleError::ProbeTimeout {
            name: name.to_string(),
            waited_ms: budget.as_millis() as u64,
        };

        // Wake-on-ready when the module offers a signal; otherwise poll.
        if let Some(mut ready) = module.ready_signal() {
            let wait = async move {
                loop {
                    if *ready.borrow_and_update() {
                        return;
                    }
                    if ready.changed().await.is_err() {
                        // Sender dropped without signalling; park until
                        // the timeout reclaims the attempt.
                        std::future::pending::<()>().await;
                    }
                }
            };
            return timeout(budget, wait).await.map_err(|_| probe_timeout);
        }

        let mut interval =
            tokio::time::interval(Duration::from_millis(self.settings.probe_interval_ms.max(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let poll = async {
            loop {
                interval.tick().await;
                if module.is_available() {
                    return;
                }
            }
        };
        timeout(budget, poll).await.map_err(|_| probe_timeout)
    }

    fn mark_loaded(&self, name: &str, duration: Duration) {
        push_unique(&self.store, paths::LOADED_MODULES, name);
        remove_entry(&self.store, paths::FAILED_MODULES, name);
        self.store
            .set(&paths::module_load_time(name), duration.as_millis() as u64);
        self.store.set(&paths::feature_ready(name), true);

        let slow_threshold = Duration::from_millis(self.settings.slow_module_threshold_ms);
        if duration > slow_threshold {
            warn!(
                module = %name,
                duration_ms = duration.as_millis() as u64,
                threshold_ms = self.settings.slow_module_threshold_ms,
                "module loaded slowly"
            );
            push_unique(&self.store, paths::SLOW_MODULES, name);
        }
    }

    fn mark_failed(&self, name: &str) {
        push_unique(&self.store, paths::FAILED_MODULES, name);
        self.store.set(&paths::feature_ready(name), false);
    }
}

fn push_unique(store: &StateStore, path: &str, name: &str) {
    let name = name.to_string();
    store.update(path, move |old| {
        let mut items = match old {
            Some(serde_json::Value::Array(items)) => items,
            _ => Vec::new(),
        };
        if !items.iter().any(|v| v.as_str() == Some(name.as_str())) {
            items.push(serde_json::Value::String(name));
        }
        serde_json::Value::Array(items)
    });
}

fn remove_entry(store: &StateStore, path: &str, name: &str) {
    let name = name.to_string();
    store.update(path, move |old| {
        let items = match old {
            Some(serde_json::Value::Array(items)) => items,
            _ => Vec::new(),
        };
        serde_json::Value::Array(
            items
                .into_iter()
                .filter(|v| v.as_str() != Some(name.as_str()))
                .collect(),
        )
    });
}
