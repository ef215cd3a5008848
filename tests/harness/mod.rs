//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::{sleep, Duration, Instant};

use ignition::config::{BootConfig, ModuleEntry, MonitorConfig};
use ignition::module::{Module, ModuleDescriptor};
use ignition::phase::BootPhase;
use ignition::recovery::{DegradedAction, EmergencyPresenter};
use ignition::state::StateStore;

pub use ignition::testkit::config::fast_settings;

/// Boot config assembled programmatically, monitor disabled.
pub fn boot_config(phases: Vec<BootPhase>, descriptors: Vec<ModuleDescriptor>) -> BootConfig {
    BootConfig {
        settings: fast_settings(),
        monitor: MonitorConfig {
            enabled: false,
            ..MonitorConfig::default()
        },
        phases,
        modules: descriptors
            .into_iter()
            .map(|descriptor| ModuleEntry {
                descriptor,
                sim: None,
            })
            .collect(),
        ..BootConfig::default()
    }
}

/// Module that timestamps its first availability probe and its
/// initialization completion, for ordering assertions.
pub struct StampingModule {
    init_delay: Duration,
    first_probe: Mutex<Option<Instant>>,
    init_done: Mutex<Option<Instant>>,
}

impl StampingModule {
    pub fn new(init_delay: Duration) -> Self {
        Self {
            init_delay,
            first_probe: Mutex::new(None),
            init_done: Mutex::new(None),
        }
    }

    pub fn first_probe(&self) -> Option<Instant> {
        *self.first_probe.lock()
    }

    pub fn init_done(&self) -> Option<Instant> {
        *self.init_done.lock()
    }
}

#[async_trait]
impl Module for StampingModule {
    fn is_available(&self) -> bool {
        self.first_probe.lock().get_or_insert_with(Instant::now);
        true
    }

    async fn initialize(&self) -> anyhow::Result<()> {
        if !self.init_delay.is_zero() {
            sleep(self.init_delay).await;
        }
        *self.init_done.lock() = Some(Instant::now());
        Ok(())
    }
}

/// Degraded action that counts invocations.
pub struct CountingAction {
    pub calls: Arc<AtomicUsize>,
    pub fail: bool,
}

impl DegradedAction for CountingAction {
    fn name(&self) -> &str {
        "counting"
    }

    fn apply(&self, _store: &StateStore) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("scripted degraded-action failure");
        }
        Ok(())
    }
}

/// Presenter that counts invocations.
#[derive(Clone, Default)]
pub struct CountingPresenter {
    pub calls: Arc<AtomicUsize>,
}

impl EmergencyPresenter for CountingPresenter {
    fn present(&self, _error: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}
