//! Scripted [`Module`] implementation for boot rehearsals and tests.
//!
//! Each call to `initialize()` pops the next scripted result from a queue
//! (defaults to `Ok(())` when exhausted), and availability can be delayed
//! by wall-clock time or by a probe count. Shared atomic counters let
//! callers assert how often the loader actually probed and initialized.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::{sleep, Duration, Instant};

use super::Module;

/// A scripted module with configurable availability and init behavior.
pub struct SimModule {
    available_after: Duration,
    available_after_probes: Option<u32>,
    never_available: bool,
    init_delay: Duration,
    init_results: Mutex<VecDeque<Result<(), String>>>,
    fail_always: bool,
    created: Instant,
    probe_count: Arc<AtomicU32>,
    init_count: Arc<AtomicU32>,
    ready_rx: Option<watch::Receiver<bool>>,
}

impl SimModule {
    #[must_use]
    pub fn new() -> Self {
        Self {
            available_after: Duration::ZERO,
            available_after_probes: None,
            never_available: false,
            init_delay: Duration::ZERO,
            init_results: Mutex::new(VecDeque::new()),
            fail_always: false,
            created: Instant::now(),
            probe_count: Arc::new(AtomicU32::new(0)),
            init_count: Arc::new(AtomicU32::new(0)),
            ready_rx: None,
        }
    }

    /// Report unavailable until `delay` has elapsed since construction.
    #[must_use]
    pub fn available_after(mut self, delay: Duration) -> Self {
        self.available_after = delay;
        self
    }

    /// Report unavailable for the first `probes` availability checks.
    #[must_use]
    pub fn available_after_probes(mut self, probes: u32) -> Self {
        self.available_after_probes = Some(probes);
        self
    }

    /// Never report available; every attempt ends in a probe timeout.
    #[must_use]
    pub fn never_available(mut self) -> Self {
        self.never_available = true;
        self
    }

    /// Sleep this long inside each `initialize()` call.
    #[must_use]
    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    /// Fail the first `failures` initialization calls, then succeed.
    #[must_use]
    pub fn with_init_failures(self, failures: u32) -> Self {
        let mut results = self.init_results.lock();
        for _ in 0..failures {
            results.push_back(Err("scripted init failure".to_string()));
        }
        drop(results);
        self
    }

    /// Fail every initialization call once the scripted queue is empty.
    #[must_use]
    pub fn failing_always(mut self) -> Self {
        self.fail_always = true;
        self
    }

    /// Push an explicit scripted init result.
    #[must_use]
    pub fn with_init_result(self, result: Result<(), String>) -> Self {
        self.init_results.lock().push_back(result);
        self
    }

    /// Expose a one-shot readiness signal instead of relying on polling.
    #[must_use]
    pub fn with_ready_signal(mut self, rx: watch::Receiver<bool>) -> Self {
        self.ready_rx = Some(rx);
        self
    }

    /// Shared counters for asserting probe/init call counts.
    #[must_use]
    pub fn counts(&self) -> (Arc<AtomicU32>, Arc<AtomicU32>) {
        (self.probe_count.clone(), self.init_count.clone())
    }

    #[must_use]
    pub fn probe_count(&self) -> u32 {
        self.probe_count.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn init_count(&self) -> u32 {
        self.init_count.load(Ordering::SeqCst)
    }
}

impl Default for SimModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for SimModule {
    fn is_available(&self) -> bool {
        let probes = self.probe_count.fetch_add(1, Ordering::SeqCst) + 1;
        if self.never_available {
            return false;
        }
        if let Some(after) = self.available_after_probes {
            return probes > after;
        }
        self.created.elapsed() >= self.available_after
    }

    async fn initialize(&self) -> anyhow::Result<()> {
        self.init_count.fetch_add(1, Ordering::SeqCst);
        if !self.init_delay.is_zero() {
            sleep(self.init_delay).await;
        }
        let scripted = self.init_results.lock().pop_front();
        match scripted {
            Some(Ok(())) => Ok(()),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None if self.fail_always => Err(anyhow::anyhow!("scripted init failure")),
            None => Ok(()),
        }
    }

    fn ready_signal(&self) -> Option<watch::Receiver<bool>> {
        self.ready_rx.clone()
    }
}
