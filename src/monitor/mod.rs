//! Periodic health sampling and operation timing.
//!
//! The monitor observes the store and system signals; it never mutates
//! module lifecycle fields. Its writes are limited to metric counters and
//! the `health.*` warning flags.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::state::{paths, StateStore};

/// Handle for the spawned monitor task.
pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Signal the monitor to stop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Spawns a task that samples process memory and the shared error counter
/// on a fixed interval, raising named warning flags on threshold
/// crossings.
pub struct HealthMonitor;

impl HealthMonitor {
    pub fn spawn(store: Arc<StateStore>, config: MonitorConfig) -> MonitorHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(config.interval_ms.max(1)));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut memory_flagged = false;
            let mut errors_flagged = false;

            info!(interval_ms = config.interval_ms, "health monitor started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            debug!("health monitor stopping");
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        sample(&store, &config, &mut memory_flagged, &mut errors_flagged);
                    }
                }
            }
        });
        MonitorHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

fn sample(
    store: &StateStore,
    config: &MonitorConfig,
    memory_flagged: &mut bool,
    errors_flagged: &mut bool,
) {
    let rss_kb = max_rss_kb();
    if rss_kb > 0 {
        store.set(paths::MEMORY_PEAK_KB, rss_kb);
    }

    let over_memory = rss_kb > config.memory_threshold_kb;
    if over_memory != *memory_flagged {
        *memory_flagged = over_memory;
        store.set(paths::MEMORY_PRESSURE, over_memory);
        if over_memory {
            warn!(
                rss_kb,
                threshold_kb = config.memory_threshold_kb,
                "memory pressure threshold crossed"
            );
        }
    }

    let error_count = store
        .get(paths::ERROR_COUNT)
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    let over_errors = error_count > config.error_threshold;
    if over_errors != *errors_flagged {
        *errors_flagged = over_errors;
        store.set(paths::ERROR_RATE, over_errors);
        if over_errors {
            warn!(
                error_count,
                threshold = config.error_threshold,
                "error rate threshold crossed"
            );
        }
    }
}

// ru_maxrss is kilobytes on Linux, bytes on macOS.
fn max_rss_kb() -> u64 {
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return 0;
    }
    #[cfg(target_os = "macos")]
    {
        (usage.ru_maxrss as u64) / 1024
    }
    #[cfg(not(target_os = "macos"))]
    {
        usage.ru_maxrss as u64
    }
}

/// Wraps named operations with start/end timing, recording durations
/// under `performance.operation_times`.
///
/// Slow operations are logged as warnings, never treated as errors.
pub struct OperationTimer {
    store: Arc<StateStore>,
    slow_after: Duration,
}

impl OperationTimer {
    #[must_use]
    pub fn new(store: Arc<StateStore>, slow_after: Duration) -> Self {
        Self { store, slow_after }
    }

    /// Time an asynchronous operation.
    pub async fn measure<T>(&self, name: &str, operation: impl std::future::Future<Output = T>) -> T {
        let start = Instant::now();
        let result = operation.await;
        self.record(name, start.elapsed());
        result
    }

    /// Time a synchronous operation.
    pub fn measure_sync<T>(&self, name: &str, operation: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = operation();
        self.record(name, start.elapsed());
        result
    }

    fn record(&self, name: &str, elapsed: Duration) {
        let elapsed_ms = elapsed.as_millis() as u64;
        self.store.set(&paths::operation_time(name), elapsed_ms);
        if elapsed > self.slow_after {
            warn!(
                operation = %name,
                elapsed_ms,
                threshold_ms = self.slow_after.as_millis() as u64,
                "slow operation"
            );
        } else {
            debug!(operation = %name, elapsed_ms, "operation timed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timer_records_async_operation() {
        let store = Arc::new(StateStore::new());
        let timer = OperationTimer::new(Arc::clone(&store), Duration::from_secs(1));

        let value = timer.measure("warmup", async { 7 }).await;

        assert_eq!(value, 7);
        assert!(store.get(&paths::operation_time("warmup")).is_some());
    }

    #[cfg(unix)]
    #[test]
    fn max_rss_is_positive_on_unix() {
        assert!(max_rss_kb() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_flags_error_rate_crossing() {
        let store = Arc::new(StateStore::new());
        let config = MonitorConfig {
            enabled: true,
            interval_ms: 100,
            memory_threshold_kb: u64::MAX,
            error_threshold: 2,
        };
        let handle = HealthMonitor::spawn(Arc::clone(&store), config);

        store.set(paths::ERROR_COUNT, 5);
        tokio::time::sleep(Duration::from_millis(250)).await;
        handle.shutdown().await;

        assert_eq!(
            store.get(paths::ERROR_RATE),
            Some(serde_json::Value::Bool(true))
        );
    }

    #[tokio::test]
    async fn timer_records_sync_operation() {
        let store = Arc::new(StateStore::new());
        let timer = OperationTimer::new(Arc::clone(&store), Duration::from_secs(1));

        let value = timer.measure_sync("parse", || 3 + 4);

        assert_eq!(value, 7);
        assert!(store.get(&paths::operation_time("parse")).is_some());
    }
}
