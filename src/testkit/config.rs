//! Canonical test configurations.

use crate::config::{MonitorConfig, Settings};

/// Settings with short delays so retry/backoff tests stay fast under a
/// paused clock.
#[must_use]
pub fn fast_settings() -> Settings {
    Settings {
        retry_delay_base_ms: 10,
        slow_module_threshold_ms: 1_000,
        max_boot_time_ms: 60_000,
        probe_interval_ms: 5,
    }
}

/// Monitor config that never trips thresholds, for tests that only need
/// the sampling loop alive.
#[must_use]
pub fn quiet_monitor() -> MonitorConfig {
    MonitorConfig {
        enabled: true,
        interval_ms: 50,
        memory_threshold_kb: u64::MAX,
        error_threshold: u64::MAX,
    }
}
