//! Well-known dot-paths into the state tree.
//!
//! Components address the store through these accessors rather than
//! scattered string literals; raw path strings appear only at the
//! configuration boundary.

pub const INIT_STATUS: &str = "initialization.status";
pub const INIT_SESSION: &str = "initialization.session";
pub const INIT_STARTED_AT: &str = "initialization.started_at";
pub const LOADED_MODULES: &str = "initialization.loaded_modules";
pub const FAILED_MODULES: &str = "initialization.failed_modules";
pub const ERRORS: &str = "initialization.errors";

pub const MODULE_LOAD_TIMES: &str = "performance.module_load_times";
pub const OPERATION_TIMES: &str = "performance.operation_times";
pub const ERROR_COUNT: &str = "performance.error_count";
pub const MEMORY_PEAK_KB: &str = "performance.memory_peak_kb";
pub const BOOT_DURATION_MS: &str = "performance.boot_duration_ms";

pub const MEMORY_PRESSURE: &str = "health.memory_pressure";
pub const ERROR_RATE: &str = "health.error_rate";
pub const SLOW_MODULES: &str = "health.slow_modules";
pub const DEGRADED: &str = "health.degraded";
pub const EMERGENCY: &str = "health.emergency";

pub const SMOKE_REPORT: &str = "diagnostics.smoke";

pub const PREF_LOW_FIDELITY: &str = "preferences.low_fidelity";
pub const PREF_STATIC_PLACEHOLDERS: &str = "preferences.static_placeholders";
pub const PREF_MINIMAL_NAVIGATION: &str = "preferences.minimal_navigation";

/// Path of a module's readiness flag.
#[must_use]
pub fn feature_ready(module: &str) -> String {
    format!("features.{module}.ready")
}

/// Path of a module's recorded load duration in milliseconds.
#[must_use]
pub fn module_load_time(module: &str) -> String {
    format!("{MODULE_LOAD_TIMES}.{module}")
}

/// Path of a named operation's recorded duration in milliseconds.
#[must_use]
pub fn operation_time(operation: &str) -> String {
    format!("{OPERATION_TIMES}.{operation}")
}
