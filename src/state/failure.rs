//! Append-only failure audit records.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::paths;
use super::store::StateStore;

/// One failure occurrence, module-scoped or global.
///
/// Records are appended to the store's error list for the lifetime of the
/// session and never removed, whether or not the failure was recovered.
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    /// Module the failure belongs to; `None` for global failures.
    pub module: Option<String>,
    pub error: String,
    pub timestamp: DateTime<Utc>,
    pub critical: bool,
}

impl FailureRecord {
    #[must_use]
    pub fn for_module(module: impl Into<String>, error: impl Into<String>, critical: bool) -> Self {
        Self {
            module: Some(module.into()),
            error: error.into(),
            timestamp: Utc::now(),
            critical,
        }
    }

    #[must_use]
    pub fn global(error: impl Into<String>, critical: bool) -> Self {
        Self {
            module: None,
            error: error.into(),
            timestamp: Utc::now(),
            critical,
        }
    }

    /// Append this record to the audit trail and bump the error counter.
    pub fn record(&self, store: &StateStore) {
        let value = serde_json::to_value(self)
            .unwrap_or_else(|_| serde_json::json!({ "error": self.error }));
        store.push(paths::ERRORS, value);
        store.increment(paths::ERROR_COUNT, 1);
    }
}
