//! Read-only derived view of the state tree.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use super::BootStatus;

/// Key derived fields of the state tree at one point in time.
///
/// Consumed by the smoke battery and the debug surface; building one never
/// mutates the store.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub status: Option<BootStatus>,
    pub session: Option<String>,
    pub loaded_modules: Vec<String>,
    pub failed_modules: Vec<String>,
    pub boot_duration_ms: Option<u64>,
    pub error_count: u64,
    /// Per-module readiness flags (`features.<name>.ready`).
    pub feature_flags: BTreeMap<String, bool>,
}

impl StateSnapshot {
    pub(super) fn from_tree(tree: &Map<String, Value>) -> Self {
        let init = tree.get("initialization").and_then(Value::as_object);
        let perf = tree.get("performance").and_then(Value::as_object);

        let status = init
            .and_then(|m| m.get("status"))
            .and_then(Value::as_str)
            .and_then(BootStatus::parse);
        let session = init
            .and_then(|m| m.get("session"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let string_list = |key: &str| -> Vec<String> {
            init.and_then(|m| m.get(key))
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut feature_flags = BTreeMap::new();
        if let Some(features) = tree.get("features").and_then(Value::as_object) {
            for (name, entry) in features {
                if let Some(ready) = entry.get("ready").and_then(Value::as_bool) {
                    feature_flags.insert(name.clone(), ready);
                }
            }
        }

        Self {
            status,
            session,
            loaded_modules: string_list("loaded_modules"),
            failed_modules: string_list("failed_modules"),
            boot_duration_ms: perf
                .and_then(|m| m.get("boot_duration_ms"))
                .and_then(Value::as_u64),
            error_count: perf
                .and_then(|m| m.get("error_count"))
                .and_then(Value::as_u64)
                .unwrap_or(0),
            feature_flags,
        }
    }

    /// True once every blocking phase has resolved.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.status, Some(BootStatus::Ready))
    }
}
