//! The state tree and its synchronous publish/subscribe machinery.

use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

use super::snapshot::StateSnapshot;

/// A single state mutation, delivered to exact-path and wildcard listeners.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub path: String,
    /// Value previously stored at the path, `None` if the path was absent.
    pub old_value: Option<Value>,
    pub new_value: Value,
    pub timestamp: DateTime<Utc>,
}

type Listener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Process-wide key-path map with synchronous change notification.
///
/// Paths are dot-delimited (`"initialization.status"`); writes auto-create
/// missing intermediate objects. `Value::Null` is a valid stored value,
/// distinct from an absent path.
///
/// Re-entrancy: a listener may itself write to the store. Such writes are
/// queued and delivered by the drainer already on the stack, so
/// notification never recurses; the outermost `set` returns only once the
/// queue is empty.
pub struct StateStore {
    tree: Mutex<Map<String, Value>>,
    listeners: Mutex<HashMap<String, Vec<Listener>>>,
    any_listeners: Mutex<Vec<Listener>>,
    pending: Mutex<VecDeque<ChangeEvent>>,
    draining: AtomicBool,
    session: Uuid,
}

impl StateStore {
    /// Create a store seeded with the fixed default shape.
    #[must_use]
    pub fn new() -> Self {
        let session = Uuid::new_v4();
        let store = Self {
            tree: Mutex::new(Map::new()),
            listeners: Mutex::new(HashMap::new()),
            any_listeners: Mutex::new(Vec::new()),
            pending: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
            session,
        };
        store.seed_defaults();
        store
    }

    fn seed_defaults(&self) {
        let defaults = serde_json::json!({
            "initialization": {
                "status": "starting",
                "session": self.session.to_string(),
                "started_at": Utc::now().to_rfc3339(),
                "loaded_modules": [],
                "failed_modules": [],
                "errors": [],
            },
            "performance": {
                "module_load_times": {},
                "operation_times": {},
                "error_count": 0,
                "memory_peak_kb": 0,
                "boot_duration_ms": null,
            },
            "features": {},
            "preferences": {
                "minimal_navigation": false,
                "static_placeholders": false,
                "low_fidelity": false,
            },
            "health": {},
        });
        if let Value::Object(map) = defaults {
            *self.tree.lock() = map;
        }
    }

    /// Session identity assigned at construction.
    #[must_use]
    pub fn session(&self) -> Uuid {
        self.session
    }

    /// Read the value at `path`, or `None` if any segment is missing.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Value> {
        let tree = self.tree.lock();
        let mut segments = path.split('.');
        let mut current = tree.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current.clone())
    }

    /// Write `value` at `path`, creating intermediate objects, then notify
    /// exact-path and wildcard listeners before returning.
    pub fn set(&self, path: &str, value: impl Into<Value>) {
        let value = value.into();
        self.update(path, |_| value);
    }

    /// Atomically replace the value at `path` with `f(old)` under the tree
    /// lock, then notify. The read-modify-write is a single mutation for
    /// concurrent writers.
    pub fn update(&self, path: &str, f: impl FnOnce(Option<Value>) -> Value) {
        if path.is_empty() {
            warn!("ignoring state write to empty path");
            return;
        }
        let (old_value, new_value) = {
            let mut tree = self.tree.lock();
            let (parent, leaf) = Self::parent_object(&mut tree, path);
            let old = parent.get(&leaf).cloned();
            let new = f(old.clone());
            parent.insert(leaf, new.clone());
            (old, new)
        };
        self.pending.lock().push_back(ChangeEvent {
            path: path.to_string(),
            old_value,
            new_value,
            timestamp: Utc::now(),
        });
        self.drain();
    }

    /// Append `value` to the array at `path`, creating it if absent.
    pub fn push(&self, path: &str, value: impl Into<Value>) {
        let value = value.into();
        self.update(path, move |old| {
            let mut items = match old {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            items.push(value);
            Value::Array(items)
        });
    }

    /// Add `by` to the integer counter at `path`, treating anything else
    /// as zero.
    pub fn increment(&self, path: &str, by: u64) {
        self.update(path, move |old| {
            let current = old.and_then(|v| v.as_u64()).unwrap_or(0);
            Value::from(current + by)
        });
    }

    /// Register a listener for writes to exactly `path`.
    pub fn subscribe(&self, path: &str, listener: impl Fn(&ChangeEvent) + Send + Sync + 'static) {
        self.listeners
            .lock()
            .entry(path.to_string())
            .or_default()
            .push(Arc::new(listener));
    }

    /// Register a listener for every write, regardless of path.
    pub fn subscribe_any(&self, listener: impl Fn(&ChangeEvent) + Send + Sync + 'static) {
        self.any_listeners.lock().push(Arc::new(listener));
    }

    /// Read-only view of the key derived fields.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::from_tree(&self.tree.lock())
    }

    // Walks to the parent object of `path`, creating intermediates and
    // replacing any non-object intermediate with an empty object. Returns
    // the parent map and the leaf key.
    fn parent_object<'a>(
        tree: &'a mut Map<String, Value>,
        path: &str,
    ) -> (&'a mut Map<String, Value>, String) {
        let mut segments: Vec<&str> = path.split('.').collect();
        let leaf = segments.pop().unwrap_or_default().to_string();
        let mut current = tree;
        for segment in segments {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !matches!(entry, Value::Object(_)) {
                *entry = Value::Object(Map::new());
            }
            let Value::Object(next) = entry else {
                unreachable!("intermediate was just replaced with an object");
            };
            current = next;
        }
        (current, leaf)
    }

    fn drain(&self) {
        loop {
            if self
                .draining
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                // A drainer is already running (possibly this thread,
                // upstack in a listener); it will pick up our event.
                return;
            }
            loop {
                let event = self.pending.lock().pop_front();
                match event {
                    Some(event) => self.deliver(&event),
                    None => break,
                }
            }
            self.draining.store(false, Ordering::Release);
            // A writer may have enqueued between our last pop and the flag
            // reset; loop back so nothing is stranded.
            if self.pending.lock().is_empty() {
                return;
            }
        }
    }

    fn deliver(&self, event: &ChangeEvent) {
        let exact: Vec<Listener> = self
            .listeners
            .lock()
            .get(&event.path)
            .map(|v| v.to_vec())
            .unwrap_or_default();
        for listener in &exact {
            Self::invoke(listener, event);
        }
        let wildcard: Vec<Listener> = self.any_listeners.lock().to_vec();
        for listener in &wildcard {
            Self::invoke(listener, event);
        }
    }

    // One listener's failure must never prevent other listeners from
    // running or the write from completing.
    fn invoke(listener: &Listener, event: &ChangeEvent) {
        if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
            warn!(path = %event.path, "state listener panicked, continuing");
        }
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn set_then_get_roundtrip() {
        let store = StateStore::new();
        store.set("app.answer", 42);
        assert_eq!(store.get("app.answer"), Some(Value::from(42)));
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let store = StateStore::new();
        store.set("a.b.c.d", "deep");
        assert_eq!(store.get("a.b.c.d"), Some(Value::from("deep")));
        assert!(store.get("a.b.c").is_some());
    }

    #[test]
    fn get_missing_segment_is_none() {
        let store = StateStore::new();
        store.set("a.b", 1);
        assert_eq!(store.get("a.b.c"), None);
        assert_eq!(store.get("missing.entirely"), None);
    }

    #[test]
    fn null_is_a_value_distinct_from_absent() {
        let store = StateStore::new();
        store.set("maybe", Value::Null);
        assert_eq!(store.get("maybe"), Some(Value::Null));
        assert_eq!(store.get("never"), None);
    }

    #[test]
    fn exact_and_wildcard_listeners_both_fire() {
        let store = StateStore::new();
        let exact = Arc::new(AtomicUsize::new(0));
        let wildcard = Arc::new(AtomicUsize::new(0));

        let exact_clone = Arc::clone(&exact);
        store.subscribe("watched.path", move |_| {
            exact_clone.fetch_add(1, Ordering::SeqCst);
        });
        let wildcard_clone = Arc::clone(&wildcard);
        store.subscribe_any(move |_| {
            wildcard_clone.fetch_add(1, Ordering::SeqCst);
        });

        store.set("watched.path", 1);
        store.set("other.path", 2);

        assert_eq!(exact.load(Ordering::SeqCst), 1);
        assert_eq!(wildcard.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn listener_sees_old_and_new_values() {
        let store = StateStore::new();
        let seen: Arc<Mutex<Vec<(Option<Value>, Value)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        store.subscribe("counter", move |event| {
            seen_clone
                .lock()
                .push((event.old_value.clone(), event.new_value.clone()));
        });

        store.set("counter", 1);
        store.set("counter", 2);

        let seen = seen.lock();
        assert_eq!(seen[0], (None, Value::from(1)));
        assert_eq!(seen[1], (Some(Value::from(1)), Value::from(2)));
    }

    #[test]
    fn panicking_listener_does_not_block_write_or_peers() {
        let store = StateStore::new();
        let called = Arc::new(AtomicUsize::new(0));

        store.subscribe("flaky", |_| panic!("listener bug"));
        let called_clone = Arc::clone(&called);
        store.subscribe("flaky", move |_| {
            called_clone.fetch_add(1, Ordering::SeqCst);
        });

        store.set("flaky", true);

        assert_eq!(store.get("flaky"), Some(Value::Bool(true)));
        assert_eq!(called.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reentrant_write_from_listener_is_queued_not_recursed() {
        let store = Arc::new(StateStore::new());
        let order: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let store_clone = Arc::clone(&store);
        let order_clone = Arc::clone(&order);
        store.subscribe("trigger", move |_| {
            order_clone.lock().push("trigger".into());
            // Writes from inside a listener queue behind the current event.
            store_clone.set("echo", 1);
        });
        let order_clone = Arc::clone(&order);
        store.subscribe("echo", move |_| {
            order_clone.lock().push("echo".into());
        });

        store.set("trigger", 1);

        assert_eq!(*order.lock(), vec!["trigger".to_string(), "echo".to_string()]);
        assert_eq!(store.get("echo"), Some(Value::from(1)));
    }

    #[test]
    fn push_appends_and_creates_array() {
        let store = StateStore::new();
        store.push("log.entries", "first");
        store.push("log.entries", "second");
        assert_eq!(
            store.get("log.entries"),
            Some(serde_json::json!(["first", "second"]))
        );
    }

    #[test]
    fn increment_counts_from_zero() {
        let store = StateStore::new();
        store.increment("count", 1);
        store.increment("count", 2);
        assert_eq!(store.get("count"), Some(Value::from(3)));
    }

    #[test]
    fn empty_path_write_is_ignored() {
        let store = StateStore::new();
        store.set("", 1);
        assert_eq!(store.get(""), None);
    }

    #[test]
    fn default_shape_is_seeded() {
        let store = StateStore::new();
        assert_eq!(
            store.get("initialization.status"),
            Some(Value::from("starting"))
        );
        assert_eq!(store.get("performance.error_count"), Some(Value::from(0)));
        assert!(store.get("initialization.session").is_some());
    }
}
