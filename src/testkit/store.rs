//! Recording listener for asserting state notifications.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::state::{ChangeEvent, StateStore};

/// Collects every [`ChangeEvent`] delivered to it.
#[derive(Clone, Default)]
pub struct RecordingListener {
    events: Arc<Mutex<Vec<ChangeEvent>>>,
}

impl RecordingListener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe this recorder to an exact path.
    pub fn attach(&self, store: &StateStore, path: &str) {
        let events = Arc::clone(&self.events);
        store.subscribe(path, move |event| {
            events.lock().push(event.clone());
        });
    }

    /// Subscribe this recorder to the wildcard channel.
    pub fn attach_any(&self, store: &StateStore) {
        let events = Arc::clone(&self.events);
        store.subscribe_any(move |event| {
            events.lock().push(event.clone());
        });
    }

    #[must_use]
    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().clone()
    }

    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.path.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}
