
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ignition::state::{paths, BootStatus, StateStore};
use ignition::testkit::store::RecordingListener;

#[test]
fn snapshot_reflects_seeded_defaults() {
    let store = StateStore::new();
    let snapshot = store.snapshot();

    assert_eq!(snapshot.status, Some(BootStatus::Starting));
    assert!(snapshot.session.is_some());
    assert!(snapshot.loaded_modules.is_empty());
    assert!(snapshot.failed_modules.is_empty());
    assert_eq!(snapshot.error_count, 0);
    assert!(snapshot.boot_duration_ms.is_none());
}

#[test]
fn snapshot_collects_feature_flags() {
    let store = StateStore::new();
    store.set(&paths::feature_ready("navigation"), true);
    store.set(&paths::feature_ready("extras"), false);

    let snapshot = store.snapshot();
    assert_eq!(snapshot.feature_flags.get("navigation"), Some(&true));
    assert_eq!(snapshot.feature_flags.get("extras"), Some(&false));
}

#[test]
fn recording_listener_sees_writes_in_order() {
    let store = StateStore::new();
    let recorder = RecordingListener::new();
    recorder.attach_any(&store);

    store.set("one", 1);
    store.set("two", 2);

    assert_eq!(recorder.paths(), vec!["one".to_string(), "two".to_string()]);
}

#[test]
fn throwing_subscriber_cannot_break_the_write_path() {
    let store = StateStore::new();
    let survivors = Arc::new(AtomicUsize::new(0));

    // Both an exact-path and a wildcard listener panic; the write and the
    // remaining listeners must be unaffected.
    store.subscribe(paths::INIT_STATUS, |_| panic!("exact listener bug"));
    store.subscribe_any(|_| panic!("wildcard listener bug"));
    let survivors_clone = Arc::clone(&survivors);
    store.subscribe(paths::INIT_STATUS, move |_| {
        survivors_clone.fetch_add(1, Ordering::SeqCst);
    });

    store.set(paths::INIT_STATUS, BootStatus::Loading.as_str());

    assert_eq!(
        store.get(paths::INIT_STATUS),
        Some("loading".into())
    );
    assert_eq!(survivors.load(Ordering::SeqCst), 1);
}

#[test]
fn wildcard_listener_observes_every_component_write() {
    let store = StateStore::new();
    let recorder = RecordingListener::new();
    recorder.attach_any(&store);

    store.push(paths::LOADED_MODULES, "store");
    store.increment(paths::ERROR_COUNT, 1);
    store.set(&paths::feature_ready("store"), true);

    assert_eq!(recorder.len(), 3);
}

#[test]
fn timestamps_are_monotone_nondecreasing() {
    let store = StateStore::new();
    let recorder = RecordingListener::new();
    recorder.attach_any(&store);

    for i in 0..5 {
        store.set("tick", i);
    }

    let events = recorder.events();
    for pair in events.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
}
