//! Failure routing, degraded-mode policies, and the last-resort notice.
//!
//! Failures not tied to a specific module load arrive here over two
//! channels: a process panic hook (uncaught synchronous failures) and a
//! cloneable [`FailureReporter`] that spawned tasks use for uncaught
//! asynchronous failures. Every failure is counted and appended to the
//! audit trail; whether it keeps propagating depends on the runtime mode.

use std::panic;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::Mode;
use crate::state::{paths, FailureRecord, StateStore};

/// Cloneable handle for routing uncaught asynchronous failures.
#[derive(Clone)]
pub struct FailureReporter {
    tx: mpsc::UnboundedSender<FailureRecord>,
}

impl FailureReporter {
    pub fn report(&self, record: FailureRecord) {
        let _ = self.tx.send(record);
    }
}

/// One degraded-mode action; individually best-effort.
pub trait DegradedAction: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, store: &StateStore) -> anyhow::Result<()>;
}

struct PreferenceAction {
    name: &'static str,
    path: &'static str,
}

impl DegradedAction for PreferenceAction {
    fn name(&self) -> &str {
        self.name
    }

    fn apply(&self, store: &StateStore) -> anyhow::Result<()> {
        store.set(self.path, true);
        Ok(())
    }
}

/// Last-resort presentation of a fatal boot failure.
///
/// The presentation layer is an external collaborator; embedders inject
/// their own implementation. The default logs a minimal notice with a
/// restart affordance.
pub trait EmergencyPresenter: Send + Sync {
    fn present(&self, error: &str);
}

/// Default presenter: a minimal non-interactive log notice.
pub struct LogPresenter;

impl EmergencyPresenter for LogPresenter {
    fn present(&self, error: &str) {
        error!(error = %error, "boot failed beyond recovery; restart the application");
    }
}

/// Routes global failures and applies degraded-mode policy.
pub struct RecoveryCoordinator {
    store: Arc<StateStore>,
    mode: Mode,
    actions: Vec<Box<dyn DegradedAction>>,
    presenter: Box<dyn EmergencyPresenter>,
    reporter: FailureReporter,
}

impl RecoveryCoordinator {
    /// Coordinator with no degraded actions and the log presenter.
    #[must_use]
    pub fn new(store: Arc<StateStore>, mode: Mode) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<FailureRecord>();
        let drain_store = Arc::clone(&store);
        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                warn!(
                    module = record.module.as_deref().unwrap_or("<global>"),
                    critical = record.critical,
                    error = %record.error,
                    "uncaught failure routed to recovery"
                );
                record.record(&drain_store);
            }
        });
        Self {
            store,
            mode,
            actions: Vec::new(),
            presenter: Box::new(LogPresenter),
            reporter: FailureReporter { tx },
        }
    }

    /// Coordinator pre-populated with the built-in degraded-surface
    /// actions: minimal navigation wiring, static placeholders for
    /// interactive surfaces, and low-fidelity visuals.
    #[must_use]
    pub fn with_default_actions(store: Arc<StateStore>, mode: Mode) -> Self {
        let mut coordinator = Self::new(store, mode);
        coordinator.add_action(Box::new(PreferenceAction {
            name: "minimal_navigation",
            path: paths::PREF_MINIMAL_NAVIGATION,
        }));
        coordinator.add_action(Box::new(PreferenceAction {
            name: "static_placeholders",
            path: paths::PREF_STATIC_PLACEHOLDERS,
        }));
        coordinator.add_action(Box::new(PreferenceAction {
            name: "low_fidelity",
            path: paths::PREF_LOW_FIDELITY,
        }));
        coordinator
    }

    pub fn add_action(&mut self, action: Box<dyn DegradedAction>) {
        self.actions.push(action);
    }

    pub fn set_presenter(&mut self, presenter: Box<dyn EmergencyPresenter>) {
        self.presenter = presenter;
    }

    /// Handle for spawned tasks to report uncaught failures.
    #[must_use]
    pub fn reporter(&self) -> FailureReporter {
        self.reporter.clone()
    }

    /// Install a process panic hook that records panics as global
    /// failures. In development mode the previously installed hook still
    /// runs afterwards; in production the panic is recorded and goes no
    /// further.
    pub fn install_panic_hook(&self) {
        let reporter = self.reporter.clone();
        let mode = self.mode;
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let message = info
                .payload()
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| info.payload().downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic with non-string payload".to_string());
            let location = info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_else(|| "<unknown>".to_string());
            reporter.report(FailureRecord::global(
                format!("panic at {location}: {message}"),
                true,
            ));
            if mode == Mode::Development {
                previous(info);
            }
        }));
    }

    /// Apply the fixed, ordered list of degraded-mode actions.
    ///
    /// Every action is attempted regardless of earlier failures; returns
    /// true only when all of them applied cleanly.
    pub fn attempt_graceful_degradation(&self) -> bool {
        info!(actions = self.actions.len(), "attempting graceful degradation");
        let mut failures = 0;
        for action in &self.actions {
            match action.apply(&self.store) {
                Ok(()) => info!(action = action.name(), "degraded action applied"),
                Err(err) => {
                    failures += 1;
                    warn!(action = action.name(), error = %err, "degraded action failed, continuing");
                }
            }
        }
        self.store.set(paths::DEGRADED, true);
        failures == 0
    }

    /// Show the minimal emergency notice; invoked only when graceful
    /// degradation itself fails.
    pub fn emergency_notice(&self, error: &str) {
        self.store.set(paths::EMERGENCY, true);
        self.presenter.present(error);
    }
}
