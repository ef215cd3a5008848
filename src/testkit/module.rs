//! Ready-made scripted module shapes.

use std::sync::Arc;

use tokio::time::Duration;

use crate::module::sim::SimModule;

/// A module that is immediately available and initializes instantly.
#[must_use]
pub fn instant() -> Arc<SimModule> {
    Arc::new(SimModule::new())
}

/// A module that fails its first `failures` init attempts, then succeeds.
#[must_use]
pub fn flaky(failures: u32) -> Arc<SimModule> {
    Arc::new(SimModule::new().with_init_failures(failures))
}

/// A module whose every init attempt fails.
#[must_use]
pub fn broken() -> Arc<SimModule> {
    Arc::new(SimModule::new().failing_always())
}

/// A module whose availability probe never succeeds.
#[must_use]
pub fn unavailable() -> Arc<SimModule> {
    Arc::new(SimModule::new().never_available())
}

/// A module that takes `delay` inside each initialization call.
#[must_use]
pub fn slow_init(delay: Duration) -> Arc<SimModule> {
    Arc::new(SimModule::new().with_init_delay(delay))
}
