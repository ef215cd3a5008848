//! The pluggable module contract and the loading machinery around it.
//!
//! A module is a named, independently initializable subsystem with an
//! availability probe and an initialization routine. The loader turns a
//! module name into a terminal `loaded`/`failed` outcome exactly once per
//! attempt chain, honoring timeouts, bounded retries, and fallback
//! strategies.

mod descriptor;
pub mod fallback;
mod loader;
pub mod sim;

pub use descriptor::ModuleDescriptor;
pub use loader::{LoadOutcome, ModuleLoader};

use async_trait::async_trait;
use tokio::sync::watch;

/// Contract the orchestrator requires from any pluggable subsystem.
#[async_trait]
pub trait Module: Send + Sync {
    /// Non-blocking readiness probe; callable repeatedly without side
    /// effects.
    fn is_available(&self) -> bool;

    /// Initialization entry point; idempotent on success. The loader
    /// imposes a hard timeout, so implementations must not hold exclusive
    /// resources across an await that could outlive it.
    async fn initialize(&self) -> anyhow::Result<()>;

    /// Optional one-shot readiness notification. When present, the loader
    /// waits on it instead of polling `is_available`.
    fn ready_signal(&self) -> Option<watch::Receiver<bool>> {
        None
    }
}
