//! Ignition - Phased application bootstrap orchestration.
//!
//! This crate brings up a set of interdependent subsystems ("modules") in
//! a controlled order, tolerates partial failure, retries transiently
//! failing modules with exponential backoff, falls back to degraded
//! behavior when a module is unrecoverable, and exposes an observable
//! process-wide state that the rest of the program reacts to.
//!
//! # Architecture
//!
//! - **[`state`]** - The single shared [`StateStore`](state::StateStore):
//!   a dot-path map with synchronous publish/subscribe. Everything else
//!   reads and writes through it.
//! - **[`module`]** - The pluggable [`Module`](module::Module) contract
//!   and the [`ModuleLoader`](module::ModuleLoader) that turns a name into
//!   a terminal loaded/failed outcome: availability probing, init
//!   timeouts, bounded retry with backoff, fallback strategies.
//! - **[`phase`]** - Ordered boot phases with blocking/required policy;
//!   fan-out/fan-in within a phase, strict ordering between phases.
//! - **[`monitor`]** - Interval health sampling and operation timing.
//! - **[`recovery`]** - Global failure routing, degraded-mode actions,
//!   and the last-resort emergency notice.
//! - **[`smoke`]** - The post-boot smoke battery.
//! - **[`orchestrator`]** - The top-level driver sequencing all of the
//!   above and publishing the readiness signal.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ignition::config::BootConfig;
//! use ignition::module::sim::SimModule;
//! use ignition::orchestrator::Orchestrator;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BootConfig::load("ignition.toml")?;
//! let orchestrator = Orchestrator::builder(config)
//!     .module("navigation", Arc::new(SimModule::new()))?
//!     .build();
//! let report = orchestrator.boot().await;
//! println!("ready: {}", report.is_ready());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod module;
pub mod monitor;
pub mod orchestrator;
pub mod phase;
pub mod recovery;
pub mod smoke;
pub mod state;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
