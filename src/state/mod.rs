//! Process-wide versioned state store with synchronous publish/subscribe.
//!
//! The store is the only shared mutable resource in the crate: the loader,
//! monitor, recovery coordinator, and orchestrator all communicate through
//! it. It is constructor-injected everywhere; there is no hidden singleton.

pub mod paths;

mod failure;
mod snapshot;
mod store;

pub use failure::FailureRecord;
pub use snapshot::StateSnapshot;
pub use store::{ChangeEvent, StateStore};

use serde::{Deserialize, Serialize};

/// Overall boot status published under [`paths::INIT_STATUS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootStatus {
    Starting,
    Loading,
    Ready,
    Error,
}

impl BootStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    /// Parse a status string as stored in the state tree.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "starting" => Some(Self::Starting),
            "loading" => Some(Self::Loading),
            "ready" => Some(Self::Ready),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for BootStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
