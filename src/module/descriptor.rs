//! Per-module load policy.

use serde::Deserialize;

/// Load policy for one named module.
///
/// Deserialized from the `[[modules]]` tables of the boot configuration;
/// the defaults match a forgiving optional module.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleDescriptor {
    /// Unique module name; doubles as the store key under `features.*`.
    pub name: String,

    /// Whether a terminal failure of this module is fatal to a blocking
    /// phase.
    #[serde(default)]
    pub required: bool,

    /// Budget for one attempt: the availability probe and the
    /// initialization routine each get at most this long.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries after the first failed attempt; `max_retries = N` allows
    /// `N + 1` attempts in total.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Named fallback strategy applied once retries are exhausted.
    #[serde(default)]
    pub fallback: Option<String>,
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_max_retries() -> u32 {
    2
}

impl ModuleDescriptor {
    /// Descriptor with default policy for `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            fallback: None,
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, strategy: impl Into<String>) -> Self {
        self.fallback = Some(strategy.into());
        self
    }
}
