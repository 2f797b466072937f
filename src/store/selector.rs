//! Remote-vs-fallback routing decision.

use std::fmt;

use parking_lot::RwLock;
use serde::Serialize;

use crate::core::config::BackendConfig;

/// Which backend a call was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// The configured remote document store.
    Remote,
    /// The in-process fallback buffer.
    Fallback,
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote => f.write_str("remote"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// Holds the backend configuration and answers "is the remote store configured?".
///
/// The answer is recomputed from the current configuration on every call, so
/// [`BackendSelector::reconfigure`] takes effect on the very next operation.
#[derive(Debug)]
pub struct BackendSelector {
    config: RwLock<BackendConfig>,
}

impl BackendSelector {
    /// Create a selector over `config`.
    #[must_use]
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Whether the remote path should be taken.
    #[must_use]
    pub fn is_remote_configured(&self) -> bool {
        self.config.read().is_configured()
    }

    /// Routing decision for the next call.
    #[must_use]
    pub fn mode(&self) -> BackendMode {
        if self.is_remote_configured() {
            BackendMode::Remote
        } else {
            BackendMode::Fallback
        }
    }

    /// Replace the backend configuration at runtime.
    pub fn reconfigure(&self, config: BackendConfig) {
        let configured = config.is_configured();
        *self.config.write() = config;
        tracing::info!(configured, "backend configuration replaced");
    }

    /// Copy of the current configuration.
    #[must_use]
    pub fn config(&self) -> BackendConfig {
        self.config.read().clone()
    }
}
