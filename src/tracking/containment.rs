//! Failure absorption for telemetry calls.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Turns a failed telemetry call into `None` after logging it.
///
/// One attempt per call: no retry, no delay. Clones share the absorbed-failure
/// counter.
#[derive(Debug, Clone, Default)]
pub struct Containment {
    absorbed: Arc<AtomicU64>,
}

impl Containment {
    /// New containment with a zeroed counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Await `op` once; `Ok(v)` becomes `Some(v)`, `Err(e)` is logged and becomes `None`.
    pub async fn absorb<T, E, F>(&self, context: &str, op: F) -> Option<T>
    where
        E: Display,
        F: Future<Output = Result<T, E>>,
    {
        match op.await {
            Ok(value) => Some(value),
            Err(e) => {
                self.absorbed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(context, error = %e, "telemetry operation failed; continuing");
                None
            }
        }
    }

    /// Number of failures absorbed so far.
    #[must_use]
    pub fn absorbed_failures(&self) -> u64 {
        self.absorbed.load(Ordering::Relaxed)
    }
}
