//! Diagnostic logging setup.
//!
//! Library code only emits `tracing` events; installing a subscriber is the
//! host's decision. The CLI calls [`init`] once at startup.

use tracing_subscriber::EnvFilter;

/// How chatty the installed subscriber should be when `RUST_LOG` is unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Info for dependencies, debug for toolpulse.
    #[default]
    Normal,
    /// Trace for toolpulse.
    Verbose,
}

impl Verbosity {
    fn default_directive(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "info,toolpulse=debug",
            Self::Verbose => "info,toolpulse=trace",
        }
    }
}

/// Install a compact stderr subscriber. `RUST_LOG` overrides `verbosity`.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init(verbosity: Verbosity) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .try_init()
        .is_ok()
}
