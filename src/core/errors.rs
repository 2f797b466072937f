//! TP-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::store::backend::BackendError;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, TpError>;

/// Top-level error type for toolpulse.
#[derive(Debug, Error)]
pub enum TpError {
    #[error("[TP-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[TP-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[TP-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[TP-2001] backend failure: {0}")]
    Backend(#[from] BackendError),

    #[error("[TP-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[TP-3001] generation request failed: {message}")]
    RequestFailed {
        status: Option<u16>,
        message: String,
    },

    #[error("[TP-3002] generation returned no content for {tool}")]
    EmptyResponse { tool: String },

    #[error("[TP-3101] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[TP-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl TpError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "TP-1001",
            Self::MissingConfig { .. } => "TP-1002",
            Self::ConfigParse { .. } => "TP-1003",
            Self::Backend(_) => "TP-2001",
            Self::Serialization { .. } => "TP-2101",
            Self::RequestFailed { .. } => "TP-3001",
            Self::EmptyResponse { .. } => "TP-3002",
            Self::Io { .. } => "TP-3101",
            Self::Runtime { .. } => "TP-3900",
        }
    }

    /// Whether this is a generation-request failure the caller must see.
    #[must_use]
    pub const fn is_generation_failure(&self) -> bool {
        matches!(self, Self::RequestFailed { .. } | Self::EmptyResponse { .. })
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for TpError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for TpError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::backend::Collection;

    fn all_variants() -> Vec<TpError> {
        vec![
            TpError::InvalidConfig {
                details: String::new(),
            },
            TpError::MissingConfig {
                path: PathBuf::new(),
            },
            TpError::ConfigParse {
                context: "",
                details: String::new(),
            },
            TpError::Backend(BackendError::Unavailable),
            TpError::Serialization {
                context: "",
                details: String::new(),
            },
            TpError::RequestFailed {
                status: None,
                message: String::new(),
            },
            TpError::EmptyResponse {
                tool: String::new(),
            },
            TpError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
            TpError::Runtime {
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = all_variants();
        let codes: Vec<&str> = errors.iter().map(TpError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn error_codes_have_tp_prefix() {
        for err in &all_variants() {
            assert!(
                err.code().starts_with("TP-"),
                "code {} must start with TP-",
                err.code()
            );
        }
    }

    #[test]
    fn error_display_includes_code() {
        let err = TpError::RequestFailed {
            status: Some(502),
            message: "upstream unavailable".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("TP-3001"), "display should contain code: {msg}");
        assert!(
            msg.contains("upstream unavailable"),
            "display should contain details: {msg}"
        );
    }

    #[test]
    fn generation_failures_are_flagged() {
        assert!(
            TpError::EmptyResponse {
                tool: "text_rewriter".to_string()
            }
            .is_generation_failure()
        );
        assert!(
            TpError::RequestFailed {
                status: None,
                message: "x".to_string()
            }
            .is_generation_failure()
        );
        assert!(
            !TpError::Backend(BackendError::Write {
                collection: Collection::Analytics,
                details: "denied".to_string(),
            })
            .is_generation_failure()
        );
    }

    #[test]
    fn backend_error_converts_with_code() {
        let err: TpError = BackendError::Unavailable.into();
        assert_eq!(err.code(), "TP-2001");
    }

    #[test]
    fn io_convenience_constructor() {
        let err = TpError::io(
            "/tmp/toolpulse.toml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "TP-3101");
        assert!(err.to_string().contains("/tmp/toolpulse.toml"));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: TpError = json_err.into();
        assert_eq!(err.code(), "TP-2101");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: TpError = toml_err.into();
        assert_eq!(err.code(), "TP-1003");
    }
}
