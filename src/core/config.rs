//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, TpError};

/// Substring that marks a backend field as an unfilled template value.
pub const PLACEHOLDER_MARKER: &str = "your-";

/// Full toolpulse configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub session: SessionConfig,
    pub query: QueryConfig,
    pub generation: GenerationConfig,
    pub tracking: TrackingConfig,
    pub paths: PathsConfig,
}

/// Remote document-store project settings.
///
/// The shipped defaults are template placeholders, so an unedited config
/// routes everything to the in-process fallback buffer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct BackendConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub storage_bucket: String,
    pub messaging_sender_id: String,
    pub app_id: String,
}

impl BackendConfig {
    /// Whether the remote store is usable: none of `api_key`, `project_id`,
    /// `auth_domain` still carries the placeholder marker.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        [&self.api_key, &self.project_id, &self.auth_domain]
            .iter()
            .all(|field| !field.contains(PLACEHOLDER_MARKER))
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_key: "your-api-key-here".to_string(),
            auth_domain: "your-project.firebaseapp.com".to_string(),
            project_id: "your-project-id".to_string(),
            storage_bucket: "your-project.appspot.com".to_string(),
            messaging_sender_id: "123456789".to_string(),
            app_id: "your-app-id".to_string(),
        }
    }
}

/// Session-scoped storage settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Key under which the session id is kept in session storage.
    pub storage_key: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_key: "a1utility_session_id".to_string(),
        }
    }
}

/// Default result limits for read queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueryConfig {
    pub analytics_limit: usize,
    pub content_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            analytics_limit: 100,
            content_limit: 10,
        }
    }
}

/// Content-generation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GenerationConfig {
    pub endpoint: String,
    /// Client-side request timeout applied by the HTTP transport.
    pub timeout_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://a1utilityhub.onrender.com/api/prompt".to_string(),
            timeout_ms: 30_000,
        }
    }
}

/// Envelope enrichment knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TrackingConfig {
    /// User agent reported when the host does not supply one.
    pub user_agent: String,
    /// Page URL reported when the host does not supply one.
    pub page_url: String,
    /// Attach the caller's public IP to remote interaction records.
    pub capture_client_ip: bool,
    pub ip_lookup_url: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("toolpulse/", env!("CARGO_PKG_VERSION")).to_string(),
            page_url: "about:blank".to_string(),
            capture_client_ip: false,
            ip_lookup_url: "https://api.ipify.org?format=json".to_string(),
        }
    }
}

/// Filesystem paths used by toolpulse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    /// SQLite document store used as the remote backend when set.
    pub document_db: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);
        Self {
            config_file: home_dir.join(".config").join("toolpulse").join("config.toml"),
            document_db: None,
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| TpError::io(&path_buf, source))?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(TpError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // backend
        for (name, slot) in [
            ("TOOLPULSE_API_KEY", &mut self.backend.api_key),
            ("TOOLPULSE_AUTH_DOMAIN", &mut self.backend.auth_domain),
            ("TOOLPULSE_PROJECT_ID", &mut self.backend.project_id),
            ("TOOLPULSE_STORAGE_BUCKET", &mut self.backend.storage_bucket),
            (
                "TOOLPULSE_MESSAGING_SENDER_ID",
                &mut self.backend.messaging_sender_id,
            ),
            ("TOOLPULSE_APP_ID", &mut self.backend.app_id),
            ("TOOLPULSE_SESSION_KEY", &mut self.session.storage_key),
            ("TOOLPULSE_GENERATION_ENDPOINT", &mut self.generation.endpoint),
            ("TOOLPULSE_USER_AGENT", &mut self.tracking.user_agent),
            ("TOOLPULSE_PAGE_URL", &mut self.tracking.page_url),
            ("TOOLPULSE_IP_LOOKUP_URL", &mut self.tracking.ip_lookup_url),
        ] {
            if let Some(raw) = lookup(name) {
                *slot = raw;
            }
        }

        // query
        if let Some(raw) = lookup("TOOLPULSE_ANALYTICS_LIMIT") {
            self.query.analytics_limit = parse_env_usize("TOOLPULSE_ANALYTICS_LIMIT", &raw)?;
        }
        if let Some(raw) = lookup("TOOLPULSE_CONTENT_LIMIT") {
            self.query.content_limit = parse_env_usize("TOOLPULSE_CONTENT_LIMIT", &raw)?;
        }

        // generation
        if let Some(raw) = lookup("TOOLPULSE_GENERATION_TIMEOUT_MS") {
            self.generation.timeout_ms = parse_env_u64("TOOLPULSE_GENERATION_TIMEOUT_MS", &raw)?;
        }

        // tracking
        if let Some(raw) = lookup("TOOLPULSE_CAPTURE_CLIENT_IP") {
            self.tracking.capture_client_ip = parse_env_bool("TOOLPULSE_CAPTURE_CLIENT_IP", &raw)?;
        }

        // paths
        if let Some(raw) = lookup("TOOLPULSE_DOCUMENT_DB") {
            self.paths.document_db = Some(PathBuf::from(raw));
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.session.storage_key.trim().is_empty() {
            return Err(TpError::InvalidConfig {
                details: "session.storage_key must not be empty".to_string(),
            });
        }

        for (name, val) in [
            ("analytics_limit", self.query.analytics_limit),
            ("content_limit", self.query.content_limit),
        ] {
            if val == 0 {
                return Err(TpError::InvalidConfig {
                    details: format!("query.{name} must be > 0"),
                });
            }
        }

        let endpoint = self.generation.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(TpError::InvalidConfig {
                details: format!("generation.endpoint must be an http(s) URL, got {endpoint:?}"),
            });
        }
        if self.generation.timeout_ms == 0 {
            return Err(TpError::InvalidConfig {
                details: "generation.timeout_ms must be > 0".to_string(),
            });
        }

        if self.tracking.capture_client_ip && self.tracking.ip_lookup_url.trim().is_empty() {
            return Err(TpError::InvalidConfig {
                details: "tracking.ip_lookup_url is required when capture_client_ip is on"
                    .to_string(),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>().map_err(|error| TpError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn parse_env_usize(name: &str, raw: &str) -> Result<usize> {
    raw.parse::<usize>().map_err(|error| TpError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.parse::<bool>().map_err(|error| TpError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
