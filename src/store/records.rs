//! Record kinds persisted by the event store.
//!
//! Every record is an envelope (timestamp, session id, and per-kind context)
//! around an opaque payload. Field names serialize in camelCase so fallback
//! records and remote documents share one schema.

#![allow(missing_docs)]

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::backend::Fields;

/// A tool call with its inputs and outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    /// Backend id, or the synthetic fallback id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub tool_name: String,
    #[serde(default)]
    pub input_data: Fields,
    #[serde(default)]
    pub output_data: Fields,
    pub timestamp: DateTime<Utc>,
    pub user_agent: String,
    pub session_id: String,
    /// Caller's public address, captured on the remote path when enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

/// Size and timing annotations for a generated-content record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_length: Option<usize>,
    /// Milliseconds from request start to response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_data: Option<Fields>,
}

/// Text produced by a tool. `content` may be empty but is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub tool_name: String,
    pub content: String,
    #[serde(default)]
    pub metadata: ContentMetadata,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
}

/// A named analytics event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub event_name: String,
    #[serde(default)]
    pub event_data: Fields,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub user_agent: String,
    pub url: String,
}

impl AnalyticsEvent {
    /// `eventData.toolName`, when it is a string.
    #[must_use]
    pub fn tool_name(&self) -> Option<&str> {
        self.event_data.get("toolName").and_then(Value::as_str)
    }
}

/// One user's preferences, replaced wholesale on every save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub values: Fields,
}

/// Conventional analytics event names. Any other string is accepted too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    ApiCallStart,
    ApiCallSuccess,
    ApiCallError,
    ApiCallNoResponse,
    ToolUsage,
    FormSubmission,
    PageView,
    UserAction,
}

impl EventName {
    pub const ALL: [Self; 8] = [
        Self::ApiCallStart,
        Self::ApiCallSuccess,
        Self::ApiCallError,
        Self::ApiCallNoResponse,
        Self::ToolUsage,
        Self::FormSubmission,
        Self::PageView,
        Self::UserAction,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ApiCallStart => "api_call_start",
            Self::ApiCallSuccess => "api_call_success",
            Self::ApiCallError => "api_call_error",
            Self::ApiCallNoResponse => "api_call_no_response",
            Self::ToolUsage => "tool_usage",
            Self::FormSubmission => "form_submission",
            Self::PageView => "page_view",
            Self::UserAction => "user_action",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unwrap a `json!({...})` literal into a payload map; non-objects become empty.
#[must_use]
pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}
