//! In-process fallback buffer used when no remote store is configured.
//!
//! Contents live for the lifetime of the process only. Reads filter by tool
//! name and truncate in insertion order; unlike the remote path they are
//! not sorted by recency.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;

use super::records::{AnalyticsEvent, GeneratedContent, Interaction, UserPreferences};

/// Synthetic id returned for fallback writes. Not unique within one millisecond.
#[must_use]
pub fn fallback_id() -> String {
    format!("fallback_{}", Utc::now().timestamp_millis())
}

#[derive(Debug, Default)]
struct Buffers {
    interactions: Vec<Interaction>,
    content: Vec<GeneratedContent>,
    analytics: Vec<AnalyticsEvent>,
    preferences: BTreeMap<String, UserPreferences>,
}

/// Per-collection record counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FallbackCounts {
    pub interactions: usize,
    pub content: usize,
    pub analytics: usize,
    pub preferences: usize,
}

/// Point-in-time copy of every buffer, for diagnostics and export.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FallbackSnapshot {
    pub interactions: Vec<Interaction>,
    pub content: Vec<GeneratedContent>,
    pub analytics: Vec<AnalyticsEvent>,
    pub preferences: BTreeMap<String, UserPreferences>,
}

/// Append-only in-memory buffers mirroring the remote collections.
///
/// The lock is held only for the synchronous append or scan, never across
/// an await, so appends keep program order.
#[derive(Debug, Default)]
pub struct FallbackStore {
    inner: Mutex<Buffers>,
}

impl FallbackStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_interaction(&self, record: Interaction) {
        self.inner.lock().interactions.push(record);
    }

    pub fn push_content(&self, record: GeneratedContent) {
        self.inner.lock().content.push(record);
    }

    pub fn push_analytics(&self, record: AnalyticsEvent) {
        self.inner.lock().analytics.push(record);
    }

    /// Replace the preferences stored for `user_id`.
    pub fn put_preferences(&self, user_id: &str, preferences: UserPreferences) {
        self.inner
            .lock()
            .preferences
            .insert(user_id.to_string(), preferences);
    }

    #[must_use]
    pub fn preferences(&self, user_id: &str) -> Option<UserPreferences> {
        self.inner.lock().preferences.get(user_id).cloned()
    }

    /// Analytics events whose `eventData.toolName` equals `tool_name`, first `limit` in insertion order.
    #[must_use]
    pub fn analytics(&self, tool_name: Option<&str>, limit: usize) -> Vec<AnalyticsEvent> {
        self.inner
            .lock()
            .analytics
            .iter()
            .filter(|event| tool_name.is_none_or(|tool| event.tool_name() == Some(tool)))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Content records whose `toolName` equals `tool_name`, first `limit` in insertion order.
    #[must_use]
    pub fn content(&self, tool_name: Option<&str>, limit: usize) -> Vec<GeneratedContent> {
        self.inner
            .lock()
            .content
            .iter()
            .filter(|record| tool_name.is_none_or(|tool| record.tool_name == tool))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Interactions for `tool_name`, first `limit` in insertion order.
    #[must_use]
    pub fn interactions(&self, tool_name: Option<&str>, limit: usize) -> Vec<Interaction> {
        self.inner
            .lock()
            .interactions
            .iter()
            .filter(|record| tool_name.is_none_or(|tool| record.tool_name == tool))
            .take(limit)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn counts(&self) -> FallbackCounts {
        let inner = self.inner.lock();
        FallbackCounts {
            interactions: inner.interactions.len(),
            content: inner.content.len(),
            analytics: inner.analytics.len(),
            preferences: inner.preferences.len(),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> FallbackSnapshot {
        let inner = self.inner.lock();
        FallbackSnapshot {
            interactions: inner.interactions.clone(),
            content: inner.content.clone(),
            analytics: inner.analytics.clone(),
            preferences: inner.preferences.clone(),
        }
    }
}
