//! Dual-backend event store.
//!
//! Every operation asks the [`BackendSelector`] which path to take. The
//! remote path talks to an injected [`DocumentStore`]; the fallback path
//! appends to the in-process [`FallbackStore`]. A call never touches both.
//! Remote failures are returned to the caller unchanged.

#![allow(missing_docs)]

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use super::backend::{
    BackendError, Collection, Direction, Document, DocumentStore, DocumentWrite, Fields, Query,
};
use super::client_ip::{IpResolver, IpifyResolver};
use super::fallback::{FallbackStore, fallback_id};
use super::records::{
    AnalyticsEvent, ContentMetadata, GeneratedContent, Interaction, UserPreferences,
};
use super::selector::{BackendMode, BackendSelector};
use crate::core::config::{Config, QueryConfig};
use crate::page::{PageContext, StaticPage};
use crate::session::{MemorySessionStorage, SessionIdentity, SessionStorage};

type StoreResult<T> = std::result::Result<T, BackendError>;

enum Route<'a> {
    Remote(&'a dyn DocumentStore),
    Fallback,
}

/// Record and query interactions, generated content, analytics events and preferences.
pub struct EventStore {
    selector: BackendSelector,
    remote: Option<Arc<dyn DocumentStore>>,
    fallback: FallbackStore,
    session: SessionIdentity,
    page: Arc<dyn PageContext>,
    ip_resolver: Option<Arc<dyn IpResolver>>,
    limits: QueryConfig,
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore")
            .field("mode", &self.mode())
            .field("has_remote", &self.remote.is_some())
            .field("session", &self.session)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

/// Wires an [`EventStore`] from configuration plus injected collaborators.
pub struct EventStoreBuilder {
    config: Config,
    remote: Option<Arc<dyn DocumentStore>>,
    session_storage: Option<Arc<dyn SessionStorage>>,
    page: Option<Arc<dyn PageContext>>,
    ip_resolver: Option<Option<Arc<dyn IpResolver>>>,
}

impl EventStoreBuilder {
    /// Attach the remote document store client.
    #[must_use]
    pub fn remote(mut self, remote: Arc<dyn DocumentStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    #[must_use]
    pub fn session_storage(mut self, storage: Arc<dyn SessionStorage>) -> Self {
        self.session_storage = Some(storage);
        self
    }

    #[must_use]
    pub fn page(mut self, page: Arc<dyn PageContext>) -> Self {
        self.page = Some(page);
        self
    }

    /// Override the client-ip resolver (`None` disables lookup).
    #[must_use]
    pub fn ip_resolver(mut self, resolver: Option<Arc<dyn IpResolver>>) -> Self {
        self.ip_resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn build(self) -> EventStore {
        let Self {
            config,
            remote,
            session_storage,
            page,
            ip_resolver,
        } = self;

        let storage =
            session_storage.unwrap_or_else(|| Arc::new(MemorySessionStorage::new()) as _);
        let page = page.unwrap_or_else(|| {
            Arc::new(StaticPage::new(
                config.tracking.user_agent.clone(),
                config.tracking.page_url.clone(),
            )) as _
        });
        let ip_resolver = ip_resolver.unwrap_or_else(|| {
            config.tracking.capture_client_ip.then(|| {
                Arc::new(IpifyResolver::new(
                    reqwest::Client::new(),
                    config.tracking.ip_lookup_url.clone(),
                )) as Arc<dyn IpResolver>
            })
        });

        let selector = BackendSelector::new(config.backend);
        info!(
            mode = %selector.mode(),
            remote_attached = remote.is_some(),
            "event store ready"
        );

        EventStore {
            selector,
            remote,
            fallback: FallbackStore::new(),
            session: SessionIdentity::new(storage, config.session.storage_key),
            page,
            ip_resolver,
            limits: config.query,
        }
    }
}

impl EventStore {
    /// Start building a store from `config`.
    #[must_use]
    pub fn builder(config: Config) -> EventStoreBuilder {
        EventStoreBuilder {
            config,
            remote: None,
            session_storage: None,
            page: None,
            ip_resolver: None,
        }
    }

    #[must_use]
    pub fn selector(&self) -> &BackendSelector {
        &self.selector
    }

    #[must_use]
    pub fn fallback(&self) -> &FallbackStore {
        &self.fallback
    }

    #[must_use]
    pub fn session(&self) -> &SessionIdentity {
        &self.session
    }

    #[must_use]
    pub fn page(&self) -> &dyn PageContext {
        self.page.as_ref()
    }

    /// Path the next call will take.
    #[must_use]
    pub fn mode(&self) -> BackendMode {
        self.selector.mode()
    }

    fn route(&self) -> StoreResult<Route<'_>> {
        match self.selector.mode() {
            BackendMode::Fallback => Ok(Route::Fallback),
            BackendMode::Remote => self
                .remote
                .as_deref()
                .map(Route::Remote)
                .ok_or(BackendError::Unavailable),
        }
    }

    // ──────────────────── writes ────────────────────

    /// Record one tool call. Returns the backend id or a synthetic fallback id.
    pub async fn record_interaction(
        &self,
        tool_name: &str,
        input_data: Fields,
        output_data: Fields,
        user_agent: Option<&str>,
    ) -> StoreResult<String> {
        let collection = Collection::UserInteractions;
        require_tool_name(collection, tool_name)?;
        let mut record = Interaction {
            id: None,
            tool_name: tool_name.to_string(),
            input_data,
            output_data,
            timestamp: Utc::now(),
            user_agent: user_agent.map_or_else(|| self.page.user_agent(), str::to_string),
            session_id: self.session.session_id(),
            ip: None,
        };

        match self.route()? {
            Route::Fallback => {
                let id = fallback_id();
                record.id = Some(id.clone());
                self.fallback.push_interaction(record);
                debug!(%id, tool = tool_name, "interaction recorded (fallback)");
                Ok(id)
            }
            Route::Remote(remote) => {
                if let Some(resolver) = &self.ip_resolver {
                    record.ip = resolver.client_ip().await;
                }
                let write = DocumentWrite::from_record(collection, &record)?.stamp("timestamp");
                let id = remote.create(collection, write).await?;
                debug!(%id, tool = tool_name, "interaction recorded");
                Ok(id)
            }
        }
    }

    /// Store generated text. `content` may be empty.
    pub async fn record_generated_content(
        &self,
        tool_name: &str,
        content: &str,
        metadata: Option<ContentMetadata>,
    ) -> StoreResult<String> {
        let collection = Collection::GeneratedContent;
        require_tool_name(collection, tool_name)?;
        let mut record = GeneratedContent {
            id: None,
            tool_name: tool_name.to_string(),
            content: content.to_string(),
            metadata: metadata.unwrap_or_default(),
            timestamp: Utc::now(),
            session_id: self.session.session_id(),
        };

        match self.route()? {
            Route::Fallback => {
                let id = fallback_id();
                record.id = Some(id.clone());
                self.fallback.push_content(record);
                debug!(%id, tool = tool_name, "content stored (fallback)");
                Ok(id)
            }
            Route::Remote(remote) => {
                let write = DocumentWrite::from_record(collection, &record)?.stamp("timestamp");
                let id = remote.create(collection, write).await?;
                debug!(%id, tool = tool_name, "content stored");
                Ok(id)
            }
        }
    }

    /// Record a named analytics event with the current page url and user agent.
    pub async fn record_analytics_event(
        &self,
        event_name: &str,
        event_data: Option<Fields>,
    ) -> StoreResult<String> {
        let collection = Collection::Analytics;
        let mut record = AnalyticsEvent {
            id: None,
            event_name: event_name.to_string(),
            event_data: event_data.unwrap_or_default(),
            timestamp: Utc::now(),
            session_id: self.session.session_id(),
            user_agent: self.page.user_agent(),
            url: self.page.url(),
        };

        match self.route()? {
            Route::Fallback => {
                let id = fallback_id();
                record.id = Some(id.clone());
                self.fallback.push_analytics(record);
                debug!(%id, event = event_name, "analytics tracked (fallback)");
                Ok(id)
            }
            Route::Remote(remote) => {
                let write = DocumentWrite::from_record(collection, &record)?.stamp("timestamp");
                let id = remote.create(collection, write).await?;
                debug!(%id, event = event_name, "analytics tracked");
                Ok(id)
            }
        }
    }

    // ──────────────────── preferences ────────────────────

    /// Preferences for `user_id`, or `None` when nothing was saved.
    pub async fn get_user_preferences(&self, user_id: &str) -> StoreResult<Option<UserPreferences>> {
        match self.route()? {
            Route::Fallback => Ok(self.fallback.preferences(user_id)),
            Route::Remote(remote) => {
                let collection = Collection::UserPreferences;
                remote
                    .get(collection, user_id)
                    .await?
                    .map(|doc| decode_preferences(collection, doc))
                    .transpose()
            }
        }
    }

    /// Replace the whole preferences record for `user_id`, stamping `updatedAt`.
    pub async fn save_user_preferences(&self, user_id: &str, preferences: Fields) -> StoreResult<()> {
        match self.route()? {
            Route::Fallback => {
                let mut values = preferences;
                values.remove("updatedAt");
                self.fallback.put_preferences(
                    user_id,
                    UserPreferences {
                        updated_at: Some(Utc::now()),
                        values,
                    },
                );
                debug!(user_id, "preferences saved (fallback)");
                Ok(())
            }
            Route::Remote(remote) => {
                let write = DocumentWrite::new(preferences).stamp("updatedAt");
                remote
                    .set(Collection::UserPreferences, user_id, write)
                    .await?;
                debug!(user_id, "preferences saved");
                Ok(())
            }
        }
    }

    // ──────────────────── queries ────────────────────

    /// Analytics events, optionally for one tool.
    ///
    /// Remote: newest first, then limited. Fallback: insertion order, then limited.
    pub async fn get_analytics_data(
        &self,
        tool_name: Option<&str>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<AnalyticsEvent>> {
        let limit = limit.unwrap_or(self.limits.analytics_limit);
        match self.route()? {
            Route::Fallback => Ok(self.fallback.analytics(tool_name, limit)),
            Route::Remote(remote) => {
                let collection = Collection::Analytics;
                let query = recent_query("eventData.toolName", tool_name, limit);
                decode_all(collection, remote.query(collection, &query).await?)
            }
        }
    }

    /// Generated content, optionally for one tool. Ordering as for analytics.
    pub async fn get_popular_content(
        &self,
        tool_name: Option<&str>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<GeneratedContent>> {
        let limit = limit.unwrap_or(self.limits.content_limit);
        match self.route()? {
            Route::Fallback => Ok(self.fallback.content(tool_name, limit)),
            Route::Remote(remote) => {
                let collection = Collection::GeneratedContent;
                let query = recent_query("toolName", tool_name, limit);
                decode_all(collection, remote.query(collection, &query).await?)
            }
        }
    }
}

fn require_tool_name(collection: Collection, tool_name: &str) -> StoreResult<()> {
    if tool_name.trim().is_empty() {
        return Err(BackendError::InvalidRecord {
            collection,
            details: "toolName must not be empty".to_string(),
        });
    }
    Ok(())
}

fn recent_query(tool_field: &str, tool_name: Option<&str>, limit: usize) -> Query {
    let query = match tool_name {
        Some(tool) => Query::new().where_eq(tool_field, tool),
        None => Query::new(),
    };
    query
        .order_by("timestamp", Direction::Descending)
        .limit(limit)
}

fn decode_all<T: serde::de::DeserializeOwned>(
    collection: Collection,
    docs: Vec<Document>,
) -> StoreResult<Vec<T>> {
    docs.into_iter()
        .map(|doc| doc.into_record(collection))
        .collect()
}

// Preference documents are keyed by user id; the id is not part of the payload.
fn decode_preferences(collection: Collection, doc: Document) -> StoreResult<UserPreferences> {
    let Document { id, fields } = doc;
    serde_json::from_value(Value::Object(fields)).map_err(|e| BackendError::Malformed {
        collection,
        id,
        details: e.to_string(),
    })
}
