//! Named tracking operations over the event store.
//!
//! Each operation shapes a fixed analytics envelope (tool name, ISO timestamp,
//! per-event fields) and records it through [`Containment`], so none of them
//! can fail because of telemetry.

#![allow(missing_docs)]

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use serde_json::{Value, json};

use super::containment::Containment;
use crate::page::{ClickTarget, InteractionSurface};
use crate::store::backend::{Fields, format_timestamp};
use crate::store::event_store::EventStore;
use crate::store::records::{EventName, fields};

/// `user_action` emitted when a copy control is clicked.
pub const ACTION_COPY_RESULT: &str = "copy_result";
/// `user_action` emitted when a form control gains focus.
pub const ACTION_INPUT_FOCUS: &str = "input_focus";
/// `user_action` emitted after a form submission produced a result.
pub const ACTION_RESULT_GENERATED: &str = "result_generated";
/// `user_action` emitted after a form submission failed.
pub const ACTION_RESULT_ERROR: &str = "result_error";

/// High-level tracking facade. Share it as `Arc<Tracker>`.
#[derive(Debug)]
pub struct Tracker {
    store: Arc<EventStore>,
    containment: Containment,
}

impl Tracker {
    /// Facade over `store` with a fresh [`Containment`].
    #[must_use]
    pub fn new(store: Arc<EventStore>) -> Self {
        Self {
            store,
            containment: Containment::new(),
        }
    }

    /// Underlying store, for direct (uncontained) access.
    #[must_use]
    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    #[must_use]
    pub fn containment(&self) -> &Containment {
        &self.containment
    }

    /// Record `event` with `data`, absorbing any failure.
    pub(crate) async fn emit(&self, event: EventName, data: Fields) -> Option<String> {
        self.emit_named(event.as_str(), data).await
    }

    async fn emit_named(&self, event_name: &str, data: Fields) -> Option<String> {
        self.containment
            .absorb(
                event_name,
                self.store.record_analytics_event(event_name, Some(data)),
            )
            .await
    }

    /// `tool_usage`: a user started using `tool_name`. `extra` fields override the envelope.
    pub async fn track_tool_usage(&self, tool_name: &str, extra: Fields) {
        let mut data = fields(json!({
            "toolName": tool_name,
            "timestamp": now_iso(),
        }));
        data.extend(extra);
        self.emit(EventName::ToolUsage, data).await;
    }

    /// `form_submission` with the submitted fields.
    pub async fn track_form_submission(&self, tool_name: &str, form_data: Fields) {
        let data = fields(json!({
            "toolName": tool_name,
            "formData": Value::Object(form_data),
            "timestamp": now_iso(),
        }));
        self.emit(EventName::FormSubmission, data).await;
    }

    /// `page_view` with the current url and referrer.
    pub async fn track_page_view(&self, page_name: &str) {
        let page = self.store.page();
        let data = fields(json!({
            "pageName": page_name,
            "url": page.url(),
            "referrer": page.referrer(),
            "timestamp": now_iso(),
        }));
        self.emit(EventName::PageView, data).await;
    }

    /// `user_action`; `toolName` is `null` when no tool is given.
    pub async fn track_user_action(&self, action: &str, tool_name: Option<&str>, data: Fields) {
        let data = fields(json!({
            "action": action,
            "toolName": tool_name,
            "data": Value::Object(data),
            "timestamp": now_iso(),
        }));
        self.emit(EventName::UserAction, data).await;
    }

    /// Start collecting for `tool_name` on `surface`.
    ///
    /// Emits a page view and a tool-usage event, then registers a click
    /// listener for copy actions and a focus listener on every form control
    /// the surface reports right now. Controls added later are not tracked.
    pub async fn initialize_data_collection(
        self: &Arc<Self>,
        tool_name: &str,
        surface: &dyn InteractionSurface,
    ) {
        self.track_page_view(tool_name).await;
        self.track_tool_usage(tool_name, Fields::new()).await;

        let tracker = Arc::clone(self);
        let tool = tool_name.to_string();
        surface.on_click(Arc::new(move |target: ClickTarget| {
            let tracker = Arc::clone(&tracker);
            let tool = tool.clone();
            async move {
                if target.is_copy_action() {
                    tracker
                        .track_user_action(ACTION_COPY_RESULT, Some(&tool), Fields::new())
                        .await;
                }
            }
            .boxed()
        }));

        let elements = surface.input_elements();
        tracing::debug!(
            tool = tool_name,
            inputs = elements.len(),
            "data collection initialized"
        );
        for element in elements {
            let tracker = Arc::clone(self);
            let tool = tool_name.to_string();
            let data = fields(json!({
                "inputType": element.element_type,
                "inputName": element.label(),
            }));
            surface.on_focus(
                &element,
                Arc::new(move |()| {
                    let tracker = Arc::clone(&tracker);
                    let tool = tool.clone();
                    let data = data.clone();
                    async move {
                        tracker
                            .track_user_action(ACTION_INPUT_FOCUS, Some(&tool), data)
                            .await;
                    }
                    .boxed()
                }),
            );
        }
    }

    /// Track a form submission around the caller's `work`.
    ///
    /// Records `form_submission`, awaits `work`, then records
    /// `result_generated` (with `resultLength`) or `result_error` (with
    /// `error`). The work's result is returned unchanged.
    pub async fn handle_form_submission<F, E>(
        &self,
        tool_name: &str,
        form_data: Fields,
        work: F,
    ) -> Result<String, E>
    where
        F: Future<Output = Result<String, E>>,
        E: Display,
    {
        self.track_form_submission(tool_name, form_data).await;
        let result = work.await;
        match &result {
            Ok(text) => {
                let data = fields(json!({"resultLength": text.chars().count()}));
                self.track_user_action(ACTION_RESULT_GENERATED, Some(tool_name), data)
                    .await;
            }
            Err(e) => {
                let data = fields(json!({"error": e.to_string()}));
                self.track_user_action(ACTION_RESULT_ERROR, Some(tool_name), data)
                    .await;
            }
        }
        result
    }
}

fn now_iso() -> String {
    format_timestamp(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{BackendConfig, Config};
    use crate::page::{InputElement, MemorySurface, StaticPage};
    use crate::store::backend::Collection;
    use crate::store::memory::MemoryDocumentStore;
    use crate::store::records::AnalyticsEvent;

    fn tracker() -> Arc<Tracker> {
        let page = Arc::new(StaticPage::new("ua", "https://tools.example/"));
        page.navigate("https://tools.example/bio");
        let store = EventStore::builder(Config::default()).page(page).build();
        Arc::new(Tracker::new(Arc::new(store)))
    }

    fn events(tracker: &Tracker) -> Vec<AnalyticsEvent> {
        tracker.store().fallback().analytics(None, usize::MAX)
    }

    #[tokio::test]
    async fn tool_usage_merges_extra_fields() {
        let tracker = tracker();
        tracker
            .track_tool_usage("text_rewriter", fields(json!({"source": "menu"})))
            .await;
        let events = events(&tracker);
        assert_eq!(events[0].event_name, "tool_usage");
        assert_eq!(events[0].event_data["toolName"], json!("text_rewriter"));
        assert_eq!(events[0].event_data["source"], json!("menu"));
        assert!(events[0].event_data["timestamp"].is_string());
    }

    #[tokio::test]
    async fn page_view_carries_url_and_referrer() {
        let tracker = tracker();
        tracker.track_page_view("instagram_bio_generator").await;
        let data = &events(&tracker)[0].event_data;
        assert_eq!(data["pageName"], json!("instagram_bio_generator"));
        assert_eq!(data["url"], json!("https://tools.example/bio"));
        assert_eq!(data["referrer"], json!("https://tools.example/"));
    }

    #[tokio::test]
    async fn user_action_without_tool_has_null_tool_name() {
        let tracker = tracker();
        tracker
            .track_user_action("share", None, fields(json!({"target": "x"})))
            .await;
        let data = &events(&tracker)[0].event_data;
        assert_eq!(data["toolName"], Value::Null);
        assert_eq!(data["data"]["target"], json!("x"));
    }

    #[tokio::test]
    async fn failing_backend_is_contained() {
        let remote = Arc::new(MemoryDocumentStore::new());
        remote.set_fail_writes(true);
        let config = Config {
            backend: BackendConfig {
                api_key: "k".to_string(),
                auth_domain: "d".to_string(),
                project_id: "p".to_string(),
                ..BackendConfig::default()
            },
            ..Config::default()
        };
        let store = EventStore::builder(config).remote(remote.clone()).build();
        let tracker = Tracker::new(Arc::new(store));
        tracker.track_page_view("home").await;
        tracker.track_form_submission("t", Fields::new()).await;
        assert_eq!(tracker.containment().absorbed_failures(), 2);
        assert!(remote.documents(Collection::Analytics).is_empty());
    }

    #[tokio::test]
    async fn initialize_tracks_copy_and_snapshot_focus() {
        let tracker = tracker();
        let surface = MemorySurface::new();
        let prompt = InputElement::new("textarea").named("prompt");
        surface.add_input(prompt.clone());

        tracker
            .initialize_data_collection("ai_prompt_generator", &surface)
            .await;

        let late = InputElement::new("text").with_id("late");
        surface.add_input(late.clone());

        surface.click(ClickTarget::new("Copy to clipboard")).await;
        surface.click(ClickTarget::new("Generate")).await;
        assert_eq!(surface.focus(&prompt).await, 1);
        assert_eq!(surface.focus(&late).await, 0);

        let events = events(&tracker);
        let names: Vec<&str> = events.iter().map(|e| e.event_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["page_view", "tool_usage", "user_action", "user_action"]
        );
        assert_eq!(events[2].event_data["action"], json!(ACTION_COPY_RESULT));
        assert_eq!(events[3].event_data["action"], json!(ACTION_INPUT_FOCUS));
        assert_eq!(events[3].event_data["data"]["inputType"], json!("textarea"));
        assert_eq!(events[3].event_data["data"]["inputName"], json!("prompt"));
    }

    #[tokio::test]
    async fn form_submission_reports_outcome() {
        let tracker = tracker();
        let ok = tracker
            .handle_form_submission("t", Fields::new(), async { Ok::<_, String>("héllo".to_string()) })
            .await;
        assert_eq!(ok.as_deref(), Ok("héllo"));
        let err = tracker
            .handle_form_submission("t", Fields::new(), async { Err::<String, _>("bad input") })
            .await;
        assert_eq!(err, Err("bad input"));

        let events = events(&tracker);
        assert_eq!(events.len(), 4);
        assert_eq!(events[1].event_data["action"], json!(ACTION_RESULT_GENERATED));
        assert_eq!(events[1].event_data["data"]["resultLength"], json!(5));
        assert_eq!(events[3].event_data["action"], json!(ACTION_RESULT_ERROR));
        assert_eq!(events[3].event_data["data"]["error"], json!("bad input"));
    }
}
