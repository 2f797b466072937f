//! Instrumented content-generation requests.
//!
//! [`GenerationClient::generate`] brackets one request to the generation
//! endpoint with analytics events and, on success, writes an interaction
//! record and a content record. Telemetry is contained; the request outcome
//! is not.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};

use super::facade::Tracker;
use crate::core::config::GenerationConfig;
use crate::core::errors::{Result, TpError};
use crate::store::backend::Fields;
use crate::store::records::{ContentMetadata, EventName, fields};

/// Body posted to the generation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(rename = "inlineData")]
    pub inline_data: Option<Value>,
}

/// Raw HTTP outcome handed back by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Sends a generation request. Errors mean the request never produced a response.
#[async_trait]
pub trait PromptTransport: Send + Sync {
    async fn send(&self, request: &GenerationRequest) -> Result<TransportResponse>;
}

/// reqwest-backed transport posting JSON to the configured endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| TpError::Runtime {
                details: format!("HTTP client error: {e}"),
            })?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PromptTransport for HttpTransport {
    async fn send(&self, request: &GenerationRequest) -> Result<TransportResponse> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| TpError::RequestFailed {
                status: None,
                message: e.to_string(),
            })?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| TpError::RequestFailed {
            status: Some(status),
            message: format!("failed to read response body: {e}"),
        })?;
        Ok(TransportResponse { status, body })
    }
}

/// Populated `error` field of a reply rendered as a message.
fn error_message(reply: &Value) -> Option<String> {
    match reply.get("error")? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// `candidates[0].content.parts[0].text` when it is a non-empty string.
fn reply_text(reply: &Value) -> Option<String> {
    reply
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Runs generation requests with telemetry around them.
pub struct GenerationClient {
    tracker: Arc<Tracker>,
    transport: Arc<dyn PromptTransport>,
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationClient")
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}

impl GenerationClient {
    #[must_use]
    pub fn new(tracker: Arc<Tracker>, transport: Arc<dyn PromptTransport>) -> Self {
        Self { tracker, transport }
    }

    /// Client posting to the endpoint in `config` over HTTP.
    pub fn http(tracker: Arc<Tracker>, config: &GenerationConfig) -> Result<Self> {
        Ok(Self::new(tracker, Arc::new(HttpTransport::new(config)?)))
    }

    #[must_use]
    pub fn tracker(&self) -> &Arc<Tracker> {
        &self.tracker
    }

    /// Generate text for `prompt` on behalf of `tool_name`.
    ///
    /// Emits `api_call_start` first. A transport failure, a non-2xx status,
    /// an unreadable body or a populated `error` field emits one
    /// `api_call_error` and returns [`TpError::RequestFailed`]. A reply
    /// without text emits `api_call_no_response` and returns
    /// [`TpError::EmptyResponse`]. Otherwise one interaction and one content
    /// record are written, `api_call_success` is emitted and the text is
    /// returned.
    pub async fn generate(
        &self,
        prompt: &str,
        tool_name: &str,
        input_data: Fields,
        inline_data: Option<Value>,
    ) -> Result<String> {
        let started = Instant::now();
        let prompt_length = prompt.chars().count();

        self.tracker
            .emit(
                EventName::ApiCallStart,
                fields(json!({
                    "toolName": tool_name,
                    "promptLength": prompt_length,
                    "hasInlineData": inline_data.as_ref().is_some_and(|v| !v.is_null()),
                })),
            )
            .await;

        let request = GenerationRequest {
            prompt: prompt.to_string(),
            inline_data,
        };

        let reply = match self.transport.send(&request).await.and_then(decode_reply) {
            Ok(reply) => reply,
            Err(e) => return Err(self.report_failure(tool_name, started, e).await),
        };

        let Some(text) = reply_text(&reply) else {
            let duration = elapsed_ms(started);
            self.tracker
                .emit(
                    EventName::ApiCallNoResponse,
                    fields(json!({"toolName": tool_name, "duration": duration})),
                )
                .await;
            return Err(TpError::EmptyResponse {
                tool: tool_name.to_string(),
            });
        };

        let duration = elapsed_ms(started);
        let response_length = text.chars().count();
        let store = self.tracker.store();
        let containment = self.tracker.containment();

        containment
            .absorb(
                "record_interaction",
                store.record_interaction(
                    tool_name,
                    fields(json!({"prompt": prompt, "inputData": Value::Object(input_data.clone())})),
                    fields(json!({"content": text, "responseTime": duration})),
                    None,
                ),
            )
            .await;

        containment
            .absorb(
                "record_generated_content",
                store.record_generated_content(
                    tool_name,
                    &text,
                    Some(ContentMetadata {
                        prompt_length: Some(prompt_length),
                        response_length: Some(response_length),
                        response_time: Some(duration),
                        input_data: Some(input_data),
                    }),
                ),
            )
            .await;

        self.tracker
            .emit(
                EventName::ApiCallSuccess,
                fields(json!({
                    "toolName": tool_name,
                    "duration": duration,
                    "responseLength": response_length,
                })),
            )
            .await;

        tracing::debug!(tool = tool_name, duration, response_length, "generation succeeded");
        Ok(text)
    }

    async fn report_failure(&self, tool_name: &str, started: Instant, error: TpError) -> TpError {
        let (status, message) = match error {
            TpError::RequestFailed { status, message } => (status, message),
            other => (None, other.to_string()),
        };
        self.tracker
            .emit(
                EventName::ApiCallError,
                fields(json!({
                    "toolName": tool_name,
                    "error": message,
                    "duration": elapsed_ms(started),
                })),
            )
            .await;
        tracing::warn!(tool = tool_name, ?status, %message, "generation request failed");
        TpError::RequestFailed { status, message }
    }
}

/// Classify a raw response: `error` field first, then HTTP status, then JSON.
///
/// Any JSON body on a 2xx status is accepted; a missing or oddly shaped text
/// path is left for `reply_text` to report as no response.
fn decode_reply(response: TransportResponse) -> Result<Value> {
    let parsed = serde_json::from_str::<Value>(&response.body);

    if let Some(message) = parsed.as_ref().ok().and_then(error_message) {
        return Err(TpError::RequestFailed {
            status: Some(response.status),
            message,
        });
    }

    if !response.is_success() {
        return Err(TpError::RequestFailed {
            status: Some(response.status),
            message: format!("endpoint returned HTTP {}", response.status),
        });
    }

    parsed.map_err(|e| TpError::RequestFailed {
        status: Some(response.status),
        message: format!("undecodable response body: {e}"),
    })
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: Value) -> TransportResponse {
        TransportResponse {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn error_field_wins_over_status() {
        let err = decode_reply(response(500, json!({"error": "quota exceeded"}))).unwrap_err();
        match err {
            TpError::RequestFailed { status, message } => {
                assert_eq!(status, Some(500));
                assert_eq!(message, "quota exceeded");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn non_success_status_fails() {
        let err = decode_reply(response(502, json!({}))).unwrap_err();
        assert!(matches!(err, TpError::RequestFailed { status: Some(502), .. }));
    }

    #[test]
    fn undecodable_body_fails() {
        let err = decode_reply(TransportResponse {
            status: 200,
            body: "<html>".to_string(),
        })
        .unwrap_err();
        assert!(matches!(err, TpError::RequestFailed { .. }));
    }

    #[test]
    fn text_extracted_from_first_candidate() {
        let reply = decode_reply(response(
            200,
            json!({"candidates": [{"content": {"parts": [{"text": "hello"}, {"text": "ignored"}]}}]}),
        ))
        .unwrap();
        assert_eq!(reply_text(&reply).as_deref(), Some("hello"));
    }

    #[test]
    fn empty_or_missing_text_is_none() {
        for body in [
            json!({}),
            json!({"candidates": []}),
            json!({"candidates": [{"content": {"parts": [{"text": ""}]}}]}),
            json!({"candidates": [{"content": null}]}),
            json!({"candidates": null}),
            json!({"candidates": [null]}),
            json!({"candidates": {"a": 1}}),
            json!({"candidates": [{"content": {"parts": [{"text": 5}]}}]}),
            json!([1, 2, 3]),
        ] {
            let reply = decode_reply(response(200, body.clone())).unwrap();
            assert!(reply_text(&reply).is_none(), "{body}");
        }
    }

    #[test]
    fn error_message_survives_malformed_candidates() {
        let err = decode_reply(response(200, json!({"error": "x", "candidates": {"a": 1}})))
            .unwrap_err();
        match err {
            TpError::RequestFailed { status, message } => {
                assert_eq!(status, Some(200));
                assert_eq!(message, "x");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn null_error_field_is_ignored() {
        let reply = decode_reply(response(
            200,
            json!({"error": null, "candidates": [{"content": {"parts": [{"text": "ok"}]}}]}),
        ))
        .unwrap();
        assert_eq!(reply_text(&reply).as_deref(), Some("ok"));
    }

    #[test]
    fn request_serializes_inline_data_as_null() {
        let body = serde_json::to_value(GenerationRequest {
            prompt: "p".to_string(),
            inline_data: None,
        })
        .unwrap();
        assert_eq!(body, json!({"prompt": "p", "inlineData": null}));
    }
}
