#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use toolpulse::core::config::{BackendConfig, Config};
use toolpulse::core::errors::{Result, TpError};
use toolpulse::store::event_store::EventStore;
use toolpulse::store::memory::MemoryDocumentStore;
use toolpulse::store::records::AnalyticsEvent;
use toolpulse::tracking::facade::Tracker;
use toolpulse::tracking::generation::{
    GenerationClient, GenerationRequest, PromptTransport, TransportResponse,
};

// ──────────────────── stores ────────────────────

pub fn live_backend() -> BackendConfig {
    BackendConfig {
        api_key: "AIzaSyIntegration".to_string(),
        auth_domain: "tools-test.firebaseapp.com".to_string(),
        project_id: "tools-test".to_string(),
        ..BackendConfig::default()
    }
}

pub fn fallback_tracker() -> Arc<Tracker> {
    let store = EventStore::builder(Config::default()).build();
    Arc::new(Tracker::new(Arc::new(store)))
}

pub fn remote_tracker() -> (Arc<MemoryDocumentStore>, Arc<Tracker>) {
    let remote = Arc::new(MemoryDocumentStore::new());
    let config = Config {
        backend: live_backend(),
        ..Config::default()
    };
    let store = EventStore::builder(config).remote(remote.clone()).build();
    (remote, Arc::new(Tracker::new(Arc::new(store))))
}

/// Fallback analytics events named `name`, in insertion order.
pub fn events_named(tracker: &Tracker, name: &str) -> Vec<AnalyticsEvent> {
    tracker
        .store()
        .fallback()
        .analytics(None, usize::MAX)
        .into_iter()
        .filter(|event| event.event_name == name)
        .collect()
}

// ──────────────────── generation transport ────────────────────

/// Transport that replays canned outcomes and remembers every request.
#[derive(Default)]
pub struct ScriptedTransport {
    outcomes: Mutex<VecDeque<Result<TransportResponse>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedTransport {
    pub fn replying(status: u16, body: Value) -> Arc<Self> {
        let transport = Self::default();
        transport.push(Ok(TransportResponse {
            status,
            body: body.to_string(),
        }));
        Arc::new(transport)
    }

    pub fn failing(message: &str) -> Arc<Self> {
        let transport = Self::default();
        transport.push(Err(TpError::RequestFailed {
            status: None,
            message: message.to_string(),
        }));
        Arc::new(transport)
    }

    pub fn push(&self, outcome: Result<TransportResponse>) {
        self.outcomes.lock().push_back(outcome);
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl PromptTransport for ScriptedTransport {
    async fn send(&self, request: &GenerationRequest) -> Result<TransportResponse> {
        self.requests.lock().push(request.clone());
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| {
                Err(TpError::RequestFailed {
                    status: None,
                    message: "no scripted response left".to_string(),
                })
            })
    }
}

pub fn candidates(text: &str) -> Value {
    json!({"candidates": [{"content": {"parts": [{"text": text}]}}]})
}

pub fn client(tracker: &Arc<Tracker>, transport: Arc<ScriptedTransport>) -> GenerationClient {
    GenerationClient::new(Arc::clone(tracker), transport)
}

// ──────────────────── CLI ────────────────────

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Some(path) = option_env!("CARGO_BIN_EXE_toolpulse") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) {
        "toolpulse.exe"
    } else {
        "toolpulse"
    };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve toolpulse binary path for integration test"),
    }
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("toolpulse-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let output = Command::new(&bin_path)
        .args(args)
        .env("RUST_LOG", "error")
        .env("RUST_BACKTRACE", "1")
        .output()
        .expect("execute toolpulse command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}
