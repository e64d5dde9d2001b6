// crates/grain-harness/tests/common/mod.rs
// ============================================================================
// Module: Flow Runtime Stub
// Description: Admin API stub that plays a flow runtime for driver tests.
// Purpose: Exercise create, stream and delete without a real runtime.
// Dependencies: axum, grain-harness, tokio, tokio-tungstenite
// ============================================================================

//! ## Overview
//! [`spawn_runtime_stub`] serves `POST /flow` and `DELETE /flow/{id}` on an
//! ephemeral port. When a flow is created it looks up the fixture's
//! `websocket-client` config and dials it, replaying a [`FlowScript`].
//! Every admin request is recorded for assertions.

#![allow(dead_code, reason = "Shared helpers are reused across multiple test suites.")]

use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::delete;
use axum::routing::post;
use futures_util::SinkExt;
use futures_util::StreamExt;
use grain_harness::HarnessConfig;
use grain_harness::fixture::WS_CLIENT_CONFIG_TYPE;
use serde_json::Value;
use serde_json::json;
use tokio::runtime::Builder;
use tokio::sync::oneshot;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

// ============================================================================
// SECTION: Scripts
// ============================================================================

/// What the simulated flow does after its frames are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    /// Keep the socket open until the harness closes it.
    AwaitClose,
    /// Close the socket from the flow side.
    Disconnect,
}

/// Frames the simulated flow sends once connected.
#[derive(Debug, Clone)]
pub struct FlowScript {
    /// Text frames in send order.
    pub frames: Vec<String>,
    /// Pause after each frame.
    pub interval: Duration,
    /// Behavior after the last frame.
    pub ending: Ending,
    /// False to never dial the harness.
    pub connect: bool,
}

impl FlowScript {
    /// `count` valid grains followed by the `close` end marker.
    pub fn grains_then_close(count: u64) -> Self {
        let mut frames: Vec<String> = (1..=count).map(grain_frame).collect();
        frames.push(json!({"close": 0}).to_string());
        Self::frames(frames)
    }

    /// `count` valid grains and no end marker.
    pub fn grains_only(count: u64) -> Self {
        Self::frames((1..=count).map(grain_frame).collect())
    }

    /// Arbitrary frames with the socket left open.
    pub fn frames(frames: Vec<String>) -> Self {
        Self {
            frames,
            interval: Duration::ZERO,
            ending: Ending::AwaitClose,
            connect: true,
        }
    }

    /// A flow that never connects.
    pub fn silent() -> Self {
        Self {
            connect: false,
            ..Self::frames(Vec::new())
        }
    }

    /// Pauses `interval` after each frame.
    pub fn every(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the ending.
    pub fn ending(mut self, ending: Ending) -> Self {
        self.ending = ending;
        self
    }
}

/// Grain message in the `push` wire format.
pub fn grain_frame(index: u64) -> String {
    json!({
        "push": {
            "ptpSyncTimestamp": format!("1510148023:{}", index * 40_000_000),
            "ptpOriginTimestamp": format!("1510148023:{}", index * 40_000_000),
            "flowId": "5fbec3b1-1b0f-417d-9059-8b94a47197ed",
            "sourceId": "2aa143ac-0ab7-4d75-bc32-5c00c13d186f",
            "duration": "1/25",
            "payloadSizes": [5_184_000]
        }
    })
    .to_string()
}

// ============================================================================
// SECTION: Stub
// ============================================================================

/// Admin API responses served by the stub.
#[derive(Debug, Clone)]
pub struct StubBehavior {
    /// Status for `POST /flow`.
    pub create_status: u16,
    /// Body for `POST /flow`; `None` assigns a fresh id.
    pub create_body: Option<Value>,
    /// Status for `DELETE /flow/{id}`.
    pub delete_status: u16,
    /// Script replayed once a flow is created.
    pub script: FlowScript,
}

impl StubBehavior {
    /// Well-behaved runtime replaying `script`.
    pub fn new(script: FlowScript) -> Self {
        Self {
            create_status: 200,
            create_body: None,
            delete_status: 204,
            script,
        }
    }
}

/// Admin request captured by the stub.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: &'static str,
    /// Request path.
    pub path: String,
    /// JSON body, `Null` when absent.
    pub body: Value,
}

/// Shared state for stub handlers.
#[derive(Clone)]
struct StubState {
    /// Configured responses and script.
    behavior: Arc<StubBehavior>,
    /// Captured admin requests.
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    /// Next assigned flow id suffix.
    next_id: Arc<AtomicU64>,
}

impl StubState {
    /// Captures one admin request.
    fn record(&self, method: &'static str, path: String, body: Value) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                method,
                path,
                body,
            });
        }
    }
}

/// Handle for the runtime stub.
pub struct RuntimeStub {
    /// Admin API port.
    port: u16,
    /// Graceful shutdown trigger.
    shutdown: Option<oneshot::Sender<()>>,
    /// Server thread.
    join: Option<thread::JoinHandle<()>>,
    /// Captured admin requests.
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl RuntimeStub {
    /// Returns the admin API port.
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns captured admin requests.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map_or_else(|_| Vec::new(), |entries| entries.clone())
    }

    /// Returns captured requests with the given method.
    pub fn requests_with(&self, method: &str) -> Vec<RecordedRequest> {
        self.requests().into_iter().filter(|request| request.method == method).collect()
    }

    /// Harness configuration pointing at this stub with an ephemeral ws port.
    pub fn config(&self) -> HarnessConfig {
        HarnessConfig {
            red_port: self.port,
            ws_port: 0,
            flow_timeout_ms: 200,
            connect_timeout_ms: 2_000,
            ..HarnessConfig::default()
        }
    }
}

impl Drop for RuntimeStub {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Spawns a runtime stub with the given behavior.
pub fn spawn_runtime_stub(behavior: StubBehavior) -> Result<RuntimeStub, String> {
    let listener = StdTcpListener::bind("127.0.0.1:0")
        .map_err(|err| format!("runtime stub bind failed: {err}"))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| format!("runtime stub listener nonblocking failed: {err}"))?;
    let port =
        listener.local_addr().map_err(|err| format!("runtime stub local addr failed: {err}"))?.port();

    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = StubState {
        behavior: Arc::new(behavior),
        requests: Arc::clone(&requests),
        next_id: Arc::new(AtomicU64::new(1)),
    };
    let app = Router::new()
        .route("/flow", post(create_flow))
        .route("/flow/{id}", delete(delete_flow))
        .with_state(state);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let join = thread::spawn(move || {
        let Ok(runtime) = Builder::new_current_thread().enable_all().build() else {
            return;
        };
        runtime.block_on(async move {
            let Ok(listener) = tokio::net::TcpListener::from_std(listener) else {
                return;
            };
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = server.await;
        });
    });
    Ok(RuntimeStub {
        port,
        shutdown: Some(shutdown_tx),
        join: Some(join),
        requests,
    })
}

/// Serves `POST /flow` and starts the flow script.
async fn create_flow(State(state): State<StubState>, Json(body): Json<Value>) -> impl IntoResponse {
    state.record("POST", "/flow".to_string(), body.clone());
    let behavior = Arc::clone(&state.behavior);
    let status = StatusCode::from_u16(behavior.create_status).unwrap_or(StatusCode::OK);
    if status != StatusCode::OK {
        return (status, Json(json!({"error": "rejected"})));
    }
    if behavior.script.connect
        && let Some(url) = tap_url(&body)
    {
        tokio::spawn(emit(url, behavior.script.clone()));
    }
    let response = behavior.create_body.clone().unwrap_or_else(|| {
        let id = state.next_id.fetch_add(1, Ordering::SeqCst);
        json!({"id": format!("flow-{id}")})
    });
    (status, Json(response))
}

/// Serves `DELETE /flow/{id}`.
async fn delete_flow(
    State(state): State<StubState>,
    Path(id): Path<String>,
    body: Bytes,
) -> StatusCode {
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
    state.record("DELETE", format!("/flow/{id}"), body);
    StatusCode::from_u16(state.behavior.delete_status).unwrap_or(StatusCode::NO_CONTENT)
}

/// Finds the WebSocket URL the fixture's client config points at.
fn tap_url(body: &Value) -> Option<String> {
    body.get("configs")?
        .as_array()?
        .iter()
        .find(|config| config.get("type").and_then(Value::as_str) == Some(WS_CLIENT_CONFIG_TYPE))?
        .get("path")?
        .as_str()
        .map(ToString::to_string)
}

/// Dials the harness and replays the script.
async fn emit(url: String, script: FlowScript) {
    let Ok((mut socket, _)) = connect_async(url.as_str()).await else {
        return;
    };
    for frame in script.frames {
        if socket.send(Message::Text(frame.into())).await.is_err() {
            return;
        }
        if !script.interval.is_zero() {
            sleep(script.interval).await;
        }
    }
    match script.ending {
        Ending::AwaitClose => while let Some(Ok(_)) = socket.next().await {},
        Ending::Disconnect => {
            let _ = socket.close(None).await;
        }
    }
}
