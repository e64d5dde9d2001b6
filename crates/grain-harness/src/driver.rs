// crates/grain-harness/src/driver.rs
// ============================================================================
// Module: Flow Lifecycle Driver
// Description: Create, observe and delete one flow per run.
// Purpose: Turn a fixture and a message handler into a single verdict.
// Dependencies: futures-util, serde, serde_json, tokio, tokio-tungstenite
// ============================================================================

//! ## Overview
//! A run binds the WebSocket listener, submits the fixture, accepts exactly
//! one connection from the flow's output node and feeds every inbound frame
//! to the [`MessageHandler`]. A watchdog compares the message count once per
//! `flowTimeout`; an unchanged count means the flow has gone quiet.
//! Invariants:
//! - The end-marker, stall and abort paths race on one [`CompletionLatch`];
//!   only the winner's completion is reported.
//! - Teardown runs once per created flow, on success and failure alike.
//! - The watchdog's first check happens one full interval after accept.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use crate::admin::AdminClient;
use crate::admin::FlowId;
use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::error::HarnessResult;
use crate::fixture::FlowFixture;
use crate::fixture::ws_url;
use crate::handler::MessageHandler;
use crate::latch::Completion;
use crate::latch::CompletionLatch;
use crate::latch::CompletionReason;
use crate::state::RunCounters;
use crate::state::RunState;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Listener details handed to the fixture constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowContext {
    /// Host the flow should connect to.
    pub ws_host: String,
    /// Port the listener is bound to.
    pub ws_port: u16,
}

impl FlowContext {
    /// Returns the URL the flow's output node should dial.
    #[must_use]
    pub fn ws_url(&self) -> String {
        ws_url(&self.ws_host, self.ws_port)
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Identifier assigned by the admin API.
    pub flow_id: FlowId,
    /// Winning completion.
    pub completion: Completion,
    /// Final termination gate.
    pub state: RunState,
    /// False when deletion was skipped by `keepFlow`.
    pub flow_deleted: bool,
}

/// Accepted server-side socket.
type FlowSocket = WebSocketStream<TcpStream>;

// ============================================================================
// SECTION: Driver
// ============================================================================

/// Drives flows through create, collect and delete.
#[derive(Debug, Clone)]
pub struct FlowDriver {
    /// Validated configuration.
    config: HarnessConfig,
    /// Admin API client.
    admin: AdminClient,
}

impl FlowDriver {
    /// Creates a driver for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] when the configuration is invalid and
    /// [`HarnessError::AdminTransport`] when the HTTP client cannot be built.
    pub fn new(config: HarnessConfig) -> HarnessResult<Self> {
        config.validate()?;
        let admin = AdminClient::from_config(&config)?;
        Ok(Self {
            config,
            admin,
        })
    }

    /// Returns the driver configuration.
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Returns the admin API client.
    #[must_use]
    pub const fn admin(&self) -> &AdminClient {
        &self.admin
    }

    /// Runs one flow to completion.
    ///
    /// `build` receives the bound listener so the fixture can point its output
    /// node at it. `handler` sees every inbound message in arrival order and
    /// stays with the caller for inspection afterwards.
    ///
    /// # Errors
    ///
    /// Returns the first failure of the run. Failures after the flow was
    /// created are returned after the flow has been torn down.
    pub async fn run<B, H>(&self, build: B, handler: &mut H) -> HarnessResult<RunReport>
    where
        B: FnOnce(&FlowContext) -> HarnessResult<FlowFixture>,
        H: MessageHandler + ?Sized,
    {
        let bind_addr = self.config.ws_bind_addr();
        let listener = TcpListener::bind(&bind_addr).await.map_err(|err| HarnessError::Bind {
            addr: bind_addr.clone(),
            detail: err.to_string(),
        })?;
        let local = listener.local_addr().map_err(|err| HarnessError::Bind {
            addr: bind_addr.clone(),
            detail: err.to_string(),
        })?;
        let context = FlowContext {
            ws_host: self.config.ws_host.clone(),
            ws_port: local.port(),
        };
        tracing::info!(addr = %local, "websocket listening");

        let fixture = build(&context)?;
        let flow_id = self.admin.create_flow(&fixture).await?;

        let counters = Arc::new(RunCounters::new());
        let latch = Arc::new(CompletionLatch::new());
        let outcome = self.collect(listener, handler, &counters, &latch).await;

        match outcome {
            Ok(completion) => {
                let flow_deleted = self.teardown(&flow_id).await?;
                counters.mark_closedown_completed();
                tracing::info!(
                    flow_id = %flow_id,
                    reason = completion.reason.as_str(),
                    received = completion.received,
                    "run complete"
                );
                Ok(RunReport {
                    flow_id,
                    completion,
                    state: counters.snapshot(),
                    flow_deleted,
                })
            }
            Err(err) => {
                latch.complete(Completion {
                    reason: CompletionReason::Aborted,
                    received: counters.received(),
                });
                if let Err(delete_err) = self.teardown(&flow_id).await {
                    tracing::warn!(flow_id = %flow_id, error = %delete_err, "teardown failed");
                }
                counters.mark_closedown_completed();
                tracing::info!(flow_id = %flow_id, error = %err, "run aborted");
                Err(err)
            }
        }
    }

    /// Accepts the flow's connection and pumps messages until the latch is set.
    async fn collect<H: MessageHandler + ?Sized>(
        &self,
        listener: TcpListener,
        handler: &mut H,
        counters: &Arc<RunCounters>,
        latch: &Arc<CompletionLatch>,
    ) -> HarnessResult<Completion> {
        let connect_timeout = self.config.connect_timeout();
        let (stream, peer) = match timeout(connect_timeout, listener.accept()).await {
            Ok(Ok(accepted)) => accepted,
            Ok(Err(err)) => return Err(HarnessError::WebSocket(format!("accept failed: {err}"))),
            Err(_) => return Err(HarnessError::ConnectTimeout(self.config.connect_timeout_ms)),
        };
        drop(listener);
        let mut socket = match timeout(connect_timeout, accept_async(stream)).await {
            Ok(Ok(socket)) => socket,
            Ok(Err(err)) => return Err(HarnessError::WebSocket(format!("handshake failed: {err}"))),
            Err(_) => return Err(HarnessError::ConnectTimeout(self.config.connect_timeout_ms)),
        };
        tracing::info!(%peer, "flow connected");

        let _watchdog = Watchdog::spawn(
            Arc::clone(counters),
            Arc::clone(latch),
            self.config.flow_timeout(),
        );
        let result = pump(&mut socket, handler, counters, latch).await;
        if let Err(err) = socket.close(None).await {
            tracing::debug!(error = %err, "websocket close");
        }
        result
    }

    /// Deletes the flow unless `keepFlow` is set. Returns whether it ran.
    async fn teardown(&self, flow_id: &FlowId) -> HarnessResult<bool> {
        if self.config.keep_flow {
            tracing::info!(flow_id = %flow_id, "keeping flow");
            return Ok(false);
        }
        self.admin.delete_flow(flow_id).await?;
        Ok(true)
    }
}

// ============================================================================
// SECTION: Message Pump
// ============================================================================

/// Feeds inbound frames to the handler until the latch is set.
async fn pump<H: MessageHandler + ?Sized>(
    socket: &mut FlowSocket,
    handler: &mut H,
    counters: &RunCounters,
    latch: &CompletionLatch,
) -> HarnessResult<Completion> {
    let mut reader_open = true;
    loop {
        let frame = tokio::select! {
            biased;
            completion = latch.wait() => return Ok(completion),
            frame = socket.next(), if reader_open => frame,
        };
        let payload = match frame {
            None => {
                // Quiet peer; the watchdog ends the run.
                reader_open = false;
                tracing::info!(received = counters.received(), "flow disconnected");
                continue;
            }
            Some(Err(err)) => return Err(HarnessError::WebSocket(err.to_string())),
            Some(Ok(Message::Text(text))) => serde_json::from_str::<Value>(text.as_str()),
            Some(Ok(Message::Binary(bytes))) => serde_json::from_slice::<Value>(&bytes),
            Some(Ok(_)) => continue,
        };
        let index = counters.record_message();
        let message = payload.map_err(|err| HarnessError::MessageParse {
            index,
            detail: err.to_string(),
        })?;
        let action = handler
            .on_message(&message, &counters.snapshot())
            .map_err(|reason| HarnessError::Handler {
                index,
                reason,
            })?;
        tracing::debug!(received = index, end = action.end, close = action.close, "message");
        if action.end {
            counters.mark_end_received();
            latch.complete(Completion {
                reason: CompletionReason::EndMarker,
                received: index,
            });
        }
        if action.close
            && reader_open
            && let Err(err) = socket.close(None).await
        {
            tracing::debug!(error = %err, "websocket close");
        }
    }
}

// ============================================================================
// SECTION: Stall Watchdog
// ============================================================================

/// Fixed-interval stall check, aborted when dropped.
struct Watchdog {
    /// Watchdog task.
    handle: JoinHandle<()>,
}

impl Watchdog {
    /// Starts checking one full `period` from now.
    fn spawn(counters: Arc<RunCounters>, latch: Arc<CompletionLatch>, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if latch.is_complete() {
                    return;
                }
                if counters.observe_stall() {
                    let received = counters.received();
                    if latch.complete(Completion {
                        reason: CompletionReason::Stalled,
                        received,
                    }) {
                        tracing::info!(received, "flow stalled");
                    }
                    return;
                }
            }
        });
        Self {
            handle,
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
