// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Socket-backed gateway transport.
//!
//! Writes request frames, correlates responses by id, and forwards `agent`
//! events to an optional channel.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::GatewayError;
use super::protocol::{decode, encode, generate_id, AgentEvent, Frame, AGENT_EVENT, LIFECYCLE_STREAM};
use super::transport::{self, GatewayStream, GatewayTransport};

const CONNECT_RETRY_ATTEMPTS: usize = 10;
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(100);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A request waiting for its response.
struct PendingCall {
    method: String,
    tx: oneshot::Sender<Result<Value, GatewayError>>,
}

type PendingMap = Arc<Mutex<HashMap<String, PendingCall>>>;

/// Gateway transport over a local socket.
pub struct SocketTransport {
    writer: Mutex<WriteHalf<GatewayStream>>,
    pending: PendingMap,
    reader: JoinHandle<()>,
}

impl SocketTransport {
    /// Connect to the gateway socket, retrying briefly while it comes up.
    pub async fn connect(
        path: &Path,
        events: Option<mpsc::Sender<AgentEvent>>,
    ) -> Result<Self, GatewayError> {
        let mut last_error: Option<String> = None;

        for attempt in 0..CONNECT_RETRY_ATTEMPTS {
            match tokio::time::timeout(CONNECT_TIMEOUT, transport::connect(path)).await {
                Ok(Ok(stream)) => {
                    debug!("Connected to gateway at {:?}", path);
                    return Ok(Self::from_stream(stream, events));
                }
                Ok(Err(err)) => last_error = Some(err.to_string()),
                Err(_) => last_error = Some("connect timeout".to_string()),
            }

            if attempt + 1 < CONNECT_RETRY_ATTEMPTS {
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
            }
        }

        Err(GatewayError::ConnectFailed(
            last_error.unwrap_or_else(|| "failed to connect".to_string()),
        ))
    }

    /// Wrap an already-open stream.
    pub fn from_stream(stream: GatewayStream, events: Option<mpsc::Sender<AgentEvent>>) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let reader = tokio::spawn(read_loop(read_half, Arc::clone(&pending), events));

        Self {
            writer: Mutex::new(write_half),
            pending,
            reader,
        }
    }

    async fn write_frame(&self, frame: &Frame) -> Result<(), GatewayError> {
        let encoded = encode(frame)?;
        let mut writer = self.writer.lock().await;
        writer
            .write_all(encoded.as_bytes())
            .await
            .map_err(|e| GatewayError::from_io_error("writing request", e))?;
        writer
            .flush()
            .await
            .map_err(|e| GatewayError::from_io_error("flushing request", e))
    }
}

#[async_trait]
impl GatewayTransport for SocketTransport {
    async fn call(&self, method: &str, params: Value, timeout: Duration) -> Result<Value, GatewayError> {
        if self.reader.is_finished() {
            return Err(GatewayError::Closed);
        }

        let id = generate_id();
        let frame = Frame::Req {
            id: id.clone(),
            method: method.to_string(),
            params,
        };

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(
            id.clone(),
            PendingCall {
                method: method.to_string(),
                tx,
            },
        );

        if let Err(e) = self.write_frame(&frame).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(GatewayError::Closed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(GatewayError::Timeout {
                    method: method.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }
}

impl Drop for SocketTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(
    read_half: ReadHalf<GatewayStream>,
    pending: PendingMap,
    events: Option<mpsc::Sender<AgentEvent>>,
) {
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                info!("Gateway disconnected");
                break;
            }
            Ok(_) => {
                if line.trim().is_empty() {
                    continue;
                }
                match decode::<Frame>(&line) {
                    Ok(frame) => handle_frame(frame, &pending, events.as_ref()).await,
                    Err(e) => debug!("Ignoring undecodable gateway frame: {}", e),
                }
            }
            Err(e) => {
                warn!("Error reading from gateway: {}", e);
                break;
            }
        }
    }

    // Dropping the senders fails every outstanding call with `Closed`.
    pending.lock().await.clear();
}

async fn handle_frame(
    frame: Frame,
    pending: &PendingMap,
    events: Option<&mpsc::Sender<AgentEvent>>,
) {
    match frame {
        Frame::Res {
            id,
            ok,
            payload,
            error,
        } => {
            let Some(call) = pending.lock().await.remove(&id) else {
                debug!("Response for unknown request {}", id);
                return;
            };
            let result = if ok {
                Ok(payload.unwrap_or(Value::Null))
            } else {
                let (code, message) = match error {
                    Some(body) => (body.code, body.message),
                    None => (None, "unknown error".to_string()),
                };
                Err(GatewayError::rpc(call.method, code, message))
            };
            let _ = call.tx.send(result);
        }
        Frame::Event { event, payload } if event == AGENT_EVENT => {
            let Some(events) = events else { return };
            match serde_json::from_value::<AgentEvent>(payload) {
                // Lifecycle events drive announcements; wait for room rather than drop them.
                Ok(agent_event) if agent_event.stream == LIFECYCLE_STREAM => {
                    if events.send(agent_event).await.is_err() {
                        debug!("Agent event channel closed; dropping lifecycle event");
                    }
                }
                Ok(_) => {}
                Err(e) => debug!("Ignoring malformed agent event: {}", e),
            }
        }
        Frame::Event { .. } | Frame::Req { .. } => {}
    }
}
