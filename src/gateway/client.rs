// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Typed gateway client.
//!
//! Every call the orchestrator makes goes through [`GatewayClient`], which
//! serializes params, applies the per-method timeout, and decodes payloads.

use std::sync::Arc;
use std::time::Duration;
#[cfg(feature = "telemetry")]
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::trace;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use super::error::GatewayError;
use super::protocol::{
    methods, AbortParams, AgentAccepted, AgentParams, ChatMessage, DeleteParams, HistoryParams,
    HistoryResponse, ListParams, SendParams, SessionPatch, SessionRow, SessionsListResponse,
    WaitParams, WaitResponse,
};
use super::transport::GatewayTransport;

/// Default budget for a single gateway call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Budget for `chat.abort`.
pub const DEFAULT_ABORT_TIMEOUT: Duration = Duration::from_secs(5);

/// Slack added to the transport budget of `agent.wait` on top of the wait itself.
pub const WAIT_SLACK: Duration = Duration::from_secs(2);

/// Messages fetched when looking for the latest reply.
pub const HISTORY_LIMIT: u32 = 50;

/// Typed access to gateway methods.
#[derive(Clone)]
pub struct GatewayClient {
    transport: Arc<dyn GatewayTransport>,
    call_timeout: Duration,
    abort_timeout: Duration,
}

impl GatewayClient {
    pub fn new(transport: Arc<dyn GatewayTransport>) -> Self {
        Self {
            transport,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            abort_timeout: DEFAULT_ABORT_TIMEOUT,
        }
    }

    /// Override the default and abort call budgets.
    pub fn with_timeouts(mut self, call_timeout: Duration, abort_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self.abort_timeout = abort_timeout;
        self
    }

    async fn request<P, R>(&self, method: &str, params: &P, timeout: Duration) -> Result<R, GatewayError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        #[cfg(feature = "telemetry")]
        let start = Instant::now();

        let params = serde_json::to_value(params)?;
        trace!(method, "gateway call");
        let result = self.transport.call(method, params, timeout).await;

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_gateway_call(method, start.elapsed(), result.is_ok());

        let payload = match result? {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        serde_json::from_value(payload).map_err(|e| GatewayError::InvalidResponse {
            method: method.to_string(),
            message: e.to_string(),
        })
    }

    async fn request_unit<P>(&self, method: &str, params: &P, timeout: Duration) -> Result<(), GatewayError>
    where
        P: Serialize + ?Sized,
    {
        self.request::<P, Value>(method, params, timeout).await.map(|_| ())
    }

    /// Start a run.
    pub async fn agent(&self, params: &AgentParams) -> Result<AgentAccepted, GatewayError> {
        self.request(methods::AGENT, params, self.call_timeout).await
    }

    /// Wait for a run to finish, bounded by `timeout_ms` on the gateway side.
    pub async fn wait(&self, run_id: &str, timeout_ms: u64) -> Result<WaitResponse, GatewayError> {
        let params = WaitParams {
            run_id: run_id.to_string(),
            timeout_ms,
        };
        let budget = Duration::from_millis(timeout_ms) + WAIT_SLACK;
        self.request(methods::AGENT_WAIT, &params, budget).await
    }

    /// Ask the gateway to cancel a run.
    pub async fn abort(&self, session_key: &str, run_id: &str) -> Result<(), GatewayError> {
        let params = AbortParams {
            session_key: session_key.to_string(),
            run_id: run_id.to_string(),
        };
        self.request_unit(methods::CHAT_ABORT, &params, self.abort_timeout).await
    }

    pub async fn patch_session(&self, patch: &SessionPatch) -> Result<(), GatewayError> {
        self.request_unit(methods::SESSIONS_PATCH, patch, self.call_timeout).await
    }

    /// Delete a session together with its transcript.
    pub async fn delete_session(&self, key: &str) -> Result<(), GatewayError> {
        let params = DeleteParams {
            key: key.to_string(),
            delete_transcript: true,
        };
        self.request_unit(methods::SESSIONS_DELETE, &params, self.call_timeout).await
    }

    pub async fn list_sessions(&self, params: &ListParams) -> Result<Vec<SessionRow>, GatewayError> {
        let response: SessionsListResponse =
            self.request(methods::SESSIONS_LIST, params, self.call_timeout).await?;
        Ok(response.sessions)
    }

    /// Deliver a message to a chat provider.
    pub async fn send(&self, params: &SendParams) -> Result<(), GatewayError> {
        self.request_unit(methods::SEND, params, self.call_timeout).await
    }

    pub async fn history(&self, session_key: &str, limit: u32) -> Result<Vec<ChatMessage>, GatewayError> {
        let params = HistoryParams {
            session_key: session_key.to_string(),
            limit,
        };
        let response: HistoryResponse =
            self.request(methods::CHAT_HISTORY, &params, self.call_timeout).await?;
        Ok(response.messages)
    }

    /// Text of the most recent assistant message in a session, if any.
    pub async fn read_latest_assistant_reply(&self, session_key: &str) -> Result<Option<String>, GatewayError> {
        let messages = self.history(session_key, HISTORY_LIMIT).await?;
        Ok(latest_assistant_text(&messages))
    }
}

/// Last non-tool message, if it is a non-empty assistant message.
pub fn latest_assistant_text(messages: &[ChatMessage]) -> Option<String> {
    let last = messages.iter().rev().find(|m| !m.is_tool())?;
    if last.role != "assistant" {
        return None;
    }
    let text = last.text()?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
