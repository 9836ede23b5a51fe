// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Gateway wire types.
//!
//! Frames are newline-delimited JSON. Requests carry a fresh id that the
//! matching response echoes; events are pushed unsolicited. The typed params
//! and payloads below cover the methods the orchestrator calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Generate a unique request or idempotency id.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

// ============================================================================
// Frames
// ============================================================================

/// Error body of a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
}

/// A single frame on the gateway connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    Req {
        id: String,
        method: String,
        #[serde(default)]
        params: Value,
    },
    Res {
        id: String,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<RpcErrorBody>,
    },
    Event {
        event: String,
        #[serde(default)]
        payload: Value,
    },
}

impl Frame {
    pub fn request(method: impl Into<String>, params: Value) -> Self {
        Frame::Req {
            id: generate_id(),
            method: method.into(),
            params,
        }
    }

    pub fn ok(id: impl Into<String>, payload: Value) -> Self {
        Frame::Res {
            id: id.into(),
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, code: Option<String>, message: impl Into<String>) -> Self {
        Frame::Res {
            id: id.into(),
            ok: false,
            payload: None,
            error: Some(RpcErrorBody {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Encode a frame to a newline-delimited JSON string.
pub fn encode<T: Serialize>(frame: &T) -> Result<String, serde_json::Error> {
    let mut json = serde_json::to_string(frame)?;
    json.push('\n');
    Ok(json)
}

/// Decode a frame from a JSON line.
pub fn decode<'a, T: Deserialize<'a>>(json: &'a str) -> Result<T, serde_json::Error> {
    serde_json::from_str(json.trim())
}

// ============================================================================
// Agent runs
// ============================================================================

/// Method names.
pub mod methods {
    pub const AGENT: &str = "agent";
    pub const AGENT_WAIT: &str = "agent.wait";
    pub const CHAT_ABORT: &str = "chat.abort";
    pub const CHAT_HISTORY: &str = "chat.history";
    pub const SESSIONS_PATCH: &str = "sessions.patch";
    pub const SESSIONS_DELETE: &str = "sessions.delete";
    pub const SESSIONS_LIST: &str = "sessions.list";
    pub const SEND: &str = "send";
}

/// Execution lane a run is queued on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    /// Primary sub-agent runs.
    Subagent,
    /// Follow-up steps on an existing sub-agent session.
    Nested,
}

/// Params for `agent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentParams {
    pub message: String,
    pub session_key: String,
    pub idempotency_key: String,
    pub deliver: bool,
    pub lane: Lane,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_system_prompt: Option<String>,
}

/// Payload of an accepted `agent` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentAccepted {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<i64>,
}

/// Params for `agent.wait`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitParams {
    pub run_id: String,
    pub timeout_ms: u64,
}

/// Terminal state reported by `agent.wait`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitStatus {
    Ok,
    Timeout,
    Error,
}

/// Payload of `agent.wait`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitResponse {
    pub status: WaitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<i64>,
}

/// Params for `chat.abort`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortParams {
    pub session_key: String,
    pub run_id: String,
}

// ============================================================================
// Chat history
// ============================================================================

/// Params for `chat.history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    pub session_key: String,
    pub limit: u32,
}

/// One transcript message. Content is either a string or a block array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: Value,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: Value) -> Self {
        Self {
            role: role.into(),
            content,
        }
    }

    /// Tool traffic is not part of the visible conversation.
    pub fn is_tool(&self) -> bool {
        matches!(self.role.as_str(), "toolResult" | "tool")
    }

    /// Plain text of the message: the string content, or the joined text blocks.
    pub fn text(&self) -> Option<String> {
        match &self.content {
            Value::String(s) => Some(s.clone()),
            Value::Array(blocks) => {
                let parts: Vec<&str> = blocks
                    .iter()
                    .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                    .filter_map(|b| b.get("text").and_then(Value::as_str))
                    .collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join(""))
                }
            }
            _ => None,
        }
    }
}

/// Payload of `chat.history`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

// ============================================================================
// Sessions
// ============================================================================

/// Params for `sessions.patch`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawned_by: Option<String>,
}

/// Params for `sessions.delete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteParams {
    pub key: String,
    pub delete_transcript: bool,
}

/// Params for `sessions.list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub include_global: bool,
    pub include_unknown: bool,
    pub limit: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            include_global: true,
            include_unknown: true,
            limit: 200,
        }
    }
}

/// One row of `sessions.list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRow {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_account_id: Option<String>,
}

/// Payload of `sessions.list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionsListResponse {
    #[serde(default)]
    pub sessions: Vec<SessionRow>,
}

// ============================================================================
// Delivery
// ============================================================================

/// Params for `send`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendParams {
    pub to: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    pub message: String,
    pub idempotency_key: String,
}

// ============================================================================
// Events
// ============================================================================

/// Event name carrying agent run updates.
pub const AGENT_EVENT: &str = "agent";

/// Stream name for run lifecycle updates.
pub const LIFECYCLE_STREAM: &str = "lifecycle";

/// Payload of an `agent` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentEvent {
    pub run_id: String,
    #[serde(default)]
    pub stream: String,
    #[serde(default)]
    pub data: Value,
}

/// Lifecycle phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecyclePhase {
    Start,
    End,
    Error,
}

/// Parsed lifecycle data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleUpdate {
    pub phase: LifecyclePhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentEvent {
    /// Lifecycle update carried by this event, if it is one.
    pub fn lifecycle(&self) -> Option<LifecycleUpdate> {
        if self.stream != LIFECYCLE_STREAM {
            return None;
        }
        serde_json::from_value(self.data.clone()).ok()
    }
}
