// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Core types for sub-agent orchestration.

use serde::{Deserialize, Serialize};

/// Current time in epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ============================================================================
// Spawn Options
// ============================================================================

/// What happens to the child session once its result has been announced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cleanup {
    /// Delete the child session and its transcript.
    Delete,
    /// Leave the child session in place.
    #[default]
    Keep,
}

impl Cleanup {
    /// Parse user input; anything other than `delete` keeps the session.
    pub fn parse_lenient(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("delete") {
            Cleanup::Delete
        } else {
            Cleanup::Keep
        }
    }
}

/// Options for a spawn request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnOptions {
    /// Short human label for the run.
    pub label: Option<String>,
    /// Model override applied to the child session before it starts.
    pub model: Option<String>,
    /// How long to wait for the run; zero returns immediately.
    pub timeout_seconds: u64,
    pub cleanup: Cleanup,
}

impl SpawnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_cleanup(mut self, cleanup: Cleanup) -> Self {
        self.cleanup = cleanup;
        self
    }
}

/// The session asking for a spawn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequesterContext {
    /// Requester session key; absent means the main session.
    pub session_key: Option<String>,
    /// Chat provider the requester is talking through.
    pub provider: Option<String>,
    /// Sandboxed requesters record ownership on the child session.
    pub sandboxed: bool,
}

impl RequesterContext {
    pub fn new(session_key: impl Into<String>) -> Self {
        Self {
            session_key: Some(session_key.into()),
            ..Default::default()
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn sandboxed(mut self, sandboxed: bool) -> Self {
        self.sandboxed = sandboxed;
        self
    }
}

// ============================================================================
// Spawn Result
// ============================================================================

/// Outcome status of a spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpawnStatus {
    /// The requester may not spawn.
    Forbidden,
    /// Patching, starting or waiting failed.
    Error,
    /// The run did not finish within the wait budget.
    Timeout,
    /// The run started; nobody waited for it.
    Accepted,
    /// The run finished within the wait budget.
    Ok,
}

impl SpawnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpawnStatus::Forbidden => "forbidden",
            SpawnStatus::Error => "error",
            SpawnStatus::Timeout => "timeout",
            SpawnStatus::Accepted => "accepted",
            SpawnStatus::Ok => "ok",
        }
    }

    /// Whether the run is known to be alive or finished.
    pub fn is_success(&self) -> bool {
        matches!(self, SpawnStatus::Accepted | SpawnStatus::Ok)
    }
}

/// Result returned to the caller of a spawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnResult {
    pub status: SpawnStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_session_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Present only when a model override was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_applied: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl SpawnResult {
    pub fn new(status: SpawnStatus) -> Self {
        Self {
            status,
            child_session_key: None,
            run_id: None,
            reply: None,
            error: None,
            model_applied: None,
            warning: None,
        }
    }

    pub fn forbidden(error: impl Into<String>) -> Self {
        Self::new(SpawnStatus::Forbidden).with_error(error)
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::new(SpawnStatus::Error).with_error(error)
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_child(mut self, child_session_key: impl Into<String>) -> Self {
        self.child_session_key = Some(child_session_key.into());
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_reply(mut self, reply: Option<String>) -> Self {
        self.reply = reply;
        self
    }

    pub fn with_model_applied(mut self, model_applied: Option<bool>) -> Self {
        self.model_applied = model_applied;
        self
    }

    pub fn with_warning(mut self, warning: Option<String>) -> Self {
        self.warning = warning;
        self
    }
}

// ============================================================================
// Registry Records
// ============================================================================

/// A sub-agent run known to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubagentRun {
    pub run_id: String,
    pub child_session_key: String,
    /// Requester key as the gateway knows it.
    pub requester_session_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_provider: Option<String>,
    /// Requester key as shown to users.
    pub requester_display_key: String,
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub cleanup: Cleanup,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<i64>,
}
