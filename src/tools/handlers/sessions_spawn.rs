// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! `sessions_spawn` tool handler.
//!
//! Starts a sub-agent run for the calling session. Spawn failures are part of
//! the structured result; only malformed arguments produce a [`ToolError`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

#[cfg(feature = "telemetry")]
use tracing::{debug, instrument};

use crate::error::ToolError;
use crate::orchestrate::{Cleanup, RequesterContext, SpawnOptions, SubagentOrchestrator};
use crate::tools::parse_arguments;
use crate::tools::registry::{ToolHandler, ToolOutput};
use crate::types::{InputSchema, ToolDefinition};

pub const SESSIONS_SPAWN: &str = "sessions_spawn";

/// Handler for the `sessions_spawn` tool, bound to one requester session.
pub struct SessionsSpawnHandler {
    orchestrator: Arc<SubagentOrchestrator>,
    requester: RequesterContext,
}

impl SessionsSpawnHandler {
    pub fn new(orchestrator: Arc<SubagentOrchestrator>, requester: RequesterContext) -> Self {
        Self {
            orchestrator,
            requester,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpawnArgs {
    task: Option<Value>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    timeout_seconds: Option<Value>,
    #[serde(default)]
    cleanup: Option<Value>,
}

/// Whole seconds from a JSON number; negatives, NaN and non-numbers give 0.
fn parse_timeout_seconds(value: Option<&Value>) -> u64 {
    match value.and_then(Value::as_f64) {
        Some(secs) if secs.is_finite() && secs > 0.0 => secs.floor() as u64,
        _ => 0,
    }
}

fn parse_cleanup(value: Option<&Value>) -> Cleanup {
    value
        .and_then(Value::as_str)
        .map(Cleanup::parse_lenient)
        .unwrap_or_default()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl SpawnArgs {
    fn into_request(self) -> Result<(String, SpawnOptions), ToolError> {
        let task = match self.task {
            Some(Value::String(task)) => non_blank(Some(task)),
            Some(_) => return Err(ToolError::InvalidInput("task must be a string".to_string())),
            None => None,
        }
        .ok_or_else(|| ToolError::MissingParameter("task".to_string()))?;

        let options = SpawnOptions {
            label: non_blank(self.label),
            model: non_blank(self.model),
            timeout_seconds: parse_timeout_seconds(self.timeout_seconds.as_ref()),
            cleanup: parse_cleanup(self.cleanup.as_ref()),
        };
        Ok((task, options))
    }
}

#[async_trait]
impl ToolHandler for SessionsSpawnHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            SESSIONS_SPAWN,
            "Spawn a background sub-agent run in an isolated session and announce the result back to this chat",
        )
        .with_schema(
            InputSchema::new()
                .with_property("task", serde_json::json!({
                    "type": "string",
                    "description": "What the sub-agent should do"
                }))
                .with_property("label", serde_json::json!({
                    "type": "string",
                    "description": "Short label for the run"
                }))
                .with_property("model", serde_json::json!({
                    "type": "string",
                    "description": "Model override for the sub-agent session"
                }))
                .with_property("timeoutSeconds", serde_json::json!({
                    "type": "number",
                    "minimum": 0,
                    "description": "Seconds to wait for the run (0 = return immediately)"
                }))
                .with_property("cleanup", serde_json::json!({
                    "type": "string",
                    "enum": ["delete", "keep"],
                    "description": "Delete the sub-agent session after announcing (default: keep)"
                }))
                .with_required(vec!["task".to_string()]),
        )
    }

    fn is_mutating(&self) -> bool {
        true
    }

    #[cfg_attr(feature = "telemetry", instrument(skip(self, input)))]
    async fn execute(&self, input: Value) -> Result<ToolOutput, ToolError> {
        let args: SpawnArgs = parse_arguments(&input)?;
        let (task, options) = args.into_request()?;

        let result = self.orchestrator.spawn(&self.requester, &task, options).await;

        #[cfg(feature = "telemetry")]
        debug!(status = result.status.as_str(), "sessions_spawn finished");

        let metadata = serde_json::to_value(&result)
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to encode result: {e}")))?;
        let content = serde_json::to_string_pretty(&metadata)
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to encode result: {e}")))?;

        Ok(ToolOutput::structured(content, result.status.is_success(), metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(input: Value) -> Result<(String, SpawnOptions), ToolError> {
        parse_arguments::<SpawnArgs>(&input)?.into_request()
    }

    #[test]
    fn test_timeout_parsing() {
        assert_eq!(parse_timeout_seconds(Some(&json!(12.9))), 12);
        assert_eq!(parse_timeout_seconds(Some(&json!(0))), 0);
        assert_eq!(parse_timeout_seconds(Some(&json!(-3))), 0);
        assert_eq!(parse_timeout_seconds(Some(&json!("30"))), 0);
        assert_eq!(parse_timeout_seconds(None), 0);
    }

    #[test]
    fn test_cleanup_parsing() {
        assert_eq!(parse_cleanup(Some(&json!("delete"))), Cleanup::Delete);
        assert_eq!(parse_cleanup(Some(&json!("keep"))), Cleanup::Keep);
        assert_eq!(parse_cleanup(Some(&json!("purge"))), Cleanup::Keep);
        assert_eq!(parse_cleanup(Some(&json!(true))), Cleanup::Keep);
        assert_eq!(parse_cleanup(None), Cleanup::Keep);
    }

    #[test]
    fn test_full_arguments() {
        let (task, options) = args(json!({
            "task": "triage the inbox",
            "label": " inbox ",
            "model": "",
            "timeoutSeconds": 90.5,
            "cleanup": "delete"
        }))
        .unwrap();

        assert_eq!(task, "triage the inbox");
        assert_eq!(options.label.as_deref(), Some("inbox"));
        assert!(options.model.is_none());
        assert_eq!(options.timeout_seconds, 90);
        assert_eq!(options.cleanup, Cleanup::Delete);
    }

    #[test]
    fn test_missing_task() {
        assert!(matches!(args(json!({"label": "x"})), Err(ToolError::MissingParameter(_))));
        assert!(matches!(args(json!({"task": 7})), Err(ToolError::InvalidInput(_))));
        assert!(matches!(args(json!({"task": ""})), Err(ToolError::MissingParameter(_))));
        assert!(matches!(args(json!({"task": " \n\t "})), Err(ToolError::MissingParameter(_))));
    }
}
