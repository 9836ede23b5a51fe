// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tool registry and handler trait.
//!
//! - [`ToolHandler`] trait that all tools implement
//! - [`ToolRegistry`] for managing and dispatching tool calls
//! - [`ToolOutput`] for returning results from tool execution

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "telemetry")]
use tracing::{debug, info_span, Instrument};

use crate::error::ToolError;
use crate::orchestrate::{RequesterContext, SubagentOrchestrator};
#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;
use crate::types::ToolDefinition;

use super::handlers::SessionsSpawnHandler;
use super::truncate_text;

/// Output from executing a tool.
#[derive(Debug, Clone)]
pub enum ToolOutput {
    Text {
        content: String,
        success: bool,
    },
    /// Text plus the machine-readable value it was rendered from.
    Structured {
        content: String,
        success: bool,
        metadata: Option<serde_json::Value>,
    },
}

impl ToolOutput {
    pub fn success(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
            success: true,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
            success: false,
        }
    }

    pub fn structured(content: impl Into<String>, success: bool, metadata: serde_json::Value) -> Self {
        Self::Structured {
            content: content.into(),
            success,
            metadata: Some(metadata),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::Text { content, .. } | Self::Structured { content, .. } => content,
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            Self::Text { success, .. } | Self::Structured { success, .. } => *success,
        }
    }

    pub fn metadata(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Text { .. } => None,
            Self::Structured { metadata, .. } => metadata.as_ref(),
        }
    }

    /// Content cut to `max_bytes` on a char boundary, for logs.
    pub fn log_preview(&self, max_bytes: usize) -> String {
        truncate_text(self.content(), max_bytes)
    }
}

impl From<ToolError> for ToolOutput {
    fn from(err: ToolError) -> Self {
        Self::error(err.to_string())
    }
}

/// Trait that all tool handlers implement.
///
/// ```rust,ignore
/// struct Echo;
///
/// #[async_trait]
/// impl ToolHandler for Echo {
///     fn definition(&self) -> ToolDefinition {
///         ToolDefinition::new("echo", "Echo the input")
///     }
///
///     fn is_mutating(&self) -> bool {
///         false
///     }
///
///     async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError> {
///         Ok(ToolOutput::success(input.to_string()))
///     }
/// }
/// ```
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Name, description and input schema.
    fn definition(&self) -> ToolDefinition;

    /// Whether the tool changes state outside the calling session.
    fn is_mutating(&self) -> bool;

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError>;
}

/// Registry of available tools, maps names to handlers.
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Tools offered to a requester session.
    pub fn for_requester(orchestrator: Arc<SubagentOrchestrator>, requester: RequesterContext) -> Self {
        let mut builder = ToolRegistryBuilder::new();
        builder.register(SessionsSpawnHandler::new(orchestrator, requester));
        builder.build()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// All tool definitions, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.handlers.values().map(|h| h.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Dispatch a tool call.
    ///
    /// Only an unknown tool is an `Err`; handler failures come back as an
    /// error output with `is_error` set.
    pub async fn dispatch(
        &self,
        tool_name: &str,
        input: serde_json::Value,
    ) -> Result<DispatchResult, ToolError> {
        let handler = self
            .get(tool_name)
            .ok_or_else(|| ToolError::NotFound(tool_name.to_string()))?;

        let start = Instant::now();

        #[cfg(feature = "telemetry")]
        let result = handler
            .execute(input)
            .instrument(info_span!("tool_execute", tool = %tool_name))
            .await;

        #[cfg(not(feature = "telemetry"))]
        let result = handler.execute(input).await;

        let duration = start.elapsed();

        #[cfg(feature = "telemetry")]
        {
            let success = result.as_ref().map(ToolOutput::is_success).unwrap_or(false);
            GLOBAL_METRICS.record_tool(tool_name, duration, success);
            debug!(tool = %tool_name, duration_ms = duration.as_millis() as u64, success, "Tool finished");
        }

        let (output, is_error) = match result {
            Ok(output) => (output, false),
            Err(err) => (ToolOutput::from(err), true),
        };

        Ok(DispatchResult {
            tool_name: tool_name.to_string(),
            output,
            duration,
            is_error,
        })
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of dispatching a tool call.
#[derive(Debug)]
pub struct DispatchResult {
    pub tool_name: String,
    pub output: ToolOutput,
    pub duration: Duration,
    /// The handler returned an error rather than an output.
    pub is_error: bool,
}

/// Builder for constructing a ToolRegistry.
#[derive(Default)]
pub struct ToolRegistryBuilder {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: ToolHandler + 'static>(&mut self, handler: T) -> &mut Self {
        self.register_arc(Arc::new(handler))
    }

    pub fn register_arc(&mut self, handler: Arc<dyn ToolHandler>) -> &mut Self {
        let def = handler.definition();
        self.handlers.insert(def.name, handler);
        self
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry {
            handlers: self.handlers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticTool {
        name: &'static str,
        fail: bool,
    }

    #[async_trait]
    impl ToolHandler for StaticTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new(self.name, "A fixed-answer tool")
        }

        fn is_mutating(&self) -> bool {
            false
        }

        async fn execute(&self, _input: serde_json::Value) -> Result<ToolOutput, ToolError> {
            if self.fail {
                Err(ToolError::MissingParameter("task".to_string()))
            } else {
                Ok(ToolOutput::structured("{}", true, serde_json::json!({"status": "ok"})))
            }
        }
    }

    fn registry() -> ToolRegistry {
        let mut builder = ToolRegistryBuilder::new();
        builder
            .register(StaticTool { name: "zeta", fail: false })
            .register(StaticTool { name: "alpha", fail: true });
        builder.build()
    }

    #[test]
    fn test_tool_output() {
        let output = ToolOutput::error("failed");
        assert!(!output.is_success());
        assert!(output.metadata().is_none());

        let output = ToolOutput::structured("{}", true, serde_json::json!({"a": 1}));
        assert!(output.is_success());
        assert_eq!(output.metadata().unwrap()["a"], 1);
    }

    #[test]
    fn test_tool_output_log_preview_utf8() {
        let output = ToolOutput::success("é".repeat(50));
        let preview = output.log_preview(5);
        assert!(preview.starts_with("éé"));
        assert!(preview.contains("truncated"));
    }

    #[test]
    fn test_definitions_sorted() {
        let names: Vec<String> = registry().definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn test_registry_dispatch() {
        let result = registry().dispatch("zeta", serde_json::json!({})).await.unwrap();
        assert_eq!(result.tool_name, "zeta");
        assert!(result.output.is_success());
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn test_registry_dispatch_handler_error() {
        let result = registry().dispatch("alpha", serde_json::json!({})).await.unwrap();
        assert!(result.is_error);
        assert!(result.output.content().contains("task"));
    }

    #[tokio::test]
    async fn test_registry_dispatch_not_found() {
        let result = ToolRegistry::new().dispatch("nonexistent", serde_json::json!({})).await;
        assert!(matches!(result.unwrap_err(), ToolError::NotFound(_)));
    }
}
