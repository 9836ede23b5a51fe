// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Sidekick - background sub-agents for chat sessions.
//!
//! A session running on the gateway calls `sessions_spawn` to hand a task to
//! a fresh child session. The child runs on its own lane; when it finishes,
//! its result is posted back into the requester's chat together with a short
//! usage line.
//!
//! # Architecture
//!
//! - [`session`] - Session key grammar and the read-only usage store
//! - [`gateway`] - Typed RPC client and the local socket transport
//! - [`orchestrate`] - Spawning, the run registry, announce flow and supervision
//! - [`tools`] - The `sessions_spawn` tool and registry
//! - [`config`] - Configuration loading and merging
//! - [`telemetry`] - Tracing setup and metrics
//! - [`error`] - Error types and result aliases
//! - [`types`] - Tool definitions and pricing
//!
//! # Example
//!
//! ```rust,ignore
//! use sidekick::config::{load_config, CliOptions};
//! use sidekick::orchestrate::{RequesterContext, SpawnOptions};
//!
//! let config = load_config(Path::new("."), CliOptions::default())?;
//! let result = orchestrator
//!     .spawn(&RequesterContext::new("main"), "Check the build", SpawnOptions::new())
//!     .await;
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod orchestrate;
pub mod session;
pub mod telemetry;
pub mod tools;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{ConfigError, Result, StoreError, ToolError};
pub use gateway::{GatewayClient, GatewayError, GatewayTransport, SocketTransport};
pub use orchestrate::{
    AnnounceFlow, AnnounceSupervisor, CompletionWatcher, RequesterContext, SpawnOptions,
    SpawnResult, SpawnStatus, SubagentOrchestrator, SubagentRegistry, UsageResolver,
};
pub use types::{ModelPricing, ToolDefinition};

/// Sidekick version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
