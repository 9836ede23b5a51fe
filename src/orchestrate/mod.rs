// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Sub-agent orchestration.
//!
//! A requester session asks for a task to run in a fresh child session; the
//! child's result is later posted back into the requester's chat.
//!
//! # Architecture
//!
//! - **SubagentOrchestrator**: Creates the child session, starts the run on
//!   the `subagent` lane, optionally waits for it, and returns a
//!   [`SpawnResult`].
//!
//! - **SubagentRegistry**: Records every spawned run and arbitrates which
//!   completion path gets to announce it.
//!
//! - **AnnounceFlow**: Gathers the child's reply, runs one extra step on the
//!   child session to write the post, appends usage stats, and sends it.
//!
//! - **AnnounceSupervisor**: Owns the detached announce tasks so their
//!   failures stay contained and shutdown can drain them.
//!
//! - **CompletionWatcher**: Follows gateway lifecycle events so runs spawned
//!   without waiting still get announced.
//!
//! ```text
//! sessions_spawn ──► SubagentOrchestrator ──► gateway: agent / agent.wait
//!                          │
//!                          ▼ claim_announce
//!   lifecycle events ──► SubagentRegistry ──► AnnounceSupervisor ──► AnnounceFlow ──► send
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use sidekick::orchestrate::{RequesterContext, SpawnOptions, SubagentOrchestrator};
//!
//! let orchestrator = SubagentOrchestrator::new(client, registry, announcer, supervisor);
//! let result = orchestrator
//!     .spawn(
//!         &RequesterContext::new("discord:group:123").with_provider("discord"),
//!         "Summarize the open issues",
//!         SpawnOptions::new().with_timeout_seconds(120),
//!     )
//!     .await;
//! println!("{}", result.status.as_str());
//! ```

pub mod announce;
pub mod prompt;
pub mod registry;
pub mod retry;
pub mod spawn;
pub mod supervisor;
pub mod target;
pub mod types;
pub mod usage;
pub mod watcher;

pub use announce::{AnnounceFlow, AnnounceOutcome, AnnounceParams, DEFAULT_ANNOUNCE_TIMEOUT, MAX_ANNOUNCE_WAIT};
pub use prompt::{build_announce_prompt, build_subagent_system_prompt, is_announce_skip, ANNOUNCE_SKIP};
pub use registry::SubagentRegistry;
pub use retry::{retry_until, RetryPolicy};
pub use spawn::{classify_patch_error, PatchFailure, SubagentOrchestrator, FORBIDDEN_FROM_SUBAGENT};
pub use supervisor::{task_budget, AnnounceSupervisor};
pub use target::{resolve_announce_target, target_from_key, AnnounceTarget};
pub use types::{Cleanup, RequesterContext, SpawnOptions, SpawnResult, SpawnStatus, SubagentRun};
pub use usage::{format_stats_line, UsageResolver, DEFAULT_USAGE_POLL};
pub use watcher::CompletionWatcher;
