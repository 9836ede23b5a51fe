// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Announcing a finished sub-agent run to the requester's chat.
//!
//! The flow runs detached from the spawn that started the run. It gathers the
//! child's final reply, asks the child for a post in an extra step on the
//! same session, appends a usage line, and sends the post to the requester's
//! chat. Nothing here reports errors to a caller: the result is an
//! [`AnnounceOutcome`] for logs and metrics. Cleanup runs on every path.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use crate::gateway::protocol::generate_id;
use crate::gateway::{AgentParams, GatewayClient, GatewayError, Lane, SendParams, WaitStatus};

use super::prompt::{build_announce_prompt, is_announce_skip, AnnouncePromptContext, ANNOUNCE_STEP_MESSAGE};
use super::target::resolve_announce_target;
use super::types::{Cleanup, SubagentRun};
use super::usage::UsageResolver;

/// Upper bound on any single wait inside the announce flow.
pub const MAX_ANNOUNCE_WAIT: Duration = Duration::from_secs(60);

/// Default budget handed to the announce flow.
pub const DEFAULT_ANNOUNCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Inputs to one announce run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceParams {
    pub child_session_key: String,
    pub run_id: String,
    pub requester_session_key: String,
    pub requester_provider: Option<String>,
    pub requester_display_key: String,
    pub task: String,
    pub timeout_ms: u64,
    pub cleanup: Cleanup,
    /// Reply already read by the spawner, if it waited.
    pub round_one_reply: Option<String>,
    /// Whether to wait for the run before reading its reply.
    pub wait_for_completion: bool,
    pub started_at: Option<i64>,
    pub ended_at: Option<i64>,
}

impl AnnounceParams {
    pub fn from_run(run: &SubagentRun, timeout: Duration) -> Self {
        Self {
            child_session_key: run.child_session_key.clone(),
            run_id: run.run_id.clone(),
            requester_session_key: run.requester_session_key.clone(),
            requester_provider: run.requester_provider.clone(),
            requester_display_key: run.requester_display_key.clone(),
            task: run.task.clone(),
            timeout_ms: timeout.as_millis() as u64,
            cleanup: run.cleanup,
            round_one_reply: None,
            wait_for_completion: true,
            started_at: run.started_at,
            ended_at: run.ended_at,
        }
    }

    pub fn with_round_one_reply(mut self, reply: Option<String>) -> Self {
        self.round_one_reply = reply;
        self
    }

    pub fn with_wait_for_completion(mut self, wait: bool) -> Self {
        self.wait_for_completion = wait;
        self
    }

    pub fn with_times(mut self, started_at: Option<i64>, ended_at: Option<i64>) -> Self {
        self.started_at = started_at;
        self.ended_at = ended_at;
        self
    }

    fn bounded_wait_ms(&self) -> u64 {
        self.timeout_ms.min(MAX_ANNOUNCE_WAIT.as_millis() as u64)
    }
}

/// How an announce run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnounceOutcome {
    /// A post was sent.
    Delivered { provider: String, to: String },
    /// The announce step declined to post.
    Suppressed,
    /// No chat to post to.
    NoTarget,
    /// A gateway call failed along the way.
    Failed(String),
}

impl AnnounceOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnounceOutcome::Delivered { .. } => "delivered",
            AnnounceOutcome::Suppressed => "suppressed",
            AnnounceOutcome::NoTarget => "no_target",
            AnnounceOutcome::Failed(_) => "failed",
        }
    }
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

/// Runs announce flows against the gateway.
#[derive(Clone)]
pub struct AnnounceFlow {
    client: GatewayClient,
    usage: Arc<UsageResolver>,
}

impl AnnounceFlow {
    pub fn new(client: GatewayClient, usage: Arc<UsageResolver>) -> Self {
        Self { client, usage }
    }

    /// Run the flow to completion. Never fails.
    #[instrument(skip(self, params), fields(run_id = %params.run_id, child = %params.child_session_key))]
    pub async fn run(&self, params: AnnounceParams) -> AnnounceOutcome {
        let outcome = match self.deliver(&params).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Sub-agent announce failed: {}", e);
                AnnounceOutcome::Failed(e.to_string())
            }
        };

        if params.cleanup == Cleanup::Delete {
            if let Err(e) = self.client.delete_session(&params.child_session_key).await {
                debug!("Sub-agent session cleanup failed: {}", e);
            }
        }

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_event(&format!("announce.{}", outcome.as_str()));

        info!(outcome = outcome.as_str(), "Sub-agent announce finished");
        outcome
    }

    async fn deliver(&self, params: &AnnounceParams) -> Result<AnnounceOutcome, GatewayError> {
        let reply = self.collect_reply(params).await;

        let Some(target) = resolve_announce_target(
            &self.client,
            &params.requester_session_key,
            &params.requester_display_key,
        )
        .await
        else {
            debug!("No announce target for requester {}", params.requester_session_key);
            return Ok(AnnounceOutcome::NoTarget);
        };

        let prompt = build_announce_prompt(&AnnouncePromptContext {
            requester_session_key: &params.requester_session_key,
            requester_provider: params.requester_provider.as_deref(),
            announce_provider: &target.provider,
            task: &params.task,
            sub_agent_reply: reply.as_deref(),
        });

        let announce_reply = self
            .run_step(&params.child_session_key, prompt, params.bounded_wait_ms())
            .await?;
        let announce_reply = match non_empty(announce_reply) {
            Some(text) if !is_announce_skip(&text) => text,
            _ => return Ok(AnnounceOutcome::Suppressed),
        };

        let stats = self
            .usage
            .summarize(&params.child_session_key, params.started_at, params.ended_at)
            .await;
        let message = format!("{}\n\n{}", announce_reply.trim(), stats);

        self.client
            .send(&SendParams {
                to: target.to.clone(),
                provider: target.provider.clone(),
                account_id: target.account_id.clone(),
                message,
                idempotency_key: generate_id(),
            })
            .await?;

        Ok(AnnounceOutcome::Delivered {
            provider: target.provider,
            to: target.to,
        })
    }

    /// The child's final reply: the one handed in, else read after waiting.
    async fn collect_reply(&self, params: &AnnounceParams) -> Option<String> {
        if let Some(reply) = non_empty(params.round_one_reply.clone()) {
            return Some(reply);
        }

        let mut reply = None;
        if params.wait_for_completion {
            match self.client.wait(&params.run_id, params.bounded_wait_ms()).await {
                Ok(wait) if wait.status == WaitStatus::Ok => {
                    reply = self.read_reply(&params.child_session_key).await;
                }
                Ok(wait) => debug!(status = ?wait.status, "Sub-agent run not finished before announce"),
                Err(e) => debug!("agent.wait failed before announce: {}", e),
            }
        }

        match reply {
            Some(reply) => Some(reply),
            None => self.read_reply(&params.child_session_key).await,
        }
    }

    async fn read_reply(&self, session_key: &str) -> Option<String> {
        match self.client.read_latest_assistant_reply(session_key).await {
            Ok(reply) => reply,
            Err(e) => {
                debug!("Reading sub-agent reply failed: {}", e);
                None
            }
        }
    }

    /// One extra run on the child session; returns its reply when it finished in time.
    async fn run_step(
        &self,
        session_key: &str,
        extra_system_prompt: String,
        wait_ms: u64,
    ) -> Result<Option<String>, GatewayError> {
        let idempotency_key = generate_id();
        let accepted = self
            .client
            .agent(&AgentParams {
                message: ANNOUNCE_STEP_MESSAGE.to_string(),
                session_key: session_key.to_string(),
                idempotency_key: idempotency_key.clone(),
                deliver: false,
                lane: Lane::Nested,
                extra_system_prompt: Some(extra_system_prompt),
            })
            .await?;
        let run_id = accepted
            .run_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(idempotency_key);

        let wait = self.client.wait(&run_id, wait_ms).await?;
        if wait.status != WaitStatus::Ok {
            debug!(status = ?wait.status, "Announce step did not finish");
            return Ok(None);
        }
        self.client.read_latest_assistant_reply(session_key).await
    }
}
