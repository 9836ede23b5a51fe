// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Spawning sub-agent runs.
//!
//! A spawn creates a child session under the requester's agent, optionally
//! pins its model, starts the run on the `subagent` lane and registers it.
//! With a positive timeout the spawner waits for the run; a finished run is
//! announced in the background through the [`AnnounceSupervisor`]. A run
//! that timed out or failed while waited on is never announced.
//!
//! Failures on the primary path come back as a [`SpawnResult`] status, never
//! as an `Err`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use crate::gateway::protocol::generate_id;
use crate::gateway::{AgentParams, GatewayClient, GatewayError, Lane, SessionPatch, WaitStatus};
use crate::session::{agent_id_from_key, is_subagent_session_key, subagent_key, MainSessionAlias};

use super::announce::{AnnounceFlow, AnnounceParams, DEFAULT_ANNOUNCE_TIMEOUT};
use super::prompt::{build_subagent_system_prompt, SubagentPromptContext};
use super::registry::SubagentRegistry;
use super::supervisor::{task_budget, AnnounceSupervisor};
use super::types::{now_ms, RequesterContext, SpawnOptions, SpawnResult, SpawnStatus, SubagentRun};

/// Error text returned to sub-agents that try to spawn.
pub const FORBIDDEN_FROM_SUBAGENT: &str = "sessions_spawn is not allowed from sub-agent sessions";

/// How a failed model patch affects the spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchFailure {
    /// The model was rejected; the run proceeds on the session default.
    InvalidModel,
    /// Anything else; the spawn fails.
    Fatal,
}

const RECOVERABLE_CODES: &[&str] = &["INVALID_MODEL", "MODEL_NOT_ALLOWED"];
const RECOVERABLE_MESSAGES: &[&str] = &["invalid model", "model not allowed"];

/// Classify a `sessions.patch` failure.
///
/// A structured error code is checked first; gateways that only send text are
/// matched on their message.
pub fn classify_patch_error(err: &GatewayError) -> PatchFailure {
    if let Some(code) = err.code() {
        if RECOVERABLE_CODES.iter().any(|c| code.eq_ignore_ascii_case(c)) {
            return PatchFailure::InvalidModel;
        }
    }

    let message = err.message().to_lowercase();
    if RECOVERABLE_MESSAGES.iter().any(|m| message.contains(m)) {
        PatchFailure::InvalidModel
    } else {
        PatchFailure::Fatal
    }
}

/// Spawns sub-agent runs and hands finished ones to the announce flow.
pub struct SubagentOrchestrator {
    client: GatewayClient,
    registry: Arc<SubagentRegistry>,
    announcer: AnnounceFlow,
    supervisor: Arc<AnnounceSupervisor>,
    alias: MainSessionAlias,
    announce_timeout: Duration,
}

impl SubagentOrchestrator {
    pub fn new(
        client: GatewayClient,
        registry: Arc<SubagentRegistry>,
        announcer: AnnounceFlow,
        supervisor: Arc<AnnounceSupervisor>,
    ) -> Self {
        Self {
            client,
            registry,
            announcer,
            supervisor,
            alias: MainSessionAlias::default(),
            announce_timeout: DEFAULT_ANNOUNCE_TIMEOUT,
        }
    }

    pub fn with_alias(mut self, alias: MainSessionAlias) -> Self {
        self.alias = alias;
        self
    }

    pub fn with_announce_timeout(mut self, timeout: Duration) -> Self {
        self.announce_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<SubagentRegistry> {
        &self.registry
    }

    pub fn supervisor(&self) -> &Arc<AnnounceSupervisor> {
        &self.supervisor
    }

    /// Spawn a sub-agent for `task` on behalf of `requester`.
    #[instrument(skip_all, fields(requester = ?requester.session_key))]
    pub async fn spawn(&self, requester: &RequesterContext, task: &str, options: SpawnOptions) -> SpawnResult {
        let result = self.run_spawn(requester, task, options).await;

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_event(&format!("spawn.{}", result.status.as_str()));

        info!(
            status = result.status.as_str(),
            run_id = ?result.run_id,
            child = ?result.child_session_key,
            "Sub-agent spawn finished"
        );
        result
    }

    async fn run_spawn(&self, requester: &RequesterContext, task: &str, options: SpawnOptions) -> SpawnResult {
        if requester
            .session_key
            .as_deref()
            .is_some_and(is_subagent_session_key)
        {
            return SpawnResult::forbidden(FORBIDDEN_FROM_SUBAGENT);
        }

        let requester_key = requester.session_key.as_deref();
        let internal_key = self.alias.resolve_internal(requester_key);
        let display_key = self.alias.resolve_display(requester_key);
        let child_key = subagent_key(&agent_id_from_key(&internal_key));

        if requester.sandboxed {
            let patch = SessionPatch {
                key: child_key.clone(),
                spawned_by: Some(internal_key.clone()),
                ..Default::default()
            };
            if let Err(e) = self.client.patch_session(&patch).await {
                debug!("Recording sub-agent owner failed: {}", e);
            }
        }

        let requested_model = options
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());
        let mut model_applied = None;
        let mut warning = None;

        if let Some(model) = requested_model {
            let patch = SessionPatch {
                key: child_key.clone(),
                model: Some(model.to_string()),
                ..Default::default()
            };
            match self.client.patch_session(&patch).await {
                Ok(()) => model_applied = Some(true),
                Err(e) => match classify_patch_error(&e) {
                    PatchFailure::InvalidModel => {
                        warn!(model, "Sub-agent model override rejected: {}", e);
                        model_applied = Some(false);
                        warning = Some(e.message());
                    }
                    PatchFailure::Fatal => {
                        return SpawnResult::failed(e.message()).with_child(child_key);
                    }
                },
            }
        }

        let system_prompt = build_subagent_system_prompt(&SubagentPromptContext {
            label: options.label.as_deref(),
            requester_session_key: Some(&display_key),
            requester_provider: requester.provider.as_deref(),
            child_session_key: &child_key,
        });

        let idempotency_key = generate_id();
        let accepted = match self
            .client
            .agent(&AgentParams {
                message: task.to_string(),
                session_key: child_key.clone(),
                idempotency_key: idempotency_key.clone(),
                deliver: false,
                lane: Lane::Subagent,
                extra_system_prompt: Some(system_prompt),
            })
            .await
        {
            Ok(accepted) => accepted,
            Err(e) => {
                return SpawnResult::failed(e.message())
                    .with_child(child_key)
                    .with_run_id(idempotency_key);
            }
        };
        let run_id = accepted
            .run_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(idempotency_key);

        let run = SubagentRun {
            run_id: run_id.clone(),
            child_session_key: child_key.clone(),
            requester_session_key: internal_key,
            requester_provider: requester.provider.clone(),
            requester_display_key: display_key,
            task: task.to_string(),
            label: options.label.clone(),
            cleanup: options.cleanup,
            created_at: now_ms(),
            started_at: None,
            ended_at: None,
        };
        self.registry.register(run.clone());

        if options.timeout_seconds == 0 {
            return SpawnResult::new(SpawnStatus::Accepted)
                .with_child(child_key)
                .with_run_id(run_id)
                .with_model_applied(model_applied)
                .with_warning(warning);
        }

        let timeout_ms = options.timeout_seconds.saturating_mul(1000);
        let wait = match self.client.wait(&run_id, timeout_ms).await {
            Ok(wait) => wait,
            Err(e) if e.is_timeout() => {
                self.registry.close_announce(&run_id);
                self.abort_quietly(&child_key, &run_id).await;
                return SpawnResult::new(SpawnStatus::Timeout)
                    .with_error(e.message())
                    .with_child(child_key)
                    .with_run_id(run_id)
                    .with_warning(warning);
            }
            Err(e) => {
                self.registry.close_announce(&run_id);
                return SpawnResult::failed(e.message())
                    .with_child(child_key)
                    .with_run_id(run_id);
            }
        };

        match wait.status {
            WaitStatus::Timeout => {
                self.registry.close_announce(&run_id);
                self.abort_quietly(&child_key, &run_id).await;
                let mut result = SpawnResult::new(SpawnStatus::Timeout)
                    .with_child(child_key)
                    .with_run_id(run_id)
                    .with_warning(warning);
                result.error = wait.error;
                return result;
            }
            WaitStatus::Error => {
                self.registry.close_announce(&run_id);
                return SpawnResult::failed(wait.error.unwrap_or_else(|| "agent error".to_string()))
                    .with_child(child_key)
                    .with_run_id(run_id);
            }
            WaitStatus::Ok => {}
        }

        let reply = match self.client.read_latest_assistant_reply(&child_key).await {
            Ok(reply) => reply,
            Err(e) => {
                debug!("Reading sub-agent reply failed: {}", e);
                None
            }
        };

        if let Some(at) = wait.started_at {
            self.registry.mark_started(&run_id, at);
        }
        if let Some(at) = wait.ended_at {
            self.registry.mark_ended(&run_id, at);
        }

        if self.registry.claim_announce(&run_id) {
            let params = AnnounceParams::from_run(&run, self.announce_timeout)
                .with_round_one_reply(reply.clone())
                .with_wait_for_completion(false)
                .with_times(wait.started_at, wait.ended_at);
            let announcer = self.announcer.clone();
            self.supervisor.spawn(
                run_id.clone(),
                task_budget(self.announce_timeout),
                async move { announcer.run(params).await },
            );
        }

        SpawnResult::new(SpawnStatus::Ok)
            .with_child(child_key)
            .with_run_id(run_id)
            .with_reply(reply)
            .with_model_applied(model_applied)
            .with_warning(warning)
    }

    async fn abort_quietly(&self, session_key: &str, run_id: &str) {
        if let Err(e) = self.client.abort(session_key, run_id).await {
            debug!("chat.abort failed after wait timeout: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_structured_code() {
        let err = GatewayError::rpc("sessions.patch", Some("MODEL_NOT_ALLOWED".to_string()), "nope");
        assert_eq!(classify_patch_error(&err), PatchFailure::InvalidModel);

        let err = GatewayError::rpc("sessions.patch", Some("invalid_model".to_string()), "nope");
        assert_eq!(classify_patch_error(&err), PatchFailure::InvalidModel);
    }

    #[test]
    fn test_classify_message_fallback() {
        let err = GatewayError::rpc("sessions.patch", None, "Invalid model: gpt-9");
        assert_eq!(classify_patch_error(&err), PatchFailure::InvalidModel);

        let err = GatewayError::rpc("sessions.patch", None, "model not allowed for this agent");
        assert_eq!(classify_patch_error(&err), PatchFailure::InvalidModel);
    }

    #[test]
    fn test_classify_fatal() {
        let err = GatewayError::rpc("sessions.patch", Some("UNAVAILABLE".to_string()), "store locked");
        assert_eq!(classify_patch_error(&err), PatchFailure::Fatal);

        let err = GatewayError::Timeout {
            method: "sessions.patch".to_string(),
            timeout_ms: 10_000,
        };
        assert_eq!(classify_patch_error(&err), PatchFailure::Fatal);
        assert_eq!(classify_patch_error(&GatewayError::Closed), PatchFailure::Fatal);
    }
}
