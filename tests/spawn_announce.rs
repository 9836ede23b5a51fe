// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Spawn and announce behavior against a scripted gateway.

mod common;

use serde_json::json;
use tempfile::TempDir;

use common::{lifecycle, Harness, ScriptedGateway};
use sidekick::gateway::GatewayError;
use sidekick::orchestrate::{Cleanup, RequesterContext, SpawnOptions, SpawnStatus, FORBIDDEN_FROM_SUBAGENT};
use sidekick::tools::{ToolRegistry, SESSIONS_SPAWN};

fn store_path(temp: &TempDir) -> std::path::PathBuf {
    temp.path().join("sessions.json")
}

// ============================================================================
// Primary path
// ============================================================================

#[tokio::test]
async fn test_subagent_requester_is_forbidden() {
    let temp = TempDir::new().unwrap();
    let h = Harness::new(ScriptedGateway::new(), &store_path(&temp));

    let result = h
        .orchestrator
        .spawn(
            &RequesterContext::new("agent:main:subagent:1234"),
            "recurse",
            SpawnOptions::new().with_timeout_seconds(5),
        )
        .await;

    assert_eq!(result.status, SpawnStatus::Forbidden);
    assert_eq!(result.error.as_deref(), Some(FORBIDDEN_FROM_SUBAGENT));
    assert!(h.gateway.calls().is_empty());
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn test_zero_timeout_returns_accepted() {
    let temp = TempDir::new().unwrap();
    let h = Harness::new(ScriptedGateway::new(), &store_path(&temp));

    let result = h
        .orchestrator
        .spawn(&RequesterContext::new("main"), "index the repo", SpawnOptions::new().with_label("index"))
        .await;

    assert_eq!(result.status, SpawnStatus::Accepted);
    assert_eq!(result.run_id.as_deref(), Some("run-1"));
    let child = result.child_session_key.unwrap();
    assert!(child.starts_with("agent:main:subagent:"));
    assert!(result.model_applied.is_none());

    assert_eq!(h.gateway.methods(), vec!["agent"]);
    let agent = &h.gateway.params_for("agent")[0];
    assert_eq!(agent["sessionKey"], child.as_str());
    assert_eq!(agent["lane"], "subagent");
    assert_eq!(agent["deliver"], false);
    let prompt = agent["extraSystemPrompt"].as_str().unwrap();
    assert!(prompt.contains("Label: index"));
    assert!(prompt.contains(&child));

    let run = h.registry.get("run-1").unwrap();
    assert_eq!(run.requester_session_key, "main");
    assert!(!h.registry.is_announce_claimed("run-1"));
}

#[tokio::test]
async fn test_sandboxed_requester_records_owner() {
    let temp = TempDir::new().unwrap();
    let h = Harness::new(ScriptedGateway::new(), &store_path(&temp));

    let result = h
        .orchestrator
        .spawn(&RequesterContext::new("main").sandboxed(true), "task", SpawnOptions::new())
        .await;

    assert_eq!(result.status, SpawnStatus::Accepted);
    assert_eq!(h.gateway.methods(), vec!["sessions.patch", "agent"]);
    let patch = &h.gateway.params_for("sessions.patch")[0];
    assert_eq!(patch["spawnedBy"], "main");
    assert!(patch.get("model").is_none());
}

#[tokio::test]
async fn test_invalid_model_runs_with_warning() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::new().with_model_patch_error(GatewayError::rpc(
        "sessions.patch",
        Some("INVALID_MODEL".to_string()),
        "model gpt-9 is not configured",
    ));
    let h = Harness::new(gateway, &store_path(&temp));

    let result = h
        .orchestrator
        .spawn(&RequesterContext::new("main"), "task", SpawnOptions::new().with_model("gpt-9"))
        .await;

    assert_eq!(result.status, SpawnStatus::Accepted);
    assert_eq!(result.model_applied, Some(false));
    assert_eq!(result.warning.as_deref(), Some("model gpt-9 is not configured"));
    assert_eq!(h.gateway.count("agent"), 1);
}

#[tokio::test]
async fn test_model_patch_failure_stops_spawn() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::new()
        .with_model_patch_error(GatewayError::rpc("sessions.patch", None, "session store locked"));
    let h = Harness::new(gateway, &store_path(&temp));

    let result = h
        .orchestrator
        .spawn(&RequesterContext::new("main"), "task", SpawnOptions::new().with_model("sonnet"))
        .await;

    assert_eq!(result.status, SpawnStatus::Error);
    assert_eq!(result.error.as_deref(), Some("session store locked"));
    assert!(result.child_session_key.is_some());
    assert_eq!(h.gateway.count("agent"), 0);
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn test_model_applied() {
    let temp = TempDir::new().unwrap();
    let h = Harness::new(ScriptedGateway::new(), &store_path(&temp));

    let result = h
        .orchestrator
        .spawn(&RequesterContext::new("main"), "task", SpawnOptions::new().with_model(" sonnet "))
        .await;

    assert_eq!(result.model_applied, Some(true));
    assert!(result.warning.is_none());
    assert_eq!(h.gateway.params_for("sessions.patch")[0]["model"], "sonnet");
}

// ============================================================================
// Waiting
// ============================================================================

#[tokio::test]
async fn test_wait_timeout_aborts_without_announce() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::new().with_waits(vec![Ok(json!({"status": "timeout"}))]);
    let h = Harness::new(gateway, &store_path(&temp));

    let result = h
        .orchestrator
        .spawn(&RequesterContext::new("main"), "task", SpawnOptions::new().with_timeout_seconds(1))
        .await;
    h.drain().await;

    assert_eq!(result.status, SpawnStatus::Timeout);
    assert_eq!(result.run_id.as_deref(), Some("run-1"));
    let abort = h.gateway.params_for("chat.abort");
    assert_eq!(abort.len(), 1);
    assert_eq!(abort[0]["runId"], "run-1");
    assert_eq!(h.gateway.count("send"), 0);
    assert!(h.registry.is_announce_claimed("run-1"));
}

#[tokio::test]
async fn test_late_end_after_timeout_is_not_announced() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::new()
        .with_waits(vec![Ok(json!({"status": "timeout"}))])
        .with_replies(&["late result", "Posting the late result."]);
    let h = Harness::new(gateway, &store_path(&temp));

    let result = h
        .orchestrator
        .spawn(&RequesterContext::new("discord:group:req"), "task", SpawnOptions::new().with_timeout_seconds(1))
        .await;
    assert_eq!(result.status, SpawnStatus::Timeout);

    assert!(!h.watcher.handle_event(&lifecycle("run-1", json!({"phase": "end", "endedAt": 9_000}))));
    h.drain().await;

    assert_eq!(h.gateway.count("send"), 0);
    assert_eq!(h.gateway.count("agent"), 1);
    assert_eq!(h.registry.get("run-1").unwrap().ended_at, Some(9_000));
}

#[tokio::test]
async fn test_late_error_after_failed_wait_is_not_announced() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::new()
        .with_waits(vec![Ok(json!({"status": "error", "error": "provider overloaded"}))])
        .with_replies(&["partial", "Posting partial."]);
    let h = Harness::new(gateway, &store_path(&temp));

    let result = h
        .orchestrator
        .spawn(&RequesterContext::new("discord:group:req"), "task", SpawnOptions::new().with_timeout_seconds(1))
        .await;
    assert_eq!(result.status, SpawnStatus::Error);

    assert!(!h.watcher.handle_event(&lifecycle("run-1", json!({"phase": "error", "error": "boom"}))));
    h.drain().await;

    assert_eq!(h.gateway.count("send"), 0);
}

#[tokio::test]
async fn test_late_end_after_transport_timeout_is_not_announced() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::new()
        .with_waits(vec![Err(GatewayError::Timeout {
            method: "agent.wait".to_string(),
            timeout_ms: 3_000,
        })])
        .with_replies(&["late result"]);
    let h = Harness::new(gateway, &store_path(&temp));

    h.orchestrator
        .spawn(&RequesterContext::new("discord:group:req"), "task", SpawnOptions::new().with_timeout_seconds(1))
        .await;

    assert!(!h.watcher.handle_event(&lifecycle("run-1", json!({"phase": "end"}))));
    h.drain().await;

    assert_eq!(h.gateway.count("send"), 0);
}

#[tokio::test]
async fn test_transport_timeout_maps_to_timeout() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::new().with_waits(vec![Err(GatewayError::Timeout {
        method: "agent.wait".to_string(),
        timeout_ms: 3_000,
    })]);
    let h = Harness::new(gateway, &store_path(&temp));

    let result = h
        .orchestrator
        .spawn(&RequesterContext::new("main"), "task", SpawnOptions::new().with_timeout_seconds(1))
        .await;

    assert_eq!(result.status, SpawnStatus::Timeout);
    assert_eq!(h.gateway.count("chat.abort"), 1);
}

#[tokio::test]
async fn test_wait_error_is_reported() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::new().with_waits(vec![Ok(json!({"status": "error", "error": "provider overloaded"}))]);
    let h = Harness::new(gateway, &store_path(&temp));

    let result = h
        .orchestrator
        .spawn(&RequesterContext::new("main"), "task", SpawnOptions::new().with_timeout_seconds(1))
        .await;
    h.drain().await;

    assert_eq!(result.status, SpawnStatus::Error);
    assert_eq!(result.error.as_deref(), Some("provider overloaded"));
    assert_eq!(h.gateway.count("send"), 0);
}

// ============================================================================
// Announce
// ============================================================================

#[tokio::test]
async fn test_end_to_end_announce_to_discord() {
    let temp = TempDir::new().unwrap();
    let store = store_path(&temp);
    let gateway = ScriptedGateway::new()
        .with_replies(&["Found 3 flaky tests.", "Sub-agent finished: 3 flaky tests in ci/."])
        .with_usage(
            &store,
            json!({
                "sessionId": "sess-1",
                "inputTokens": 1200,
                "outputTokens": 300,
                "model": "sonnet",
                "modelProvider": "anthropic"
            }),
        );
    let h = Harness::new(gateway, &store);

    let requester = RequesterContext::new("discord:group:req").with_provider("discord");
    let result = h
        .orchestrator
        .spawn(&requester, "find flaky tests", SpawnOptions::new().with_timeout_seconds(1))
        .await;

    assert_eq!(result.status, SpawnStatus::Ok);
    assert_eq!(result.reply.as_deref(), Some("Found 3 flaky tests."));
    let child = result.child_session_key.clone().unwrap();

    h.drain().await;

    let agents = h.gateway.params_for("agent");
    assert_eq!(agents.len(), 2);
    assert_eq!(agents[1]["lane"], "nested");
    assert_eq!(agents[1]["sessionKey"], child.as_str());
    assert_ne!(agents[0]["idempotencyKey"], agents[1]["idempotencyKey"]);
    let announce_prompt = agents[1]["extraSystemPrompt"].as_str().unwrap();
    assert!(announce_prompt.contains("Found 3 flaky tests."));
    assert!(announce_prompt.contains("Post target provider: discord."));

    let sends = h.gateway.params_for("send");
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0]["provider"], "discord");
    assert_eq!(sends[0]["to"], "channel:req");
    assert!(!sends[0]["idempotencyKey"].as_str().unwrap().is_empty());

    let message = sends[0]["message"].as_str().unwrap();
    assert!(message.starts_with("Sub-agent finished: 3 flaky tests in ci/.\n\nStats: "));
    assert!(message.contains("runtime 3s"));
    assert!(message.contains("tokens 1.5k (in 1.2k / out 300)"));
    assert!(message.contains("est $0.0081"));
    assert!(message.contains(&format!("sessionKey {}", child)));
    assert!(message.contains("sessionId sess-1"));
    assert!(message.contains("sess-1.jsonl"));

    // Keep is the default; the child session stays.
    assert_eq!(h.gateway.count("sessions.delete"), 0);
    let run = h.registry.get(result.run_id.as_deref().unwrap()).unwrap();
    assert_eq!(run.started_at, Some(1_000));
    assert_eq!(run.ended_at, Some(4_000));
}

#[tokio::test]
async fn test_missing_usage_reports_na() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::new().with_replies(&["done", "All done."]);
    let h = Harness::new(gateway, &store_path(&temp));

    let requester = RequesterContext::new("slack:channel:C42").with_provider("slack");
    let result = h
        .orchestrator
        .spawn(&requester, "task", SpawnOptions::new().with_timeout_seconds(1))
        .await;
    h.drain().await;

    assert_eq!(result.status, SpawnStatus::Ok);
    let sends = h.gateway.params_for("send");
    assert_eq!(sends[0]["to"], "channel:C42");
    let message = sends[0]["message"].as_str().unwrap();
    assert!(message.contains("tokens n/a"));
    assert!(!message.contains("est $"));
}

#[tokio::test]
async fn test_skip_reply_suppresses_send_but_cleans_up() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::new().with_replies(&["nothing to report", "  ANNOUNCE_SKIP  "]);
    let h = Harness::new(gateway, &store_path(&temp));

    let result = h
        .orchestrator
        .spawn(
            &RequesterContext::new("discord:group:req"),
            "task",
            SpawnOptions::new().with_timeout_seconds(1).with_cleanup(Cleanup::Delete),
        )
        .await;
    h.drain().await;

    assert_eq!(result.status, SpawnStatus::Ok);
    assert_eq!(h.gateway.count("send"), 0);
    let deletes = h.gateway.params_for("sessions.delete");
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0]["key"], result.child_session_key.unwrap().as_str());
    assert_eq!(deletes[0]["deleteTranscript"], true);
}

#[tokio::test]
async fn test_no_target_skips_announce_step() {
    let temp = TempDir::new().unwrap();
    let h = Harness::new(ScriptedGateway::new().with_replies(&["done"]), &store_path(&temp));

    let result = h
        .orchestrator
        .spawn(&RequesterContext::new("main"), "task", SpawnOptions::new().with_timeout_seconds(1))
        .await;
    h.drain().await;

    assert_eq!(result.status, SpawnStatus::Ok);
    assert_eq!(h.gateway.count("sessions.list"), 1);
    assert_eq!(h.gateway.count("agent"), 1);
    assert_eq!(h.gateway.count("send"), 0);
}

#[tokio::test]
async fn test_duplicate_completion_announces_once() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::new().with_replies(&["result", "Posting the result."]);
    let h = Harness::new(gateway, &store_path(&temp));

    let result = h
        .orchestrator
        .spawn(&RequesterContext::new("discord:group:req"), "task", SpawnOptions::new().with_timeout_seconds(1))
        .await;
    assert_eq!(result.status, SpawnStatus::Ok);

    // The lifecycle end arrives after the spawner already claimed the run.
    assert!(!h.watcher.handle_event(&lifecycle("run-1", json!({"phase": "end", "endedAt": 4_100}))));
    h.drain().await;

    assert_eq!(h.gateway.count("send"), 1);
}

#[tokio::test]
async fn test_zero_timeout_announced_by_watcher() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::new()
        .with_replies(&["Background job result", "Background job finished."])
        .with_sessions(json!({"sessions": [
            {"key": "main", "lastProvider": "slack", "lastTo": "channel:C1", "lastAccountId": "work"}
        ]}));
    let h = Harness::new(gateway, &store_path(&temp));

    let result = h
        .orchestrator
        .spawn(&RequesterContext::new("main"), "long task", SpawnOptions::new())
        .await;
    assert_eq!(result.status, SpawnStatus::Accepted);

    assert!(!h.watcher.handle_event(&lifecycle("run-1", json!({"phase": "start", "startedAt": 10_000}))));
    assert!(h.watcher.handle_event(&lifecycle("run-1", json!({"phase": "end", "endedAt": 70_000}))));
    h.drain().await;

    // Only the announce step waits; the run itself already ended.
    assert_eq!(h.gateway.params_for("agent.wait").len(), 1);
    let sends = h.gateway.params_for("send");
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0]["provider"], "slack");
    assert_eq!(sends[0]["to"], "channel:C1");
    assert_eq!(sends[0]["accountId"], "work");
    let message = sends[0]["message"].as_str().unwrap();
    assert!(message.starts_with("Background job finished."));
    assert!(message.contains("runtime 1m0s"));
}

// ============================================================================
// Tool surface
// ============================================================================

#[tokio::test]
async fn test_sessions_spawn_tool_returns_structured_result() {
    let temp = TempDir::new().unwrap();
    let h = Harness::new(ScriptedGateway::new(), &store_path(&temp));
    let gateway = h.gateway.clone();
    let tools = ToolRegistry::for_requester(
        std::sync::Arc::new(h.orchestrator),
        RequesterContext::new("main"),
    );

    let dispatched = tools
        .dispatch(SESSIONS_SPAWN, json!({"task": "t", "timeoutSeconds": -4, "cleanup": "shred"}))
        .await
        .unwrap();

    assert!(!dispatched.is_error);
    assert!(dispatched.output.is_success());
    let metadata = dispatched.output.metadata().unwrap();
    assert_eq!(metadata["status"], "accepted");
    assert_eq!(metadata["runId"], "run-1");
    assert!(metadata.get("reply").is_none());
    assert_eq!(gateway.count("agent.wait"), 0);
}

#[tokio::test]
async fn test_sessions_spawn_tool_forbidden_is_not_success() {
    let temp = TempDir::new().unwrap();
    let h = Harness::new(ScriptedGateway::new(), &store_path(&temp));
    let tools = ToolRegistry::for_requester(
        std::sync::Arc::new(h.orchestrator),
        RequesterContext::new("agent:ops:subagent:x"),
    );

    let dispatched = tools.dispatch(SESSIONS_SPAWN, json!({"task": "t"})).await.unwrap();

    assert!(!dispatched.is_error);
    assert!(!dispatched.output.is_success());
    assert_eq!(dispatched.output.metadata().unwrap()["status"], "forbidden");
}

#[tokio::test]
async fn test_sessions_spawn_tool_requires_task() {
    let temp = TempDir::new().unwrap();
    let h = Harness::new(ScriptedGateway::new(), &store_path(&temp));
    let gateway = h.gateway.clone();
    let tools = ToolRegistry::for_requester(std::sync::Arc::new(h.orchestrator), RequesterContext::new("main"));

    let dispatched = tools.dispatch(SESSIONS_SPAWN, json!({"label": "x"})).await.unwrap();

    assert!(dispatched.is_error);
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_sessions_spawn_tool_rejects_blank_task() {
    let temp = TempDir::new().unwrap();
    let h = Harness::new(ScriptedGateway::new(), &store_path(&temp));
    let gateway = h.gateway.clone();
    let tools = ToolRegistry::for_requester(std::sync::Arc::new(h.orchestrator), RequesterContext::new("main"));

    let dispatched = tools.dispatch(SESSIONS_SPAWN, json!({"task": "   "})).await.unwrap();

    assert!(dispatched.is_error);
    assert!(gateway.calls().is_empty());
}
