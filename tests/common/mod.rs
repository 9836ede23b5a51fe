// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Scripted in-memory gateway shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use sidekick::config::PricingTable;
use sidekick::gateway::{GatewayClient, GatewayError, GatewayTransport};
use sidekick::orchestrate::{
    AnnounceFlow, AnnounceSupervisor, CompletionWatcher, RetryPolicy, SubagentOrchestrator,
    SubagentRegistry, UsageResolver,
};
use sidekick::session::FileSessionStore;
use sidekick::types::ModelPricing;

pub const ANNOUNCE_TIMEOUT: Duration = Duration::from_secs(1);
pub const DRAIN_DEADLINE: Duration = Duration::from_secs(5);

/// Gateway stand-in that answers from a script and records every call.
///
/// Unscripted `agent.wait` calls finish `ok` with a 3s runtime. Each
/// `chat.history` call consumes one scripted reply; the last one repeats.
pub struct ScriptedGateway {
    calls: Mutex<Vec<(String, Value)>>,
    next_run: AtomicU32,
    waits: Mutex<VecDeque<Result<Value, GatewayError>>>,
    replies: Mutex<VecDeque<String>>,
    patch_error: Option<GatewayError>,
    failures: HashMap<String, GatewayError>,
    blank_run_ids: bool,
    sessions: Value,
    usage: Option<(PathBuf, Value)>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_run: AtomicU32::new(1),
            waits: Mutex::new(VecDeque::new()),
            replies: Mutex::new(VecDeque::new()),
            patch_error: None,
            failures: HashMap::new(),
            blank_run_ids: false,
            sessions: json!({"sessions": []}),
            usage: None,
        }
    }

    pub fn with_replies(self, replies: &[&str]) -> Self {
        *self.replies.lock().unwrap() = replies.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_waits(self, waits: Vec<Result<Value, GatewayError>>) -> Self {
        *self.waits.lock().unwrap() = waits.into();
        self
    }

    /// Fail `sessions.patch` calls that carry a model.
    pub fn with_model_patch_error(mut self, err: GatewayError) -> Self {
        self.patch_error = Some(err);
        self
    }

    /// Fail every call to `method` with `err`.
    pub fn with_failure(mut self, method: &str, err: GatewayError) -> Self {
        self.failures.insert(method.to_string(), err);
        self
    }

    /// Answer `agent` with a whitespace run id.
    pub fn with_blank_run_ids(mut self) -> Self {
        self.blank_run_ids = true;
        self
    }

    pub fn with_sessions(mut self, sessions: Value) -> Self {
        self.sessions = sessions;
        self
    }

    /// Write `entry` into the store at `path` under the child key when a
    /// sub-agent run starts.
    pub fn with_usage(mut self, path: &Path, entry: Value) -> Self {
        self.usage = Some((path.to_path_buf(), entry));
        self
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|(m, _)| m).collect()
    }

    pub fn params_for(&self, method: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p)
            .collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.params_for(method).len()
    }

    fn next_reply(&self) -> Option<String> {
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        }
    }
}

#[async_trait]
impl GatewayTransport for ScriptedGateway {
    async fn call(&self, method: &str, params: Value, _timeout: Duration) -> Result<Value, GatewayError> {
        self.calls.lock().unwrap().push((method.to_string(), params.clone()));
        if let Some(err) = self.failures.get(method) {
            return Err(err.clone());
        }

        match method {
            "agent" => {
                if params["lane"] == "subagent" {
                    if let (Some((path, entry)), Some(key)) = (&self.usage, params["sessionKey"].as_str()) {
                        let mut store = serde_json::Map::new();
                        store.insert(key.to_string(), entry.clone());
                        std::fs::write(path, Value::Object(store).to_string()).unwrap();
                    }
                }
                if self.blank_run_ids {
                    return Ok(json!({"runId": "  ", "status": "accepted"}));
                }
                let n = self.next_run.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"runId": format!("run-{}", n), "status": "accepted"}))
            }
            "agent.wait" => self
                .waits
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(json!({"status": "ok", "startedAt": 1_000, "endedAt": 4_000}))),
            "chat.history" => {
                let messages = match self.next_reply() {
                    Some(text) => json!([
                        {"role": "user", "content": "task"},
                        {"role": "assistant", "content": [{"type": "text", "text": text}]}
                    ]),
                    None => json!([]),
                };
                Ok(json!({"messages": messages}))
            }
            "sessions.patch" => match (&self.patch_error, params.get("model")) {
                (Some(err), Some(_)) => Err(err.clone()),
                _ => Ok(json!({"ok": true})),
            },
            "sessions.list" => Ok(self.sessions.clone()),
            _ => Ok(json!({"ok": true})),
        }
    }
}

/// Orchestrator wired to a scripted gateway.
pub struct Harness {
    pub gateway: Arc<ScriptedGateway>,
    pub orchestrator: SubagentOrchestrator,
    pub announcer: AnnounceFlow,
    pub registry: Arc<SubagentRegistry>,
    pub supervisor: Arc<AnnounceSupervisor>,
    pub watcher: CompletionWatcher,
}

impl Harness {
    pub fn new(gateway: ScriptedGateway, store_path: &Path) -> Self {
        let gateway = Arc::new(gateway);
        let client = GatewayClient::new(gateway.clone());

        let mut pricing = PricingTable::default();
        pricing.insert("anthropic", "sonnet", ModelPricing::new(3.0, 15.0));
        let usage = UsageResolver::new(Arc::new(FileSessionStore::new(store_path)), pricing)
            .with_poll(RetryPolicy::new(3, Duration::from_millis(10)));

        let announcer = AnnounceFlow::new(client.clone(), Arc::new(usage));
        let registry = Arc::new(SubagentRegistry::new());
        let supervisor = Arc::new(AnnounceSupervisor::new());

        let watcher = CompletionWatcher::new(
            Arc::clone(&registry),
            announcer.clone(),
            Arc::clone(&supervisor),
            ANNOUNCE_TIMEOUT,
        );
        let orchestrator = SubagentOrchestrator::new(
            client,
            Arc::clone(&registry),
            announcer.clone(),
            Arc::clone(&supervisor),
        )
        .with_announce_timeout(ANNOUNCE_TIMEOUT);

        Self {
            gateway,
            orchestrator,
            announcer,
            registry,
            supervisor,
            watcher,
        }
    }

    /// Wait for all announce tasks; panics if any had to be aborted.
    pub async fn drain(&self) {
        assert_eq!(self.supervisor.drain(DRAIN_DEADLINE).await, 0);
    }
}

pub fn lifecycle(run_id: &str, data: Value) -> sidekick::gateway::AgentEvent {
    sidekick::gateway::AgentEvent {
        run_id: run_id.to_string(),
        stream: "lifecycle".to_string(),
        data,
    }
}
