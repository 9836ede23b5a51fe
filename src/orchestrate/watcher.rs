// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Out-of-band completion path.
//!
//! Runs spawned without waiting (or whose spawner gave up) still finish
//! eventually. The gateway reports that through `agent` lifecycle events; the
//! watcher records run timestamps and starts the announce flow for whichever
//! registered run ends first on this path or the spawner's.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::gateway::{AgentEvent, LifecyclePhase};

use super::announce::{AnnounceFlow, AnnounceParams};
use super::registry::SubagentRegistry;
use super::supervisor::{task_budget, AnnounceSupervisor};
use super::types::now_ms;

/// Turns lifecycle events into announce flows.
#[derive(Clone)]
pub struct CompletionWatcher {
    registry: Arc<SubagentRegistry>,
    announcer: AnnounceFlow,
    supervisor: Arc<AnnounceSupervisor>,
    announce_timeout: Duration,
}

impl CompletionWatcher {
    pub fn new(
        registry: Arc<SubagentRegistry>,
        announcer: AnnounceFlow,
        supervisor: Arc<AnnounceSupervisor>,
        announce_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            announcer,
            supervisor,
            announce_timeout,
        }
    }

    /// Apply one event. Returns true when it started an announce flow.
    pub fn handle_event(&self, event: &AgentEvent) -> bool {
        let Some(update) = event.lifecycle() else {
            return false;
        };
        if !self.registry.contains(&event.run_id) {
            return false;
        }

        match update.phase {
            LifecyclePhase::Start => {
                let at = update.started_at.unwrap_or_else(now_ms);
                self.registry.mark_started(&event.run_id, at);
                false
            }
            LifecyclePhase::End | LifecyclePhase::Error => {
                let at = update.ended_at.unwrap_or_else(now_ms);
                let Some(run) = self.registry.mark_ended(&event.run_id, at) else {
                    return false;
                };
                if let Some(error) = update.error.as_deref() {
                    debug!(run_id = %run.run_id, "Sub-agent run ended with error: {}", error);
                }
                if !self.registry.claim_announce(&run.run_id) {
                    debug!(run_id = %run.run_id, "Announce already claimed");
                    return false;
                }

                let params = AnnounceParams::from_run(&run, self.announce_timeout)
                    .with_wait_for_completion(false);
                let announcer = self.announcer.clone();
                self.supervisor.spawn(
                    run.run_id.clone(),
                    task_budget(self.announce_timeout),
                    async move { announcer.run(params).await },
                );
                true
            }
        }
    }

    /// Consume events until the channel closes.
    pub fn spawn(self, mut events: mpsc::Receiver<AgentEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.handle_event(&event);
            }
            info!("Agent event stream closed");
        })
    }
}
