// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-memory registry of sub-agent runs.
//!
//! The registry also owns the announce gate: [`SubagentRegistry::claim_announce`]
//! returns true exactly once per run id, no matter how many completion paths
//! race for it.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::types::SubagentRun;

#[derive(Debug, Default)]
struct RegistryState {
    runs: HashMap<String, SubagentRun>,
    claimed: HashSet<String>,
}

/// Shared store of in-flight runs. Wrap in an `Arc` to share.
#[derive(Debug, Default)]
pub struct SubagentRegistry {
    state: Mutex<RegistryState>,
}

impl SubagentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a run. Registering the same run id again replaces the record.
    pub fn register(&self, run: SubagentRun) {
        debug!(run_id = %run.run_id, child = %run.child_session_key, "registering sub-agent run");
        self.lock().runs.insert(run.run_id.clone(), run);
    }

    pub fn get(&self, run_id: &str) -> Option<SubagentRun> {
        self.lock().runs.get(run_id).cloned()
    }

    pub fn contains(&self, run_id: &str) -> bool {
        self.lock().runs.contains_key(run_id)
    }

    /// Take the announce gate for a run. True for the first caller only.
    pub fn claim_announce(&self, run_id: &str) -> bool {
        self.lock().claimed.insert(run_id.to_string())
    }

    /// Close the announce gate without announcing. Later claims fail.
    ///
    /// Used when the spawner gave up on a run; a lifecycle event arriving
    /// afterwards must not announce it.
    pub fn close_announce(&self, run_id: &str) {
        debug!(run_id, "closing announce gate");
        self.lock().claimed.insert(run_id.to_string());
    }

    pub fn is_announce_claimed(&self, run_id: &str) -> bool {
        self.lock().claimed.contains(run_id)
    }

    /// Record when a run started. Returns the updated record.
    pub fn mark_started(&self, run_id: &str, at: i64) -> Option<SubagentRun> {
        let mut state = self.lock();
        let run = state.runs.get_mut(run_id)?;
        run.started_at = Some(at);
        Some(run.clone())
    }

    /// Record when a run ended. Returns the updated record.
    pub fn mark_ended(&self, run_id: &str, at: i64) -> Option<SubagentRun> {
        let mut state = self.lock();
        let run = state.runs.get_mut(run_id)?;
        run.ended_at = Some(at);
        Some(run.clone())
    }

    /// Runs spawned by a requester, oldest first.
    pub fn runs_for_requester(&self, requester_session_key: &str) -> Vec<SubagentRun> {
        let mut runs: Vec<SubagentRun> = self
            .lock()
            .runs
            .values()
            .filter(|r| r.requester_session_key == requester_session_key)
            .cloned()
            .collect();
        runs.sort_by_key(|r| r.created_at);
        runs
    }

    pub fn len(&self) -> usize {
        self.lock().runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
