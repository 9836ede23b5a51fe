// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Owner of detached announce tasks.
//!
//! Every task runs under its own deadline; failures and panics are logged and
//! never reach the code that spawned them. [`AnnounceSupervisor::drain`] lets
//! a shutting-down process finish outstanding announcements.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::announce::{AnnounceOutcome, MAX_ANNOUNCE_WAIT};

/// Extra time on top of the waits an announce flow may perform.
pub const SUPERVISOR_SLACK: Duration = Duration::from_secs(30);

/// Deadline for a whole announce task given its announce timeout.
pub fn task_budget(announce_timeout: Duration) -> Duration {
    announce_timeout.min(MAX_ANNOUNCE_WAIT) * 2 + SUPERVISOR_SLACK
}

/// Aborts the flow when its watchdog stops, including on shutdown aborts.
struct AbortOnDrop(JoinHandle<AnnounceOutcome>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Tracks detached announce tasks.
#[derive(Debug, Default)]
pub struct AnnounceSupervisor {
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AnnounceSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run an announce flow in the background under `budget`.
    pub fn spawn<F>(&self, run_id: String, budget: Duration, flow: F)
    where
        F: Future<Output = AnnounceOutcome> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut inner = AbortOnDrop(tokio::spawn(flow));
            match tokio::time::timeout(budget, &mut inner.0).await {
                Ok(Ok(outcome)) => {
                    debug!(run_id = %run_id, outcome = outcome.as_str(), "Announce task finished");
                }
                Ok(Err(e)) => warn!(run_id = %run_id, "Announce task failed: {}", e),
                Err(_) => warn!(run_id = %run_id, "Announce task timed out after {:?}", budget),
            }
        });

        let mut tasks = self.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    /// Tasks still running.
    pub fn pending(&self) -> usize {
        self.lock().iter().filter(|t| !t.is_finished()).count()
    }

    /// Wait up to `deadline` for outstanding tasks, then abort the rest.
    ///
    /// Returns how many tasks were aborted.
    pub async fn drain(&self, deadline: Duration) -> usize {
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.lock());
        if tasks.is_empty() {
            return 0;
        }

        let aborts: Vec<_> = tasks.iter().map(JoinHandle::abort_handle).collect();
        let all = async {
            for task in tasks {
                let _ = task.await;
            }
        };

        if tokio::time::timeout(deadline, all).await.is_ok() {
            return 0;
        }

        let mut aborted = 0;
        for handle in aborts {
            if !handle.is_finished() {
                handle.abort();
                aborted += 1;
            }
        }
        warn!("Aborted {} announce task(s) at shutdown", aborted);
        aborted
    }
}
