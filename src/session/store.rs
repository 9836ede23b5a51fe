// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Read-only access to the session store.
//!
//! The store is a JSON object keyed by session key, written by the agent
//! runtime. Transcripts live next to it as `<sessionId>.jsonl`.

use std::path::{Path, PathBuf};
#[cfg(feature = "telemetry")]
use std::time::Instant;

use async_trait::async_trait;

use crate::error::StoreError;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use super::types::SessionUsageEntry;

/// Read access to per-session usage entries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the entry for a session key, if the runtime has written one.
    async fn load_entry(&self, key: &str) -> Result<Option<SessionUsageEntry>, StoreError>;

    /// Location of the store file.
    fn store_path(&self) -> PathBuf;
}

/// Transcript file for a session id, stored alongside the store file.
pub fn transcript_path(store_path: &Path, session_id: &str) -> PathBuf {
    let dir = store_path.parent().map(Path::to_path_buf).unwrap_or_default();
    dir.join(format!("{}.jsonl", session_id))
}

/// Session store backed by a `sessions.json` file.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load_entry(&self, key: &str) -> Result<Option<SessionUsageEntry>, StoreError> {
        #[cfg(feature = "telemetry")]
        let start = Instant::now();

        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // A half-written store reads as empty; the caller polls again.
        if content.trim().is_empty() {
            return Ok(None);
        }

        let mut sessions: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&content)?;
        let entry = match sessions.remove(key) {
            Some(value) => Some(serde_json::from_value(value)?),
            None => None,
        };

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("session.store.load", start.elapsed());

        Ok(entry)
    }

    fn store_path(&self) -> PathBuf {
        self.path.clone()
    }
}
