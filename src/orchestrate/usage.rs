// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Usage summary appended to announced results.
//!
//! The runtime writes usage for a session shortly after the run ends, so the
//! entry is polled a few times before giving up. Summaries never fail; missing
//! data shows up as `n/a` or is left out.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::PricingTable;
use crate::session::{transcript_path, SessionStore, SessionUsageEntry};

use super::retry::{retry_until, RetryPolicy};

/// Default polling: four more reads, 200ms apart.
pub const DEFAULT_USAGE_POLL: RetryPolicy = RetryPolicy::new(4, Duration::from_millis(200));

const SEPARATOR: &str = " \u{2022} ";

/// Builds `Stats: ...` lines from the session store.
pub struct UsageResolver {
    store: Arc<dyn SessionStore>,
    pricing: PricingTable,
    poll: RetryPolicy,
}

impl UsageResolver {
    pub fn new(store: Arc<dyn SessionStore>, pricing: PricingTable) -> Self {
        Self {
            store,
            pricing,
            poll: DEFAULT_USAGE_POLL,
        }
    }

    pub fn with_poll(mut self, poll: RetryPolicy) -> Self {
        self.poll = poll;
        self
    }

    async fn load(&self, session_key: &str) -> Option<SessionUsageEntry> {
        match self.store.load_entry(session_key).await {
            Ok(entry) => entry,
            Err(e) => {
                debug!(session_key, "session store read failed: {}", e);
                None
            }
        }
    }

    /// Summarize runtime, tokens, cost and location of a session.
    pub async fn summarize(&self, session_key: &str, started_at: Option<i64>, ended_at: Option<i64>) -> String {
        let entry = retry_until(
            self.poll,
            || self.load(session_key),
            |entry| entry.as_ref().is_some_and(SessionUsageEntry::has_token_fields),
        )
        .await
        .unwrap_or_default();

        let runtime_ms = match (started_at, ended_at) {
            (Some(start), Some(end)) => end.checked_sub(start),
            _ => None,
        };

        let cost = match (
            entry.model_provider.as_deref(),
            entry.model.as_deref(),
            entry.input_tokens,
            entry.output_tokens,
        ) {
            (Some(provider), Some(model), Some(input), Some(output)) => self
                .pricing
                .lookup(provider, model)
                .map(|pricing| pricing.estimate(input, output)),
            _ => None,
        };

        let transcript = entry
            .session_id
            .as_deref()
            .map(|id| transcript_path(&self.store.store_path(), id).display().to_string());

        format_stats_line(&StatsParts {
            runtime_ms,
            entry: &entry,
            cost,
            session_key,
            transcript: transcript.as_deref(),
        })
    }
}

/// Inputs to a stats line.
pub struct StatsParts<'a> {
    pub runtime_ms: Option<i64>,
    pub entry: &'a SessionUsageEntry,
    pub cost: Option<f64>,
    pub session_key: &'a str,
    pub transcript: Option<&'a str>,
}

pub fn format_stats_line(parts: &StatsParts<'_>) -> String {
    let mut out: Vec<String> = Vec::with_capacity(6);

    let runtime = parts.runtime_ms.and_then(format_duration_short);
    out.push(format!("runtime {}", runtime.as_deref().unwrap_or("n/a")));

    match parts.entry.total() {
        Some(total) => out.push(format!(
            "tokens {} (in {} / out {})",
            format_token_count(Some(total)),
            format_token_count(parts.entry.input_tokens),
            format_token_count(parts.entry.output_tokens),
        )),
        None => out.push("tokens n/a".to_string()),
    }

    if let Some(cost) = parts.cost.and_then(format_usd) {
        out.push(format!("est {}", cost));
    }

    out.push(format!("sessionKey {}", parts.session_key));
    if let Some(session_id) = parts.entry.session_id.as_deref() {
        out.push(format!("sessionId {}", session_id));
    }
    if let Some(transcript) = parts.transcript {
        out.push(format!("transcript {}", transcript));
    }

    format!("Stats: {}", out.join(SEPARATOR))
}

/// `1h5m`, `2m3s` or `45s`. `None` for durations that round to zero or less.
pub fn format_duration_short(ms: i64) -> Option<String> {
    let total_seconds = (ms as f64 / 1000.0).round() as i64;
    if total_seconds <= 0 {
        return None;
    }
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    Some(if hours > 0 {
        format!("{}h{}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    })
}

/// `1.5m`, `12.3k` or the plain count.
pub fn format_token_count(count: Option<u64>) -> String {
    match count {
        None | Some(0) => "0".to_string(),
        Some(n) if n >= 1_000_000 => format!("{:.1}m", n as f64 / 1_000_000.0),
        Some(n) if n >= 1_000 => format!("{:.1}k", n as f64 / 1_000.0),
        Some(n) => n.to_string(),
    }
}

/// Dollars with cents, or four decimals under one cent.
pub fn format_usd(value: f64) -> Option<String> {
    if !value.is_finite() {
        return None;
    }
    if value >= 0.01 {
        Some(format!("${:.2}", value))
    } else {
        Some(format!("${:.4}", value))
    }
}
