// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Where an announcement goes.
//!
//! Provider-scoped keys such as `discord:group:123` name their chat directly.
//! Anything else is looked up in the gateway's session listing, which records
//! the last provider and recipient each session talked to.

use tracing::debug;

use crate::gateway::{GatewayClient, ListParams, SessionRow};
use crate::session::parse_agent_session_key;

/// Chat destination for an announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceTarget {
    pub provider: String,
    pub to: String,
    pub account_id: Option<String>,
}

/// Providers that address rooms as `channel:<id>`.
const CHANNEL_ADDRESSED: &[&str] = &["discord", "slack"];

/// Parse `<provider>:<group|channel>:<id>`, optionally under an `agent:<id>:` prefix.
pub fn target_from_key(key: &str) -> Option<AnnounceTarget> {
    let raw = key.trim();
    let rest = match parse_agent_session_key(raw) {
        Some(parsed) => parsed.rest(),
        None => raw.to_string(),
    };

    let parts: Vec<&str> = rest.split(':').filter(|p| !p.is_empty()).collect();
    if parts.len() < 3 {
        return None;
    }

    let provider = parts[0].trim().to_lowercase();
    let kind = parts[1].trim().to_lowercase();
    if provider.is_empty() || (kind != "group" && kind != "channel") {
        return None;
    }

    let id = parts[2..].join(":");
    let id = id.trim();
    if id.is_empty() {
        return None;
    }

    let to = if CHANNEL_ADDRESSED.contains(&provider.as_str()) {
        format!("channel:{}", id)
    } else {
        id.to_string()
    };

    Some(AnnounceTarget {
        provider,
        to,
        account_id: None,
    })
}

fn target_from_row(row: &SessionRow) -> Option<AnnounceTarget> {
    let provider = row.last_provider.as_deref().map(str::trim).filter(|p| !p.is_empty())?;
    let to = row.last_to.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
    Some(AnnounceTarget {
        provider: provider.to_string(),
        to: to.to_string(),
        account_id: row.last_account_id.clone(),
    })
}

/// Resolve the target from the requester keys, then from the session listing.
pub async fn resolve_announce_target(
    client: &GatewayClient,
    requester_session_key: &str,
    requester_display_key: &str,
) -> Option<AnnounceTarget> {
    if let Some(target) =
        target_from_key(requester_session_key).or_else(|| target_from_key(requester_display_key))
    {
        return Some(target);
    }

    let rows = match client.list_sessions(&ListParams::default()).await {
        Ok(rows) => rows,
        Err(e) => {
            debug!("sessions.list failed while resolving announce target: {}", e);
            return None;
        }
    };

    rows.iter()
        .find(|r| r.key == requester_session_key)
        .or_else(|| rows.iter().find(|r| r.key == requester_display_key))
        .and_then(target_from_row)
}
