// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session key parsing and construction.
//!
//! Agent-scoped keys look like `agent:<agentId>:<rest>`. The rest is `main`
//! for an agent's main session, `subagent:<runToken>` for a spawned child,
//! and anything else for provider-scoped sessions. Keys that do not carry the
//! `agent:` prefix (for example `discord:group:req`) are opaque display keys.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session key as exchanged with the gateway.
pub type SessionKey = String;

/// Agent id used when a key does not name one.
pub const DEFAULT_AGENT_ID: &str = "main";

/// Default main session key.
pub const DEFAULT_MAIN_KEY: &str = "main";

const AGENT_PREFIX: &str = "agent";
const SUBAGENT_PREFIX: &str = "subagent:";

/// What a parsed agent key points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionKind {
    /// The agent's main session.
    Main,
    /// A spawned sub-agent session.
    Subagent { run_token: String },
    /// Any other agent-scoped session; carries the raw rest.
    Other(String),
}

/// Structured view of an `agent:<id>:<rest>` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSessionKey {
    pub agent_id: String,
    pub kind: SessionKind,
}

impl ParsedSessionKey {
    /// The part after `agent:<id>:`.
    pub fn rest(&self) -> String {
        match &self.kind {
            SessionKind::Main => "main".to_string(),
            SessionKind::Subagent { run_token } => format!("{}{}", SUBAGENT_PREFIX, run_token),
            SessionKind::Other(rest) => rest.clone(),
        }
    }
}

/// Parse an agent-scoped key. Returns `None` for anything that is not one.
pub fn parse_agent_session_key(key: &str) -> Option<ParsedSessionKey> {
    let parts: Vec<&str> = key.trim().split(':').filter(|p| !p.is_empty()).collect();
    if parts.len() < 3 || parts[0] != AGENT_PREFIX {
        return None;
    }

    let agent_id = parts[1].trim();
    let rest = parts[2..].join(":");
    if agent_id.is_empty() || rest.is_empty() {
        return None;
    }

    let lowered = rest.to_lowercase();
    let kind = if lowered == "main" {
        SessionKind::Main
    } else if lowered.starts_with(SUBAGENT_PREFIX) {
        SessionKind::Subagent {
            run_token: rest.get(SUBAGENT_PREFIX.len()..).unwrap_or_default().to_string(),
        }
    } else {
        SessionKind::Other(rest)
    };

    Some(ParsedSessionKey {
        agent_id: agent_id.to_string(),
        kind,
    })
}

/// Whether a key names a sub-agent session, either agent-scoped or bare.
pub fn is_subagent_session_key(key: &str) -> bool {
    let raw = key.trim();
    if raw.is_empty() {
        return false;
    }
    if raw.to_lowercase().starts_with(SUBAGENT_PREFIX) {
        return true;
    }
    matches!(
        parse_agent_session_key(raw).map(|p| p.kind),
        Some(SessionKind::Subagent { .. })
    )
}

/// Trim and lowercase an agent id; empty becomes the default agent.
pub fn normalize_agent_id(id: &str) -> String {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        DEFAULT_AGENT_ID.to_string()
    } else {
        trimmed.to_lowercase()
    }
}

/// Agent id owning a key, falling back to the default agent.
pub fn agent_id_from_key(key: &str) -> String {
    parse_agent_session_key(key)
        .map(|p| normalize_agent_id(&p.agent_id))
        .unwrap_or_else(|| DEFAULT_AGENT_ID.to_string())
}

/// Build a fresh sub-agent key under the given agent.
pub fn subagent_key(agent_id: &str) -> SessionKey {
    format!(
        "{}:{}:{}{}",
        AGENT_PREFIX,
        normalize_agent_id(agent_id),
        SUBAGENT_PREFIX,
        Uuid::new_v4()
    )
}

/// How main sessions are shared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionScope {
    /// Each sender gets its own main session.
    #[default]
    PerSender,
    /// A single main session shared by everyone.
    Global,
}

/// Maps the literal `main` onto the configured main session key and back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainSessionAlias {
    main_key: String,
    scope: SessionScope,
}

impl Default for MainSessionAlias {
    fn default() -> Self {
        Self::new(DEFAULT_MAIN_KEY, SessionScope::PerSender)
    }
}

impl MainSessionAlias {
    pub fn new(main_key: impl Into<String>, scope: SessionScope) -> Self {
        let main_key = main_key.into();
        let main_key = if main_key.trim().is_empty() {
            DEFAULT_MAIN_KEY.to_string()
        } else {
            main_key.trim().to_string()
        };
        Self { main_key, scope }
    }

    pub fn main_key(&self) -> &str {
        &self.main_key
    }

    /// The key the literal `main` resolves to.
    pub fn alias(&self) -> &str {
        match self.scope {
            SessionScope::Global => "global",
            SessionScope::PerSender => &self.main_key,
        }
    }

    /// Key used when talking to the gateway.
    pub fn resolve_internal(&self, key: Option<&str>) -> SessionKey {
        match key.map(str::trim).filter(|k| !k.is_empty()) {
            None | Some("main") => self.alias().to_string(),
            Some(other) => other.to_string(),
        }
    }

    /// Key shown to users and used when matching session listings.
    pub fn resolve_display(&self, key: Option<&str>) -> SessionKey {
        match key.map(str::trim).filter(|k| !k.is_empty()) {
            None => "main".to_string(),
            Some(k) if k == self.alias() || k == self.main_key => "main".to_string(),
            Some(other) => other.to_string(),
        }
    }
}
