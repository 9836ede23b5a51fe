// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session keys and the read-only session store.
//!
//! - **Keys**: parsing `agent:<id>:<rest>` keys, building sub-agent keys,
//!   resolving the `main` alias
//! - **Store**: usage entries written by the agent runtime

pub mod key;
pub mod store;
pub mod types;

pub use key::{
    agent_id_from_key, is_subagent_session_key, normalize_agent_id, parse_agent_session_key,
    subagent_key, MainSessionAlias, ParsedSessionKey, SessionKey, SessionKind, SessionScope,
    DEFAULT_AGENT_ID, DEFAULT_MAIN_KEY,
};
pub use store::{transcript_path, FileSessionStore, SessionStore};
pub use types::SessionUsageEntry;

#[cfg(test)]
pub use store::MockSessionStore;
