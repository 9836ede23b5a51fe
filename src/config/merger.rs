// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use std::path::PathBuf;

use crate::error::ConfigError;

use super::loader::expand_home;
use super::types::{ResolvedConfig, WorkspaceConfig};

/// CLI options that can override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub socket_path: Option<PathBuf>,
    pub session_store: Option<PathBuf>,
    pub announce_timeout_ms: Option<u64>,
}

/// Default configuration values.
pub fn default_config() -> ResolvedConfig {
    ResolvedConfig::default()
}

/// Merge multiple configurations with precedence.
///
/// Precedence (highest to lowest):
/// 1. CLI options
/// 2. Local config (.sidekick.local.json)
/// 3. Workspace config (.sidekick.json)
/// 4. Global config (~/.sidekick/config.json)
/// 5. Default values
pub fn merge_config(
    global: Option<WorkspaceConfig>,
    workspace: Option<WorkspaceConfig>,
    local: Option<WorkspaceConfig>,
    cli: CliOptions,
) -> ResolvedConfig {
    let mut result = default_config();

    for config in [global, workspace, local].iter().flatten() {
        apply_workspace_config(&mut result, config);
    }

    apply_cli_options(&mut result, &cli);

    result
}

fn apply_workspace_config(result: &mut ResolvedConfig, config: &WorkspaceConfig) {
    if let Some(ref gateway) = config.gateway {
        if let Some(ref path) = gateway.socket_path {
            result.socket_path = expand_home(path);
        }
        if let Some(ms) = gateway.call_timeout_ms {
            result.call_timeout_ms = ms;
        }
        if let Some(ms) = gateway.abort_timeout_ms {
            result.abort_timeout_ms = ms;
        }
    }

    if let Some(ref session) = config.session {
        if let Some(ref key) = session.main_key {
            result.main_key = key.trim().to_string();
        }
        if let Some(scope) = session.scope {
            result.session_scope = scope;
        }
        if let Some(ref store) = session.store {
            result.session_store = expand_home(store);
        }
    }

    if let Some(ref subagents) = config.subagents {
        if let Some(ms) = subagents.announce_timeout_ms {
            result.announce_timeout_ms = ms;
        }
        if let Some(attempts) = subagents.usage_poll_attempts {
            result.usage_poll_attempts = attempts;
        }
        if let Some(ms) = subagents.usage_poll_interval_ms {
            result.usage_poll_interval_ms = ms;
        }
    }

    // Pricing merges per model; later sources replace individual entries.
    if let Some(ref models) = config.models {
        for (provider, entries) in models {
            for (model, entry) in entries {
                if let Some(cost) = entry.cost {
                    result.pricing.insert(provider, model, cost);
                }
            }
        }
    }
}

fn apply_cli_options(result: &mut ResolvedConfig, cli: &CliOptions) {
    if let Some(ref path) = cli.socket_path {
        result.socket_path = path.clone();
    }
    if let Some(ref path) = cli.session_store {
        result.session_store = path.clone();
    }
    if let Some(ms) = cli.announce_timeout_ms {
        result.announce_timeout_ms = ms;
    }
}

/// Reject values the orchestrator cannot run with.
pub fn validate_config(config: &ResolvedConfig) -> Result<(), ConfigError> {
    let positive = [
        ("gateway.callTimeoutMs", config.call_timeout_ms),
        ("gateway.abortTimeoutMs", config.abort_timeout_ms),
        ("subagents.announceTimeoutMs", config.announce_timeout_ms),
    ];
    for (field, value) in positive {
        if value == 0 {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
    }

    if config.main_key.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "session.mainKey".to_string(),
            message: "must not be empty".to_string(),
        });
    }

    Ok(())
}
