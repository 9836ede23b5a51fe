// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading from files.
//!
//! Handles loading configuration from JSON and YAML files in various locations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::types::ModelPricing;

use super::types::{GatewayConfig, ModelConfig, SessionConfig, SubagentsConfig, WorkspaceConfig};

/// Config file names to search for (in order).
pub const CONFIG_FILES: &[&str] = &[".sidekick.json", ".sidekick/config.json", "sidekick.config.json"];

/// Local config file name (for per-directory overrides).
pub const LOCAL_CONFIG_FILE: &str = ".sidekick.local.json";

/// Global config directory name.
pub const GLOBAL_CONFIG_DIR: &str = ".sidekick";

/// Global config file name.
pub const GLOBAL_CONFIG_FILE: &str = "config.json";

/// Get the global config directory path.
pub fn get_global_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(GLOBAL_CONFIG_DIR))
}

/// Get the global config file path.
pub fn get_global_config_path() -> Option<PathBuf> {
    get_global_config_dir().map(|dir| dir.join(GLOBAL_CONFIG_FILE))
}

/// Directory holding the gateway socket and session store by default.
pub(crate) fn state_dir() -> PathBuf {
    get_global_config_dir().unwrap_or_else(|| PathBuf::from(GLOBAL_CONFIG_DIR))
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Load global configuration from ~/.sidekick/config.json.
pub fn load_global_config() -> Result<Option<WorkspaceConfig>, ConfigError> {
    let path = match get_global_config_path() {
        Some(p) => p,
        None => return Ok(None),
    };

    if !path.exists() {
        return Ok(None);
    }

    load_config_file(&path).map(Some)
}

/// Load workspace configuration from the workspace root.
///
/// Searches for config files in the following order:
/// 1. .sidekick.json
/// 2. .sidekick/config.json
/// 3. sidekick.config.json
pub fn load_workspace_config(workspace_root: &Path) -> Result<Option<WorkspaceConfig>, ConfigError> {
    for filename in CONFIG_FILES {
        let path = workspace_root.join(filename);
        if path.exists() {
            return load_config_file(&path).map(Some);
        }
    }
    Ok(None)
}

/// Load local configuration from .sidekick.local.json.
pub fn load_local_config(workspace_root: &Path) -> Result<Option<WorkspaceConfig>, ConfigError> {
    let path = workspace_root.join(LOCAL_CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }
    load_config_file(&path).map(Some)
}

/// Load a configuration file (JSON or YAML).
pub fn load_config_file(path: &Path) -> Result<WorkspaceConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(WorkspaceConfig::default());
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(ConfigError::from),
        "json" | "" => serde_json::from_str(&content).map_err(ConfigError::from),
        other => Err(ConfigError::InvalidFormat(format!(
            "unsupported config extension .{} ({})",
            other,
            path.display()
        ))),
    }
}

/// Save workspace configuration to a file.
pub fn save_workspace_config(
    workspace_root: &Path,
    config: &WorkspaceConfig,
    filename: Option<&str>,
) -> Result<PathBuf, ConfigError> {
    let filename = filename.unwrap_or(CONFIG_FILES[0]);
    let path = workspace_root.join(filename);

    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, content)?;

    Ok(path)
}

/// Write a workspace config, refusing to replace an existing one.
pub fn init_config(
    workspace_root: &Path,
    config: Option<WorkspaceConfig>,
) -> Result<PathBuf, ConfigError> {
    if let Some(existing) = CONFIG_FILES
        .iter()
        .map(|f| workspace_root.join(f))
        .find(|p| p.exists())
    {
        return Err(ConfigError::InvalidValue {
            field: "path".to_string(),
            message: format!("{} already exists", existing.display()),
        });
    }
    let config = config.unwrap_or_default();
    save_workspace_config(workspace_root, &config, None)
}

/// Find the workspace root by searching for config files.
///
/// Walks up the directory tree from `start` until it finds a directory
/// containing a config file or reaches the filesystem root.
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        if CONFIG_FILES.iter().any(|f| current.join(f).exists()) {
            return Some(current);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return None,
        }
    }
}

/// Get an example configuration.
pub fn get_example_config() -> WorkspaceConfig {
    let sonnet = ModelConfig {
        cost: Some(ModelPricing::new(3.0, 15.0)),
    };
    let models = HashMap::from([(
        "anthropic".to_string(),
        HashMap::from([("claude-sonnet-4-20250514".to_string(), sonnet)]),
    )]);

    WorkspaceConfig {
        gateway: Some(GatewayConfig {
            socket_path: Some("~/.sidekick/gateway.sock".to_string()),
            call_timeout_ms: Some(10_000),
            abort_timeout_ms: Some(5_000),
        }),
        session: Some(SessionConfig {
            main_key: Some("main".to_string()),
            scope: None,
            store: Some("~/.sidekick/sessions/sessions.json".to_string()),
        }),
        subagents: Some(SubagentsConfig {
            announce_timeout_ms: Some(30_000),
            usage_poll_attempts: None,
            usage_poll_interval_ms: None,
        }),
        models: Some(models),
    }
}
