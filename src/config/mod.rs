// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module for sidekick.
//!
//! Handles loading, merging, and validation of configuration from multiple sources:
//! - Global config: ~/.sidekick/config.json
//! - Workspace config: .sidekick.json, .sidekick/config.json, or sidekick.config.json
//! - Local config: .sidekick.local.json (gitignored, for personal overrides)
//! - CLI options: command-line arguments
//!
//! Configuration is merged with precedence (CLI > local > workspace > global > defaults).

mod loader;
mod merger;
mod types;

pub use loader::{
    expand_home, find_workspace_root, get_example_config, get_global_config_dir,
    get_global_config_path, init_config, load_config_file, load_global_config, load_local_config,
    load_workspace_config, save_workspace_config, CONFIG_FILES, GLOBAL_CONFIG_DIR,
    GLOBAL_CONFIG_FILE, LOCAL_CONFIG_FILE,
};

pub use merger::{default_config, merge_config, validate_config, CliOptions};

pub use types::{
    GatewayConfig, ModelConfig, PricingTable, ResolvedConfig, SessionConfig, SubagentsConfig,
    WorkspaceConfig,
};

use crate::error::ConfigError;
use std::path::Path;

/// Load, merge and validate all configuration sources for a workspace.
pub fn load_config(
    workspace_root: &Path,
    cli_options: CliOptions,
) -> Result<ResolvedConfig, ConfigError> {
    let global = load_global_config()?;
    let workspace = load_workspace_config(workspace_root)?;
    let local = load_local_config(workspace_root)?;

    let config = merge_config(global, workspace, local, cli_options);
    validate_config(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_with_no_files() {
        let temp = TempDir::new().unwrap();
        let config = load_config(temp.path(), CliOptions::default()).unwrap();
        assert!(!config.main_key.is_empty());
    }

    #[test]
    fn test_load_config_local_over_workspace() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(".sidekick.json"),
            r#"{"gateway": {"socketPath": "/ws.sock", "callTimeoutMs": 2000}}"#,
        )
        .unwrap();
        std::fs::write(
            temp.path().join(LOCAL_CONFIG_FILE),
            r#"{"gateway": {"socketPath": "/local.sock"}}"#,
        )
        .unwrap();

        let config = load_config(temp.path(), CliOptions::default()).unwrap();
        assert_eq!(config.socket_path, PathBuf::from("/local.sock"));
        assert_eq!(config.call_timeout_ms, 2000);
    }

    #[test]
    fn test_load_config_cli_override() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(".sidekick.json"),
            r#"{"session": {"store": "/ws/sessions.json"}}"#,
        )
        .unwrap();

        let cli = CliOptions {
            session_store: Some(PathBuf::from("/cli/sessions.json")),
            ..Default::default()
        };

        let config = load_config(temp.path(), cli).unwrap();
        assert_eq!(config.session_store, PathBuf::from("/cli/sessions.json"));
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(".sidekick.json"),
            r#"{"subagents": {"announceTimeoutMs": 0}}"#,
        )
        .unwrap();

        let result = load_config(temp.path(), CliOptions::default());
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
