// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! Defines the structure of workspace and resolved configuration,
//! supporting JSON and YAML formats.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::orchestrate::RetryPolicy;
use crate::session::{MainSessionAlias, SessionScope};
use crate::types::ModelPricing;

/// Workspace configuration for sidekick.
/// Can be defined in .sidekick.json or .sidekick/config.json in the project root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    /// Gateway connection settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,

    /// Session naming and store location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionConfig>,

    /// Sub-agent announce tuning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subagents: Option<SubagentsConfig>,

    /// Per-provider, per-model settings (`models.<provider>.<model>`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<HashMap<String, HashMap<String, ModelConfig>>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Path of the gateway socket (`~/` is expanded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_timeout_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Key the literal `main` stands for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<SessionScope>,

    /// Path of the session store JSON (`~/` is expanded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubagentsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub announce_timeout_ms: Option<u64>,

    /// Extra store reads while waiting for usage to appear
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_poll_attempts: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_poll_interval_ms: Option<u64>,
}

/// Settings for one model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    /// USD per million tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<ModelPricing>,
}

/// Per-million-token prices keyed by provider and model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingTable(HashMap<String, HashMap<String, ModelPricing>>);

impl PricingTable {
    pub fn insert(&mut self, provider: &str, model: &str, pricing: ModelPricing) {
        self.0
            .entry(provider.trim().to_lowercase())
            .or_default()
            .insert(model.trim().to_string(), pricing);
    }

    /// Pricing for a model. Providers match case-insensitively, models exactly.
    pub fn lookup(&self, provider: &str, model: &str) -> Option<ModelPricing> {
        self.0
            .get(&provider.trim().to_lowercase())?
            .get(model.trim())
            .copied()
    }

    pub fn len(&self) -> usize {
        self.0.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolved configuration with all values set.
/// This is the merged result of global, workspace, local, and CLI configs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub socket_path: PathBuf,
    pub call_timeout_ms: u64,
    pub abort_timeout_ms: u64,
    pub main_key: String,
    pub session_scope: SessionScope,
    pub session_store: PathBuf,
    pub announce_timeout_ms: u64,
    pub usage_poll_attempts: u32,
    pub usage_poll_interval_ms: u64,
    pub pricing: PricingTable,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        let state_dir = super::loader::state_dir();
        Self {
            socket_path: state_dir.join("gateway.sock"),
            call_timeout_ms: 10_000,
            abort_timeout_ms: 5_000,
            main_key: "main".to_string(),
            session_scope: SessionScope::PerSender,
            session_store: state_dir.join("sessions").join("sessions.json"),
            announce_timeout_ms: 30_000,
            usage_poll_attempts: 4,
            usage_poll_interval_ms: 200,
            pricing: PricingTable::default(),
        }
    }
}

impl ResolvedConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn abort_timeout(&self) -> Duration {
        Duration::from_millis(self.abort_timeout_ms)
    }

    pub fn announce_timeout(&self) -> Duration {
        Duration::from_millis(self.announce_timeout_ms)
    }

    pub fn usage_poll(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.usage_poll_attempts,
            Duration::from_millis(self.usage_poll_interval_ms),
        )
    }

    pub fn main_session_alias(&self) -> MainSessionAlias {
        MainSessionAlias::new(self.main_key.as_str(), self.session_scope)
    }
}
