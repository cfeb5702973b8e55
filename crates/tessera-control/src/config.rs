// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Runtime configuration.

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tessera_core::ExecutionRole;

/// Configuration for a runtime instance.
///
/// Every field has a default, so a partial JSON document is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// The role this process plays.
    pub role: ExecutionRole,
    /// `env_logger` filter used when the runtime installs the logger.
    pub log_filter: String,
    /// Log a warning when an entity is rejected by a component's guard or
    /// ancestor scope.
    pub warn_on_rejection: bool,
    /// Time every frame hook and emit profiling samples.
    pub profile_hooks: bool,
    /// Maximum number of profiling samples to buffer.
    /// If the buffer is full, new samples are dropped.
    pub profile_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            role: ExecutionRole::Server,
            log_filter: "info".to_string(),
            warn_on_rejection: true,
            profile_hooks: false,
            profile_buffer_size: 1024,
        }
    }
}

impl RuntimeConfig {
    /// Default configuration for `role`.
    pub fn for_role(role: ExecutionRole) -> Self {
        Self {
            role,
            ..Self::default()
        }
    }

    /// Parses a configuration from a JSON document.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("invalid runtime configuration")
    }

    /// Reads and parses a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = RuntimeConfig::from_json(r#"{ "role": "client", "profile_hooks": true }"#)
            .unwrap();
        assert_eq!(config.role, ExecutionRole::Client);
        assert!(config.profile_hooks);
        assert!(config.warn_on_rejection);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_invalid_role_is_rejected() {
        let err = RuntimeConfig::from_json(r#"{ "role": "observer" }"#).unwrap_err();
        assert!(format!("{err:#}").contains("invalid runtime configuration"));
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let err = RuntimeConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
