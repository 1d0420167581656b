// Copyright 2025 Sushanth (https://github.com/sushanthpy)
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

//! Service configuration.
//!
//! All settings are plain data loaded from TOML or built in code; nothing in
//! the library reads the process environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ResultDbError, Result};

/// Default authentication endpoint of the hosted service.
pub const DEFAULT_AUTH_URL: &str = "https://auth.quantum-computing.ibm.com/api";

/// Default number of records returned by list calls.
pub const DEFAULT_LIST_LIMIT: usize = 10;

/// Default bulk save worker pool size.
pub const DEFAULT_MAX_WORKERS: usize = 100;

/// Default number of create/update attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Behaviour of the experiment service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceOptions {
    /// Ask for confirmation before deleting anything.
    pub prompt_for_delete: bool,
    /// HTTP request timeout in seconds.
    pub requests_timeout_secs: u64,
    /// `hub/group/project` stamped onto created experiments.
    pub hgp: Option<String>,
    /// Worker pool size for bulk saves.
    pub max_workers: usize,
    pub max_attempts: u32,
    pub default_limit: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            prompt_for_delete: true,
            requests_timeout_secs: 100,
            hgp: None,
            max_workers: DEFAULT_MAX_WORKERS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            default_limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl ServiceOptions {
    /// Options for scripted use: never prompt before deleting.
    pub fn unattended() -> Self {
        Self {
            prompt_for_delete: false,
            ..Self::default()
        }
    }

    pub fn requests_timeout(&self) -> Duration {
        Duration::from_secs(self.requests_timeout_secs)
    }

    /// Split `hgp` into hub, group and project.
    pub fn hub_group_project(&self) -> Result<Option<(String, String, String)>> {
        let Some(hgp) = &self.hgp else {
            return Ok(None);
        };
        let parts: Vec<&str> = hgp.split('/').collect();
        match parts.as_slice() {
            [hub, group, project] if !hub.is_empty() && !group.is_empty() && !project.is_empty() => {
                Ok(Some((hub.to_string(), group.to_string(), project.to_string())))
            }
            _ => Err(ResultDbError::InvalidArgument(format!(
                "hgp '{}' is not of the form hub/group/project",
                hgp
            ))),
        }
    }
}

/// Local store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalStoreConfig {
    /// Directory holding `experiments.json`, `results.json`, `figures/` and `files/`.
    pub main_dir: Option<PathBuf>,
    /// Persist to `main_dir` after every mutation.
    pub local_save: bool,
    /// Identity reported as `owner` and used by the "mine" filters.
    pub user: String,
}

impl Default for LocalStoreConfig {
    fn default() -> Self {
        Self {
            main_dir: None,
            local_save: false,
            user: "local".to_string(),
        }
    }
}

impl LocalStoreConfig {
    /// In-memory only.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Persisted under `dir`.
    pub fn persistent(dir: impl Into<PathBuf>) -> Self {
        Self {
            main_dir: Some(dir.into()),
            local_save: true,
            ..Self::default()
        }
    }

    /// Directory to persist to, if persistence is enabled.
    pub fn save_dir(&self) -> Option<&Path> {
        if self.local_save {
            self.main_dir.as_deref()
        } else {
            None
        }
    }
}

/// Remote service settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// Authentication endpoint; defaults to [`DEFAULT_AUTH_URL`].
    pub auth_url: Option<String>,
    /// Long-lived API token exchanged for an access token.
    pub api_token: Option<String>,
    /// Results database URL; discovered from the auth service when absent.
    pub db_url: Option<String>,
    /// Session access token; obtained from `api_token` when absent.
    pub access_token: Option<String>,
}

impl RemoteSettings {
    pub fn auth_url(&self) -> &str {
        self.auth_url.as_deref().unwrap_or(DEFAULT_AUTH_URL)
    }
}

/// Parse a TOML document into any of the configuration sections.
pub fn from_toml_str<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
    Ok(toml::from_str(text)?)
}
