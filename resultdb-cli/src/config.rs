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

//! Configuration file for the `resultdb` binary.

use anyhow::{Context, Result};
use resultdb_core::{LocalStoreConfig, RemoteSettings, ServiceOptions};
use resultdb_telemetry::LogConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Contents of `resultdb.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultDbConfig {
    pub service: ServiceOptions,
    pub local: LocalStoreConfig,
    /// Absent: work against the local store.
    pub remote: Option<RemoteSettings>,
    pub log: LogConfig,
}

impl ResultDbConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(resultdb_core::config::from_toml_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_local_with_defaults() {
        let config = ResultDbConfig::parse("").unwrap();
        assert!(config.remote.is_none());
        assert!(config.service.prompt_for_delete);
        assert_eq!(config.local, LocalStoreConfig::default());
    }

    #[test]
    fn test_full_file() {
        let text = r#"
[service]
prompt_for_delete = false
hgp = "h/g/p"
max_workers = 8

[local]
main_dir = "/var/lib/resultdb"
local_save = true

[remote]
api_token = "secret"

[log]
level = "debug"
"#;
        let config = ResultDbConfig::parse(text).unwrap();
        assert!(!config.service.prompt_for_delete);
        assert_eq!(config.service.max_workers, 8);
        assert_eq!(config.local.save_dir(), Some(Path::new("/var/lib/resultdb")));
        assert_eq!(
            config.remote.as_ref().and_then(|r| r.api_token.as_deref()),
            Some("secret")
        );
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resultdb.toml");
        std::fs::write(&path, "[service]\nmax_workers = \"many\"\n").unwrap();
        let err = ResultDbConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("resultdb.toml"));
        assert!(ResultDbConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
