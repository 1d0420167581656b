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

//! Logging setup for resultdb binaries.
//!
//! Library crates only emit `tracing` events; a binary decides where they
//! go by calling [`init_logging`] once at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable holding the log level.
pub const LOG_LEVEL_ENV: &str = "RESULTDB_LOG_LEVEL";
/// Environment variable holding the log file path.
pub const LOG_FILE_ENV: &str = "RESULTDB_LOG_FILE";

const DEFAULT_LEVEL: &str = "warn";
const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Where and how much to log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// One of `trace`, `debug`, `info`, `warn`, `error`, `off`.
    pub level: String,
    /// Log only to this file instead of stderr.
    pub file: Option<PathBuf>,
    /// Emit JSON lines
    pub json: bool,
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL.to_string(),
            file: None,
            json: false,
            with_target: false,
        }
    }
}

impl LogConfig {
    /// Read level and file from `RESULTDB_LOG_LEVEL` / `RESULTDB_LOG_FILE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(level) = lookup(LOG_LEVEL_ENV).filter(|v| !v.trim().is_empty()) {
            config.level = level;
        }
        if let Some(file) = lookup(LOG_FILE_ENV).filter(|v| !v.trim().is_empty()) {
            config.file = Some(PathBuf::from(file));
        }
        config
    }

    /// Level to install, and whether the configured one had to be replaced.
    pub fn effective_level(&self) -> (&str, bool) {
        let requested = self.level.trim();
        match LEVELS.iter().find(|level| level.eq_ignore_ascii_case(requested)) {
            Some(level) => (*level, false),
            None => (DEFAULT_LEVEL, true),
        }
    }
}

/// Install the global subscriber described by `config`.
///
/// Fails if a global subscriber is already set or the log file cannot
/// be opened.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let (level, replaced) = config.effective_level();
    let filter = EnvFilter::try_new(level)?;

    let layer = match &config.file {
        Some(path) => {
            let (dir, name) = split_log_path(path)?;
            std::fs::create_dir_all(&dir)?;
            let appender = tracing_appender::rolling::never(dir, name);
            fmt_layer(config, appender)
        }
        None => fmt_layer(config, std::io::stderr),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()?;

    if replaced {
        tracing::warn!(
            "Invalid log level '{}', falling back to {}",
            config.level,
            DEFAULT_LEVEL
        );
    }
    Ok(())
}

type BoxedLayer = Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>;

fn fmt_layer<W>(config: &LogConfig, writer: W) -> BoxedLayer
where
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(config.with_target)
        .with_ansi(false);
    if config.json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

fn split_log_path(path: &Path) -> anyhow::Result<(PathBuf, PathBuf)> {
    let name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("log file path {} has no file name", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, PathBuf::from(name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.effective_level(), ("warn", false));
        assert!(config.file.is_none());
    }

    #[test]
    fn test_level_is_case_insensitive() {
        let config = LogConfig {
            level: " DEBUG ".into(),
            ..LogConfig::default()
        };
        assert_eq!(config.effective_level(), ("debug", false));
    }

    #[test]
    fn test_invalid_level_falls_back_to_warn() {
        let config = LogConfig {
            level: "chatty".into(),
            ..LogConfig::default()
        };
        assert_eq!(config.effective_level(), ("warn", true));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> =
            [(LOG_LEVEL_ENV, "info"), (LOG_FILE_ENV, "/tmp/resultdb.log")].into();
        let config = LogConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.level, "info");
        assert_eq!(config.file, Some(PathBuf::from("/tmp/resultdb.log")));

        let config = LogConfig::from_lookup(|_| Some("  ".to_string()));
        assert_eq!(config, LogConfig::default());
    }

    #[test]
    fn test_toml_section() {
        let config: LogConfig = toml::from_str("level = \"debug\"\njson = true\n").unwrap();
        assert_eq!(config.level, "debug");
        assert!(config.json);
        assert!(!config.with_target);
    }

    #[test]
    fn test_split_log_path() {
        let (dir, name) = split_log_path(Path::new("resultdb.log")).unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(name, PathBuf::from("resultdb.log"));
        assert!(split_log_path(Path::new("/")).is_err());
    }

    #[test]
    fn test_init_logging_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("resultdb.log");
        let config = LogConfig {
            level: "info".into(),
            file: Some(path.clone()),
            ..LogConfig::default()
        };
        init_logging(&config).unwrap();
        tracing::info!("hello from the test");
        assert!(path.exists());
        // A second global subscriber is refused.
        assert!(init_logging(&config).is_err());
    }
}
