//! `.undu/config.toml`: auto-save settings and ignore patterns

use crate::error::{Result, StorageContext};
use crate::ignore::IgnoreSet;
use crate::store::atomic_write;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Patterns written into a fresh repository's config
pub const DEFAULT_IGNORE: &[&str] = &[
    ".undu",
    ".git",
    "node_modules",
    ".DS_Store",
    "*.pyc",
    "__pycache__",
    ".env",
    ".env.local",
    "dist",
    "build",
    ".next",
    ".cache",
    "*.log",
];

const HEADER: &str = "# Undu Configuration\n\n";

/// Repository configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Patterns to ignore (see [`crate::ignore`])
    pub ignore: IgnoreSet,
    pub auto_save: AutoSaveConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoSaveConfig {
    pub enabled: bool,
    /// Quiet period before the watcher records an auto-save
    pub interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ignore: IgnoreSet::new(DEFAULT_IGNORE.iter().copied()),
            auto_save: AutoSaveConfig::default(),
        }
    }
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 60_000,
        }
    }
}

impl Config {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e).storage("Failed to read config.toml"),
        };
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).storage("Failed to parse config.toml")
    }

    /// Serialize to TOML with a leading comment
    pub fn to_toml(&self) -> Result<String> {
        let body = toml::to_string_pretty(self).storage("Failed to serialize config")?;
        Ok(format!("{HEADER}{body}"))
    }

    pub fn save(&self, path: &Path, tmp_dir: &Path) -> Result<()> {
        let text = self.to_toml()?;
        atomic_write(tmp_dir, path, text.as_bytes()).storage("Failed to write config.toml")
    }
}
