use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name the project config is discovered under.
pub const CONFIG_FILE_NAME: &str = "sinew.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Sources enumerated per relationship per run.
    #[serde(default = "default_audit_limit")]
    pub limit: usize,
    /// Candidate cap for reverse-lookup scans.
    #[serde(default = "default_scan_cap")]
    pub scan_cap: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            limit: default_audit_limit(),
            scan_cap: default_scan_cap(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("sinew.db")
}

const fn default_audit_limit() -> usize {
    crate::check::checker::DEFAULT_CHECK_LIMIT
}

const fn default_scan_cap() -> usize {
    crate::resolve::DEFAULT_SCAN_CAP
}

impl ProjectConfig {
    /// Parse a config file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parse config {}", path.display()))
    }

    /// Walk from `start` upward looking for [`CONFIG_FILE_NAME`].
    #[must_use]
    pub fn discover(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load the discovered config, or defaults when none exists.
    ///
    /// A store path in the config is resolved relative to the config file's
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns an error only when a discovered file fails to parse — absence
    /// is not an error.
    pub fn load_or_default(start: &Path) -> Result<Self> {
        match Self::discover(start) {
            Some(path) => {
                let mut config = Self::load(&path)?;
                if config.store.path.is_relative() {
                    if let Some(dir) = path.parent() {
                        config.store.path = dir.join(&config.store.path);
                    }
                }
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }
}
