//! Configuration loading for Fusarex.
//!
//! Reads `fusarex.toml` from the path in the `FUSAREX_CONFIG` environment
//! variable, falling back to the current directory. Every field has a
//! default, so an empty file (or an absent section) is a valid start.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Content-cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding one JSON entry per extracted document.
    #[serde(default = "default_cache_dir")]
    pub dir: String,
}

/// Retry bounds for the backoff executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempt budget, including the first try.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

/// Batch pacing and checkpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Documents processed per group.
    #[serde(default = "default_group_size")]
    pub group_size: usize,
    /// Sleep between consecutive groups.
    #[serde(default = "default_inter_group_delay_secs")]
    pub inter_group_delay_secs: u64,
    /// Checkpoint after this many processed documents.
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: usize,
    /// File the run checkpoint is written to.
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: String,
}

fn default_cache_dir() -> String {
    "cache/extractions".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_secs() -> u64 {
    1
}

fn default_max_delay_secs() -> u64 {
    60
}

fn default_group_size() -> usize {
    10
}

fn default_inter_group_delay_secs() -> u64 {
    60
}

fn default_checkpoint_every() -> usize {
    50
}

fn default_checkpoint_path() -> String {
    "cache/checkpoint.json".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            group_size: default_group_size(),
            inter_group_delay_secs: default_inter_group_delay_secs(),
            checkpoint_every: default_checkpoint_every(),
            checkpoint_path: default_checkpoint_path(),
        }
    }
}

impl Config {
    /// Load configuration from `fusarex.toml`.
    ///
    /// Checks the `FUSAREX_CONFIG` environment variable first, then the
    /// current directory.
    pub fn load() -> Result<Self> {
        let path =
            std::env::var("FUSAREX_CONFIG").unwrap_or_else(|_| "fusarex.toml".to_string());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!(
                "Config file not found: {}\nCopy fusarex.example.toml to fusarex.toml and edit it.",
                path.display()
            );
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_secs, 1);
        assert_eq!(config.retry.max_delay_secs, 60);
        assert_eq!(config.batch.group_size, 10);
        assert_eq!(config.batch.inter_group_delay_secs, 60);
        assert_eq!(config.batch.checkpoint_every, 50);
        assert_eq!(config.batch.checkpoint_path, "cache/checkpoint.json");
        assert_eq!(config.cache.dir, "cache/extractions");
    }

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.batch.group_size, 10);
        assert_eq!(config.cache.dir, "cache/extractions");
    }

    #[test]
    fn test_partial_override() {
        let toml_str = r#"
            [batch]
            group_size = 3
            inter_group_delay_secs = 0

            [retry]
            max_attempts = 2
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.batch.group_size, 3);
        assert_eq!(config.batch.inter_group_delay_secs, 0);
        assert_eq!(config.batch.checkpoint_every, 50);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.base_delay_secs, 1);
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = Config::load_from(Path::new("/nonexistent/fusarex.toml")).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}
