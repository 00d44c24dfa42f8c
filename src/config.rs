use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::remote::RetryPolicy;

/// Environment variable overriding `api.base_url`.
pub const API_URL_ENV: &str = "PRODQ_API_URL";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  pub cache: CacheConfig,
  /// Retry policy for list reads
  pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
  pub base_url: String,
  /// Per-request timeout in milliseconds
  pub timeout_ms: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:3000/api".to_string(),
      timeout_ms: 15_000,
    }
  }
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms)
  }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
  /// Seconds before the full product list is considered stale
  pub stale_secs: i64,
  /// Seconds before a search result is considered stale
  pub search_stale_secs: i64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_secs: 300,
      search_stale_secs: 120,
    }
  }
}

impl CacheConfig {
  pub fn stale_time(&self) -> chrono::Duration {
    chrono::Duration::seconds(self.stale_secs.max(0))
  }

  pub fn search_stale_time(&self) -> chrono::Duration {
    chrono::Duration::seconds(self.search_stale_secs.max(0))
  }
}

impl Config {
  /// Load configuration from file, falling back to defaults.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./prodq.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/prodq/config.yaml
  ///
  /// `PRODQ_API_URL` overrides the configured base URL.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };

    if let Ok(url) = std::env::var(API_URL_ENV) {
      config.apply_api_url(&url);
    }

    Ok(config)
  }

  /// Replace the base URL unless `url` is blank.
  pub fn apply_api_url(&mut self, url: &str) {
    let url = url.trim();
    if !url.is_empty() {
      self.api.base_url = url.to_string();
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("prodq.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("prodq").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    // An empty file parses as null; treat it as all defaults.
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.api.base_url, "http://localhost:3000/api");
    assert_eq!(config.api.timeout(), Duration::from_secs(15));
    assert_eq!(config.cache.stale_time(), chrono::Duration::minutes(5));
    assert_eq!(config.cache.search_stale_time(), chrono::Duration::minutes(2));
    assert_eq!(config.retry, RetryPolicy::default());
  }

  #[test]
  fn test_partial_file_keeps_other_defaults() {
    let config = Config::parse(
      "api:\n  base_url: http://api.test/v1\nretry:\n  max_attempts: 5\n",
    )
    .unwrap();

    assert_eq!(config.api.base_url, "http://api.test/v1");
    assert_eq!(config.api.timeout_ms, 15_000);
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.delay_ms, 1000);
    assert_eq!(config.cache.stale_secs, 300);
    assert_eq!(config.cache.search_stale_secs, 120);
  }

  #[test]
  fn test_search_stale_time_configurable() {
    let config = Config::parse("cache:\n  search_stale_secs: 30\n").unwrap();
    assert_eq!(config.cache.stale_secs, 300);
    assert_eq!(config.cache.search_stale_time(), chrono::Duration::seconds(30));
  }

  #[test]
  fn test_empty_file_is_default() {
    assert_eq!(Config::parse("  \n").unwrap(), Config::default());
  }

  #[test]
  fn test_invalid_yaml_rejected() {
    assert!(Config::parse("api: [").is_err());
  }

  #[test]
  fn test_missing_explicit_path_is_error() {
    let err = Config::load(Some(Path::new("/nonexistent/prodq.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }

  #[test]
  fn test_blank_api_url_ignored() {
    let mut config = Config::default();
    config.apply_api_url("   ");
    assert_eq!(config.api.base_url, "http://localhost:3000/api");
    config.apply_api_url(" http://other:8080/api ");
    assert_eq!(config.api.base_url, "http://other:8080/api");
  }
}
