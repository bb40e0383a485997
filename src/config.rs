use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheSettings;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub supabase: SupabaseConfig,
  #[serde(default)]
  pub retry: RetryConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseConfig {
  /// Project URL, e.g. https://abcd.supabase.co
  pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
  pub max_attempts: u32,
  pub initial_delay_ms: u64,
  pub max_delay_ms: u64,
  pub backoff_factor: f64,
}

impl Default for RetryConfig {
  fn default() -> Self {
    let policy = RetryPolicy::default();
    Self {
      max_attempts: policy.max_attempts,
      initial_delay_ms: policy.initial_delay.as_millis() as u64,
      max_delay_ms: policy.max_delay.as_millis() as u64,
      backoff_factor: policy.backoff_factor,
    }
  }
}

impl RetryConfig {
  pub fn policy(&self) -> RetryPolicy {
    RetryPolicy::new(self.max_attempts)
      .with_initial_delay(Duration::from_millis(self.initial_delay_ms))
      .with_max_delay(Duration::from_millis(self.max_delay_ms))
      .with_backoff_factor(self.backoff_factor)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// When false, nothing is cached and every read goes to the database
  pub enabled: bool,
  /// How long a cached collection is served before it is refetched
  pub freshness_secs: i64,
  /// Storage-level expiry for entries that are never read again
  pub storage_ttl_secs: i64,
  /// Cache database location (default: $XDG_DATA_HOME/outreach/cache.db)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    let settings = CacheSettings::default();
    Self {
      enabled: true,
      freshness_secs: settings.freshness_window.num_seconds(),
      storage_ttl_secs: settings.storage_ttl.num_seconds(),
      path: None,
    }
  }
}

impl CacheConfig {
  pub fn settings(&self) -> CacheSettings {
    CacheSettings {
      freshness_window: seconds(self.freshness_secs),
      storage_ttl: seconds(self.storage_ttl_secs),
    }
  }
}

/// Negative values become zero, values past the representable range saturate.
fn seconds(secs: i64) -> chrono::Duration {
  chrono::Duration::try_seconds(secs.max(0)).unwrap_or(chrono::Duration::MAX)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Write logs to this file instead of stderr
  pub file: Option<PathBuf>,
  /// Default filter when RUST_LOG is not set
  pub level: String,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      file: None,
      level: "info".to_string(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./outreach.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/outreach/config.yaml
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

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/outreach/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("outreach.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("outreach").join("config.yaml");
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

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Get the database API key from environment variables.
  ///
  /// Checks OUTREACH_SUPABASE_KEY first, then SUPABASE_ANON_KEY as fallback.
  pub fn get_api_key() -> Result<String> {
    std::env::var("OUTREACH_SUPABASE_KEY")
      .or_else(|_| std::env::var("SUPABASE_ANON_KEY"))
      .map_err(|_| {
        eyre!(
          "Database API key not found. Set OUTREACH_SUPABASE_KEY or SUPABASE_ANON_KEY environment variable."
        )
      })
  }
}
