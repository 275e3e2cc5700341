//! Engine configuration loaded from TOML.
//!
//! Every section and key is optional; see `EngineConfig` for the schema and
//! the defaults applied when a key (or the whole file) is absent.

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use crate::error::ConfigError;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Root holding one folder per subject.
  pub content_dir: String,
  pub batch: BatchConfig,
  pub progression: ProgressionConfig,
  pub reinforcement: ReinforcementConfig,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      content_dir: "content".into(),
      batch: BatchConfig::default(),
      progression: ProgressionConfig::default(),
      reinforcement: ReinforcementConfig::default(),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
  /// Exercises per step when neither the request nor the step says otherwise.
  pub default_count: usize,
  /// Hard ceiling on any batch, whatever the request or content asks for.
  pub max_count: usize,
  /// Size of a step test batch (own exercises topped up with fractions).
  pub test_count: usize,
  /// Size of a subject-wide flash batch.
  pub flash_count: usize,
}

impl Default for BatchConfig {
  fn default() -> Self {
    Self { default_count: 10, max_count: 50, test_count: 20, flash_count: 15 }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
  pub xp_per_correct: u32,
  /// XP per correct answer on "test" style submissions.
  pub test_xp_per_correct: u32,
  /// A step completes once correct / presented reaches this ratio.
  pub completion_ratio: f64,
  pub max_mastery: u8,
}

impl Default for ProgressionConfig {
  fn default() -> Self {
    Self { xp_per_correct: 10, test_xp_per_correct: 15, completion_ratio: 0.5, max_mastery: 3 }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ReinforcementConfig {
  /// Tags below this success rate are weak.
  pub weak_threshold: f64,
  pub weak_share: f64,
  pub easy_share: f64,
  pub easy_difficulty: u8,
  pub default_count: usize,
}

impl Default for ReinforcementConfig {
  fn default() -> Self {
    Self { weak_threshold: 0.8, weak_share: 0.6, easy_share: 0.2, easy_difficulty: 1, default_count: 10 }
  }
}

/// Read and parse one config file.
pub fn load_engine_config(path: impl AsRef<Path>) -> Result<EngineConfig, ConfigError> {
  let path = path.as_ref();
  let shown = path.display().to_string();
  let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: shown.clone(), source })?;
  toml::from_str(&raw).map_err(|source| ConfigError::Toml { path: shown, source })
}

/// Config from ENGINE_CONFIG_PATH, then CONTENT_DIR on top.
/// Any read/parse failure is logged and defaults are used.
pub fn load_engine_config_from_env() -> EngineConfig {
  let mut cfg = match std::env::var("ENGINE_CONFIG_PATH") {
    Ok(path) => match load_engine_config(&path) {
      Ok(cfg) => {
        info!(target: "cours_engine", %path, "Loaded engine config (TOML)");
        cfg
      }
      Err(e) => {
        error!(target: "cours_engine", %path, error = %e, "Failed to load engine config; using defaults");
        EngineConfig::default()
      }
    },
    Err(_) => EngineConfig::default(),
  };

  if let Ok(dir) = std::env::var("CONTENT_DIR") {
    cfg.content_dir = dir;
  }
  cfg
}
