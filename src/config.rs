//! Loading application configuration (reward tables, ledger settings and optional
//! badge/challenge catalogs) from TOML.
//!
//! See `AppConfig` for the expected schema and `ecolearn.toml` for an example.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{BadgeDefinition, EcoChallenge};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub server: ServerConfig,
  #[serde(default)]
  pub rewards: RewardConfig,
  #[serde(default)]
  pub ledger: LedgerConfig,
  /// Replaces the built-in badge catalog when non-empty.
  #[serde(default)]
  pub badges: Vec<BadgeDefinition>,
  /// Replaces the built-in eco challenge catalog when non-empty.
  #[serde(default)]
  pub challenges: Vec<EcoChallenge>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub static_dir: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self { static_dir: "./static".into() }
  }
}

/// Point tables used by the reward rules.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
  /// Quiz base points keyed by lowercase difficulty tier.
  pub quiz_base_points: HashMap<String, u32>,
  /// Base points for a tier missing from `quiz_base_points`.
  pub quiz_fallback_points: u32,
  /// Score at or above which an attempt is recorded as passed.
  pub quiz_passing_score: f64,
  pub fun_challenge_points: u32,
}

impl Default for RewardConfig {
  fn default() -> Self {
    Self {
      quiz_base_points: HashMap::from([
        ("beginner".to_string(), 10),
        ("intermediate".to_string(), 25),
        ("advanced".to_string(), 50),
      ]),
      quiz_fallback_points: 15,
      quiz_passing_score: 60.0,
      fun_challenge_points: 50,
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
  /// How many times an optimistic ledger write is retried on version conflict.
  pub max_update_retries: u32,
  pub leaderboard_default_limit: usize,
}

impl Default for LedgerConfig {
  fn default() -> Self {
    Self { max_update_retries: 3, leaderboard_default_limit: 10 }
  }
}

impl RewardConfig {
  /// Tier keys are matched case-insensitively.
  fn normalized(mut self) -> Self {
    self.quiz_base_points = self
      .quiz_base_points
      .into_iter()
      .map(|(k, v)| (k.trim().to_ascii_lowercase(), v))
      .collect();
    self
  }
}

pub fn parse_app_config(s: &str) -> Result<AppConfig, toml::de::Error> {
  let mut cfg = toml::from_str::<AppConfig>(s)?;
  cfg.rewards = cfg.rewards.normalized();
  Ok(cfg)
}

/// Attempt to load `AppConfig` from ECOLEARN_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_app_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("ECOLEARN_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_app_config(&s) {
      Ok(cfg) => {
        info!(target: "ecolearn_backend", %path, badges = cfg.badges.len(), challenges = cfg.challenges.len(), "Loaded app config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "ecolearn_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "ecolearn_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
