//! Application state: the gamification service wired to its stores and clock.
//!
//! This module owns:
//!   - the in-memory store backing ledgers, participations and quiz attempts
//!   - the badge and eco challenge catalogs (from TOML or built-in seeds)
//!   - reward and ledger settings
//!
//! Handlers only ever talk to `GamificationService`; swapping the store for a
//! persistent one only touches `from_config`.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::config::{load_app_config_from_env, AppConfig};
use crate::logic::GamificationService;
use crate::seeds::{seed_badges, seed_challenges};
use crate::store::MemoryStore;
use crate::util::{Clock, SystemClock};

#[derive(Clone)]
pub struct AppState {
    pub service: GamificationService,
    pub static_dir: String,
}

impl AppState {
    /// Build state from env: load config, fall back to seeded catalogs, wire the store.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_app_config_from_env().unwrap_or_else(|| {
            warn!(target: "ecolearn_backend", "No app config loaded; using built-in defaults");
            AppConfig::default()
        });
        Self::from_config(cfg, Arc::new(SystemClock))
    }

    pub fn from_config(cfg: AppConfig, clock: Arc<dyn Clock>) -> Self {
        let badges = if cfg.badges.is_empty() { seed_badges() } else { cfg.badges };
        let challenges = if cfg.challenges.is_empty() { seed_challenges() } else { cfg.challenges };
        info!(
            target: "ecolearn_backend",
            badges = badges.len(),
            challenges = challenges.len(),
            "Catalogs ready"
        );

        let store = Arc::new(MemoryStore::new(badges, challenges));
        let service = GamificationService::new(
            store.clone(),
            store.clone(),
            store,
            clock,
            cfg.rewards,
            cfg.ledger,
        );
        Self { service, static_dir: cfg.server.static_dir }
    }
}
