use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use tracing::info;

use crate::ingredient_matcher::DEFAULT_MATCH_THRESHOLD;
use crate::logging::LoggingConfig;
use crate::units::{load_unit_table, UnitRegistry};

pub const MATCH_THRESHOLD_ENV: &str = "PANTRY_MATCH_THRESHOLD";
pub const REVERT_WINDOW_ENV: &str = "PANTRY_REVERT_WINDOW_MINUTES";
pub const UNIT_TABLE_ENV: &str = "PANTRY_UNIT_TABLE";
pub const STATE_FILE_ENV: &str = "PANTRY_STATE_FILE";

pub const DEFAULT_REVERT_WINDOW_MINUTES: i64 = 60;
pub const DEFAULT_STATE_FILE: &str = "pantry_state.json";

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub match_threshold: f64,
    /// Used by revert when the request has neither a transaction id nor `minutes_ago`.
    pub revert_window_minutes: i64,
    pub unit_table: Option<PathBuf>,
    pub state_file: PathBuf,
    pub logging: LoggingConfig,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            revert_window_minutes: DEFAULT_REVERT_WINDOW_MINUTES,
            unit_table: None,
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            logging: LoggingConfig::default(),
        }
    }
}

impl ReconcileConfig {
    /// Reads the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let mut config = Self::from_vars(|key| env::var(key).ok())?;
        config.logging = LoggingConfig::from_env();
        Ok(config)
    }

    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = get(MATCH_THRESHOLD_ENV) {
            let threshold = raw
                .trim()
                .parse::<f64>()
                .with_context(|| format!("{} must be a number, got '{}'", MATCH_THRESHOLD_ENV, raw))?;
            config.match_threshold = validate_threshold(threshold)?;
        }
        if let Some(raw) = get(REVERT_WINDOW_ENV) {
            let minutes = raw
                .trim()
                .parse::<i64>()
                .with_context(|| format!("{} must be a whole number, got '{}'", REVERT_WINDOW_ENV, raw))?;
            if minutes < 0 {
                return Err(anyhow::anyhow!("{} must not be negative", REVERT_WINDOW_ENV));
            }
            config.revert_window_minutes = minutes;
        }
        if let Some(raw) = get(UNIT_TABLE_ENV).filter(|v| !v.trim().is_empty()) {
            config.unit_table = Some(PathBuf::from(raw.trim()));
        }
        if let Some(raw) = get(STATE_FILE_ENV).filter(|v| !v.trim().is_empty()) {
            config.state_file = PathBuf::from(raw.trim());
        }

        Ok(config)
    }

    /// Standard units, extended with the configured unit table if any.
    pub fn build_registry(&self) -> Result<UnitRegistry> {
        let mut registry = UnitRegistry::standard();
        if let Some(path) = &self.unit_table {
            let definitions = load_unit_table(path)
                .with_context(|| format!("Failed to load unit table from {:?}", path))?;
            info!(path = %path.display(), units = definitions.len(), "loaded extra unit definitions");
            registry.extend(definitions);
        }
        Ok(registry)
    }
}

pub fn validate_threshold(threshold: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(anyhow::anyhow!("match threshold must be within [0, 1], got {}", threshold));
    }
    Ok(threshold)
}
