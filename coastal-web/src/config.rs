use coastal_core::NotifierConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub port: u16,
    pub database_url: String,
    /// Empty means any origin is allowed.
    pub cors_origins: Vec<String>,
    pub thresholds_file: Option<PathBuf>,
    pub notifier: NotifierConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: format!("sqlite://{}", default_database_path().display()),
            cors_origins: Vec::new(),
            thresholds_file: None,
            notifier: NotifierConfig::default(),
        }
    }
}

/// `~/.coastal-alert/data/alerts.db`, or `./data/alerts.db` without a home directory.
fn default_database_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".coastal-alert"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("data")
        .join("alerts.db")
}

impl WebConfig {
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::default();

        // COASTAL_PORT wins over the generic PORT
        if let Ok(port) = env::var("COASTAL_PORT").or_else(|_| env::var("PORT")) {
            config.port = port.parse()?;
        }

        if let Ok(db_url) = env::var("DATABASE_URL") {
            config.database_url = db_url;
        } else if let Ok(db_path) = env::var("COASTAL_DATABASE_PATH") {
            config.database_url = format!("sqlite://{}", db_path);
        }

        if let Ok(origins) = env::var("COASTAL_CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(path) = env::var("COASTAL_THRESHOLDS_FILE") {
            if !path.trim().is_empty() {
                config.thresholds_file = Some(PathBuf::from(path));
            }
        }

        config.notifier = NotifierConfig::from_env();

        Ok(config)
    }

    /// Configuration for tests and one-off runs: in-memory database, demo notifiers.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            ..Self::default()
        }
    }
}
