use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub subscriptions: SubscriptionsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionsConfig {
    /// Extra days after nominal expiry during which entitlement is still honored.
    #[serde(default)]
    pub grace_days: i64,
}

impl Default for SubscriptionsConfig {
    fn default() -> Self {
        Self { grace_days: 0 }
    }
}

impl SubscriptionsConfig {
    pub fn grace_seconds(&self) -> i64 {
        self.grace_days * 86400
    }
}

fn default_max_connections() -> u32 {
    10
}

impl Config {
    pub fn from_toml() -> AppResult<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // Read the config file when present; otherwise build from environment only.
        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => toml::from_str(&config_str)
                .map_err(|e| AppError::ConfigError(format!("failed to parse {config_path}: {e}")))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let database_url = env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(format!(
                        "DATABASE_URL is not set and no config file was found at {config_path}"
                    ))
                })?;

                Config {
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: default_max_connections(),
                    },
                    subscriptions: SubscriptionsConfig::default(),
                }
            }
            Err(e) => {
                return Err(AppError::ConfigError(format!(
                    "failed to read config file {config_path}: {e}"
                )));
            }
        };

        // Environment variables override the file in either case.
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            config.database.max_connections = mc;
        }
        if let Ok(v) = env::var("GROUPSUB_GRACE_DAYS")
            && let Ok(days) = v.parse()
        {
            config.subscriptions.grace_days = days;
        }

        Ok(config)
    }
}
