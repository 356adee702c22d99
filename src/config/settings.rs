use sqlx::postgres::PgConnectOptions;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{EvalResult, EvaluationError};

pub const DEFAULT_ENV_FILE: &str = "db.env";
const DATABASE_PORT: u16 = 5432;

/// Connection settings for the indicator warehouse.
#[derive(Clone, PartialEq)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub host: String,
    pub name: String,
    pub port: u16,
}

impl DatabaseSettings {
    /// Credentials are passed as fields, never spliced into a URL, so
    /// reserved characters in the password need no escaping.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .database(&self.name)
    }
}

impl std::fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("username", &self.username)
            .field("password", &"***")
            .field("host", &self.host)
            .field("name", &self.name)
            .field("port", &self.port)
            .finish()
    }
}

/// Loads `env_file` (default `db.env`) into the process environment. Only
/// an explicitly named file is required to exist.
fn load_env_file(env_file: Option<&Path>) -> EvalResult<()> {
    let path = env_file.unwrap_or_else(|| Path::new(DEFAULT_ENV_FILE));
    match dotenvy::from_path(path) {
        Ok(()) => debug!("Loaded environment from {}", path.display()),
        Err(e) if env_file.is_some() => {
            return Err(EvaluationError::Configuration(format!(
                "cannot read {}: {}",
                path.display(),
                e
            )))
        }
        Err(_) => warn!("{} not found, reading settings from process environment", path.display()),
    }
    Ok(())
}

/// Process-level settings, built once at startup and passed to the clients.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database: DatabaseSettings,
    pub model_url: String,
}

impl AppConfig {
    /// Reads the required keys from the process environment after loading
    /// the env file.
    pub fn load(env_file: Option<&Path>) -> EvalResult<Self> {
        load_env_file(env_file)?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; every key is required.
    pub fn from_lookup<F>(lookup: F) -> EvalResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut require = |key: &'static str| match lookup(key).filter(|v| !v.trim().is_empty()) {
            Some(value) => value,
            None => {
                missing.push(key);
                String::new()
            }
        };

        let config = AppConfig {
            database: DatabaseSettings {
                username: require("DATABASE_USERNAME"),
                password: require("DATABASE_PASSWORD"),
                host: require("DATABASE_HOST"),
                name: require("DATABASE_NAME"),
                port: DATABASE_PORT,
            },
            model_url: require("MODEL_URL"),
        };

        if missing.is_empty() {
            Ok(config)
        } else {
            Err(EvaluationError::Configuration(format!(
                "missing required settings: {}",
                missing.join(", ")
            )))
        }
    }
}
