use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub public_rps: u32,
    pub admin_rps: u32,
    pub grading: GradingConfig,
    pub evaluation_claim_ttl_minutes: i64,
    pub bootstrap_admin: Option<(String, String)>,
}

/// Settings for the external grading model.
#[derive(Debug, Clone)]
pub struct GradingConfig {
    /// `None` disables oracle calls; every answer is then recorded with score 0.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
    pub concurrency: usize,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o".to_string(),
            max_tokens: 500,
            temperature: 0.3,
            timeout: Duration::from_secs(60),
            concurrency: 4,
        }
    }
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let defaults = GradingConfig::default();
        let grading = GradingConfig {
            api_key: get_env_opt("OPENAI_API_KEY"),
            base_url: get_env_or("OPENAI_BASE_URL", defaults.base_url)?,
            model: get_env_or("OPENAI_MODEL", defaults.model)?,
            max_tokens: get_env_or("GRADING_MAX_TOKENS", defaults.max_tokens)?,
            temperature: get_env_or("GRADING_TEMPERATURE", defaults.temperature)?,
            timeout: Duration::from_secs(get_env_or("GRADING_TIMEOUT_SECS", 60u64)?),
            concurrency: get_env_or("GRADING_CONCURRENCY", defaults.concurrency)?.max(1),
        };

        let bootstrap_admin = match (get_env_opt("ADMIN_USERNAME"), get_env_opt("ADMIN_PASSWORD")) {
            (Some(user), Some(password)) => Some((user, password)),
            _ => None,
        };

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            db_max_connections: get_env_or("DB_MAX_CONNECTIONS", 30)?,
            jwt_secret: get_env("JWT_SECRET")?,
            jwt_ttl_hours: get_env_or("JWT_TTL_HOURS", 24)?,
            public_rps: get_env_or("PUBLIC_RPS", 50)?,
            admin_rps: get_env_or("ADMIN_RPS", 50)?,
            grading,
            evaluation_claim_ttl_minutes: get_env_or("EVALUATION_CLAIM_TTL_MINUTES", 15)?,
            bootstrap_admin,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

/// Unset and blank values are both treated as absent.
fn get_env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get_env_opt(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        None => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> Result<&'static Config> {
    CONFIG
        .get()
        .ok_or_else(|| Error::Config("Configuration has not been initialized".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grading_defaults_favor_deterministic_output() {
        let cfg = GradingConfig::default();
        assert!(cfg.api_key.is_none());
        assert_eq!(cfg.model, "gpt-4o");
        assert_eq!(cfg.max_tokens, 500);
        assert!(cfg.temperature <= 0.3);
        assert!(cfg.concurrency >= 1);
    }

    #[test]
    fn missing_optional_value_falls_back_to_default() {
        let value: u32 = get_env_or("QA_BACKEND_SURELY_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }
}
