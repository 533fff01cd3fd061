//! Typed, environment-derived configuration assembled once at process
//! start. Every field with a sane default has one; `database_url`,
//! `runner_url`, and `runner_secret` are required and missing/empty
//! values fail startup immediately rather than surfacing mid-request.

use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("environment variable {0} has an invalid value: {1}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub runner_url: String,
    pub runner_secret: String,
    pub projects_dir: String,
    pub templates_dir: String,
    pub use_postgres_rate_limit: bool,
    pub web_origin: String,
    pub http_bind_addr: String,
    pub build_timeout: Duration,
    pub max_attempts: u32,
    pub rate_limit_window_s: u64,
    pub rate_limit_max_requests: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            database_url: required("DATABASE_URL")?,
            runner_url: required("RUNNER_URL")?,
            runner_secret: required("RUNNER_SECRET")?,
            projects_dir: optional("PROJECTS_DIR", "projects"),
            templates_dir: optional("TEMPLATES_DIR", "templates"),
            use_postgres_rate_limit: optional_bool("USE_POSTGRES_RATE_LIMIT", false)?,
            web_origin: optional("WEB_ORIGIN", "http://localhost:3000"),
            http_bind_addr: optional("HTTP_BIND_ADDR", "0.0.0.0:8080"),
            build_timeout: Duration::from_secs(optional_u64("BUILD_TIMEOUT_S", 300)?),
            max_attempts: optional_u32("MAX_ATTEMPTS", 3)?,
            rate_limit_window_s: optional_u64("RATE_LIMIT_WINDOW_S", 60)?,
            rate_limit_max_requests: optional_u32("RATE_LIMIT_MAX_REQUESTS", 10)?,
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn optional(key: &'static str, default: &str) -> String {
    env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}

fn optional_bool(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(v) if !v.is_empty() => v
            .parse::<bool>()
            .map_err(|_| ConfigError::Invalid(key, v.clone())),
        _ => Ok(default),
    }
}

fn optional_u64(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(v) if !v.is_empty() => v
            .parse::<u64>()
            .map_err(|_| ConfigError::Invalid(key, v.clone())),
        _ => Ok(default),
    }
}

fn optional_u32(key: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(key) {
        Ok(v) if !v.is_empty() => v
            .parse::<u32>()
            .map_err(|_| ConfigError::Invalid(key, v.clone())),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_all() {
        for key in [
            "DATABASE_URL",
            "RUNNER_URL",
            "RUNNER_SECRET",
            "PROJECTS_DIR",
            "TEMPLATES_DIR",
            "USE_POSTGRES_RATE_LIMIT",
            "WEB_ORIGIN",
            "HTTP_BIND_ADDR",
            "BUILD_TIMEOUT_S",
            "MAX_ATTEMPTS",
            "RATE_LIMIT_WINDOW_S",
            "RATE_LIMIT_MAX_REQUESTS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn missing_runner_secret_fails_startup() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        env::set_var("DATABASE_URL", "postgres://x");
        env::set_var("RUNNER_URL", "http://runner");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("RUNNER_SECRET")));
        clear_all();
    }

    #[test]
    fn defaults_applied_when_optional_vars_absent() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        env::set_var("DATABASE_URL", "postgres://x");
        env::set_var("RUNNER_URL", "http://runner");
        env::set_var("RUNNER_SECRET", "shh");
        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.projects_dir, "projects");
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.rate_limit_max_requests, 10);
        clear_all();
    }
}
