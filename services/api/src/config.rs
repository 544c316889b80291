//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

pub const DEFAULT_AI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_AI_MODEL: &str = "gemini-2.0-flash-lite";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub uploads_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub gemini_api_key: Option<String>,
    pub ai_api_base: String,
    pub ai_model: String,
    pub cors_origin: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3333".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- File Storage ---
        let uploads_dir = lookup("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./uploads"));

        let max_upload_bytes = match lookup("MAX_UPLOAD_BYTES") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(bytes) if bytes > 0 => bytes,
                _ => {
                    return Err(ConfigError::InvalidValue(
                        "MAX_UPLOAD_BYTES".to_string(),
                        format!("'{}' is not a positive byte count", raw),
                    ))
                }
            },
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        // --- AI Settings (the key is checked when the client is built) ---
        let gemini_api_key = lookup("GEMINI_API_KEY");
        let ai_api_base = lookup("AI_API_BASE").unwrap_or_else(|| DEFAULT_AI_API_BASE.to_string());
        let ai_model = lookup("AI_MODEL").unwrap_or_else(|| DEFAULT_AI_MODEL.to_string());

        let cors_origin = lookup("CORS_ORIGIN").filter(|origin| !origin.trim().is_empty());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            uploads_dir,
            max_upload_bytes,
            gemini_api_key,
            ai_api_base,
            ai_model,
            cors_origin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://localhost/plans")])).unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:3333".parse::<SocketAddr>().unwrap());
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.uploads_dir, PathBuf::from("./uploads"));
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(config.ai_api_base, DEFAULT_AI_API_BASE);
        assert_eq!(config.ai_model, DEFAULT_AI_MODEL);
        assert!(config.gemini_api_key.is_none());
        assert!(config.cors_origin.is_none());
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(var) if var == "DATABASE_URL"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/plans"),
            ("MAX_UPLOAD_BYTES", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "MAX_UPLOAD_BYTES"));

        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/plans"),
            ("RUST_LOG", "chatty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "RUST_LOG"));

        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/plans"),
            ("BIND_ADDRESS", "not-an-address"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "BIND_ADDRESS"));
    }

    #[test]
    fn overrides_are_read() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/plans"),
            ("BIND_ADDRESS", "127.0.0.1:8080"),
            ("UPLOADS_DIR", "/var/lib/plans"),
            ("MAX_UPLOAD_BYTES", "1024"),
            ("GEMINI_API_KEY", "secret"),
            ("AI_MODEL", "gemini-2.0-flash"),
            ("CORS_ORIGIN", "http://localhost:3000"),
        ]))
        .unwrap();

        assert_eq!(config.bind_address.port(), 8080);
        assert_eq!(config.uploads_dir, PathBuf::from("/var/lib/plans"));
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.gemini_api_key.as_deref(), Some("secret"));
        assert_eq!(config.ai_model, "gemini-2.0-flash");
        assert_eq!(config.cors_origin.as_deref(), Some("http://localhost:3000"));
    }
}
