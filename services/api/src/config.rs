//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which generation backend serves the pipeline stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationProvider {
    Gemini,
    OpenAi,
}

impl FromStr for GenerationProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            other => Err(format!("'{other}' is not one of: gemini, openai")),
        }
    }
}

pub const DEFAULT_NOTION_COVER_URL: &str = "https://images.pexels.com/photos/1106468/pexels-photo-1106468.jpeg?auto=compress&cs=tinysrgb&w=1260&h=750&dpr=1";

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub generation_provider: GenerationProvider,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_api_url: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub generation_timeout: Duration,
    pub notion_token: String,
    pub notion_parent_page_id: String,
    pub notion_api_url: String,
    pub notion_version: String,
    pub notion_cover_url: String,
    pub submission_max_attempts: u32,
    pub submission_backoff: Duration,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| var(*name))
                .ok_or_else(|| ConfigError::MissingVar(names.join(" or ")))
        };

        // --- Server Settings ---
        let bind_address: SocketAddr = parse_or(&var, "BIND_ADDRESS", "0.0.0.0:3000".parse().ok())?;

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Generation Backend ---
        let generation_provider =
            parse_or(&var, "GENERATION_PROVIDER", Some(GenerationProvider::Gemini))?;
        let gemini_api_key = var("GEMINI_API_KEY").or_else(|| var("GOOGLE_API_KEY"));
        let openai_api_key = var("OPENAI_API_KEY");
        match generation_provider {
            GenerationProvider::Gemini if gemini_api_key.is_none() => {
                return Err(ConfigError::MissingVar("GEMINI_API_KEY or GOOGLE_API_KEY".to_string()))
            }
            GenerationProvider::OpenAi if openai_api_key.is_none() => {
                return Err(ConfigError::MissingVar("OPENAI_API_KEY".to_string()))
            }
            _ => {}
        }

        let gemini_model = var("GEMINI_MODEL").unwrap_or_else(|| "gemini-2.0-flash".to_string());
        let gemini_api_url = var("GEMINI_API_URL").unwrap_or_else(|| {
            "https://generativelanguage.googleapis.com/v1beta/models".to_string()
        });
        let openai_model = var("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o".to_string());
        let generation_timeout =
            Duration::from_secs(parse_or(&var, "GENERATION_TIMEOUT_SECS", Some(180u64))?);

        // --- Workspace Page API ---
        let notion_token = required(&["NOTION_TOKEN"])?;
        let notion_parent_page_id = required(&["NOTION_PARENT_PAGE_ID", "PAGE_ID"])?;
        let notion_api_url = var("NOTION_API_URL")
            .unwrap_or_else(|| "https://api.notion.com/v1".to_string())
            .trim_end_matches('/')
            .to_string();
        let notion_version = var("NOTION_VERSION").unwrap_or_else(|| "2022-06-28".to_string());
        let notion_cover_url =
            var("NOTION_COVER_URL").unwrap_or_else(|| DEFAULT_NOTION_COVER_URL.to_string());

        let submission_max_attempts: u32 = parse_or(&var, "SUBMISSION_MAX_ATTEMPTS", Some(3))?;
        if submission_max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "SUBMISSION_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let submission_backoff =
            Duration::from_millis(parse_or(&var, "SUBMISSION_BACKOFF_MS", Some(500u64))?);
        let max_upload_bytes: usize = parse_or(&var, "MAX_UPLOAD_BYTES", Some(10 * 1024 * 1024))?;

        Ok(Self {
            bind_address,
            log_level,
            generation_provider,
            gemini_api_key,
            gemini_model,
            gemini_api_url,
            openai_api_key,
            openai_model,
            generation_timeout,
            notion_token,
            notion_parent_page_id,
            notion_api_url,
            notion_version,
            notion_cover_url,
            submission_max_attempts,
            submission_backoff,
            max_upload_bytes,
        })
    }
}

/// Parses `name` if it is set, falling back to `default` otherwise.
fn parse_or<T, V>(var: &V, name: &str, default: Option<T>) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => default.ok_or_else(|| ConfigError::MissingVar(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    const MINIMAL: &[(&str, &str)] = &[
        ("GOOGLE_API_KEY", "g-key"),
        ("NOTION_TOKEN", "secret_abc"),
        ("PAGE_ID", "parent-page"),
    ];

    #[test]
    fn minimal_environment_uses_defaults() {
        let config = load(MINIMAL).unwrap();

        assert_eq!(config.generation_provider, GenerationProvider::Gemini);
        assert_eq!(config.gemini_api_key.as_deref(), Some("g-key"));
        assert_eq!(config.notion_parent_page_id, "parent-page");
        assert_eq!(config.notion_version, "2022-06-28");
        assert_eq!(config.generation_timeout, Duration::from_secs(180));
        assert_eq!(config.submission_max_attempts, 3);
        assert_eq!(config.bind_address.port(), 3000);
    }

    #[test]
    fn notion_token_is_required() {
        let err = load(&[("GOOGLE_API_KEY", "g"), ("PAGE_ID", "p")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(name) if name == "NOTION_TOKEN"));
    }

    #[test]
    fn openai_provider_needs_its_own_key() {
        let mut pairs = MINIMAL.to_vec();
        pairs.push(("GENERATION_PROVIDER", "openai"));
        assert!(matches!(load(&pairs), Err(ConfigError::MissingVar(_))));

        pairs.push(("OPENAI_API_KEY", "sk-test"));
        assert_eq!(load(&pairs).unwrap().generation_provider, GenerationProvider::OpenAi);
    }

    #[test]
    fn invalid_numbers_are_reported_by_name() {
        let mut pairs = MINIMAL.to_vec();
        pairs.push(("SUBMISSION_MAX_ATTEMPTS", "zero"));
        assert!(matches!(
            load(&pairs),
            Err(ConfigError::InvalidValue(name, _)) if name == "SUBMISSION_MAX_ATTEMPTS"
        ));
    }

    #[test]
    fn trailing_slash_is_dropped_from_notion_url() {
        let mut pairs = MINIMAL.to_vec();
        pairs.push(("NOTION_API_URL", "http://127.0.0.1:9999/v1/"));
        assert_eq!(load(&pairs).unwrap().notion_api_url, "http://127.0.0.1:9999/v1");
    }
}
