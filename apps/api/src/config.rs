use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
///
/// Nothing is strictly required: without `DATABASE_URL` the service runs on the
/// in-memory store, and without `ANTHROPIC_API_KEY` every model-backed path
/// degrades to templates.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub enable_model_backend: bool,
    pub model_timeout_secs: u64,
    pub template_seed: Option<u64>,
    pub ingest_job_history: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            enable_model_backend: parse_bool(
                &std::env::var("ENABLE_MODEL_BACKEND").unwrap_or_else(|_| "true".to_string()),
            )
            .context("ENABLE_MODEL_BACKEND must be true or false")?,
            model_timeout_secs: std::env::var("MODEL_TIMEOUT_SECS")
                .unwrap_or_else(|_| "20".to_string())
                .parse::<u64>()
                .context("MODEL_TIMEOUT_SECS must be a whole number of seconds")?,
            template_seed: optional_env("TEMPLATE_SEED")
                .map(|s| s.parse::<u64>())
                .transpose()
                .context("TEMPLATE_SEED must be an unsigned integer")?,
            ingest_job_history: std::env::var("INGEST_JOB_HISTORY")
                .unwrap_or_else(|_| "200".to_string())
                .parse::<usize>()
                .context("INGEST_JOB_HISTORY must be a positive integer")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn model_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.model_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            anthropic_api_key: None,
            enable_model_backend: false,
            model_timeout_secs: 20,
            template_seed: None,
            ingest_job_history: 200,
            port: 8080,
            rust_log: "info".to_string(),
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("unrecognized boolean '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_accepts_common_spellings() {
        assert!(parse_bool("TRUE").unwrap());
        assert!(parse_bool("1").unwrap());
        assert!(!parse_bool("off").unwrap());
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn test_default_config_is_template_only() {
        let config = Config::default();
        assert!(config.database_url.is_none());
        assert!(!config.enable_model_backend);
        assert_eq!(config.model_timeout().as_secs(), 20);
    }
}
