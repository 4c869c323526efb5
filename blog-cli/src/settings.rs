use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use blog_client::{ClientConfig, DEFAULT_API_BASE_URL};

const DEFAULT_STORAGE_PATH: &str = ".blog_storage.json";

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_base_url: String,
    pub storage_path: PathBuf,
    pub log_level: String,
    pub request_timeout_secs: Option<u64>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_base_url = non_empty(lookup("BLOG_API_URL"))
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let storage_path = non_empty(lookup("BLOG_STORAGE_PATH"))
            .unwrap_or_else(|| DEFAULT_STORAGE_PATH.to_string())
            .into();
        let log_level = non_empty(lookup("LOG_LEVEL"))
            .or_else(|| non_empty(lookup("RUST_LOG")))
            .unwrap_or_else(|| "warn".to_string());
        let request_timeout_secs =
            parse_optional_u64("BLOG_HTTP_TIMEOUT_SECS", lookup("BLOG_HTTP_TIMEOUT_SECS"))?;

        Ok(Self {
            api_base_url,
            storage_path,
            log_level,
            request_timeout_secs,
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            api_base_url: self.api_base_url.clone(),
            request_timeout: self.request_timeout_secs.map(Duration::from_secs),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_optional_u64(key: &str, raw: Option<String>) -> Result<Option<u64>> {
    let Some(raw) = non_empty(raw) else {
        return Ok(None);
    };

    let value = raw
        .parse::<u64>()
        .with_context(|| format!("Failed to parse {key}, expecting positive integer"))?;

    if value == 0 {
        return Err(anyhow!("{key} must be > 0"));
    }
    Ok(Some(value))
}
