use std::{fs, path::Path};

use serde::Deserialize;
use url::Url;

use crate::error::SettingsError;

pub const DEFAULT_SETTINGS_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub token_database_url: String,
    pub request_timeout_secs: u64,
    /// Number of body characters kept when a post summary is derived.
    pub summary_len: usize,
    pub page_size: usize,
    /// Drop list results that settle after a newer list already settled.
    pub discard_stale_lists: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000/api".into(),
            token_database_url: "sqlite://./data/client.db".into(),
            request_timeout_secs: 30,
            summary_len: 150,
            page_size: 6,
            discard_stale_lists: false,
        }
    }
}

impl ClientSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        Url::parse(&self.api_base_url).map_err(|source| SettingsError::InvalidApiUrl {
            url: self.api_base_url.clone(),
            source,
        })?;
        if self.page_size == 0 {
            return Err(SettingsError::ZeroValue { field: "page_size" });
        }
        if self.request_timeout_secs == 0 {
            return Err(SettingsError::ZeroValue {
                field: "request_timeout_secs",
            });
        }
        Ok(())
    }
}

/// Loads settings from an optional TOML file, then applies environment overrides.
///
/// A missing file is not an error; a file that exists but fails to parse is.
pub fn load_settings(path: Option<&Path>) -> Result<ClientSettings, SettingsError> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_SETTINGS_FILE));
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => toml::from_str::<ClientSettings>(&raw).map_err(|source| SettingsError::Parse {
            path: path.display().to_string(),
            source,
        })?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => ClientSettings::default(),
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.display().to_string(),
                source,
            })
        }
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings.token_database_url = normalize_database_url(&settings.token_database_url);
    settings.validate()?;
    Ok(settings)
}

fn apply_env_overrides(settings: &mut ClientSettings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("BLOG_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = var("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = var("TOKEN_DATABASE_URL") {
        settings.token_database_url = v;
    }
    if let Some(v) = var("APP__TOKEN_DATABASE_URL") {
        settings.token_database_url = v;
    }

    if let Some(parsed) = var("APP__REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
        settings.request_timeout_secs = parsed;
    }
    if let Some(parsed) = var("APP__SUMMARY_LEN").and_then(|v| v.parse().ok()) {
        settings.summary_len = parsed;
    }
    if let Some(parsed) = var("APP__PAGE_SIZE").and_then(|v| v.parse().ok()) {
        settings.page_size = parsed;
    }
    if let Some(v) = var("APP__DISCARD_STALE_LISTS") {
        settings.discard_stale_lists = matches!(v.trim(), "1" | "true" | "yes");
    }
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return ClientSettings::default().token_database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        return format!("sqlite://{}", path.replace('\\', "/"));
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
