//! Process configuration.
//!
//! Read once at startup: `.env` (if present), then the process environment,
//! then an optional TOML file named by `ADVISOR_CONFIG` whose keys override
//! the environment. Credentials only ever come from the environment.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;
use zeroize::Zeroizing;

use crate::engine::prompt::DEFAULT_BRAND;
use crate::engine::provider::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::error::AppError;

pub const ENV_API_KEY: &str = "API_KEY";
pub const ENV_MODEL: &str = "GEMINI_MODEL";
pub const ENV_BASE_URL: &str = "GEMINI_BASE_URL";
pub const ENV_CATALOG_PATH: &str = "CATALOG_PATH";
pub const ENV_USER_API_BASE_URL: &str = "USER_API_BASE_URL";
pub const ENV_BRAND: &str = "BRAND_NAME";
pub const ENV_CONFIG_FILE: &str = "ADVISOR_CONFIG";

pub struct AppConfig {
    /// Comma-separated provider credentials, as configured. Only commands
    /// that reach the provider require them; see [`AppConfig::api_keys`].
    api_keys: Option<Zeroizing<String>>,
    pub model: String,
    pub base_url: Url,
    pub catalog_path: Option<PathBuf>,
    pub user_api_base_url: Option<Url>,
    pub brand: String,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = self
            .api_keys
            .as_deref()
            .map_or(0, |raw| raw.split(',').filter(|k| !k.trim().is_empty()).count());
        f.debug_struct("AppConfig")
            .field("api_keys", &format_args!("<{keys} redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url.as_str())
            .field("catalog_path", &self.catalog_path)
            .field("user_api_base_url", &self.user_api_base_url.as_ref().map(Url::as_str))
            .field("brand", &self.brand)
            .finish()
    }
}

/// Keys accepted in the TOML overlay.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileOverlay {
    model: Option<String>,
    base_url: Option<String>,
    catalog_path: Option<PathBuf>,
    user_api_base_url: Option<String>,
    brand: Option<String>,
}

impl AppConfig {
    /// Load from `.env`, the environment, and the optional TOML overlay.
    pub fn load() -> Result<Self, AppError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!("Ignoring unreadable .env: {}", e),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_keys = var(ENV_API_KEY).map(Zeroizing::new);

        let overlay = match var(ENV_CONFIG_FILE) {
            Some(path) => read_overlay(Path::new(&path))?,
            None => FileOverlay::default(),
        };

        let model = overlay
            .model
            .or_else(|| var(ENV_MODEL))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = overlay
            .base_url
            .or_else(|| var(ENV_BASE_URL))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let user_api_base_url = overlay.user_api_base_url.or_else(|| var(ENV_USER_API_BASE_URL));

        Ok(Self {
            api_keys,
            model,
            base_url: parse_url(ENV_BASE_URL, &base_url)?,
            catalog_path: overlay
                .catalog_path
                .or_else(|| var(ENV_CATALOG_PATH).map(PathBuf::from)),
            user_api_base_url: user_api_base_url
                .map(|u| parse_url(ENV_USER_API_BASE_URL, &u))
                .transpose()?,
            brand: overlay
                .brand
                .or_else(|| var(ENV_BRAND))
                .unwrap_or_else(|| DEFAULT_BRAND.to_string()),
        })
    }

    /// The configured credential list; missing is a configuration error.
    pub fn api_keys(&self) -> Result<&str, AppError> {
        self.api_keys
            .as_deref()
            .map(String::as_str)
            .ok_or_else(|| AppError::Configuration(format!("{ENV_API_KEY} is not set")))
    }
}

fn read_overlay(path: &Path) -> Result<FileOverlay, AppError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        AppError::Configuration(format!("cannot read config file {}: {e}", path.display()))
    })?;
    let overlay = toml::from_str(&text).map_err(|e| {
        AppError::Configuration(format!("invalid config file {}: {e}", path.display()))
    })?;
    tracing::debug!(path = %path.display(), "Applied config overlay");
    Ok(overlay)
}

fn parse_url(key: &str, raw: &str) -> Result<Url, AppError> {
    let url = Url::parse(raw)
        .map_err(|e| AppError::Configuration(format!("{key} is not a valid URL ({raw}): {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(AppError::Configuration(format!(
            "{key} must use http or https, got '{other}'"
        ))),
    }
}
