use std::env;

use url::Url;

use crate::error::ConfigError;

pub const API_URL_VAR: &str = "BEACON_API_URL";
pub const DASHBOARD_LIMIT_VAR: &str = "BEACON_DASHBOARD_LIMIT";
pub const TREND_DAYS_VAR: &str = "BEACON_TREND_DAYS";

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_DASHBOARD_LIMIT: u32 = 10;
pub const DEFAULT_TREND_DAYS: u32 = 7;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub api_base_url: String,
    pub dashboard_limit: u32,
    pub trend_days: u32,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.into(),
            dashboard_limit: DEFAULT_DASHBOARD_LIMIT,
            trend_days: DEFAULT_TREND_DAYS,
        }
    }
}

impl TelemetryConfig {
    /// Read the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the configuration through an arbitrary key lookup.
    ///
    /// Unset and blank values fall back to the defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a value is present but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let present = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_base_url = match present(API_URL_VAR) {
            Some(raw) => normalize_base_url(&raw)?,
            None => DEFAULT_API_URL.into(),
        };
        let dashboard_limit = match present(DASHBOARD_LIMIT_VAR) {
            Some(raw) => parse_positive(DASHBOARD_LIMIT_VAR, &raw)?,
            None => DEFAULT_DASHBOARD_LIMIT,
        };
        let trend_days = match present(TREND_DAYS_VAR) {
            Some(raw) => parse_positive(TREND_DAYS_VAR, &raw)?,
            None => DEFAULT_TREND_DAYS,
        };

        Ok(Self {
            api_base_url,
            dashboard_limit,
            trend_days,
        })
    }
}

/// Validate an analytics base URL and strip its trailing slash.
///
/// # Errors
///
/// Returns `ConfigError` if the URL does not parse or is not http(s).
pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed).map_err(|source| ConfigError::InvalidBaseUrl {
        raw: raw.to_string(),
        source,
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::UnsupportedScheme {
            scheme: parsed.scheme().to_string(),
        });
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

/// # Errors
///
/// Returns `ConfigError::InvalidNumber` unless `raw` is an integer above zero.
pub fn parse_positive(key: &'static str, raw: &str) -> Result<u32, ConfigError> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| ConfigError::InvalidNumber {
            key,
            raw: raw.to_string(),
        })
}
