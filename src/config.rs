//! Environment-backed configuration.
//!
//! Values come from the process environment, optionally seeded from a
//! `.env` file. Each command loads only the groups it needs, so
//! `create-dirs` works without org credentials.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::security::token_cache::DEFAULT_TOKEN_LIFETIME_SECS;

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Load `.env` (or `path` when given) into the process environment.
/// A missing default `.env` is not an error; a missing explicit file is.
pub fn load_dotenv(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            dotenv::from_path(p).map_err(|e| {
                Error::Configuration(format!("cannot load env file {}: {e}", p.display()))
            })?;
            debug!(path = %p.display(), "loaded env file");
        }
        None => {
            if let Ok(p) = dotenv::dotenv() {
                debug!(path = %p.display(), "loaded env file");
            }
        }
    }
    Ok(())
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::Configuration(format!("{key} is not set"))),
    }
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn number_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match optional(lookup, key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| Error::Configuration(format!("{key} is not a valid number: {raw:?}"))),
        None => Ok(default),
    }
}

fn json_map<F>(lookup: &F, key: &str) -> Result<BTreeMap<String, String>>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = required(lookup, key)?;
    serde_json::from_str(&raw).map_err(|e| {
        Error::Configuration(format!("{key} is not a valid JSON object of strings: {e}"))
    })
}

/// Credentials for the password-grant exchange.
#[derive(Clone)]
pub struct AuthConfig {
    pub auth_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub token_lifetime_secs: i64,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("auth_url", &self.auth_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("token_lifetime_secs", &self.token_lifetime_secs)
            .finish()
    }
}

impl AuthConfig {
    /// Environment variables:
    /// - `SF_AUTH_URL`, `SF_CONSUMER_KEY`, `SF_CONSUMER_SECRET`, `SF_USERNAME`, `SF_PASSWORD`
    /// - `SF_TOKEN_LIFETIME` (seconds, default 3600)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token_lifetime_secs =
            number_or(&lookup, "SF_TOKEN_LIFETIME", DEFAULT_TOKEN_LIFETIME_SECS)?;
        if token_lifetime_secs <= 0 {
            return Err(Error::Configuration(
                "SF_TOKEN_LIFETIME must be positive".to_string(),
            ));
        }

        Ok(Self {
            auth_url: required(&lookup, "SF_AUTH_URL")?,
            client_id: required(&lookup, "SF_CONSUMER_KEY")?,
            client_secret: required(&lookup, "SF_CONSUMER_SECRET")?,
            username: required(&lookup, "SF_USERNAME")?,
            password: required(&lookup, "SF_PASSWORD")?,
            token_lifetime_secs,
        })
    }

    pub fn token_lifetime(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.token_lifetime_secs)
    }
}

/// REST API settings shared by queries and downloads.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_version: String,
    /// Host used for log downloads instead of the token's instance URL.
    pub domain_name: Option<String>,
    pub http_timeout_secs: u64,
}

impl ApiConfig {
    /// Environment variables:
    /// - `SF_VERSION_NUMBER` (required, e.g. `58.0`)
    /// - `SF_DOMAIN_NAME` (optional)
    /// - `SF_HTTP_TIMEOUT_SECS` (default 30)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_version = required(&lookup, "SF_VERSION_NUMBER")?;
        let api_version = api_version.trim().trim_start_matches('v').to_string();

        Ok(Self {
            api_version,
            domain_name: optional(&lookup, "SF_DOMAIN_NAME"),
            http_timeout_secs: number_or(
                &lookup,
                "SF_HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Client for auth and query calls: the timeout bounds the whole request.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .timeout(self.http_timeout())
            .build()?)
    }

    /// Client for log file downloads. Large files may take longer than the
    /// timeout to arrive, so it only bounds connecting and each idle read.
    pub fn download_client(&self) -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .connect_timeout(self.http_timeout())
            .read_timeout(self.http_timeout())
            .build()?)
    }
}

/// Event type to directory name mapping plus the roots it is applied under.
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    /// `EVENT_LOG_BASE_DIR`: root of the financial-year/quarter/sprint tree.
    pub base_dir: Option<String>,
    /// `CURRENT_SPRINT_DIRECTORY`: where downloads land.
    pub current_sprint_dir: Option<String>,
    /// `EVENT_TYPES_MAPPING`: JSON object, event type -> directory name.
    pub event_types: BTreeMap<String, String>,
}

impl LayoutConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            base_dir: optional(&lookup, "EVENT_LOG_BASE_DIR"),
            current_sprint_dir: optional(&lookup, "CURRENT_SPRINT_DIRECTORY"),
            event_types: json_map(&lookup, "EVENT_TYPES_MAPPING")?,
        })
    }

    pub fn require_base_dir(&self) -> Result<&str> {
        self.base_dir
            .as_deref()
            .ok_or_else(|| Error::Configuration("EVENT_LOG_BASE_DIR is not set".to_string()))
    }

    pub fn require_current_sprint_dir(&self) -> Result<&str> {
        self.current_sprint_dir.as_deref().ok_or_else(|| {
            Error::Configuration("CURRENT_SPRINT_DIRECTORY is not set".to_string())
        })
    }
}

/// `EVENT_QUERY_PAIRS`: JSON object, event type -> query file (or literal SOQL).
pub fn event_query_pairs_from_env() -> Result<BTreeMap<String, String>> {
    event_query_pairs_from_lookup(|key| std::env::var(key).ok())
}

pub fn event_query_pairs_from_lookup<F>(lookup: F) -> Result<BTreeMap<String, String>>
where
    F: Fn(&str) -> Option<String>,
{
    json_map(&lookup, "EVENT_QUERY_PAIRS")
}
