//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Backend (required for distribution sessions)
//! - `STOWAGE_API_URL` - Base URL of the warehouse backend
//!
//! ## Backend (optional)
//! - `STOWAGE_API_TOKEN` - Bearer token sent with every backend request
//! - `STOWAGE_HTTP_TIMEOUT_SECS` - Request timeout (default: 30)
//!
//! ## Marketplace relay (required for `stowage relay`)
//! - `MARKETPLACE_API_URL` - Base URL of the marketplace order API
//! - `MARKETPLACE_API_KEY` - Marketplace API token (sent as `X-Auth-Token`)
//! - `STOWAGE_AUTH` - Backend login as `email:password`
//!
//! ## Marketplace relay (optional)
//! - `RELAY_TOKEN_FILE` - Where the backend token is kept (default: token.json)
//! - `RELAY_LOOKBACK_MINUTES` - Order creation window (default: 30)
//! - `RELAY_ORDER_STATE` - Marketplace order state filter (default: ARCHIVE)
//! - `RELAY_POLL_SECS` - Order poll interval (default: 60)
//! - `RELAY_TOKEN_REFRESH_SECS` - Token refresh interval (default: 1800)

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "xxx",
    "todo",
    "insert",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Warehouse backend configuration.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct BackendConfig {
    /// Backend base URL
    pub api_url: Url,
    /// Bearer token for backend requests
    pub api_token: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("api_url", &self.api_url.as_str())
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl BackendConfig {
    /// Build a configuration for the given URL with no token.
    #[must_use]
    pub const fn new(api_url: Url) -> Self {
        Self {
            api_url,
            api_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_vars(&|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_vars(vars: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = get_url(vars, "STOWAGE_API_URL")?;
        let api_token = get_optional_env(vars, "STOWAGE_API_TOKEN").map(|token| {
            if let Err(e) = check_placeholder(&token, "STOWAGE_API_TOKEN") {
                tracing::warn!("STOWAGE_API_TOKEN validation warning: {e}");
            }
            SecretString::from(token)
        });
        let timeout_secs: u64 = get_parsed_or_default(
            vars,
            "STOWAGE_HTTP_TIMEOUT_SECS",
            DEFAULT_TIMEOUT_SECS,
        )?;

        Ok(Self {
            api_url,
            api_token,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Backend login used by the relay to obtain tokens.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl std::str::FromStr for Credentials {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (email, password) = s
            .split_once(':')
            .ok_or_else(|| "expected email:password".to_string())?;
        if email.is_empty() || password.is_empty() {
            return Err("email and password must both be non-empty".to_string());
        }
        Ok(Self {
            email: email.to_string(),
            password: SecretString::from(password.to_string()),
        })
    }
}

/// Marketplace relay configuration.
///
/// Implements `Debug` manually to redact the marketplace key and credentials.
#[derive(Clone)]
pub struct RelayConfig {
    /// Marketplace order API base URL
    pub marketplace_url: Url,
    /// Marketplace API token
    pub marketplace_api_key: SecretString,
    /// Warehouse backend base URL
    pub backend_url: Url,
    /// Backend login for token refresh
    pub credentials: Credentials,
    /// File holding the current backend token
    pub token_file: PathBuf,
    /// How far back each poll looks for new orders
    pub lookback: chrono::Duration,
    /// Marketplace order state to import
    pub order_state: String,
    /// Interval between order polls
    pub poll_interval: Duration,
    /// Interval between token refreshes
    pub token_refresh_interval: Duration,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("marketplace_url", &self.marketplace_url.as_str())
            .field("marketplace_api_key", &"[REDACTED]")
            .field("backend_url", &self.backend_url.as_str())
            .field("credentials", &self.credentials)
            .field("token_file", &self.token_file)
            .field("lookback", &self.lookback)
            .field("order_state", &self.order_state)
            .field("poll_interval", &self.poll_interval)
            .field("token_refresh_interval", &self.token_refresh_interval)
            .finish_non_exhaustive()
    }
}

impl RelayConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_vars(&|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_vars(vars: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let marketplace_api_key = get_required_env(vars, "MARKETPLACE_API_KEY")?;
        if let Err(e) = check_placeholder(&marketplace_api_key, "MARKETPLACE_API_KEY") {
            tracing::warn!("MARKETPLACE_API_KEY validation warning: {e}");
        }

        let credentials = get_required_env(vars, "STOWAGE_AUTH")?
            .parse::<Credentials>()
            .map_err(|e| ConfigError::InvalidEnvVar("STOWAGE_AUTH".to_string(), e))?;

        let lookback_minutes: i64 = get_parsed_or_default(vars, "RELAY_LOOKBACK_MINUTES", 30)?;
        let lookback = chrono::Duration::try_minutes(lookback_minutes)
            .filter(|lookback| *lookback > chrono::Duration::zero())
            .ok_or_else(|| {
                ConfigError::InvalidEnvVar(
                    "RELAY_LOOKBACK_MINUTES".to_string(),
                    "must be a positive number of minutes".to_string(),
                )
            })?;

        let poll_secs: u64 = get_parsed_or_default(vars, "RELAY_POLL_SECS", 60)?;
        let refresh_secs: u64 = get_parsed_or_default(vars, "RELAY_TOKEN_REFRESH_SECS", 1800)?;
        if poll_secs == 0 || refresh_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "RELAY_*_SECS".to_string(),
                "intervals must be at least one second".to_string(),
            ));
        }

        Ok(Self {
            marketplace_url: get_url(vars, "MARKETPLACE_API_URL")?,
            marketplace_api_key: SecretString::from(marketplace_api_key),
            backend_url: get_url(vars, "STOWAGE_API_URL")?,
            credentials,
            token_file: PathBuf::from(get_env_or_default(vars, "RELAY_TOKEN_FILE", "token.json")),
            lookback,
            order_state: get_env_or_default(vars, "RELAY_ORDER_STATE", "ARCHIVE"),
            poll_interval: Duration::from_secs(poll_secs),
            token_refresh_interval: Duration::from_secs(refresh_secs),
            timeout: Duration::from_secs(get_parsed_or_default(
                vars,
                "STOWAGE_HTTP_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )?),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required variable.
fn get_required_env(vars: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    get_optional_env(vars, key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional variable, treating blank values as unset.
fn get_optional_env(vars: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    vars(key).filter(|value| !value.trim().is_empty())
}

/// Get a variable with a default value.
fn get_env_or_default(vars: &dyn Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    get_optional_env(vars, key).unwrap_or_else(|| default.to_string())
}

/// Parse a variable, falling back to `default` when unset.
fn get_parsed_or_default<T>(
    vars: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(vars, key).map_or(Ok(default), |value| {
        value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Get a required variable as an absolute http(s) URL.
fn get_url(vars: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<Url, ConfigError> {
    let raw = get_required_env(vars, key)?;
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Reject values that look like copied placeholders.
fn check_placeholder(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InvalidEnvVar(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }
    Ok(())
}
