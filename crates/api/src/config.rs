//! Client configuration from envelope options and the environment.

use std::env;
use std::fmt;
use std::time::Duration;

use opcall_types::Options;
use thiserror::Error;
use url::Url;

pub const USERNAME_ENV: &str = "IONOS_USERNAME";
pub const PASSWORD_ENV: &str = "IONOS_PASSWORD";
pub const TOKEN_ENV: &str = "IONOS_TOKEN";
pub const API_URL_ENV: &str = "IONOS_API_URL";

/// Endpoint used when `IONOS_API_URL` is not set.
pub const DEFAULT_API_URL: &str = "https://api.ionos.com/cloudapi/v6";

/// Hostnames allowed to use plain HTTP.
const LOCALHOST_DOMAINS: &[&str] = &["localhost", "127.0.0.1"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid IONOS_API_URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("IONOS_API_URL must use https for non-localhost hosts; got '{scheme}://'")]
    InsecureScheme { scheme: String },

    #[error("timeout must not be negative; got {0}")]
    InvalidTimeout(i64),

    #[error("could not build the HTTP client: {0}")]
    Client(String),
}

impl ConfigError {
    pub fn invalid_base_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidBaseUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// How requests authenticate.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Token(String),
    Basic { username: String, password: String },
    Anonymous,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Token(<redacted>)"),
            Self::Basic { username, .. } => write!(f, "Basic {{ username: {username:?}, password: <redacted> }}"),
            Self::Anonymous => f.write_str("Anonymous"),
        }
    }
}

/// Resolved settings for the HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub credentials: Credentials,
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    /// Anonymous configuration for an explicit endpoint.
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credentials: Credentials::Anonymous,
            timeout: None,
        }
    }

    /// Resolves the configuration for one dispatch.
    ///
    /// Envelope `options` win over `IONOS_USERNAME`, `IONOS_PASSWORD` and
    /// `IONOS_TOKEN`; empty values count as unset. A token takes precedence
    /// over basic credentials. Missing credentials are not an error: the API
    /// rejects the call instead. The base URL comes from `IONOS_API_URL`
    /// (a scheme-less host gets `https://`) or [`DEFAULT_API_URL`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a malformed or insecure base URL or a
    /// negative timeout.
    pub fn resolve(options: Option<&Options>) -> Result<Self, ConfigError> {
        let options = options.cloned().unwrap_or_default();

        let token = non_empty(options.token).or_else(|| env_value(TOKEN_ENV));
        let username = non_empty(options.username).or_else(|| env_value(USERNAME_ENV));
        let password = non_empty(options.password).or_else(|| env_value(PASSWORD_ENV));
        let credentials = match (token, username) {
            (Some(token), _) => Credentials::Token(token),
            (None, Some(username)) => Credentials::Basic {
                username,
                password: password.unwrap_or_default(),
            },
            (None, None) => Credentials::Anonymous,
        };

        let timeout = match options.timeout {
            Some(seconds) if seconds < 0 => return Err(ConfigError::InvalidTimeout(seconds)),
            Some(0) | None => None,
            Some(seconds) => Some(Duration::from_secs(seconds.unsigned_abs())),
        };

        let base_url = normalize_base_url(&env_value(API_URL_ENV).unwrap_or_else(|| DEFAULT_API_URL.to_string()));
        validate_base_url(&base_url)?;

        Ok(Self {
            base_url,
            credentials,
            timeout,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

fn env_value(name: &str) -> Option<String> {
    non_empty(env::var(name).ok())
}

/// Adds a missing `https://` scheme and drops trailing slashes.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Validates a base URL.
///
/// Rules:
/// - `localhost` or `127.0.0.1`: any scheme is allowed
/// - otherwise: the scheme must be HTTPS
pub fn validate_base_url(base_url: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(base_url).map_err(|error| ConfigError::invalid_base_url(base_url, error.to_string()))?;
    let host_name = parsed
        .host_str()
        .ok_or_else(|| ConfigError::invalid_base_url(base_url, "missing host"))?;

    if LOCALHOST_DOMAINS.iter().any(|allowed| host_name.eq_ignore_ascii_case(allowed)) {
        return Ok(());
    }
    if parsed.scheme() != "https" {
        return Err(ConfigError::InsecureScheme {
            scheme: parsed.scheme().to_string(),
        });
    }
    Ok(())
}
