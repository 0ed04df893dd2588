//! Connector configuration.

use std::env;
use std::fmt;
use std::time::Duration;

use reqwest::Url;

use crate::error::{ConnectorError, Result};
use crate::retry::RetryConfig;

/// Environment variable for the API bearer token.
pub const ENV_API_KEY: &str = "INCIDENT_BRIDGE_API_KEY";
/// Environment variable for the API base URL.
pub const ENV_BASE_URL: &str = "INCIDENT_BRIDGE_BASE_URL";
/// Environment variable for the per-request timeout in seconds.
pub const ENV_TIMEOUT_SECS: &str = "INCIDENT_BRIDGE_TIMEOUT_SECS";
/// Environment variable for the connect timeout in seconds.
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "INCIDENT_BRIDGE_CONNECT_TIMEOUT_SECS";
/// Environment variable for the retry attempt budget.
pub const ENV_MAX_ATTEMPTS: &str = "INCIDENT_BRIDGE_MAX_ATTEMPTS";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Credential, endpoint and transport policy for one connector.
#[derive(Clone)]
pub struct ConnectorConfig {
    api_key: String,
    base_url: Url,
    /// Total time allowed for one request, `None` for no limit.
    pub request_timeout: Option<Duration>,
    /// Time allowed to establish a connection, `None` for no limit.
    pub connect_timeout: Option<Duration>,
    /// Retry policy applied to every remote call.
    pub retry: RetryConfig,
}

impl ConnectorConfig {
    /// Create a configuration with default timeouts and no retries.
    ///
    /// # Errors
    /// Returns [`ConnectorError::Config`] if the API key is empty or the
    /// base URL is not an absolute http(s) URL.
    pub fn new(api_key: impl Into<String>, base_url: &str) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConnectorError::Config("API key must not be empty".to_string()));
        }

        Ok(Self {
            api_key,
            base_url: parse_base_url(base_url)?,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            retry: RetryConfig::default(),
        })
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Returns [`ConnectorError::Config`] if a required variable is missing
    /// or any variable is malformed.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var(ENV_API_KEY)
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConnectorError::Config(format!("{ENV_API_KEY} not set")))?;
        let base_url = env::var(ENV_BASE_URL)
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConnectorError::Config(format!("{ENV_BASE_URL} not set")))?;

        let mut config = Self::new(api_key, &base_url)?;

        if let Some(secs) = env_number(ENV_TIMEOUT_SECS)? {
            config.request_timeout = timeout_from_secs(secs);
        }
        if let Some(secs) = env_number(ENV_CONNECT_TIMEOUT_SECS)? {
            config.connect_timeout = timeout_from_secs(secs);
        }
        if let Some(attempts) = env_number(ENV_MAX_ATTEMPTS)? {
            config.retry.max_attempts = u32::try_from(attempts).map_err(|_| {
                ConnectorError::Config(format!("{ENV_MAX_ATTEMPTS} is out of range"))
            })?;
        }

        Ok(config)
    }

    /// Set the per-request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The bearer token.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// The API base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `segments` below the base URL.
    ///
    /// Each segment is percent-encoded as a single path component.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                ConnectorError::Config(format!("base URL cannot be a base: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

impl fmt::Debug for ConnectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConnectorError::Config(format!("invalid base URL '{raw}': {e}")))?;

    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        "http" | "https" => Err(ConnectorError::Config(format!(
            "base URL '{raw}' has no host"
        ))),
        scheme => Err(ConnectorError::Config(format!(
            "base URL '{raw}' must use http or https, got '{scheme}'"
        ))),
    }
}

fn env_number(name: &str) -> Result<Option<u64>> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ConnectorError::Config(format!("{name}='{raw}' is not a number: {e}"))),
        _ => Ok(None),
    }
}

/// Zero disables the timeout.
fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
