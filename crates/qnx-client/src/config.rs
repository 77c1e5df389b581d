//! Client configuration.
//!
//! Supports loading configuration from:
//! 1. Environment variables (with `NEXUS_` prefix)
//! 2. A `.env.qnx` file in the working directory
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables
//! 2. `.env.qnx`
//! 3. Default values

use std::path::Path;
use std::time::Duration;

use qnx_core::{RetryPolicy, WaitOptions};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// File loaded by [`NexusConfig::load`] before reading the environment.
pub const ENV_FILE: &str = ".env.qnx";

/// Connection and behaviour settings for a [`crate::NexusClient`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NexusConfig {
    /// HTTP scheme.
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Websocket scheme.
    #[serde(default = "default_websockets_protocol")]
    pub websockets_protocol: String,

    /// API host (`NEXUS_DOMAIN`, or `NEXUS_HOST`).
    #[serde(default = "default_domain")]
    pub domain: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Verify TLS certificates.
    #[serde(default = "default_true")]
    pub httpx_verify: bool,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Interval between status polls in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Default wait deadline in seconds; 0 disables the deadline
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_secs: u64,

    /// Retries after a transient failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First retry delay in milliseconds; doubles per attempt
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Listing page size
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_protocol() -> String {
    "https".to_string()
}

fn default_websockets_protocol() -> String {
    "wss".to_string()
}

fn default_domain() -> String {
    "nexus.quantinuum.com".to_string()
}

fn default_port() -> u16 {
    443
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    60
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_wait_timeout() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    500
}

fn default_page_size() -> u32 {
    qnx_core::DEFAULT_PAGE_SIZE
}

impl Default for NexusConfig {
    fn default() -> Self {
        Self {
            protocol: default_protocol(),
            websockets_protocol: default_websockets_protocol(),
            domain: default_domain(),
            port: default_port(),
            httpx_verify: true,
            request_timeout_secs: default_request_timeout(),
            poll_interval_ms: default_poll_interval(),
            wait_timeout_secs: default_wait_timeout(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay(),
            page_size: default_page_size(),
        }
    }
}

impl NexusConfig {
    /// Load configuration: `.env.qnx` (if present), then environment
    /// overrides, then validation.
    pub fn load() -> ClientResult<Self> {
        env_file(dotenvy::from_filename(ENV_FILE))?;
        Self::from_env()
    }

    /// Like [`NexusConfig::load`], reading the env file at `path`.
    pub fn load_from(path: impl AsRef<Path>) -> ClientResult<Self> {
        env_file(dotenvy::from_path(path.as_ref()))?;
        Self::from_env()
    }

    /// Defaults overridden by `NEXUS_*` environment variables.
    pub fn from_env() -> ClientResult<Self> {
        Self::default().merge_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its
    /// value. Only variables that are present override a field; values
    /// that fail to parse are rejected.
    pub fn merge_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> ClientResult<Self> {
        if let Some(v) = lookup("NEXUS_PROTOCOL") {
            self.protocol = v;
        }
        if let Some(v) = lookup("NEXUS_WEBSOCKETS_PROTOCOL") {
            self.websockets_protocol = v;
        }
        if let Some(v) = lookup("NEXUS_DOMAIN").or_else(|| lookup("NEXUS_HOST")) {
            self.domain = v;
        }
        if let Some(v) = lookup("NEXUS_PORT") {
            self.port = parse("NEXUS_PORT", &v)?;
        }
        if let Some(v) = lookup("NEXUS_HTTPX_VERIFY") {
            self.httpx_verify = parse_bool("NEXUS_HTTPX_VERIFY", &v)?;
        }
        if let Some(v) = lookup("NEXUS_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse("NEXUS_REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("NEXUS_POLL_INTERVAL_MS") {
            self.poll_interval_ms = parse("NEXUS_POLL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("NEXUS_WAIT_TIMEOUT_SECS") {
            self.wait_timeout_secs = parse("NEXUS_WAIT_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("NEXUS_MAX_RETRIES") {
            self.max_retries = parse("NEXUS_MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("NEXUS_RETRY_BASE_DELAY_MS") {
            self.retry_base_delay_ms = parse("NEXUS_RETRY_BASE_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("NEXUS_PAGE_SIZE") {
            self.page_size = parse("NEXUS_PAGE_SIZE", &v)?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> ClientResult<()> {
        match self.protocol.as_str() {
            "http" | "https" => {}
            other => {
                return Err(ClientError::Config(format!("Invalid protocol: {other}")));
            }
        }

        match self.websockets_protocol.as_str() {
            "ws" | "wss" => {}
            other => {
                return Err(ClientError::Config(format!(
                    "Invalid websockets protocol: {other}"
                )));
            }
        }

        if self.domain.is_empty() {
            return Err(ClientError::Config("domain must not be empty".to_string()));
        }

        if self.page_size == 0 {
            return Err(ClientError::Config(
                "page_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// HTTP API root, e.g. `https://nexus.quantinuum.com:443`.
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.domain, self.port)
    }

    /// Websocket API root, e.g. `wss://nexus.quantinuum.com`.
    pub fn websockets_url(&self) -> String {
        format!("{}://{}", self.websockets_protocol, self.domain)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Retry policy for transient failures.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }

    /// Default options for [`qnx_core::JobWatcher::wait_for`].
    pub fn wait_options(&self) -> WaitOptions {
        let options =
            WaitOptions::default().with_poll_interval(Duration::from_millis(self.poll_interval_ms));
        if self.wait_timeout_secs == 0 {
            options.without_timeout()
        } else {
            options.with_timeout(Duration::from_secs(self.wait_timeout_secs))
        }
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> ClientResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ClientError::Config(format!("{key}: cannot parse {value:?}")))
}

fn parse_bool(key: &str, value: &str) -> ClientResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ClientError::Config(format!(
            "{key}: expected a boolean, got {value:?}"
        ))),
    }
}

/// A missing env file is fine; an unreadable or malformed one is not.
fn env_file<T>(loaded: Result<T, dotenvy::Error>) -> ClientResult<()> {
    match loaded {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(ClientError::Config(format!("{ENV_FILE}: {e}"))),
    }
}
