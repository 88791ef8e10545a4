//! Client configuration loaded from environment variables.
//!
//! Every setting has a default so the client runs against a local backend
//! with zero configuration. Stored [`ClientSettings`] fill in the server URLs
//! when the environment leaves them unset.

use std::path::PathBuf;
use std::time::Duration;

use mosaic_net::{BackoffPolicy, LiveConfig};
use mosaic_shared::constants::{
    DEFAULT_API_URL, DEFAULT_LIVE_URL, HTTP_TIMEOUT_SECS, LIVE_CHANNEL_BUFFER,
    RECONNECT_BASE_MS, RECONNECT_MAX_ATTEMPTS, RECONNECT_MAX_MS,
};
use mosaic_store::ClientSettings;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST base URL.
    /// Env: `API_URL`
    /// Default: `http://127.0.0.1:8000`
    pub api_url: String,

    /// Live channel base URL.
    /// Env: `LIVE_URL`
    /// Default: `ws://127.0.0.1:8000`
    pub live_url: String,

    /// Reconnect attempts before a chat session gives up.
    /// Env: `RECONNECT_MAX_ATTEMPTS`
    pub reconnect_max_attempts: u32,

    /// First reconnect delay.
    /// Env: `RECONNECT_BASE_MS`
    pub reconnect_base: Duration,

    /// Cap on the reconnect delay.
    /// Env: `RECONNECT_MAX_MS`
    pub reconnect_max: Duration,

    /// Per-request timeout for REST calls.
    /// Env: `HTTP_TIMEOUT_SECS`
    pub http_timeout: Duration,

    /// Database file. `None` uses the platform data directory.
    /// Env: `MOSAIC_DB_PATH`
    pub db_path: Option<PathBuf>,

    api_url_from_env: bool,
    live_url_from_env: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            live_url: DEFAULT_LIVE_URL.to_string(),
            reconnect_max_attempts: RECONNECT_MAX_ATTEMPTS,
            reconnect_base: Duration::from_millis(RECONNECT_BASE_MS),
            reconnect_max: Duration::from_millis(RECONNECT_MAX_MS),
            http_timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
            db_path: None,
            api_url_from_env: false,
            live_url_from_env: false,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup, falling back to defaults.
    pub fn from_vars<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = var("API_URL").filter(|v| !v.trim().is_empty()) {
            config.api_url = url.trim().to_string();
            config.api_url_from_env = true;
        }

        if let Some(url) = var("LIVE_URL").filter(|v| !v.trim().is_empty()) {
            config.live_url = url.trim().to_string();
            config.live_url_from_env = true;
        }

        if let Some(n) = parse_var::<u32, _>(&var, "RECONNECT_MAX_ATTEMPTS") {
            config.reconnect_max_attempts = n;
        }

        if let Some(ms) = parse_var::<u64, _>(&var, "RECONNECT_BASE_MS") {
            config.reconnect_base = Duration::from_millis(ms);
        }

        if let Some(ms) = parse_var::<u64, _>(&var, "RECONNECT_MAX_MS") {
            config.reconnect_max = Duration::from_millis(ms);
        }

        if config.reconnect_max < config.reconnect_base {
            tracing::warn!(
                base_ms = config.reconnect_base.as_millis() as u64,
                max_ms = config.reconnect_max.as_millis() as u64,
                "RECONNECT_MAX_MS below RECONNECT_BASE_MS, raising cap to base"
            );
            config.reconnect_max = config.reconnect_base;
        }

        match parse_var::<u64, _>(&var, "HTTP_TIMEOUT_SECS") {
            Some(0) => tracing::warn!("HTTP_TIMEOUT_SECS must be positive, using default"),
            Some(secs) => config.http_timeout = Duration::from_secs(secs),
            None => {}
        }

        if let Some(path) = var("MOSAIC_DB_PATH").filter(|v| !v.is_empty()) {
            config.db_path = Some(PathBuf::from(path));
        }

        // RUST_LOG is read by the tracing EnvFilter directly.

        config
    }

    /// Take server URLs from stored settings unless the environment set them.
    pub fn apply_settings(&mut self, settings: &ClientSettings) {
        if !self.api_url_from_env && !settings.api_url.is_empty() {
            self.api_url = settings.api_url.clone();
        }
        if !self.live_url_from_env && !settings.live_url.is_empty() {
            self.live_url = settings.live_url.clone();
        }
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            base: self.reconnect_base,
            max: self.reconnect_max,
            max_attempts: self.reconnect_max_attempts,
            jitter: true,
        }
    }

    pub fn live(&self) -> LiveConfig {
        LiveConfig {
            backoff: self.backoff(),
            buffer: LIVE_CHANNEL_BUFFER,
        }
    }
}

fn parse_var<T, F>(var: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = var(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid value, using default");
            None
        }
    }
}
