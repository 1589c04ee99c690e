//! Watcher configuration
//!
//! Built with chained setters, or read from `WATCHER_*` environment variables
//! via [`WatcherConfig::from_env`].

use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// Categories auto-hidden out of the box
pub const DEFAULT_HIGH_SEVERITY_CATEGORIES: &[&str] = &["sexual_minors", "csam", "NS-csam"];

/// Subscription id used for the report stream
pub const DEFAULT_SUBSCRIPTION_ID: &str = "report-watcher";

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A variable could not be parsed
    #[error("Invalid value for {key}: {value}")]
    InvalidValue {
        /// Variable name
        key: String,
        /// Offending value
        value: String,
    },

    /// Values are inconsistent with each other
    #[error("Invalid configuration: {0}")]
    Inconsistent(String),
}

/// Result type for configuration
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Report watcher configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherConfig {
    /// Relay WebSocket URL
    pub relay_url: String,
    /// Whether qualifying reports are enforced at all
    pub auto_hide_enabled: bool,
    /// High-severity categories eligible for auto-hide
    pub categories: HashSet<String>,
    /// Client applications whose reports are trusted
    pub trusted_clients: HashSet<String>,
    /// First reconnect delay, and the value restored after a successful connect
    pub initial_reconnect_delay: Duration,
    /// Reconnect delay ceiling
    pub max_reconnect_delay: Duration,
    /// Interval between health checks
    pub health_check_interval: Duration,
    /// Upper bound on opening a connection and subscribing
    pub connect_timeout: Duration,
    /// Capacity of the watcher's command inbox
    pub inbox_capacity: usize,
    /// Subscription id sent in `REQ`/`CLOSE`
    pub subscription_id: String,
    /// Targets remembered as enforced by this process
    pub enforced_cache_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://localhost:7777".to_string(),
            auto_hide_enabled: true,
            categories: DEFAULT_HIGH_SEVERITY_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            trusted_clients: HashSet::new(),
            initial_reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(60),
            health_check_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            inbox_capacity: 64,
            subscription_id: DEFAULT_SUBSCRIPTION_ID.to_string(),
            enforced_cache_capacity: 10_000,
        }
    }
}

impl WatcherConfig {
    /// Configuration for the relay at `relay_url`
    pub fn new(relay_url: impl Into<String>) -> Self {
        Self { relay_url: relay_url.into(), ..Default::default() }
    }

    /// Enable or disable auto-hide
    pub fn auto_hide_enabled(mut self, enabled: bool) -> Self {
        self.auto_hide_enabled = enabled;
        self
    }

    /// Replace the high-severity category set
    pub fn categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the trusted client set
    pub fn trusted_clients<I, S>(mut self, clients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trusted_clients = clients.into_iter().map(Into::into).collect();
        self
    }

    /// Set initial and maximum reconnect delays
    pub fn reconnect_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_reconnect_delay = initial;
        self.max_reconnect_delay = max;
        self
    }

    /// Set health check interval
    pub fn health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set inbox capacity
    pub fn inbox_capacity(mut self, capacity: usize) -> Self {
        self.inbox_capacity = capacity;
        self
    }

    /// Set subscription id
    pub fn subscription_id(mut self, id: impl Into<String>) -> Self {
        self.subscription_id = id.into();
        self
    }

    /// Set enforced-target cache capacity
    pub fn enforced_cache_capacity(mut self, capacity: usize) -> Self {
        self.enforced_cache_capacity = capacity;
        self
    }

    /// Check values that would break the watcher's invariants
    pub fn validate(&self) -> Result<()> {
        if self.initial_reconnect_delay.is_zero() {
            return Err(ConfigError::Inconsistent("initial reconnect delay must be non-zero".into()));
        }
        if self.max_reconnect_delay < self.initial_reconnect_delay {
            return Err(ConfigError::Inconsistent(
                "maximum reconnect delay is below the initial delay".into(),
            ));
        }
        if self.health_check_interval.is_zero() {
            return Err(ConfigError::Inconsistent("health check interval must be non-zero".into()));
        }
        if self.inbox_capacity == 0 {
            return Err(ConfigError::Inconsistent("inbox capacity must be non-zero".into()));
        }
        Ok(())
    }

    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `WATCHER_RELAY_URL` | relay WebSocket URL |
    /// | `WATCHER_AUTO_HIDE` | `true`/`false` |
    /// | `WATCHER_CATEGORIES` | comma-separated categories |
    /// | `WATCHER_TRUSTED_CLIENTS` | comma-separated client names |
    /// | `WATCHER_RECONNECT_INITIAL_MS` | initial reconnect delay |
    /// | `WATCHER_RECONNECT_MAX_MS` | maximum reconnect delay |
    /// | `WATCHER_HEALTH_CHECK_SECS` | health check interval |
    /// | `WATCHER_CONNECT_TIMEOUT_SECS` | connect timeout |
    /// | `WATCHER_SUBSCRIPTION_ID` | subscription id |
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("WATCHER_RELAY_URL") {
            config.relay_url = url;
        }
        if let Some(value) = lookup("WATCHER_AUTO_HIDE") {
            config.auto_hide_enabled = parse_bool("WATCHER_AUTO_HIDE", &value)?;
        }
        if let Some(value) = lookup("WATCHER_CATEGORIES") {
            config.categories = parse_list(&value);
        }
        if let Some(value) = lookup("WATCHER_TRUSTED_CLIENTS") {
            config.trusted_clients = parse_list(&value);
        }
        if let Some(value) = lookup("WATCHER_RECONNECT_INITIAL_MS") {
            config.initial_reconnect_delay =
                Duration::from_millis(parse_number("WATCHER_RECONNECT_INITIAL_MS", &value)?);
        }
        if let Some(value) = lookup("WATCHER_RECONNECT_MAX_MS") {
            config.max_reconnect_delay =
                Duration::from_millis(parse_number("WATCHER_RECONNECT_MAX_MS", &value)?);
        }
        if let Some(value) = lookup("WATCHER_HEALTH_CHECK_SECS") {
            config.health_check_interval =
                Duration::from_secs(parse_number("WATCHER_HEALTH_CHECK_SECS", &value)?);
        }
        if let Some(value) = lookup("WATCHER_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout =
                Duration::from_secs(parse_number("WATCHER_CONNECT_TIMEOUT_SECS", &value)?);
        }
        if let Some(id) = lookup("WATCHER_SUBSCRIPTION_ID") {
            config.subscription_id = id;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_list(value: &str) -> HashSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() }),
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() })
}
