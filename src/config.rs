//! Configuration management for the logger

use crate::errors::{LoggerError, Result};
use crate::message::generate_session_key;
use chrono::{DateTime, Utc};
use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Invoked after a batch was accepted by the endpoint.
pub type SuccessCallback = Arc<dyn Fn() + Send + Sync>;

/// Invoked with the failure detail when a batch could not be delivered.
pub type ErrorCallback = Arc<dyn Fn(&LoggerError) + Send + Sync>;

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Which built-in transport executes the POST requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// reqwest client (fetch-style)
    #[default]
    Http,
    /// HTTP/1.1 written directly over a TCP socket
    Socket,
}

impl From<&str> for TransportKind {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "socket" | "tcp" | "raw" => TransportKind::Socket,
            _ => TransportKind::Http,
        }
    }
}

/// Options accepted when constructing a logger.
///
/// Everything except `endpoint` is optional.
#[derive(Clone)]
pub struct LoggerOptions {
    /// URL of the HTTP source receiving the logs
    pub endpoint: String,

    /// Sent as the `url` field of every JSON line
    pub client_url: String,

    /// Sent as the `X-Sumo-Host` header
    pub host_name: String,

    /// Sent as the `X-Sumo-Name` header
    pub source_name: String,

    /// Sent as the `X-Sumo-Category` header
    pub source_category: String,

    /// Identifies the session; a fresh UUID is generated when empty
    pub session_key: String,

    /// Timer cadence; zero sends on every log call
    pub interval: Duration,

    /// Aggregated message length that triggers a send; zero ignores size
    pub batch_size: usize,

    /// Only the timer triggers sends
    pub use_interval_only: bool,

    /// `log` awaits a flush it triggered instead of spawning it
    pub return_promise: bool,

    /// Send messages exactly as given
    pub raw: bool,

    /// Send `path value seconds` graphite lines
    pub graphite: bool,

    /// Upper bound for a single request
    pub http_timeout: Duration,

    /// Built-in transport used when none is injected
    pub transport: TransportKind,

    pub on_success: Option<SuccessCallback>,

    pub on_error: Option<ErrorCallback>,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            client_url: String::new(),
            host_name: String::new(),
            source_name: String::new(),
            source_category: String::new(),
            session_key: String::new(),
            interval: Duration::ZERO,
            batch_size: 0,
            use_interval_only: false,
            return_promise: true,
            raw: false,
            graphite: false,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            transport: TransportKind::default(),
            on_success: None,
            on_error: None,
        }
    }
}

impl fmt::Debug for LoggerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerOptions")
            .field("endpoint", &self.endpoint)
            .field("client_url", &self.client_url)
            .field("host_name", &self.host_name)
            .field("source_name", &self.source_name)
            .field("source_category", &self.source_category)
            .field("session_key", &self.session_key)
            .field("interval", &self.interval)
            .field("batch_size", &self.batch_size)
            .field("use_interval_only", &self.use_interval_only)
            .field("return_promise", &self.return_promise)
            .field("raw", &self.raw)
            .field("graphite", &self.graphite)
            .field("http_timeout", &self.http_timeout)
            .field("transport", &self.transport)
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl LoggerOptions {
    /// Defaults for everything except the endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Load options from `SUMO_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load options through an arbitrary key lookup.
    ///
    /// Values that fail to parse are ignored and the default is kept.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = LoggerOptions::default();

        if let Some(endpoint) = lookup("SUMO_ENDPOINT") {
            options.endpoint = endpoint;
        }

        if let Some(client_url) = lookup("SUMO_CLIENT_URL") {
            options.client_url = client_url;
        }

        if let Some(host_name) = lookup("SUMO_HOST_NAME") {
            options.host_name = host_name;
        }

        if let Some(source_name) = lookup("SUMO_SOURCE_NAME") {
            options.source_name = source_name;
        }

        if let Some(source_category) = lookup("SUMO_SOURCE_CATEGORY") {
            options.source_category = source_category;
        }

        if let Some(session_key) = lookup("SUMO_SESSION_KEY") {
            options.session_key = session_key;
        }

        if let Some(interval) = lookup("SUMO_INTERVAL_MS") {
            if let Ok(ms) = interval.trim().parse::<u64>() {
                options.interval = Duration::from_millis(ms);
            }
        }

        if let Some(batch_size) = lookup("SUMO_BATCH_SIZE") {
            if let Ok(size) = batch_size.trim().parse() {
                options.batch_size = size;
            }
        }

        if let Some(interval_only) = lookup("SUMO_USE_INTERVAL_ONLY") {
            options.use_interval_only = interval_only.to_lowercase() == "true";
        }

        if let Some(raw) = lookup("SUMO_RAW") {
            options.raw = raw.to_lowercase() == "true";
        }

        if let Some(graphite) = lookup("SUMO_GRAPHITE") {
            options.graphite = graphite.to_lowercase() == "true";
        }

        if let Some(timeout) = lookup("SUMO_HTTP_TIMEOUT_SECONDS") {
            if let Ok(seconds) = timeout.trim().parse::<u64>() {
                options.http_timeout = Duration::from_secs(seconds);
            }
        }

        if let Some(transport) = lookup("SUMO_TRANSPORT") {
            options.transport = TransportKind::from(transport.as_str());
        }

        options
    }
}

/// Effective configuration of a live logger
#[derive(Clone)]
pub struct Config {
    pub endpoint: String,
    pub client_url: String,
    pub host_name: String,
    pub source_name: String,
    pub source_category: String,
    pub session_key: String,
    pub interval: Duration,
    pub batch_size: usize,
    pub use_interval_only: bool,
    pub return_promise: bool,
    pub raw: bool,
    pub graphite: bool,
    pub http_timeout: Duration,
    pub transport: TransportKind,
    pub on_success: Option<SuccessCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("endpoint", &self.endpoint)
            .field("session_key", &self.session_key)
            .field("interval", &self.interval)
            .field("batch_size", &self.batch_size)
            .field("use_interval_only", &self.use_interval_only)
            .field("raw", &self.raw)
            .field("graphite", &self.graphite)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Validate construction options and resolve their defaults
    pub fn from_options(options: LoggerOptions) -> Result<Self> {
        if options.endpoint.trim().is_empty() {
            return Err(LoggerError::Config(
                "An endpoint value must be provided".to_string(),
            ));
        }

        let session_key = if options.session_key.is_empty() {
            generate_session_key()
        } else {
            options.session_key
        };

        Ok(Self {
            endpoint: options.endpoint,
            client_url: options.client_url,
            host_name: options.host_name,
            source_name: options.source_name,
            source_category: options.source_category,
            session_key,
            interval: options.interval,
            batch_size: options.batch_size,
            use_interval_only: options.use_interval_only,
            return_promise: options.return_promise,
            raw: options.raw,
            graphite: options.graphite,
            http_timeout: options.http_timeout,
            transport: options.transport,
            on_success: options.on_success,
            on_error: options.on_error,
        })
    }

    /// Overwrite the fields carrying a truthy value.
    ///
    /// Returns true when the interval changed and the timer must be re-armed.
    pub fn apply_update(&mut self, update: ConfigUpdate) -> bool {
        fn set_string(target: &mut String, value: Option<String>) {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                *target = value;
            }
        }

        set_string(&mut self.endpoint, update.endpoint);
        set_string(&mut self.client_url, update.client_url);
        set_string(&mut self.host_name, update.host_name);
        set_string(&mut self.source_name, update.source_name);
        set_string(&mut self.source_category, update.source_category);
        set_string(&mut self.session_key, update.session_key);

        if let Some(batch_size) = update.batch_size.filter(|size| *size > 0) {
            self.batch_size = batch_size;
        }
        if update.use_interval_only == Some(true) {
            self.use_interval_only = true;
        }
        if update.return_promise == Some(true) {
            self.return_promise = true;
        }
        if update.raw == Some(true) {
            self.raw = true;
        }
        if update.graphite == Some(true) {
            self.graphite = true;
        }
        if update.on_success.is_some() {
            self.on_success = update.on_success;
        }
        if update.on_error.is_some() {
            self.on_error = update.on_error;
        }

        match update.interval.filter(|interval| !interval.is_zero()) {
            Some(interval) => {
                self.interval = interval;
                true
            }
            None => false,
        }
    }
}

/// Partial configuration accepted by `Logger::update_config`.
///
/// Empty strings, zero numbers and `false` are ignored.
#[derive(Clone, Default)]
pub struct ConfigUpdate {
    pub endpoint: Option<String>,
    pub client_url: Option<String>,
    pub host_name: Option<String>,
    pub source_name: Option<String>,
    pub source_category: Option<String>,
    pub session_key: Option<String>,
    pub interval: Option<Duration>,
    pub batch_size: Option<usize>,
    pub use_interval_only: Option<bool>,
    pub return_promise: Option<bool>,
    pub raw: Option<bool>,
    pub graphite: Option<bool>,
    pub on_success: Option<SuccessCallback>,
    pub on_error: Option<ErrorCallback>,
}

/// Overrides applied to a single `log` call
#[derive(Debug, Clone, Default)]
pub struct PerMessageOptions {
    /// Defaults to the time of the call
    pub timestamp: Option<DateTime<Utc>>,
    pub session_key: Option<String>,
    pub url: Option<String>,
}

impl PerMessageOptions {
    /// Use this timestamp instead of the current time
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Override the session key for this call
    pub fn with_session_key(mut self, session_key: impl Into<String>) -> Self {
        self.session_key = Some(session_key.into());
        self
    }

    /// Override the client url for this call
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_options_requires_endpoint() {
        let err = Config::from_options(LoggerOptions::default()).unwrap_err();
        assert!(matches!(err, LoggerError::Config(_)));

        let err = Config::from_options(LoggerOptions::new("   ")).unwrap_err();
        assert!(matches!(err, LoggerError::Config(_)));
    }

    #[test]
    fn test_from_options_generates_session_key() {
        let config = Config::from_options(LoggerOptions::new("http://localhost/receiver")).unwrap();
        assert_eq!(config.session_key.len(), 36);
        assert!(config.return_promise);
        assert_eq!(config.interval, Duration::ZERO);

        let options = LoggerOptions {
            session_key: "fixed".to_string(),
            ..LoggerOptions::new("http://localhost/receiver")
        };
        assert_eq!(Config::from_options(options).unwrap().session_key, "fixed");
    }

    #[test]
    fn test_apply_update_ignores_falsy_values() {
        let options = LoggerOptions {
            batch_size: 100,
            interval: Duration::from_millis(500),
            source_category: "web".to_string(),
            ..LoggerOptions::new("http://localhost/receiver")
        };
        let mut config = Config::from_options(options).unwrap();

        let rearm = config.apply_update(ConfigUpdate {
            endpoint: Some(String::new()),
            batch_size: Some(0),
            interval: Some(Duration::ZERO),
            use_interval_only: Some(false),
            source_category: Some(String::new()),
            ..ConfigUpdate::default()
        });

        assert!(!rearm);
        assert_eq!(config.endpoint, "http://localhost/receiver");
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.interval, Duration::from_millis(500));
        assert_eq!(config.source_category, "web");
        assert!(!config.use_interval_only);
    }

    #[test]
    fn test_apply_update_overwrites_truthy_values() {
        let mut config = Config::from_options(LoggerOptions::new("http://localhost/a")).unwrap();

        let rearm = config.apply_update(ConfigUpdate {
            endpoint: Some("http://localhost/b".to_string()),
            batch_size: Some(2048),
            interval: Some(Duration::from_secs(5)),
            use_interval_only: Some(true),
            host_name: Some("web-01".to_string()),
            ..ConfigUpdate::default()
        });

        assert!(rearm);
        assert_eq!(config.endpoint, "http://localhost/b");
        assert_eq!(config.batch_size, 2048);
        assert_eq!(config.interval, Duration::from_secs(5));
        assert!(config.use_interval_only);
        assert_eq!(config.host_name, "web-01");
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SUMO_ENDPOINT", "http://collectors.example/receiver/v1/http/abc"),
            ("SUMO_SOURCE_CATEGORY", "prod/web"),
            ("SUMO_INTERVAL_MS", "2500"),
            ("SUMO_BATCH_SIZE", "not-a-number"),
            ("SUMO_USE_INTERVAL_ONLY", "TRUE"),
            ("SUMO_TRANSPORT", "socket"),
        ]);

        let options = LoggerOptions::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(options.endpoint, "http://collectors.example/receiver/v1/http/abc");
        assert_eq!(options.source_category, "prod/web");
        assert_eq!(options.interval, Duration::from_millis(2500));
        assert_eq!(options.batch_size, 0);
        assert!(options.use_interval_only);
        assert!(!options.graphite);
        assert_eq!(options.transport, TransportKind::Socket);
        assert_eq!(options.http_timeout, DEFAULT_HTTP_TIMEOUT);
    }

    #[test]
    fn test_transport_kind_from_str() {
        assert_eq!(TransportKind::from("SOCKET"), TransportKind::Socket);
        assert_eq!(TransportKind::from("http"), TransportKind::Http);
        assert_eq!(TransportKind::from("unknown"), TransportKind::Http);
    }
}
