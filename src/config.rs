use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::adapters::SnmpClientConfig;
use crate::application::{PollerSettings, DEFAULT_QUEUE_CAPACITY};
use crate::domain::CounterWidth;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value '{value}' for {key}")]
    Invalid { key: String, value: String },
}

/// Application configuration
///
/// Loaded from the TOML file named by `NETPULSE_CONFIG` (if set), then
/// overridden by `NETPULSE_*` environment variables.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    pub agent_hosts: Vec<String>,
    pub read_community: String,
    pub write_community: String,
    pub trap_community: String,
    pub snmp_port: u16,
    pub trap_listen_addr: String,
    pub request_timeout_ms: u64,
    pub retries: u32,
    pub backoff_ms: u64,
    pub max_repetitions: u32,
    /// 32 or 64
    pub counter_width: u32,
    /// Seconds between poll cycles
    pub poll_interval: u64,
    pub stale_after_failures: u32,
    pub history_size: usize,
    pub queue_capacity: usize,
    pub cors_origins: Vec<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            agent_hosts: Vec::new(),
            read_community: "public".to_string(),
            write_community: "private".to_string(),
            trap_community: "public".to_string(),
            snmp_port: 161,
            trap_listen_addr: "0.0.0.0:162".to_string(),
            request_timeout_ms: 2000,
            retries: 2,
            backoff_ms: 200,
            max_repetitions: 25,
            counter_width: 32,
            poll_interval: 10,
            stale_after_failures: 3,
            history_size: 360,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            cors_origins: vec![
                "http://localhost".to_string(),
                "http://localhost:3000".to_string(),
            ],
            log_level: "info".to_string(),
        }
    }
}

/// Community strings are credentials and never printed
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("agent_hosts", &self.agent_hosts)
            .field("read_community", &REDACTED)
            .field("write_community", &REDACTED)
            .field("trap_community", &REDACTED)
            .field("snmp_port", &self.snmp_port)
            .field("trap_listen_addr", &self.trap_listen_addr)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("retries", &self.retries)
            .field("backoff_ms", &self.backoff_ms)
            .field("max_repetitions", &self.max_repetitions)
            .field("counter_width", &self.counter_width)
            .field("poll_interval", &self.poll_interval)
            .field("stale_after_failures", &self.stale_after_failures)
            .field("history_size", &self.history_size)
            .field("queue_capacity", &self.queue_capacity)
            .field("cors_origins", &self.cors_origins)
            .field("log_level", &self.log_level)
            .finish()
    }
}

pub(crate) const REDACTED: Redacted = Redacted;

/// Debug placeholder for secret fields
pub(crate) struct Redacted;

impl fmt::Debug for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let base = match env::var("NETPULSE_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        base.with_overrides(|key| env::var(key).ok())
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `NETPULSE_*` overrides from `lookup`
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = parse_var(&var, "NETPULSE_PORT")? {
            self.port = v;
        }
        if let Some(hosts) = var("NETPULSE_AGENT_HOSTS") {
            self.agent_hosts = split_list(&hosts);
        }
        if let Some(v) = var("NETPULSE_READ_COMMUNITY") {
            self.read_community = v;
        }
        if let Some(v) = var("NETPULSE_WRITE_COMMUNITY") {
            self.write_community = v;
        }
        if let Some(v) = var("NETPULSE_TRAP_COMMUNITY") {
            self.trap_community = v;
        }
        if let Some(v) = parse_var(&var, "NETPULSE_SNMP_PORT")? {
            self.snmp_port = v;
        }
        if let Some(v) = var("NETPULSE_TRAP_LISTEN_ADDR") {
            self.trap_listen_addr = v;
        }
        if let Some(v) = parse_var(&var, "NETPULSE_REQUEST_TIMEOUT_MS")? {
            self.request_timeout_ms = v;
        }
        if let Some(v) = parse_var(&var, "NETPULSE_RETRIES")? {
            self.retries = v;
        }
        if let Some(v) = parse_var(&var, "NETPULSE_BACKOFF_MS")? {
            self.backoff_ms = v;
        }
        if let Some(v) = parse_var(&var, "NETPULSE_MAX_REPETITIONS")? {
            self.max_repetitions = v;
        }
        if let Some(v) = parse_var(&var, "NETPULSE_COUNTER_WIDTH")? {
            self.counter_width = v;
        }
        if let Some(v) = parse_var(&var, "NETPULSE_POLL_INTERVAL")? {
            self.poll_interval = v;
        }
        if let Some(v) = parse_var(&var, "NETPULSE_STALE_AFTER_FAILURES")? {
            self.stale_after_failures = v;
        }
        if let Some(v) = parse_var(&var, "NETPULSE_HISTORY_SIZE")? {
            self.history_size = v;
        }
        if let Some(v) = parse_var(&var, "NETPULSE_QUEUE_CAPACITY")? {
            self.queue_capacity = v;
        }
        if let Some(origins) = var("NETPULSE_CORS_ORIGINS") {
            self.cors_origins = split_list(&origins);
        }
        if let Some(v) = var("NETPULSE_LOG_LEVEL") {
            self.log_level = v;
        }

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, value: String| ConfigError::Invalid {
            key: key.to_string(),
            value,
        };

        if CounterWidth::from_bits(self.counter_width).is_none() {
            return Err(invalid("counter_width", self.counter_width.to_string()));
        }
        if self.poll_interval == 0 {
            return Err(invalid("poll_interval", "0".to_string()));
        }
        if self.max_repetitions == 0 {
            return Err(invalid("max_repetitions", "0".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(invalid("queue_capacity", "0".to_string()));
        }
        if self.history_size == 0 {
            return Err(invalid("history_size", "0".to_string()));
        }
        if self.retries > async_snmp::MAX_RETRIES {
            return Err(invalid("retries", self.retries.to_string()));
        }
        Ok(())
    }

    pub fn counter_width(&self) -> CounterWidth {
        CounterWidth::from_bits(self.counter_width).unwrap_or_default()
    }

    pub fn snmp_client(&self) -> SnmpClientConfig {
        SnmpClientConfig {
            port: self.snmp_port,
            read_community: self.read_community.clone(),
            write_community: self.write_community.clone(),
            timeout: Duration::from_millis(self.request_timeout_ms),
            retries: self.retries,
            backoff: Duration::from_millis(self.backoff_ms),
            max_repetitions: self.max_repetitions,
        }
    }

    pub fn poller_settings(&self) -> PollerSettings {
        PollerSettings {
            interval: Duration::from_secs(self.poll_interval),
            stale_after: self.stale_after_failures,
            counter_width: self.counter_width(),
        }
    }
}

fn parse_var<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match var(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                value,
            }),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
