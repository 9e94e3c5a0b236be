//! Client configuration (strict parsing).
//!
//! A [`ClientConfig`] comes from one of three places:
//!
//! - the process environment ([`ClientConfig::from_env`]),
//! - a YAML document ([`load_from_str`], [`load_from_file`]),
//! - code, starting from [`ClientConfig::new`].
//!
//! Every loader ends with [`ClientConfig::validate`], so a config that
//! made it out of a loader is safe to run with.

use std::fmt;
use std::fs;
use std::time::Duration;

use cordwire_protocol::{Intents, Snowflake};
use serde::Deserialize;

pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=9&encoding=json";

/// Errors produced while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required setting is absent.
    #[error("missing required setting {0}")]
    Missing(&'static str),

    /// A setting is present but unusable.
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    /// The YAML document did not parse (or had unknown fields).
    #[error("invalid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("read config failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything the gateway client needs to run.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Account token sent with identify.
    pub token: String,

    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// Channels whose events are dispatched. Empty means all channels.
    #[serde(default)]
    pub monitored_channels: Vec<Snowflake>,

    /// Guilds to subscribe to typing indicators for after READY.
    #[serde(default)]
    pub monitored_guilds: Vec<Snowflake>,

    /// Debug logging, plus raw payloads next to handler and parse errors.
    #[serde(default)]
    pub verbose: bool,

    /// Upper bound on handler invocations running at once.
    #[serde(default = "default_max_concurrent_handlers")]
    pub max_concurrent_handlers: usize,

    /// Pause between a dropped connection and the next attempt.
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,

    /// How long to wait for HELLO after connecting.
    #[serde(default = "default_hello_timeout_ms")]
    pub hello_timeout_ms: u64,

    /// Randomize the first heartbeat within the interval.
    #[serde(default = "default_true")]
    pub heartbeat_jitter: bool,

    #[serde(default)]
    pub intents: Intents,
}

fn default_gateway_url() -> String {
    DEFAULT_GATEWAY_URL.to_string()
}

fn default_max_concurrent_handlers() -> usize {
    50
}

fn default_reconnect_backoff_ms() -> u64 {
    5_000
}

fn default_hello_timeout_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

impl ClientConfig {
    /// A config with every optional setting at its default.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            gateway_url: default_gateway_url(),
            monitored_channels: Vec::new(),
            monitored_guilds: Vec::new(),
            verbose: false,
            max_concurrent_handlers: default_max_concurrent_handlers(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            hello_timeout_ms: default_hello_timeout_ms(),
            heartbeat_jitter: true,
            intents: Intents::default(),
        }
    }

    /// Reads the config from the process environment.
    ///
    /// | variable | setting |
    /// |---|---|
    /// | `DISCORD_TOKEN` (required) | `token` |
    /// | `GATEWAY_URL` | `gateway_url` |
    /// | `MONITORED_CHANNELS` | `monitored_channels`, comma separated |
    /// | `MONITORED_GUILDS` | `monitored_guilds`, comma separated |
    /// | `LOG_LEVEL` (`DEBUG` turns it on) | `verbose` |
    /// | `MAX_CONCURRENT_HANDLERS` | `max_concurrent_handlers` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through
    /// `lookup` instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;
        let mut cfg = Self::new(token);

        if let Some(url) = lookup("GATEWAY_URL") {
            cfg.gateway_url = url;
        }
        if let Some(list) = lookup("MONITORED_CHANNELS") {
            cfg.monitored_channels = parse_id_list("MONITORED_CHANNELS", &list)?;
        }
        if let Some(list) = lookup("MONITORED_GUILDS") {
            cfg.monitored_guilds = parse_id_list("MONITORED_GUILDS", &list)?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            cfg.verbose = level.trim().eq_ignore_ascii_case("debug");
        }
        if let Some(max) = lookup("MAX_CONCURRENT_HANDLERS") {
            cfg.max_concurrent_handlers =
                max.trim().parse().map_err(|e| ConfigError::Invalid {
                    key: "MAX_CONCURRENT_HANDLERS",
                    reason: format!("{e}"),
                })?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "token",
                reason: "must not be empty".into(),
            });
        }
        if self.max_concurrent_handlers == 0 {
            return Err(ConfigError::Invalid {
                key: "max_concurrent_handlers",
                reason: "must be at least 1".into(),
            });
        }
        if !(self.gateway_url.starts_with("ws://") || self.gateway_url.starts_with("wss://")) {
            return Err(ConfigError::Invalid {
                key: "gateway_url",
                reason: format!("expected a ws:// or wss:// url, got {:?}", self.gateway_url),
            });
        }
        Ok(())
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub fn hello_timeout(&self) -> Duration {
        Duration::from_millis(self.hello_timeout_ms)
    }

    /// Whether events from `channel` pass the monitored-channel filter.
    pub fn monitors(&self, channel: Option<Snowflake>) -> bool {
        self.monitored_channels.is_empty()
            || channel.is_some_and(|c| self.monitored_channels.contains(&c))
    }
}

// Keeps the token out of logs.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &"<redacted>")
            .field("gateway_url", &self.gateway_url)
            .field("monitored_channels", &self.monitored_channels)
            .field("monitored_guilds", &self.monitored_guilds)
            .field("verbose", &self.verbose)
            .field("max_concurrent_handlers", &self.max_concurrent_handlers)
            .field("reconnect_backoff_ms", &self.reconnect_backoff_ms)
            .field("hello_timeout_ms", &self.hello_timeout_ms)
            .field("heartbeat_jitter", &self.heartbeat_jitter)
            .field("intents", &self.intents)
            .finish()
    }
}

fn parse_id_list(key: &'static str, raw: &str) -> Result<Vec<Snowflake>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Snowflake>().map_err(|_| ConfigError::Invalid {
                key,
                reason: format!("{s:?} is not a numeric id"),
            })
        })
        .collect()
}

pub fn load_from_file(path: &str) -> Result<ClientConfig, ConfigError> {
    let s = fs::read_to_string(path)?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ClientConfig, ConfigError> {
    let cfg: ClientConfig = serde_yaml::from_str(s)?;
    cfg.validate()?;
    Ok(cfg)
}
