//! Client configuration.
//!
//! All fields have defaults, so a YAML file only needs the keys it changes:
//!
//! ```yaml
//! name: base
//! heartbeat_interval_ms: 30000
//! transport:
//!   kind: tcp
//!   host: 192.168.42.1
//!   port: 4403
//! ```

use std::path::Path;

use mtlink_protocol::{
    OversizePolicy, CONNECT_TIMEOUT_MS, DEFAULT_BAUD_RATE, DEFAULT_RADIO_HOST, DEFAULT_RADIO_PORT,
    HEARTBEAT_INTERVAL_MS, IDLE_TIMEOUT_MS, NO_NEWS_PAUSE_MS, UNKNOWN_VARIANT_LOG_INTERVAL_MS,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid YAML for this schema.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How to reach the radio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    /// A serial port (USB or UART).
    Serial {
        /// Device path, e.g. `/dev/ttyUSB0`.
        port: String,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
    },
    /// A TCP socket, usually over WiFi.
    Tcp {
        #[serde(default = "default_host")]
        host: String,
        #[serde(default = "default_port")]
        port: u16,
    },
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_host() -> String {
    DEFAULT_RADIO_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_RADIO_PORT
}

impl TransportConfig {
    /// Serial port at the default baud rate.
    pub fn serial(port: impl Into<String>) -> Self {
        TransportConfig::Serial {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }

    /// TCP endpoint.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        TransportConfig::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Short name of the transport kind.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportConfig::Serial { .. } => "serial",
            TransportConfig::Tcp { .. } => "tcp",
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::tcp(DEFAULT_RADIO_HOST, DEFAULT_RADIO_PORT)
    }
}

/// Configuration for a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Name used in log lines and metric labels.
    pub name: String,

    /// How long one connect attempt may take before another starts (ms).
    pub connect_timeout_ms: u64,

    /// How long a TCP link may go without a completed report before it is
    /// reset (ms).
    pub idle_timeout_ms: u64,

    /// Keep-alive interval for transports that need one (ms).
    pub heartbeat_interval_ms: u64,

    /// Suggested pause between polls when nothing happened (ms).
    pub no_news_pause_ms: u64,

    /// Minimum spacing between "unrecognized message" log lines (ms).
    pub unknown_variant_log_interval_ms: u64,

    /// What to do with a frame header declaring an oversize payload.
    pub oversize_policy: OversizePolicy,

    /// Refresh the idle deadline on every decoded frame, not only on
    /// completed reports.
    pub refresh_idle_on_traffic: bool,

    /// Seed for correlation and packet ids. Drawn from the OS when absent.
    pub seed: Option<u64>,

    /// Log every frame and dispatch decision.
    pub debug: bool,

    /// How to reach the radio.
    pub transport: Option<TransportConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            name: "radio".to_string(),
            connect_timeout_ms: CONNECT_TIMEOUT_MS,
            idle_timeout_ms: IDLE_TIMEOUT_MS,
            heartbeat_interval_ms: HEARTBEAT_INTERVAL_MS,
            no_news_pause_ms: NO_NEWS_PAUSE_MS,
            unknown_variant_log_interval_ms: UNKNOWN_VARIANT_LOG_INTERVAL_MS,
            oversize_policy: OversizePolicy::default(),
            refresh_idle_on_traffic: false,
            seed: None,
            debug: false,
            transport: None,
        }
    }
}

impl ClientConfig {
    /// Parse a configuration from YAML and validate it.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Check that all values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid("connect_timeout_ms must be positive".into()));
        }
        if self.idle_timeout_ms == 0 {
            return Err(ConfigError::Invalid("idle_timeout_ms must be positive".into()));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Invalid("heartbeat_interval_ms must be positive".into()));
        }
        match &self.transport {
            Some(TransportConfig::Serial { port, baud_rate }) => {
                if port.is_empty() {
                    return Err(ConfigError::Invalid("serial port path is empty".into()));
                }
                if *baud_rate == 0 {
                    return Err(ConfigError::Invalid("baud_rate must be positive".into()));
                }
            }
            Some(TransportConfig::Tcp { host, port }) => {
                if host.is_empty() {
                    return Err(ConfigError::Invalid("tcp host is empty".into()));
                }
                if *port == 0 {
                    return Err(ConfigError::Invalid("tcp port must be non-zero".into()));
                }
            }
            None => {}
        }
        Ok(())
    }

    /// Set the instance name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the transport.
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    /// Set the idle timeout.
    pub fn with_idle_timeout_ms(mut self, ms: u64) -> Self {
        self.idle_timeout_ms = ms;
        self
    }

    /// Set the heartbeat interval.
    pub fn with_heartbeat_interval_ms(mut self, ms: u64) -> Self {
        self.heartbeat_interval_ms = ms;
        self
    }

    /// Set the oversize frame policy.
    pub fn with_oversize_policy(mut self, policy: OversizePolicy) -> Self {
        self.oversize_policy = policy;
        self
    }

    /// Use a fixed RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enable or disable verbose diagnostics.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}
