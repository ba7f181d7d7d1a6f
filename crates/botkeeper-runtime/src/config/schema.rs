//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::flush::FlushPolicy;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotkeeperConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to compact without it.
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub output: LogOutput,
    /// Log file, required when `output` is `file`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,
    #[serde(default)]
    pub thread_ids: bool,
    /// Include source file and line.
    #[serde(default)]
    pub file_location: bool,
    #[serde(default)]
    pub span_events: SpanEventConfig,
    /// Per-module levels, e.g. `botkeeper_gateway = "trace"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

// =============================================================================
// Runtime
// =============================================================================

/// Supervisor and worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Capacity of each live connection's inbound event queue.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    /// How often a flush is retried after a revision conflict.
    #[serde(default = "default_flush_retries")]
    pub flush_retries: u32,
    #[serde(default = "default_flush_retry_delay_ms")]
    pub flush_retry_delay_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_buffer: default_event_buffer(),
            flush_retries: default_flush_retries(),
            flush_retry_delay_ms: default_flush_retry_delay_ms(),
        }
    }
}

impl RuntimeConfig {
    pub fn flush_policy(&self) -> FlushPolicy {
        FlushPolicy {
            retries: self.flush_retries,
            retry_delay: Duration::from_millis(self.flush_retry_delay_ms),
        }
    }
}

fn default_event_buffer() -> usize {
    256
}

fn default_flush_retries() -> u32 {
    3
}

fn default_flush_retry_delay_ms() -> u64 {
    50
}

// =============================================================================
// Gateway
// =============================================================================

/// Gateway endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// WebSocket URL of the gateway.
    #[serde(default = "default_gateway_url")]
    pub url: String,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            heartbeat_interval_secs: default_heartbeat_interval(),
        }
    }
}

impl GatewayConfig {
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Builds a WebSocket connector for this endpoint.
    #[cfg(feature = "ws-client")]
    pub fn ws_connector(&self, buffer: usize) -> botkeeper_gateway::WsConnector {
        botkeeper_gateway::WsConnector::new(&self.url)
            .with_heartbeat(self.heartbeat())
            .with_buffer(buffer)
    }
}

fn default_gateway_url() -> String {
    "ws://127.0.0.1:8080/gateway".to_string()
}

fn default_heartbeat_interval() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BotkeeperConfig::default();
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert_eq!(config.runtime.event_buffer, 256);
        assert_eq!(config.gateway.heartbeat(), Duration::from_secs(30));
    }

    #[test]
    fn test_flush_policy() {
        let runtime = RuntimeConfig {
            flush_retries: 5,
            flush_retry_delay_ms: 10,
            ..Default::default()
        };
        let policy = runtime.flush_policy();
        assert_eq!(policy.retries, 5);
        assert_eq!(policy.retry_delay, Duration::from_millis(10));
    }
}
