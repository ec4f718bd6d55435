//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files and
//! every field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::http::request::DEFAULT_BUFFER_SIZE;

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (host, port).
    pub listener: ListenerConfig,

    /// Request parser tuning.
    pub parser: ParserConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Settings for the bundled demo handlers.
    pub demo: DemoConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// TCP port. `0` asks the OS for an ephemeral port.
    pub port: u16,
}

impl ListenerConfig {
    /// `host:port` as passed to the socket layer.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 42069,
        }
    }
}

/// Request parser configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Starting size of the per-connection read buffer in bytes. The buffer
    /// doubles whenever it fills up.
    pub initial_buffer_size: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            initial_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Demo handler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Upstream that `/httpbin/<path>` is proxied to.
    pub httpbin_url: String,

    /// File served by `/video`.
    pub video_path: String,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            httpbin_url: "https://httpbin.org".to_string(),
            video_path: "./assets/vim.mp4".to_string(),
        }
    }
}
