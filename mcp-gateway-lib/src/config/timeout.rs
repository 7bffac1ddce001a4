use std::time::Duration;

use serde::Deserialize;

/// Connection timeout configuration
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Time allowed for a client to send the request headers (HTTP/1.1)
    /// Protects against slow-header clients
    /// Default: 10 seconds
    #[serde(default = "default_read_header_timeout")]
    pub read_header_secs: u64,
    /// Time a handler may take to produce the response head.
    /// Streaming bodies are not bounded by it.
    /// Default: 0 (unlimited)
    #[serde(default)]
    pub write_secs: u64,
    /// Time a connection may stay open with no request in flight
    /// Default: 3600 seconds (0 disables)
    #[serde(default = "default_idle_timeout")]
    pub idle_secs: u64,
    /// TLS handshake timeout in seconds
    /// Default: 15 seconds
    #[serde(default = "default_tls_handshake_timeout")]
    pub tls_handshake_secs: u64,
    /// Graceful shutdown deadline in seconds
    /// Default: 10
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_secs: u64,
}

impl TimeoutConfig {
    pub fn read_header(&self) -> Duration {
        Duration::from_secs(self.read_header_secs)
    }

    pub fn write(&self) -> Option<Duration> {
        non_zero_secs(self.write_secs)
    }

    pub fn idle(&self) -> Option<Duration> {
        non_zero_secs(self.idle_secs)
    }

    pub fn tls_handshake(&self) -> Duration {
        Duration::from_secs(self.tls_handshake_secs)
    }

    pub fn shutdown(&self) -> Duration {
        Duration::from_secs(self.shutdown_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_header_secs: default_read_header_timeout(),
            write_secs: 0,
            idle_secs: default_idle_timeout(),
            tls_handshake_secs: default_tls_handshake_timeout(),
            shutdown_secs: default_shutdown_timeout(),
        }
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn default_read_header_timeout() -> u64 {
    10
}

fn default_idle_timeout() -> u64 {
    3600
}

fn default_tls_handshake_timeout() -> u64 {
    15
}

fn default_shutdown_timeout() -> u64 {
    10
}
