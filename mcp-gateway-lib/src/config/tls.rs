use std::time::Duration;

use serde::Deserialize;

/// TLS termination configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TlsConfig {
    /// Path to TLS certificate file (PEM format)
    /// File must exist and be readable at startup
    pub cert_path: String,
    /// Path to TLS private key file (PEM format)
    /// File must exist and be readable at startup
    pub key_path: String,
    /// Application-Layer Protocol Negotiation (ALPN) protocols
    /// Default: ["h2", "http/1.1"]
    #[serde(default = "default_alpn")]
    pub alpn: Vec<String>,
    /// Reload the certificate when the files change on disk
    /// Default: false
    #[serde(default)]
    pub watch: bool,
    /// Quiet period after a file change before reloading, in milliseconds
    /// Default: 500
    #[serde(default = "default_watch_delay_ms")]
    pub watch_delay_ms: u64,
}

impl TlsConfig {
    pub fn watch_delay(&self) -> Duration {
        Duration::from_millis(self.watch_delay_ms)
    }
}

fn default_alpn() -> Vec<String> {
    vec!["h2".to_string(), "http/1.1".to_string()]
}

fn default_watch_delay_ms() -> u64 {
    500
}
