use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

use super::telemetry::LoggingConfig;
use super::timeout::TimeoutConfig;
use super::tls::TlsConfig;

/// Wire binding used to expose the protocol engine
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Transport {
    /// Server-sent events: the engine owns a loopback listener and the
    /// gateway reverse-proxies authenticated traffic to it
    Sse,
    /// Streamable HTTP: the engine handler is mounted in-process
    #[default]
    StreamableHttp,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Sse => "sse",
            Transport::StreamableHttp => "streamable-http",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bearer authentication settings
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Shared bearer secret every client must present.
    /// May be left empty in the file and supplied via the environment.
    #[serde(default)]
    pub secret: String,
    /// Realm reported in `WWW-Authenticate` challenges
    /// Default: "mcp-gateway"
    #[serde(default = "default_realm")]
    pub realm: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { secret: String::new(), realm: default_realm() }
    }
}

fn default_realm() -> String {
    "mcp-gateway".to_string()
}

/// Upper bound for every configured interval, one week
pub const MAX_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Authentication attempt throttling
///
/// An identity that fails more than `max_attempts` times within `window_secs`
/// is locked out for `lockout_secs`. Records idle for longer than the lockout
/// are swept every `cleanup_interval_secs`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Failed attempts tolerated per window
    /// Default: 5
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Counting window in seconds
    /// Default: 60
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Lockout duration in seconds
    /// Default: 300
    #[serde(default = "default_lockout_secs")]
    pub lockout_secs: u64,
    /// Interval of the stale record sweep in seconds
    /// Default: 600
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn lockout(&self) -> Duration {
        Duration::from_secs(self.lockout_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            window_secs: default_window_secs(),
            lockout_secs: default_lockout_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_window_secs() -> u64 {
    60
}

fn default_lockout_secs() -> u64 {
    300
}

fn default_cleanup_interval_secs() -> u64 {
    600
}

/// Downstream health probe reported by `/status`
#[derive(Debug, Deserialize, Clone)]
pub struct ProbeConfig {
    /// Plain HTTP URL answering 2xx when the downstream service is healthy
    pub url: String,
    /// Probe deadline in milliseconds
    /// Default: 2000
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

/// Root gateway configuration, loaded from TOML
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    /// Public listen address
    /// Default: 0.0.0.0:8443
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Externally visible base URL, reported by `/status`.
    /// Derived from the bound address when unset.
    #[serde(default)]
    pub public_url: Option<String>,
    /// Protocol binding
    /// Default: streamable-http
    #[serde(default)]
    pub transport: Transport,
    /// Loopback address of the engine listener (sse transport only)
    /// Default: 127.0.0.1:18443
    #[serde(default = "default_internal_listen")]
    pub internal_listen: SocketAddr,
    /// Keep-alive comment interval on event streams, 0 disables it
    /// Default: 30
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// TLS termination; plain HTTP when absent
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    #[serde(default)]
    pub timeout: TimeoutConfig,
    #[serde(default)]
    pub probe: Option<ProbeConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            public_url: None,
            transport: Transport::default(),
            internal_listen: default_internal_listen(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            tls: None,
            timeout: TimeoutConfig::default(),
            probe: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        (self.heartbeat_interval_secs > 0).then(|| Duration::from_secs(self.heartbeat_interval_secs))
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8443))
}

fn default_internal_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 18443))
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}
