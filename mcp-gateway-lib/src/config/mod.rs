mod loader;
mod telemetry;
mod timeout;
mod tls;
mod types;

pub use loader::{load_from_path, read_from_path, validate_config};
pub use telemetry::LoggingConfig;
pub use timeout::TimeoutConfig;
pub use tls::TlsConfig;
pub use types::{
    AuthConfig, GatewayConfig, ProbeConfig, RateLimitConfig, Transport, MAX_DURATION_SECS,
};
