//! Shared helpers for gateway integration tests
#![allow(dead_code)]

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use mcp_gateway_lib::config::{AuthConfig, GatewayConfig, RateLimitConfig, TlsConfig};
use mcp_gateway_lib::{
    BasicEngine, DirectBinding, EngineOptions, Gateway, LoopbackEngine, ProxiedBinding,
};

pub type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub const SECRET: &str = "s3cr3t-token-for-tests";

/// Generate a temporary file path for testing
pub fn tmp_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_nanos();
    std::env::temp_dir().join(format!("mcp-gateway-test-{nanos}-{name}"))
}

/// Generate valid test certificates using rcgen
/// Returns paths to PEM files containing a self-signed certificate for localhost
pub fn create_valid_test_cert(
) -> Result<(PathBuf, PathBuf), Box<dyn std::error::Error + Send + Sync>> {
    let cert_path = tmp_path("test.crt");
    let key_path = tmp_path("test.key");

    let rcgen::CertifiedKey { cert, signing_key } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()])?;
    fs::write(&cert_path, cert.pem())?;
    fs::write(&key_path, signing_key.serialize_pem())?;

    Ok((cert_path, key_path))
}

pub fn tls_config(cert_path: &PathBuf, key_path: &PathBuf) -> TlsConfig {
    TlsConfig {
        cert_path: cert_path.to_string_lossy().into_owned(),
        key_path: key_path.to_string_lossy().into_owned(),
        alpn: vec!["h2".to_string(), "http/1.1".to_string()],
        watch: false,
        watch_delay_ms: 500,
    }
}

/// Config listening on ephemeral loopback ports
pub fn test_config() -> GatewayConfig {
    GatewayConfig {
        listen: SocketAddr::from(([127, 0, 0, 1], 0)),
        internal_listen: SocketAddr::from(([127, 0, 0, 1], 0)),
        heartbeat_interval_secs: 1,
        auth: AuthConfig {
            secret: SECRET.to_string(),
            ..Default::default()
        },
        rate_limit: RateLimitConfig::default(),
        ..GatewayConfig::default()
    }
}

fn engine(message_path: Option<&str>) -> Arc<BasicEngine> {
    Arc::new(BasicEngine::new(EngineOptions {
        message_path: message_path.map(str::to_string),
        heartbeat: Some(Duration::from_secs(1)),
        ..EngineOptions::default()
    }))
}

pub fn direct_gateway(cfg: GatewayConfig) -> Gateway {
    Gateway::new(cfg, Arc::new(DirectBinding::new(engine(None))))
}

/// Proxied gateway plus a handle on its loopback engine
pub fn proxied_gateway(cfg: GatewayConfig) -> (Gateway, Arc<LoopbackEngine>) {
    let loopback = Arc::new(LoopbackEngine::new(engine(Some("/message"))));
    let binding = ProxiedBinding::new(loopback.clone(), cfg.internal_listen);
    (Gateway::new(cfg, Arc::new(binding)), loopback)
}

pub fn bearer() -> String {
    format!("Bearer {SECRET}")
}

pub fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(Duration::from_secs(5)).build()
}
