use std::fs;
use std::path::Path;

use crate::config::{GatewayConfig, Transport, MAX_DURATION_SECS};
use crate::error::{GatewayError, Result};

/// Reads and validates a configuration file
pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<GatewayConfig> {
    let cfg = read_from_path(p)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Reads a configuration file without validating it, so callers can apply
/// overrides (such as a secret from the environment) first
pub fn read_from_path<P: AsRef<Path>>(p: P) -> Result<GatewayConfig> {
    let txt = fs::read_to_string(p)
        .map_err(|e| GatewayError::Config(format!("Failed to read config file: {e}")))?;
    toml::from_str(&txt).map_err(|e| GatewayError::Config(format!("Failed to parse config: {e}")))
}

pub fn validate_config(cfg: &GatewayConfig) -> Result<()> {
    if cfg.auth.secret.trim().is_empty() {
        return Err(invalid("auth.secret must be set"));
    }

    if cfg.rate_limit.max_attempts == 0 {
        return Err(invalid("rate_limit.max_attempts must be greater than zero"));
    }
    if cfg.rate_limit.window_secs == 0 {
        return Err(invalid("rate_limit.window_secs must be greater than zero"));
    }
    if cfg.rate_limit.lockout_secs == 0 {
        return Err(invalid("rate_limit.lockout_secs must be greater than zero"));
    }
    if cfg.rate_limit.cleanup_interval_secs == 0 {
        return Err(invalid("rate_limit.cleanup_interval_secs must be greater than zero"));
    }
    for (name, secs) in [
        ("rate_limit.window_secs", cfg.rate_limit.window_secs),
        ("rate_limit.lockout_secs", cfg.rate_limit.lockout_secs),
        ("rate_limit.cleanup_interval_secs", cfg.rate_limit.cleanup_interval_secs),
        ("heartbeat_interval_secs", cfg.heartbeat_interval_secs),
    ] {
        if secs > MAX_DURATION_SECS {
            return Err(invalid(&format!("{name} must be at most {MAX_DURATION_SECS}, got {secs}")));
        }
    }

    if cfg.transport == Transport::Sse && !cfg.internal_listen.ip().is_loopback() {
        return Err(invalid(&format!(
            "internal_listen must be a loopback address, got {}",
            cfg.internal_listen
        )));
    }

    if let Some(public_url) = &cfg.public_url {
        let parsed = url::Url::parse(public_url)
            .map_err(|e| invalid(&format!("public_url is not a valid URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(&format!("public_url must use http or https: {public_url}")));
        }
    }

    if let Some(tls) = &cfg.tls {
        if !Path::new(&tls.cert_path).exists() {
            return Err(invalid(&format!("Certificate file not found: {}", tls.cert_path)));
        }
        if !Path::new(&tls.key_path).exists() {
            return Err(invalid(&format!("Key file not found: {}", tls.key_path)));
        }
    }

    if let Some(probe) = &cfg.probe {
        let uri = probe
            .url
            .parse::<http::Uri>()
            .map_err(|e| invalid(&format!("probe.url is not a valid URI: {e}")))?;
        if uri.scheme_str() != Some("http") || uri.authority().is_none() {
            return Err(invalid(&format!("probe.url must be an absolute http URL: {}", probe.url)));
        }
        if probe.timeout_ms == 0 {
            return Err(invalid("probe.timeout_ms must be greater than zero"));
        }
    }

    Ok(())
}

fn invalid(msg: &str) -> GatewayError {
    GatewayError::ConfigurationInvalid(msg.to_string())
}
