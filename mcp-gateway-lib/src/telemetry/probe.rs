use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Uri};
use http_body_util::Empty;
use serde::Serialize;
use thiserror::Error;
use tokio::time::timeout;

use crate::config::ProbeConfig;
use crate::error::{GatewayError, Result};
use crate::proxy::ClientPool;

/// Why the downstream service is considered degraded
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("downstream unreachable: {0}")]
    Unreachable(String),

    #[error("downstream check failed: {0}")]
    Failed(String),

    #[error("downstream check timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

/// Health check of the downstream query service
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> std::result::Result<(), ProbeError>;
}

/// Probes a plain-HTTP health endpoint; any 2xx counts as healthy
pub struct HttpProbe {
    url: Uri,
    pool: ClientPool<Empty<Bytes>>,
}

impl HttpProbe {
    pub fn new(url: &str) -> Result<Self> {
        let url = url
            .parse::<Uri>()
            .map_err(|e| GatewayError::ConfigurationInvalid(format!("invalid probe url: {e}")))?;
        Ok(Self { url, pool: ClientPool::default() })
    }

    pub fn from_config(config: &ProbeConfig) -> Result<Self> {
        Self::new(&config.url)
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn check(&self) -> std::result::Result<(), ProbeError> {
        let req = Request::get(self.url.clone())
            .body(Empty::<Bytes>::new())
            .map_err(|e| ProbeError::Failed(e.to_string()))?;

        let resp = self.pool.client().request(req).await.map_err(|e| {
            if e.is_connect() {
                ProbeError::Unreachable(e.to_string())
            } else {
                ProbeError::Failed(e.to_string())
            }
        })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ProbeError::Failed(format!("unexpected status {}", resp.status())))
        }
    }
}

/// Downstream section of the status report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownstreamStatus {
    pub status: &'static str,
    pub error: String,
}

impl DownstreamStatus {
    pub const CONNECTED: &'static str = "connected";
    pub const DISCONNECTED: &'static str = "disconnected";
    pub const NOT_CONFIGURED: &'static str = "not_configured";
    pub const ERROR: &'static str = "error";

    fn new(status: &'static str, error: String) -> Self {
        Self { status, error }
    }
}

/// Runs `probe` bounded by `limit` and maps the outcome for the report
pub async fn probe_downstream(probe: Option<&dyn HealthProbe>, limit: Duration) -> DownstreamStatus {
    let Some(probe) = probe else {
        return DownstreamStatus::new(DownstreamStatus::NOT_CONFIGURED, String::new());
    };

    match timeout(limit, probe.check()).await {
        Ok(Ok(())) => DownstreamStatus::new(DownstreamStatus::CONNECTED, String::new()),
        Ok(Err(e @ ProbeError::Unreachable(_))) => {
            DownstreamStatus::new(DownstreamStatus::DISCONNECTED, e.to_string())
        }
        Ok(Err(e)) => DownstreamStatus::new(DownstreamStatus::ERROR, e.to_string()),
        Err(_) => DownstreamStatus::new(
            DownstreamStatus::ERROR,
            ProbeError::Timeout(limit).to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe(std::result::Result<(), ProbeError>);

    #[async_trait]
    impl HealthProbe for FixedProbe {
        async fn check(&self) -> std::result::Result<(), ProbeError> {
            self.0.clone()
        }
    }

    struct SlowProbe;

    #[async_trait]
    impl HealthProbe for SlowProbe {
        async fn check(&self) -> std::result::Result<(), ProbeError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    const LIMIT: Duration = Duration::from_millis(100);

    #[tokio::test]
    async fn maps_probe_outcomes() {
        let ok = probe_downstream(Some(&FixedProbe(Ok(()))), LIMIT).await;
        assert_eq!(ok.status, "connected");
        assert!(ok.error.is_empty());

        let down = FixedProbe(Err(ProbeError::Unreachable("connection refused".to_string())));
        let down = probe_downstream(Some(&down), LIMIT).await;
        assert_eq!(down.status, "disconnected");
        assert!(down.error.contains("connection refused"));

        let failed = FixedProbe(Err(ProbeError::Failed("unexpected status 500".to_string())));
        assert_eq!(probe_downstream(Some(&failed), LIMIT).await.status, "error");

        assert_eq!(probe_downstream(None, LIMIT).await.status, "not_configured");
    }

    #[tokio::test]
    async fn slow_probe_reports_timeout() {
        let status = probe_downstream(Some(&SlowProbe), LIMIT).await;
        assert_eq!(status.status, "error");
        assert!(status.error.contains("timed out after 100ms"));
    }

    #[tokio::test]
    async fn http_probe_reports_refused_connection_as_unreachable() -> Result<()> {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        let probe = HttpProbe::new(&format!("http://{addr}/healthz"))?;
        assert!(matches!(probe.check().await, Err(ProbeError::Unreachable(_))));
        Ok(())
    }
}
