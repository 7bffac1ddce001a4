use std::sync::Arc;
use std::time::{Duration, Instant};

use http::{Method, StatusCode};
use hyper::body::Incoming;
use hyper::Request;
use serde::Serialize;

use crate::config::Transport;
use crate::engine::{ConnInfo, HandlerFuture, RequestHandler};
use crate::proxy::synthetic_response::{json_response, method_not_allowed};
use crate::telemetry::health::rfc3339_now;
use crate::telemetry::probe::{probe_downstream, DownstreamStatus, HealthProbe};

/// Body of `GET /status`; the shape is the same for every transport
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub status: &'static str,
    pub version: &'static str,
    pub transport: &'static str,
    pub tls_enabled: bool,
    pub base_url: String,
    pub downstream: DownstreamStatus,
    /// Whole seconds since the reporter was created
    pub uptime_secs: u64,
    pub timestamp: String,
}

/// Builds status reports, probing the downstream service on each request
pub struct StatusReporter {
    transport: Transport,
    tls_enabled: bool,
    base_url: String,
    probe: Option<Arc<dyn HealthProbe>>,
    probe_timeout: Duration,
    started: Instant,
}

impl StatusReporter {
    pub fn new(
        transport: Transport,
        tls_enabled: bool,
        base_url: String,
        probe: Option<Arc<dyn HealthProbe>>,
        probe_timeout: Duration,
    ) -> Self {
        Self { transport, tls_enabled, base_url, probe, probe_timeout, started: Instant::now() }
    }

    pub async fn report(&self) -> StatusReport {
        let downstream = probe_downstream(self.probe.as_deref(), self.probe_timeout).await;
        StatusReport {
            status: "running",
            version: env!("CARGO_PKG_VERSION"),
            transport: self.transport.as_str(),
            tls_enabled: self.tls_enabled,
            base_url: self.base_url.clone(),
            downstream,
            uptime_secs: self.started.elapsed().as_secs(),
            timestamp: rfc3339_now(),
        }
    }
}

/// `GET /status` endpoint
pub struct StatusHandler {
    reporter: Arc<StatusReporter>,
}

impl StatusHandler {
    pub fn new(reporter: StatusReporter) -> Self {
        Self { reporter: Arc::new(reporter) }
    }
}

impl RequestHandler for StatusHandler {
    fn handle(&self, req: Request<Incoming>, _conn: ConnInfo) -> HandlerFuture {
        if req.method() != Method::GET {
            return Box::pin(async { method_not_allowed() });
        }
        let reporter = Arc::clone(&self.reporter);
        Box::pin(async move { json_response(StatusCode::OK, &reporter.report().await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn report_without_probe() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let reporter = StatusReporter::new(
            Transport::Sse,
            true,
            "https://gateway.example.com".to_string(),
            None,
            Duration::from_secs(2),
        );

        let value = serde_json::to_value(reporter.report().await)?;
        assert_eq!(value["status"], "running");
        assert_eq!(value["transport"], "sse");
        assert_eq!(value["tls_enabled"], true);
        assert_eq!(value["base_url"], "https://gateway.example.com");
        assert_eq!(value["downstream"]["status"], "not_configured");
        assert_eq!(value["downstream"]["error"], "");
        assert!(value["uptime_secs"].as_u64().is_some_and(|secs| secs < 60));
        assert!(value["timestamp"].as_str().is_some_and(|t| t.ends_with('Z')));
        Ok(())
    }
}
