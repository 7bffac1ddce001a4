use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::binding::Binding;
use crate::config::Transport;
use crate::engine::{ListeningEngine, RequestHandler};
use crate::error::{GatewayError, Result};
use crate::proxy::{ClientPool, ReverseProxy};

pub const SSE_PATH: &str = "/sse";
pub const MESSAGE_PATH: &str = "/message";

/// Runs the engine on a loopback listener and reverse-proxies
/// authenticated traffic to it
pub struct ProxiedBinding {
    engine: Arc<dyn ListeningEngine>,
    internal_addr: SocketAddr,
    pool: ClientPool<hyper::body::Incoming>,
}

impl ProxiedBinding {
    pub fn new(engine: Arc<dyn ListeningEngine>, internal_addr: SocketAddr) -> Self {
        Self { engine, internal_addr, pool: ClientPool::default() }
    }
}

#[async_trait]
impl Binding for ProxiedBinding {
    fn transport(&self) -> Transport {
        Transport::Sse
    }

    fn protocol_paths(&self) -> &[&'static str] {
        &[SSE_PATH, MESSAGE_PATH]
    }

    async fn start(&self) -> Result<Arc<dyn RequestHandler>> {
        if !self.internal_addr.ip().is_loopback() {
            return Err(GatewayError::ConfigurationInvalid(format!(
                "internal engine address must be loopback, got {}",
                self.internal_addr
            )));
        }

        let upstream = self.engine.start(self.internal_addr).await?;
        info!(%upstream, "engine started behind reverse proxy");

        let proxy = ReverseProxy::new(upstream, self.pool.clone())
            .map_err(|e| GatewayError::Engine(e.to_string()))?;
        Ok(Arc::new(proxy))
    }

    async fn shutdown(&self, deadline: Duration) -> Result<()> {
        self.engine.shutdown(deadline).await
    }
}
