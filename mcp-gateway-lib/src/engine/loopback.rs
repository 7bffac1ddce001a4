use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::info;

use crate::engine::{ListeningEngine, RequestHandler};
use crate::error::{GatewayError, Result};
use crate::server::listener::{serve, ServeOptions, ServerHandle};

/// Hosts a [`RequestHandler`] on a private, unauthenticated listener
///
/// Only loopback addresses are accepted: anything reaching this listener has
/// bypassed authentication.
pub struct LoopbackEngine {
    handler: Arc<dyn RequestHandler>,
    options: ServeOptions,
    server: Mutex<Option<ServerHandle>>,
}

impl LoopbackEngine {
    pub fn new(handler: Arc<dyn RequestHandler>) -> Self {
        Self::with_options(handler, ServeOptions::default())
    }

    pub fn with_options(handler: Arc<dyn RequestHandler>, options: ServeOptions) -> Self {
        Self { handler, options, server: Mutex::new(None) }
    }
}

#[async_trait]
impl ListeningEngine for LoopbackEngine {
    async fn start(&self, addr: SocketAddr) -> Result<SocketAddr> {
        if !addr.ip().is_loopback() {
            return Err(GatewayError::Engine(format!(
                "refusing to expose the engine on non-loopback address {addr}"
            )));
        }

        let mut server = self.server.lock().await;
        if server.is_some() {
            return Err(GatewayError::InvalidState("engine already started".to_string()));
        }

        let listener = TcpListener::bind(addr).await.map_err(|e| {
            GatewayError::Engine(format!("failed to bind engine listener on {addr}: {e}"))
        })?;
        let handle = serve(listener, Arc::clone(&self.handler), None, self.options)?;
        let bound = handle.local_addr();
        info!(addr = %bound, "protocol engine listening");
        *server = Some(handle);
        Ok(bound)
    }

    async fn shutdown(&self, timeout: Duration) -> Result<()> {
        let handle = self.server.lock().await.take();
        if let Some(handle) = handle {
            handle.shutdown(timeout).await;
        }
        Ok(())
    }
}
