use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::binding::Binding;
use crate::config::Transport;
use crate::engine::RequestHandler;
use crate::error::Result;

pub const MCP_PATH: &str = "/mcp";

/// Mounts the engine's handler in-process under `/mcp`
pub struct DirectBinding {
    handler: Arc<dyn RequestHandler>,
}

impl DirectBinding {
    pub fn new(handler: Arc<dyn RequestHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl Binding for DirectBinding {
    fn transport(&self) -> Transport {
        Transport::StreamableHttp
    }

    fn protocol_paths(&self) -> &[&'static str] {
        &[MCP_PATH]
    }

    async fn start(&self) -> Result<Arc<dyn RequestHandler>> {
        Ok(Arc::clone(&self.handler))
    }

    async fn shutdown(&self, _deadline: Duration) -> Result<()> {
        Ok(())
    }
}
