//! Wire bindings between the public gateway and the protocol engine.
//!
//! Both bindings hand the gateway a [`RequestHandler`] that it mounts behind
//! the authentication middleware, so health, status and auth behaviour is
//! identical whichever one is configured.

mod direct;
mod proxied;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Transport;
use crate::engine::RequestHandler;
use crate::error::Result;

pub use direct::{DirectBinding, MCP_PATH};
pub use proxied::{ProxiedBinding, MESSAGE_PATH, SSE_PATH};

#[async_trait]
pub trait Binding: Send + Sync {
    /// Transport name reported by `/status`
    fn transport(&self) -> Transport;

    /// Public paths routed to the protocol handler
    fn protocol_paths(&self) -> &[&'static str];

    /// Prepares the engine and returns the handler to mount
    async fn start(&self) -> Result<Arc<dyn RequestHandler>>;

    /// Releases binding resources, waiting at most `deadline`
    async fn shutdown(&self, deadline: Duration) -> Result<()>;
}
