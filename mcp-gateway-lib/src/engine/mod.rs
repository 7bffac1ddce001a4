//! Protocol engine seams.
//!
//! The gateway never interprets the protocol itself. It talks to an engine
//! through one of two shapes: a [`RequestHandler`] it can mount in-process,
//! or a [`ListeningEngine`] that owns its own listener.

mod basic;
mod loopback;

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::body::Incoming;
use hyper::{Request, Response};

use crate::error::Result;

pub use basic::{BasicEngine, EngineOptions, PROTOCOL_VERSION};
pub use loopback::LoopbackEngine;

pub type RespBody = BoxBody<Bytes, hyper::Error>;

pub type HandlerFuture = Pin<Box<dyn Future<Output = Response<RespBody>> + Send>>;

/// Connection facts available to every handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnInfo {
    pub peer: SocketAddr,
    pub is_https: bool,
}

/// Serves one HTTP request. Failures are expressed as responses.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle(&self, req: Request<Incoming>, conn: ConnInfo) -> HandlerFuture;
}

impl<H: RequestHandler + ?Sized> RequestHandler for Arc<H> {
    fn handle(&self, req: Request<Incoming>, conn: ConnInfo) -> HandlerFuture {
        (**self).handle(req, conn)
    }
}

/// An engine that serves the protocol on a listener of its own
#[async_trait]
pub trait ListeningEngine: Send + Sync {
    /// Binds `addr` and starts serving. Returns the bound address.
    async fn start(&self, addr: SocketAddr) -> Result<SocketAddr>;

    /// Stops accepting and waits up to `timeout` for open connections.
    async fn shutdown(&self, timeout: Duration) -> Result<()>;
}
