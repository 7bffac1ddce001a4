use std::sync::Arc;

use ahash::AHashMap;
use hyper::body::Incoming;
use hyper::Request;
use tracing::debug;

use crate::engine::{ConnInfo, HandlerFuture, RequestHandler};
use crate::proxy::synthetic_response::not_found;

/// Exact-path route table
#[derive(Default)]
pub struct Router {
    routes: AHashMap<String, Arc<dyn RequestHandler>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, path: &str, handler: Arc<dyn RequestHandler>) -> Self {
        self.routes.insert(path.to_string(), handler);
        self
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}

impl RequestHandler for Router {
    fn handle(&self, req: Request<Incoming>, conn: ConnInfo) -> HandlerFuture {
        match self.routes.get(req.uri().path()) {
            Some(handler) => handler.handle(req, conn),
            None => {
                debug!(peer = %conn.peer, path = req.uri().path(), "no route");
                Box::pin(async { not_found() })
            }
        }
    }
}
