use chrono::{SecondsFormat, Utc};
use http::{Method, StatusCode};
use hyper::body::Incoming;
use hyper::{Request, Response};
use serde::Serialize;

use crate::engine::{ConnInfo, HandlerFuture, RequestHandler, RespBody};
use crate::proxy::synthetic_response::{json_response, method_not_allowed};

pub fn rfc3339_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: String,
}

/// Health check response - always returns 200 if process is running
pub fn health_check_response() -> Response<RespBody> {
    json_response(StatusCode::OK, &HealthReport { status: "healthy", timestamp: rfc3339_now() })
}

/// Unauthenticated liveness endpoint
pub struct HealthHandler;

impl RequestHandler for HealthHandler {
    fn handle(&self, req: Request<Incoming>, _conn: ConnInfo) -> HandlerFuture {
        let resp = match *req.method() {
            Method::GET | Method::HEAD => health_check_response(),
            _ => method_not_allowed(),
        };
        Box::pin(async move { resp })
    }
}
