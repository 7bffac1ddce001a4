use std::convert::Infallible;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{ready, Context, Poll};
use std::time::Duration;

use ahash::RandomState;
use bytes::Bytes;
use http::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use http::{Method, StatusCode};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Frame, Incoming};
use hyper::{Request, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::config::MAX_DURATION_SECS;
use crate::engine::{ConnInfo, HandlerFuture, RequestHandler, RespBody};
use crate::proxy::synthetic_response::{
    empty_body, json_response, method_not_allowed, synthetic_error_response, text_response,
};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;
const HEARTBEAT_FRAME: &[u8] = b": ping\n\n";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Name reported in the `initialize` result
    pub server_name: String,
    /// When set, event streams open with an `endpoint` event pointing here
    pub message_path: Option<String>,
    /// Interval of keep-alive comments on event streams
    pub heartbeat: Option<Duration>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            server_name: "mcp-gateway".to_string(),
            message_path: None,
            heartbeat: Some(Duration::from_secs(30)),
        }
    }
}

/// Minimal JSON-RPC engine: answers `initialize` and `ping`, and keeps
/// event streams open with heartbeats. Stands in for a full protocol engine.
pub struct BasicEngine {
    options: EngineOptions,
    sessions: AtomicU64,
    hasher: RandomState,
}

impl BasicEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self { options, sessions: AtomicU64::new(0), hasher: RandomState::new() }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    fn next_session_id(&self) -> String {
        let n = self.sessions.fetch_add(1, Ordering::Relaxed);
        format!("{:016x}", self.hasher.hash_one(n))
    }

    fn open_stream(&self) -> Response<RespBody> {
        let first = self.options.message_path.as_ref().map(|path| {
            let session = self.next_session_id();
            Bytes::from(format!("event: endpoint\ndata: {path}?sessionId={session}\n\n"))
        });
        let body = EventStream::new(first, self.options.heartbeat)
            .map_err(|never| match never {})
            .boxed();

        let mut resp = Response::new(body);
        resp.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
        resp.headers_mut()
            .insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        resp
    }
}

impl RequestHandler for BasicEngine {
    fn handle(&self, req: Request<Incoming>, conn: ConnInfo) -> HandlerFuture {
        match *req.method() {
            Method::GET => {
                debug!(peer = %conn.peer, path = req.uri().path(), "opening event stream");
                let resp = self.open_stream();
                Box::pin(async move { resp })
            }
            Method::POST => {
                let server_name = self.options.server_name.clone();
                Box::pin(async move { handle_rpc(req, &server_name).await })
            }
            _ => Box::pin(async { method_not_allowed() }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Option<Value>,
    method: String,
}

async fn handle_rpc(req: Request<Incoming>, server_name: &str) -> Response<RespBody> {
    let body = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            return text_response(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large");
        }
        Err(e) => {
            warn!(error = %e, "failed to read request body");
            return synthetic_error_response(StatusCode::BAD_REQUEST);
        }
    };

    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => return rpc_error(Value::Null, PARSE_ERROR, &format!("Parse error: {e}")),
    };
    let rpc: RpcRequest = match serde_json::from_value(value) {
        Ok(rpc) => rpc,
        Err(_) => return rpc_error(Value::Null, INVALID_REQUEST, "Invalid Request"),
    };

    let Some(id) = rpc.id else {
        debug!(method = %rpc.method, "notification received");
        let mut resp = Response::new(empty_body());
        *resp.status_mut() = StatusCode::ACCEPTED;
        return resp;
    };

    match rpc.method.as_str() {
        "initialize" => rpc_result(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "serverInfo": { "name": server_name, "version": env!("CARGO_PKG_VERSION") }
            }),
        ),
        "ping" => rpc_result(id, json!({})),
        other => rpc_error(id, METHOD_NOT_FOUND, &format!("Method not found: {other}")),
    }
}

fn rpc_result(id: Value, result: Value) -> Response<RespBody> {
    json_response(StatusCode::OK, &json!({ "jsonrpc": "2.0", "id": id, "result": result }))
}

fn rpc_error(id: Value, code: i64, message: &str) -> Response<RespBody> {
    json_response(
        StatusCode::OK,
        &json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } }),
    )
}

/// Open-ended `text/event-stream` body: an optional first event, then a
/// comment frame per heartbeat tick until the client goes away
struct EventStream {
    first: Option<Bytes>,
    heartbeat: Option<Interval>,
}

impl EventStream {
    fn new(first: Option<Bytes>, heartbeat: Option<Duration>) -> Self {
        let heartbeat = heartbeat.map(|period| {
            let period = period.min(Duration::from_secs(MAX_DURATION_SECS));
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        Self { first, heartbeat }
    }
}

impl Body for EventStream {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if let Some(first) = this.first.take() {
            return Poll::Ready(Some(Ok(Frame::data(first))));
        }
        match this.heartbeat.as_mut() {
            Some(interval) => {
                ready!(interval.poll_tick(cx));
                Poll::Ready(Some(Ok(Frame::data(Bytes::from_static(HEARTBEAT_FRAME)))))
            }
            None => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_stream_emits_endpoint_then_heartbeats() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut stream = EventStream::new(
            Some(Bytes::from_static(b"event: endpoint\ndata: /message\n\n")),
            Some(Duration::from_millis(20)),
        );

        let first = stream.frame().await.ok_or("stream ended")??;
        assert_eq!(first.into_data().ok(), Some(Bytes::from_static(b"event: endpoint\ndata: /message\n\n")));

        let beat = stream.frame().await.ok_or("stream ended")??;
        assert_eq!(beat.into_data().ok(), Some(Bytes::from_static(HEARTBEAT_FRAME)));
        Ok(())
    }

    #[test]
    fn session_ids_are_distinct() {
        let engine = BasicEngine::new(EngineOptions::default());
        assert_ne!(engine.next_session_id(), engine.next_session_id());
    }
}
