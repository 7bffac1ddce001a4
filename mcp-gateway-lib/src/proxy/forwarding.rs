use std::net::SocketAddr;

use http::header::{HeaderValue, HOST};
use http::uri::Authority;
use http::{Request, Response, Uri, Version};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use tracing::{debug, warn};

use crate::engine::{ConnInfo, HandlerFuture, RequestHandler, RespBody};
use crate::proxy::client_pool::{ClientPool, HttpClient};
use crate::proxy::headers::add_forwarded_headers;
use crate::proxy::http_result::{HttpError, HttpResult};
use crate::proxy::synthetic_response::{bad_gateway, synthetic_error_response};

/// Relays authenticated requests to a single loopback upstream
///
/// The outbound request targets the upstream authority in both its URI and
/// its `Host` header. Response bodies are streamed back unbuffered.
pub struct ReverseProxy {
    upstream: Authority,
    pool: ClientPool<Incoming>,
}

impl ReverseProxy {
    pub fn new(upstream: SocketAddr, pool: ClientPool<Incoming>) -> HttpResult<Self> {
        let upstream = upstream
            .to_string()
            .parse::<Authority>()
            .map_err(|e| HttpError::InvalidUri(e.to_string()))?;
        Ok(Self { upstream, pool })
    }

    pub fn upstream(&self) -> &Authority {
        &self.upstream
    }
}

impl RequestHandler for ReverseProxy {
    fn handle(&self, req: Request<Incoming>, conn: ConnInfo) -> HandlerFuture {
        let upstream = self.upstream.clone();
        let client = self.pool.client().clone();
        Box::pin(async move {
            match forward(req, &upstream, conn, &client).await {
                Ok(resp) => resp,
                Err(HttpError::UpstreamUnavailable(e)) => {
                    warn!(%upstream, error = %e, "upstream request failed");
                    bad_gateway()
                }
                Err(e) => {
                    warn!(%upstream, error = %e, "failed to relay request");
                    synthetic_error_response((&e).into())
                }
            }
        })
    }
}

/// Rewrites `req` for the upstream and sends it
pub async fn forward(
    req: Request<Incoming>,
    upstream: &Authority,
    conn: ConnInfo,
    client: &HttpClient<Incoming>,
) -> HttpResult<Response<RespBody>> {
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let uri = format!("http://{upstream}{path_and_query}")
        .parse::<Uri>()
        .map_err(|e| HttpError::InvalidUri(e.to_string()))?;
    let host = HeaderValue::from_str(upstream.as_str())
        .map_err(|e| HttpError::FailedToGenerateUpstreamRequest(e.to_string()))?;

    let (mut parts, body) = req.into_parts();
    add_forwarded_headers(&mut parts.headers, conn.peer, conn.is_https);
    parts.uri = uri;
    // Loopback hop is always HTTP/1.1, whatever the client negotiated.
    parts.version = Version::HTTP_11;
    parts.headers.insert(HOST, host);

    debug!(%upstream, uri = %parts.uri, method = %parts.method, "forwarding request");

    let resp = client
        .request(Request::from_parts(parts, body))
        .await
        .map_err(|e| HttpError::UpstreamUnavailable(e.to_string()))?;

    Ok(resp.map(|b| b.boxed()))
}
