use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::TimeoutConfig;
use crate::engine::{ConnInfo, RequestHandler};
use crate::error::Result;
use crate::proxy::synthetic_response::synthetic_error_response;
use crate::server::connection::{idle_timeout, ConnectionActivity, TrackedBody};

/// TLS acceptor that can be replaced while the listener runs
pub type SharedAcceptor = Arc<ArcSwap<TlsAcceptor>>;

const MAX_HEADER_BYTES: usize = 1 << 20;
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);
const FORCE_CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Per-connection limits applied by [`serve`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServeOptions {
    pub read_header_timeout: Duration,
    pub write_timeout: Option<Duration>,
    pub idle_timeout: Option<Duration>,
    pub tls_handshake_timeout: Duration,
    pub max_header_bytes: usize,
}

impl ServeOptions {
    pub fn from_timeouts(timeouts: &TimeoutConfig) -> Self {
        Self {
            read_header_timeout: timeouts.read_header(),
            write_timeout: timeouts.write(),
            idle_timeout: timeouts.idle(),
            tls_handshake_timeout: timeouts.tls_handshake(),
            max_header_bytes: MAX_HEADER_BYTES,
        }
    }
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self::from_timeouts(&TimeoutConfig::default())
    }
}

struct ConnContext {
    handler: Arc<dyn RequestHandler>,
    builder: ConnBuilder<TokioExecutor>,
    tls: Option<SharedAcceptor>,
    options: ServeOptions,
    shutdown: CancellationToken,
    force: CancellationToken,
}

/// A running listener. Dropping the handle does not stop it; call
/// [`shutdown`](ServerHandle::shutdown).
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    force: CancellationToken,
    tracker: TaskTracker,
    accept_loop: Mutex<Option<JoinHandle<()>>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn active_connections(&self) -> usize {
        self.tracker.len()
    }

    /// Stops accepting, lets open connections finish their in-flight
    /// requests, and force-closes whatever is left after `deadline`.
    pub async fn shutdown(&self, deadline: Duration) {
        self.shutdown.cancel();
        if let Some(accept_loop) = self.accept_loop.lock().await.take() {
            if let Err(e) = accept_loop.await {
                warn!(error = %e, "accept loop terminated abnormally");
            }
        }
        self.tracker.close();

        info!(
            addr = %self.local_addr,
            active_connections = self.tracker.len(),
            "waiting for active connections to finish (timeout: {}ms)",
            deadline.as_millis()
        );
        if timeout(deadline, self.tracker.wait()).await.is_err() {
            warn!(
                addr = %self.local_addr,
                active_connections = self.tracker.len(),
                "shutdown deadline reached, force-closing connections"
            );
            self.force.cancel();
            if timeout(FORCE_CLOSE_GRACE, self.tracker.wait()).await.is_err() {
                warn!(addr = %self.local_addr, "connections still open after force close");
            }
        }
        info!(addr = %self.local_addr, "listener stopped");
    }
}

/// Serves `handler` on an already bound listener
pub fn serve(
    listener: TcpListener,
    handler: Arc<dyn RequestHandler>,
    tls: Option<SharedAcceptor>,
    options: ServeOptions,
) -> Result<ServerHandle> {
    let local_addr = listener.local_addr()?;

    let mut builder = ConnBuilder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(options.read_header_timeout)
        .max_buf_size(options.max_header_bytes);
    builder.http2().timer(TokioTimer::new());

    let shutdown = CancellationToken::new();
    let force = CancellationToken::new();
    let tracker = TaskTracker::new();
    let ctx = Arc::new(ConnContext {
        handler,
        builder,
        tls,
        options,
        shutdown: shutdown.clone(),
        force: force.clone(),
    });

    let accept_loop = tokio::spawn(accept_loop(listener, ctx, tracker.clone()));

    Ok(ServerHandle {
        local_addr,
        shutdown,
        force,
        tracker,
        accept_loop: Mutex::new(Some(accept_loop)),
    })
}

async fn accept_loop(listener: TcpListener, ctx: Arc<ConnContext>, tracker: TaskTracker) {
    loop {
        tokio::select! {
            _ = ctx.shutdown.cancelled() => break,
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "accept error");
                        sleep(ACCEPT_ERROR_BACKOFF).await;
                        continue;
                    }
                };
                tracker.spawn(handle_connection(stream, peer, Arc::clone(&ctx)));
            }
        }
    }
    debug!("accept loop stopped");
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, ctx: Arc<ConnContext>) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(?peer, error = %e, "failed to set TCP_NODELAY");
    }

    let Some(acceptor) = ctx.tls.as_ref().map(|tls| tls.load_full()) else {
        serve_io(stream, peer, false, &ctx).await;
        return;
    };

    tokio::select! {
        handshake = timeout(ctx.options.tls_handshake_timeout, acceptor.accept(stream)) => {
            match handshake {
                Ok(Ok(tls)) => serve_io(tls, peer, true, &ctx).await,
                Ok(Err(e)) => warn!(?peer, error = %e, "tls accept error"),
                Err(_) => warn!(?peer, "tls handshake timeout"),
            }
        }
        _ = ctx.force.cancelled() => debug!(?peer, "tls handshake abandoned at shutdown"),
    }
}

async fn serve_io<I>(io: I, peer: SocketAddr, is_https: bool, ctx: &ConnContext)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let conn_info = ConnInfo { peer, is_https };
    let activity = ConnectionActivity::new();
    let handler = Arc::clone(&ctx.handler);
    let write_timeout = ctx.options.write_timeout;
    let svc_activity = Arc::clone(&activity);

    let svc = service_fn(move |req: Request<Incoming>| {
        let guard = svc_activity.begin();
        let fut = handler.handle(req, conn_info);
        async move {
            let resp = match write_timeout {
                Some(limit) => match timeout(limit, fut).await {
                    Ok(resp) => resp,
                    Err(_) => {
                        warn!(?peer, "handler did not produce a response in time");
                        synthetic_error_response(StatusCode::GATEWAY_TIMEOUT)
                    }
                },
                None => fut.await,
            };
            Ok::<_, hyper::Error>(resp.map(|body| TrackedBody::new(body, guard)))
        }
    });

    let conn = ctx.builder.serve_connection(TokioIo::new(io), svc);
    tokio::pin!(conn);
    let idle = idle_timeout(activity, ctx.options.idle_timeout);
    tokio::pin!(idle);

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                debug!(?peer, error = %e, "serve_connection error");
            }
            return;
        }
        _ = ctx.shutdown.cancelled() => debug!(?peer, "closing connection for shutdown"),
        _ = &mut idle => debug!(?peer, "closing idle connection"),
    }

    conn.as_mut().graceful_shutdown();
    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                debug!(?peer, error = %e, "serve_connection error during shutdown");
            }
        }
        _ = ctx.force.cancelled() => debug!(?peer, "connection force-closed"),
    }
}
