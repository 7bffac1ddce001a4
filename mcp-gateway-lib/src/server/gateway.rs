use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::binding::Binding;
use crate::config::{GatewayConfig, MAX_DURATION_SECS};
use crate::engine::RequestHandler;
use crate::error::{GatewayError, Result};
use crate::security::{mask_secret, AuthMiddleware, Authenticated, IdentityRateLimiter};
use crate::server::listener::{serve, ServeOptions, ServerHandle};
use crate::server::router::Router;
use crate::telemetry::{HealthHandler, HealthProbe, HttpProbe, StatusHandler, StatusReporter};
use crate::tls::TlsReloader;

pub const HEALTH_PATH: &str = "/health";
pub const STATUS_PATH: &str = "/status";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    Created,
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

impl fmt::Display for GatewayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GatewayState::Created => "created",
            GatewayState::Starting => "starting",
            GatewayState::Running => "running",
            GatewayState::ShuttingDown => "shutting down",
            GatewayState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

struct Running {
    server: ServerHandle,
    background: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    tls: Option<Arc<TlsReloader>>,
}

/// The public, authenticated front of the protocol engine
///
/// Lifecycle: `Created -> Starting -> Running -> ShuttingDown -> Stopped`.
/// A failed start lands in `Stopped`; shutdown is idempotent.
pub struct Gateway {
    config: GatewayConfig,
    binding: Arc<dyn Binding>,
    limiter: Arc<IdentityRateLimiter>,
    probe: Option<Arc<dyn HealthProbe>>,
    state: Mutex<GatewayState>,
    local_addr: OnceLock<SocketAddr>,
    running: tokio::sync::Mutex<Option<Running>>,
}

impl Gateway {
    pub fn new(config: GatewayConfig, binding: Arc<dyn Binding>) -> Self {
        let limiter = Arc::new(IdentityRateLimiter::from_config(&config.rate_limit));
        Self {
            config,
            binding,
            limiter,
            probe: None,
            state: Mutex::new(GatewayState::Created),
            local_addr: OnceLock::new(),
            running: tokio::sync::Mutex::new(None),
        }
    }

    /// Shares an externally owned limiter instead of building one from config
    pub fn with_limiter(mut self, limiter: Arc<IdentityRateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Uses `probe` for `/status` instead of the configured HTTP probe
    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn state(&self) -> GatewayState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bound public address, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    pub fn limiter(&self) -> &Arc<IdentityRateLimiter> {
        &self.limiter
    }

    fn set_state(&self, next: GatewayState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Starts serving and returns the bound public address
    pub async fn start(&self) -> Result<SocketAddr> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != GatewayState::Created {
                return Err(GatewayError::InvalidState(format!(
                    "cannot start a gateway that is {}",
                    *state
                )));
            }
            *state = GatewayState::Starting;
        }

        match self.launch().await {
            Ok(addr) => {
                self.set_state(GatewayState::Running);
                Ok(addr)
            }
            Err(e) => {
                self.set_state(GatewayState::Stopped);
                Err(e)
            }
        }
    }

    async fn launch(&self) -> Result<SocketAddr> {
        if self.config.auth.secret.is_empty() {
            return Err(GatewayError::ConfigurationInvalid(
                "a bearer secret is required".to_string(),
            ));
        }

        let tls = match &self.config.tls {
            Some(cfg) => Some(Arc::new(TlsReloader::new(cfg.clone()).map_err(|e| {
                GatewayError::ConfigurationInvalid(format!("invalid TLS material: {e}"))
            })?)),
            None => None,
        };

        let probe = match (&self.probe, &self.config.probe) {
            (Some(probe), _) => Some(Arc::clone(probe)),
            (None, Some(cfg)) => {
                Some(Arc::new(HttpProbe::from_config(cfg)?) as Arc<dyn HealthProbe>)
            }
            (None, None) => None,
        };
        let probe_timeout = self
            .config
            .probe
            .as_ref()
            .map(|p| p.timeout())
            .unwrap_or(Duration::from_secs(2));

        let listener = TcpListener::bind(self.config.listen).await?;
        let local_addr = listener.local_addr()?;

        let protocol = self.binding.start().await?;

        let background = CancellationToken::new();
        let mut tasks = vec![spawn_cleanup(
            Arc::clone(&self.limiter),
            self.config.rate_limit.cleanup_interval(),
            background.clone(),
        )];
        if let Some(reloader) = tls.as_ref().filter(|_| self.watch_tls()) {
            match Arc::clone(reloader).watch(background.clone()) {
                Ok(task) => tasks.push(task),
                Err(e) => warn!(error = %e, "TLS file watching disabled"),
            }
        }

        let tls_enabled = tls.is_some();
        let scheme = if tls_enabled { "https" } else { "http" };
        let base_url = self
            .config
            .public_url
            .clone()
            .unwrap_or_else(|| format!("{scheme}://{local_addr}"));

        let auth = Arc::new(AuthMiddleware::new(
            Arc::clone(&self.limiter),
            self.config.auth.secret.clone(),
            &self.config.auth.realm,
        ));
        let status = StatusHandler::new(StatusReporter::new(
            self.binding.transport(),
            tls_enabled,
            base_url.clone(),
            probe,
            probe_timeout,
        ));

        let mut router = Router::new()
            .route(HEALTH_PATH, Arc::new(HealthHandler))
            .route(STATUS_PATH, Arc::new(Authenticated::new(Arc::clone(&auth), status)));
        for path in self.binding.protocol_paths() {
            let guarded = Authenticated::new(Arc::clone(&auth), Arc::clone(&protocol));
            router = router.route(path, Arc::new(guarded));
        }
        debug!(routes = ?router.paths().collect::<Vec<_>>(), "routes registered");

        let server = match serve(
            listener,
            Arc::new(router) as Arc<dyn RequestHandler>,
            tls.as_ref().map(|t| t.acceptor()),
            ServeOptions::from_timeouts(&self.config.timeout),
        ) {
            Ok(server) => server,
            Err(e) => {
                background.cancel();
                if let Err(stop_err) = self.binding.shutdown(self.config.timeout.shutdown()).await {
                    warn!(error = %stop_err, "failed to stop binding after start failure");
                }
                return Err(e);
            }
        };

        let _ = self.local_addr.set(local_addr);
        *self.running.lock().await = Some(Running { server, background, tasks, tls });

        info!(
            addr = %local_addr,
            transport = %self.binding.transport(),
            tls = tls_enabled,
            %base_url,
            secret = %mask_secret(&self.config.auth.secret),
            "gateway listening"
        );
        Ok(local_addr)
    }

    fn watch_tls(&self) -> bool {
        self.config.tls.as_ref().is_some_and(|t| t.watch)
    }

    /// Stops the gateway: cleanup task, public listener, then the binding.
    /// Open connections get until `deadline` to finish. Calling it again, or
    /// on a gateway that never started, is a no-op.
    pub async fn shutdown(&self, deadline: Duration) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match *state {
                GatewayState::Created => {
                    *state = GatewayState::Stopped;
                    return Ok(());
                }
                GatewayState::ShuttingDown | GatewayState::Stopped => return Ok(()),
                GatewayState::Starting => {
                    return Err(GatewayError::InvalidState(
                        "cannot shut down a gateway that is still starting".to_string(),
                    ));
                }
                GatewayState::Running => *state = GatewayState::ShuttingDown,
            }
        }

        let started = Instant::now();
        info!(timeout_ms = deadline.as_millis(), "gateway shutting down");

        let mut result = Ok(());
        if let Some(running) = self.running.lock().await.take() {
            running.background.cancel();
            for task in running.tasks {
                if let Err(e) = task.await {
                    warn!(error = %e, "background task terminated abnormally");
                }
            }

            running.server.shutdown(deadline).await;

            let remaining = deadline.saturating_sub(started.elapsed());
            if let Err(e) = self.binding.shutdown(remaining).await {
                warn!(error = %e, "binding shutdown failed");
                result = Err(e);
            }
        }

        self.set_state(GatewayState::Stopped);
        info!("gateway stopped");
        result
    }

    /// Re-reads the TLS certificate and key. The current certificate stays
    /// active if the new material does not load.
    pub async fn reload_tls(&self) -> Result<()> {
        let running = self.running.lock().await;
        let reloader = running
            .as_ref()
            .ok_or_else(|| GatewayError::InvalidState("gateway is not running".to_string()))?
            .tls
            .as_ref()
            .ok_or_else(|| GatewayError::Tls("TLS is not enabled".to_string()))?;
        reloader.reload()
    }
}

fn spawn_cleanup(
    limiter: Arc<IdentityRateLimiter>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let every = every.clamp(Duration::from_secs(1), Duration::from_secs(MAX_DURATION_SECS));
    tokio::spawn(async move {
        let mut ticker = interval_at(tokio::time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = limiter.cleanup();
                    if removed > 0 {
                        debug!(removed, remaining = limiter.len(), "swept stale authentication records");
                    }
                }
            }
        }
        debug!("authentication record sweep stopped");
    })
}
