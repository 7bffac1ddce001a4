use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TlsConfig;
use crate::error::{GatewayError, Result};
use crate::server::listener::SharedAcceptor;
use crate::tls::acceptor::build_tls_acceptor;

/// Owns the live TLS acceptor and replaces it when certificates change
///
/// A reload builds and validates the new acceptor before swapping it in;
/// if anything fails the previous acceptor keeps serving.
pub struct TlsReloader {
    config: TlsConfig,
    current: SharedAcceptor,
}

impl TlsReloader {
    pub fn new(config: TlsConfig) -> Result<Self> {
        let initial = build_tls_acceptor(&config)?;
        Ok(Self { config, current: Arc::new(ArcSwap::from_pointee(initial)) })
    }

    pub fn acceptor(&self) -> SharedAcceptor {
        Arc::clone(&self.current)
    }

    pub fn reload(&self) -> Result<()> {
        let acceptor = build_tls_acceptor(&self.config)?;
        self.current.store(Arc::new(acceptor));
        info!(cert = %self.config.cert_path, "TLS certificate reloaded");
        Ok(())
    }

    /// Reloads whenever the certificate or key file changes, until `cancel`
    pub fn watch(self: Arc<Self>, cancel: CancellationToken) -> Result<JoinHandle<()>> {
        let targets = [PathBuf::from(&self.config.cert_path), PathBuf::from(&self.config.key_path)];
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        let watched = targets.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !matches!(event.kind, EventKind::Access(_)) && touches_any(&event, &watched) {
                    let _ = tx.send(());
                }
            }
            Err(e) => warn!(error = %e, "certificate watcher error"),
        })
        .map_err(|e| GatewayError::Tls(format!("Failed to create certificate watcher: {e}")))?;

        // Watch the parent directories so atomic replace-by-rename is seen.
        let mut dirs: Vec<PathBuf> = targets.iter().map(|p| parent_dir(p)).collect();
        dirs.dedup();
        for dir in &dirs {
            watcher.watch(dir, RecursiveMode::NonRecursive).map_err(|e| {
                GatewayError::Tls(format!("Failed to watch {}: {e}", dir.display()))
            })?;
        }

        let delay = self.config.watch_delay();
        info!(cert = %self.config.cert_path, key = %self.config.key_path, "watching TLS files for changes");

        Ok(tokio::spawn(async move {
            let _watcher: RecommendedWatcher = watcher;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = rx.recv() => {
                        if changed.is_none() {
                            break;
                        }
                        sleep(delay).await;
                        while rx.try_recv().is_ok() {}
                        if let Err(e) = self.reload() {
                            warn!(error = %e, "certificate reload failed, keeping current certificate");
                        }
                    }
                }
            }
            debug!("certificate watcher stopped");
        }))
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn touches_any(event: &Event, targets: &[PathBuf]) -> bool {
    event.paths.iter().any(|changed| {
        targets
            .iter()
            .any(|target| changed.file_name().is_some() && changed.file_name() == target.file_name())
    })
}
