use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use bytes::Bytes;
use hyper::body::{Body, Frame, SizeHint};

use crate::engine::RespBody;

/// Per-connection request activity, used to detect idle connections
#[derive(Debug)]
pub struct ConnectionActivity {
    started: Instant,
    in_flight: AtomicUsize,
    last_active_ms: AtomicU64,
}

impl ConnectionActivity {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            started: Instant::now(),
            in_flight: AtomicUsize::new(0),
            last_active_ms: AtomicU64::new(0),
        })
    }

    /// Marks a request as in flight until the returned guard is dropped
    pub fn begin(self: &Arc<Self>) -> ActivityGuard {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        self.touch();
        ActivityGuard(Arc::clone(self))
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Time since the last request started or finished
    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_active_ms.load(Ordering::Acquire));
        self.started.elapsed().saturating_sub(last)
    }

    fn touch(&self) {
        let now = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_active_ms.store(now, Ordering::Release);
    }
}

/// Guard to decrement the in-flight counter when a request completes
#[derive(Debug)]
pub struct ActivityGuard(Arc<ConnectionActivity>);

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        self.0.touch();
        self.0.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Response body that keeps its request counted as in flight until the
/// body has been fully sent or dropped
pub struct TrackedBody {
    inner: RespBody,
    _guard: ActivityGuard,
}

impl TrackedBody {
    pub fn new(inner: RespBody, guard: ActivityGuard) -> Self {
        Self { inner, _guard: guard }
    }
}

impl Body for TrackedBody {
    type Data = Bytes;
    type Error = hyper::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.get_mut().inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Resolves once the connection has had no request in flight for `idle`.
/// Never resolves when `idle` is `None`.
pub async fn idle_timeout(activity: Arc<ConnectionActivity>, idle: Option<Duration>) {
    let Some(idle) = idle else {
        return std::future::pending().await;
    };
    loop {
        let idle_for = activity.idle_for();
        if activity.in_flight() == 0 && idle_for >= idle {
            return;
        }
        let wait = if activity.in_flight() == 0 { idle.saturating_sub(idle_for) } else { idle };
        tokio::time::sleep(wait.max(Duration::from_millis(10))).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_tracks_in_flight_requests() {
        let activity = ConnectionActivity::new();
        let first = activity.begin();
        let second = activity.begin();
        assert_eq!(activity.in_flight(), 2);
        drop(first);
        assert_eq!(activity.in_flight(), 1);
        drop(second);
        assert_eq!(activity.in_flight(), 0);
    }

    #[tokio::test]
    async fn idle_timeout_waits_for_in_flight_requests() {
        let activity = ConnectionActivity::new();
        let guard = activity.begin();
        let watch = tokio::spawn(idle_timeout(Arc::clone(&activity), Some(Duration::from_millis(50))));

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(!watch.is_finished());

        drop(guard);
        let finished = tokio::time::timeout(Duration::from_secs(2), watch).await;
        assert!(finished.is_ok());
    }
}
