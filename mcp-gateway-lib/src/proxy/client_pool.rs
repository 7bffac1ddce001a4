use std::sync::Arc;
use std::time::Duration;

use hyper::body::Body;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

pub type HttpClient<B> = Client<HttpConnector, B>;

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const DEFAULT_MAX_IDLE_PER_HOST: usize = 32;

/// Shared plain-HTTP/1.1 client for loopback and probe traffic
///
/// Connections to the upstream are kept alive and reused across requests.
pub struct ClientPool<B> {
    client: Arc<HttpClient<B>>,
}

impl<B> Clone for ClientPool<B> {
    fn clone(&self) -> Self {
        Self { client: Arc::clone(&self.client) }
    }
}

impl<B> ClientPool<B>
where
    B: Body + Send + 'static,
    B::Data: Send,
{
    pub fn new(idle_timeout: Duration, max_idle_per_host: usize) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);

        let mut builder = Client::builder(TokioExecutor::new());
        builder.pool_idle_timeout(idle_timeout);
        if max_idle_per_host > 0 {
            builder.pool_max_idle_per_host(max_idle_per_host);
        }

        Self { client: Arc::new(builder.build(connector)) }
    }

    pub fn client(&self) -> &Arc<HttpClient<B>> {
        &self.client
    }
}

impl<B> Default for ClientPool<B>
where
    B: Body + Send + 'static,
    B::Data: Send,
{
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_IDLE_PER_HOST)
    }
}
