#![forbid(unsafe_code)]

pub mod binding;
pub mod config;
pub mod engine;
pub mod error;
pub mod proxy;
pub mod security;
pub mod server;
pub mod telemetry;
pub mod tls;

pub use binding::{Binding, DirectBinding, ProxiedBinding};
pub use config::{load_from_path, GatewayConfig, Transport};
pub use engine::{BasicEngine, EngineOptions, ListeningEngine, LoopbackEngine, RequestHandler};
pub use error::{GatewayError, Result};
pub use security::{client_identity, AuthMiddleware, IdentityRateLimiter};
pub use server::{shutdown_signal, Gateway, GatewayState};
pub use telemetry::init_tracing;
