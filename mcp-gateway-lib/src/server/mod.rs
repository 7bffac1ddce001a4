pub mod connection;
pub mod gateway;
pub mod listener;
pub mod router;
pub mod signal;

pub use gateway::{Gateway, GatewayState, HEALTH_PATH, STATUS_PATH};
pub use listener::{serve, ServeOptions, ServerHandle, SharedAcceptor};
pub use router::Router;
pub use signal::shutdown_signal;
