pub mod client_pool;
pub mod forwarding;
pub mod headers;
pub mod http_result;
pub mod synthetic_response;

pub use client_pool::ClientPool;
pub use forwarding::ReverseProxy;
pub use http_result::{HttpError, HttpResult};
