pub mod auth;
pub mod identity;
pub mod rate_limit;

pub use auth::{mask_secret, AuthError, AuthMiddleware, Authenticated};
pub use identity::client_identity;
pub use rate_limit::{AttemptRecord, IdentityRateLimiter};
