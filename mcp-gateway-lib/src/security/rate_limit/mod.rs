//! Authentication attempt throttling.
//!
//! Failed bearer-token attempts are counted per client identity inside a
//! fixed window. Exceeding the allowance locks the identity out; a successful
//! authentication clears its history.
//!
//! ```toml
//! [rate_limit]
//! max_attempts = 5
//! window_secs = 60
//! lockout_secs = 300
//! cleanup_interval_secs = 600
//! ```

mod limiter;

pub use limiter::{AttemptRecord, IdentityRateLimiter};
