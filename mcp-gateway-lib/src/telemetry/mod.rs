pub mod health;
pub mod probe;
pub mod status;
pub mod tracing;

pub use health::{health_check_response, HealthHandler};
pub use probe::{probe_downstream, DownstreamStatus, HealthProbe, HttpProbe, ProbeError};
pub use status::{StatusHandler, StatusReport, StatusReporter};
pub use self::tracing::init_tracing;
