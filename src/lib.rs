//! DoH upstream selector - health-weighted smooth round robin over
//! DNS-over-HTTPS resolvers
//!
//! Upstreams are registered once, probed periodically in the background and
//! picked with smooth weighted round robin. Probe verdicts and reported query
//! outcomes move each upstream's effective weight within `[0, weight]`, so
//! traffic drifts away from degraded resolvers without ever dropping them.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod selector;
pub mod upstream;
pub mod utils;

// Re-export commonly used items
pub use config::{SelectorConfig, UpstreamConfig};
pub use error::{Error, Result};
pub use logging::init_logger_with_env;
pub use models::{ProbeReport, ProbeVerdict, UpstreamStatus};
pub use selector::{WeightRoundRobinSelector, DEFAULT_PROBE_INTERVAL};
pub use upstream::{DohProtocol, Upstream};
