//! Time utility functions

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Get current timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert duration to milliseconds
pub fn duration_to_ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}
