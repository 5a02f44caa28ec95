use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Outcome of a real query, reported back by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamStatus {
    Timeout,
    Error,
    Ok,
}

impl UpstreamStatus {
    pub fn delta(self) -> i32 {
        match self {
            UpstreamStatus::Timeout => -10,
            UpstreamStatus::Error => -5,
            UpstreamStatus::Ok => 2,
        }
    }
}

// Classification of a single health probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeVerdict {
    /// Upstream answered the probe correctly
    Healthy,
    /// HTTP status other than 200
    ServerError,
    /// 200 but the body did not validate
    Invalid,
    /// No response received
    TransportFailed,
    /// The probe request could not be built
    Malformed,
}

impl ProbeVerdict {
    pub fn delta(self) -> i32 {
        match self {
            ProbeVerdict::Healthy => 5,
            ProbeVerdict::ServerError => -5,
            ProbeVerdict::Invalid => -1,
            ProbeVerdict::TransportFailed => -10,
            ProbeVerdict::Malformed => -10,
        }
    }

    pub fn is_healthy(self) -> bool {
        self == ProbeVerdict::Healthy
    }
}

// Result of probing one upstream, kept for logging and callers of a round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    pub address: String,
    pub kind: String,
    pub verdict: ProbeVerdict,
    pub status_code: Option<u16>,
    pub error: Option<String>,
    pub latency_ms: u64,
    pub effective_weight: i32,
    pub timestamp: DateTime<Utc>,
}
