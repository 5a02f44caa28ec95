//! Upstream DoH endpoints and their health tracking

pub mod client;
pub mod health_check;
pub mod protocol;
pub mod weight;

pub use client::{ProbeClient, ProbeResponse, ProbeTransport};
pub use health_check::HealthChecker;
pub use protocol::{lookup, DohProtocol, JsonQuery, WireBinary};

use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};

/// One configured upstream resolver
///
/// Identity, protocol and static weight never change after registration.
/// The effective weight moves within `[0, weight]` as probes and reports
/// come in; it is safe to adjust from any thread.
pub struct Upstream {
    protocol: &'static dyn DohProtocol,
    address: String,
    weight: i32,
    effective_weight: AtomicI32,
}

impl Upstream {
    pub(crate) fn new(address: String, protocol: &'static dyn DohProtocol, weight: i32) -> Self {
        Self {
            protocol,
            address,
            weight,
            effective_weight: AtomicI32::new(weight),
        }
    }

    /// Kind name, e.g. `google` or `ietf`
    pub fn kind(&self) -> &'static str {
        self.protocol.name()
    }

    pub fn protocol(&self) -> &'static dyn DohProtocol {
        self.protocol
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Content type real queries to this upstream must use
    pub fn request_type(&self) -> &'static str {
        self.protocol.content_type()
    }

    /// Static weight, the ceiling of the effective weight
    pub fn weight(&self) -> i32 {
        self.weight
    }

    pub fn effective_weight(&self) -> i32 {
        self.effective_weight.load(Ordering::Acquire)
    }

    /// Apply a weight delta, clamped into `[0, weight]`. Returns the new value.
    pub fn adjust(&self, delta: i32) -> i32 {
        weight::adjust(&self.effective_weight, delta, self.weight)
    }
}

impl fmt::Debug for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upstream")
            .field("kind", &self.kind())
            .field("address", &self.address)
            .field("weight", &self.weight)
            .field("effective_weight", &self.effective_weight())
            .finish()
    }
}
