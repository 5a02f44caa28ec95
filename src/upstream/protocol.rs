//! DNS-over-HTTPS request formats supported by upstreams
//!
//! Each upstream kind is a [`DohProtocol`] implementation: it knows its
//! content type, how to build the synthetic health probe, and how to turn the
//! probe's HTTP outcome into a [`ProbeVerdict`]. Adding a protocol means adding
//! one implementation and one entry in [`PROTOCOLS`].

use reqwest::StatusCode;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::models::ProbeVerdict;
use crate::utils::append_query;

/// Hostname every health probe resolves
pub const PROBE_HOST: &str = "www.example.com";

/// `www.example.com IN A` as a base64url DNS message (RFC 8484 GET form)
pub const WIRE_PROBE_QUERY: &str = "q80BAAABAAAAAAAAA3d3dwdleGFtcGxlA2NvbQAAAQAB";

pub const DNS_JSON_CONTENT_TYPE: &str = "application/dns-json";
pub const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";

/// Capability set of one upstream request format
pub trait DohProtocol: Send + Sync {
    /// Canonical kind name used in configuration
    fn name(&self) -> &'static str;

    /// Other accepted spellings of the kind name
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// Content type for both the accept header and real queries
    fn content_type(&self) -> &'static str;

    /// Full URL of the health probe for an upstream address
    fn probe_url(&self, address: &str) -> String;

    /// Whether `classify` needs the response body
    fn reads_body(&self) -> bool {
        false
    }

    fn classify(&self, status: StatusCode, body: &[u8]) -> ProbeVerdict;
}

/// JSON query API (`?name=...&type=...`), as served by Google Public DNS
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonQuery;

impl DohProtocol for JsonQuery {
    fn name(&self) -> &'static str {
        "google"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["json", "dns-json"]
    }

    fn content_type(&self) -> &'static str {
        DNS_JSON_CONTENT_TYPE
    }

    fn probe_url(&self, address: &str) -> String {
        append_query(address, &format!("name={}&type=A", PROBE_HOST))
    }

    fn reads_body(&self) -> bool {
        true
    }

    fn classify(&self, status: StatusCode, body: &[u8]) -> ProbeVerdict {
        if status != StatusCode::OK {
            return ProbeVerdict::ServerError;
        }

        let Ok(answer) = serde_json::from_slice::<Map<String, Value>>(body) else {
            return ProbeVerdict::Invalid;
        };

        match answer.get("status").and_then(Value::as_i64) {
            Some(0) => ProbeVerdict::Healthy,
            _ => ProbeVerdict::Invalid,
        }
    }
}

/// RFC 8484 binary DNS messages
///
/// Only the HTTP status is checked; the DNS message in the body is not parsed.
#[derive(Debug, Clone, Copy, Default)]
pub struct WireBinary;

impl DohProtocol for WireBinary {
    fn name(&self) -> &'static str {
        "ietf"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["wire", "dns-message", "rfc8484"]
    }

    fn content_type(&self) -> &'static str {
        DNS_MESSAGE_CONTENT_TYPE
    }

    fn probe_url(&self, address: &str) -> String {
        append_query(address, &format!("dns={}", WIRE_PROBE_QUERY))
    }

    fn classify(&self, status: StatusCode, _body: &[u8]) -> ProbeVerdict {
        if status == StatusCode::OK {
            ProbeVerdict::Healthy
        } else {
            ProbeVerdict::ServerError
        }
    }
}

/// Every supported upstream kind
pub static PROTOCOLS: [&dyn DohProtocol; 2] = [&JsonQuery, &WireBinary];

/// Resolve a kind name (case-insensitive, aliases included)
pub fn lookup(kind: &str) -> Result<&'static dyn DohProtocol> {
    let kind = kind.trim();
    PROTOCOLS
        .iter()
        .copied()
        .find(|protocol| {
            protocol.name().eq_ignore_ascii_case(kind)
                || protocol.aliases().iter().any(|alias| alias.eq_ignore_ascii_case(kind))
        })
        .ok_or_else(|| Error::UnknownUpstreamKind(kind.to_string()))
}
