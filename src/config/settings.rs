//! Upstream selector configuration settings

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::Error;

/// Main configuration for the upstream selector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Log level configuration
    pub log_level: String,

    /// Request timeout in seconds, applied to every probe
    pub request_timeout_secs: u64,

    /// Seconds between two health probe rounds
    pub probe_interval_secs: u64,

    /// Upstream resolvers, in selection tie-break order
    pub upstreams: Vec<UpstreamConfig>,
}

/// One upstream resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// DoH endpoint URL
    pub url: String,

    /// Request format: "google" (JSON) or "ietf" (RFC 8484)
    #[serde(alias = "type")]
    pub kind: String,

    /// Static weight, must be positive
    pub weight: i32,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            request_timeout_secs: 5,
            probe_interval_secs: 15,
            upstreams: Vec::new(),
        }
    }
}

impl SelectorConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: SelectorConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Load configuration from YAML file with environment variable overrides
    pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !path.as_ref().exists() {
            return Err(anyhow::anyhow!(
                "Config file '{}' not found",
                path.as_ref().display()
            ));
        }

        let mut config = Self::from_yaml_file(path)?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Override settings from `RUST_LOG`, `DOH_REQUEST_TIMEOUT` and `DOH_PROBE_INTERVAL`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(log_level) = lookup("RUST_LOG") {
            self.log_level = log_level;
        }

        if let Some(timeout) = lookup("DOH_REQUEST_TIMEOUT") {
            if let Ok(timeout) = timeout.parse() {
                self.request_timeout_secs = timeout;
            }
        }

        if let Some(interval) = lookup("DOH_PROBE_INTERVAL") {
            if let Ok(interval) = interval.parse() {
                self.probe_interval_secs = interval;
            }
        }
    }

    /// Reject settings the selector cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be positive".into()));
        }
        if self.probe_interval_secs == 0 {
            return Err(Error::Config("probe_interval_secs must be positive".into()));
        }
        if self.upstreams.is_empty() {
            return Err(Error::Config("at least one upstream is required".into()));
        }
        if let Some(upstream) = self.upstreams.iter().find(|u| u.weight <= 0) {
            return Err(Error::InvalidWeight(upstream.weight));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
log_level: debug
request_timeout_secs: 3
upstreams:
  - url: https://dns.google/resolve
    type: google
    weight: 20
  - url: https://cloudflare-dns.com/dns-query
    kind: ietf
    weight: 10
"#;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = SelectorConfig::default();
        assert_eq!(config.probe_interval(), Duration::from_secs(15));
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert!(config.upstreams.is_empty());
    }

    #[test]
    fn test_from_yaml_file() {
        let file = write_config(SAMPLE);
        let config = SelectorConfig::from_yaml_file(file.path()).unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.request_timeout_secs, 3);
        assert_eq!(config.probe_interval_secs, 15);
        assert_eq!(config.upstreams.len(), 2);
        assert_eq!(config.upstreams[0].kind, "google");
        assert_eq!(config.upstreams[1].kind, "ietf");
        assert_eq!(config.upstreams[1].weight, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file() {
        assert!(SelectorConfig::load_config("/nonexistent/doh.yml").is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = SelectorConfig::default();
        let env: HashMap<&str, &str> = [
            ("DOH_REQUEST_TIMEOUT", "9"),
            ("DOH_PROBE_INTERVAL", "not-a-number"),
            ("RUST_LOG", "trace"),
        ]
        .into_iter()
        .collect();

        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.request_timeout_secs, 9);
        assert_eq!(config.probe_interval_secs, 15);
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = SelectorConfig::default();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.upstreams.push(UpstreamConfig {
            url: "https://dns.google/resolve".into(),
            kind: "google".into(),
            weight: -1,
        });
        assert!(matches!(config.validate(), Err(Error::InvalidWeight(-1))));

        config.upstreams[0].weight = 5;
        config.probe_interval_secs = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
