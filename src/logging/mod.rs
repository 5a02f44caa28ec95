use crate::models::ProbeReport;
use anyhow::Result;
use log::{debug, error, info, LevelFilter};
use std::sync::Once;
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

static INIT: Once = Once::new();

/// Initialize logger with environment variable support
/// Uses RUST_LOG environment variable for configuration
pub fn init_logger_with_env() {
    INIT.call_once(|| {
        let level = std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string())
            .parse::<LevelFilter>()
            .unwrap_or(LevelFilter::Info);

        log::set_max_level(level);

        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .with_target(false)
            .with_thread_names(true)
            .with_level(true)
            .with_ansi(true)
            .finish();

        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Warning: Failed to set tracing subscriber: {:?}", e);
        }

        if let Err(e) = LogTracer::init() {
            eprintln!("Warning: Failed to initialize LogTracer: {:?}", e);
        }
    });
}

/// Log a probe report as JSON at debug level
pub fn log_probe_report(report: &ProbeReport) -> Result<()> {
    let message = serde_json::to_string(report)?;
    debug!("PROBE: {}", message);
    Ok(())
}

/// Log an error message
pub fn log_error(message: &str) {
    error!("{}", message);
}

/// Log an info message
pub fn log_info(message: &str) {
    info!("{}", message);
}

/// Convenience macro for logging probe reports
#[macro_export]
macro_rules! log_probe {
    ($report:expr) => {
        if let Err(e) = $crate::logging::log_probe_report($report) {
            eprintln!("Failed to log probe report: {}", e);
        }
    };
}

/// Convenience macro for logging errors
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logging::log_error(&format!($($arg)*));
    };
}

/// Convenience macro for logging info messages
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logging::log_info(&format!($($arg)*));
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProbeVerdict;
    use crate::utils::now;

    #[test]
    fn test_report_serializes_for_logging() {
        init_logger_with_env();
        let report = ProbeReport {
            address: "https://dns.google/resolve".to_string(),
            kind: "google".to_string(),
            verdict: ProbeVerdict::Invalid,
            status_code: Some(200),
            error: Some("truncated".to_string()),
            latency_ms: 12,
            effective_weight: 4,
            timestamp: now(),
        };

        assert!(log_probe_report(&report).is_ok());
        // second init is a no-op
        init_logger_with_env();
    }
}
