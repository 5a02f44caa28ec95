//! Periodic health probing of upstream resolvers

use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::client::ProbeTransport;
use super::Upstream;
use crate::error::Error;
use crate::log_probe;
use crate::models::{ProbeReport, ProbeVerdict};
use crate::utils::{duration_to_ms, now};

/// Probes every upstream once per interval and feeds the verdicts into
/// their effective weights.
///
/// A round fans out one probe per upstream and waits for all of them before
/// sleeping. Every probe resolves to a [`ProbeReport`] whatever happens to
/// its request, so a failing upstream can never hold up later rounds.
#[derive(Clone)]
pub struct HealthChecker {
    upstreams: Vec<Arc<Upstream>>,
    transport: Arc<dyn ProbeTransport>,
    check_interval: Duration,
}

impl HealthChecker {
    pub fn new(
        upstreams: Vec<Arc<Upstream>>,
        transport: Arc<dyn ProbeTransport>,
        check_interval: Duration,
    ) -> Self {
        Self {
            upstreams,
            transport,
            check_interval,
        }
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    /// Spawn the probing loop on the current runtime.
    ///
    /// The loop ends when a shutdown message arrives or every sender is
    /// dropped. A round in flight at that moment is abandoned.
    pub fn start_with_shutdown(
        &self,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let checker = self.clone();

        tokio::spawn(async move {
            info!(
                upstreams = checker.upstreams.len(),
                interval_secs = checker.check_interval.as_secs(),
                "health checker started"
            );

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => break,
                    reports = checker.check_all_upstreams() => {
                        let healthy = reports.iter().filter(|r| r.verdict.is_healthy()).count();
                        debug!(healthy, total = reports.len(), "probe round finished");
                    }
                }

                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(checker.check_interval) => {}
                }
            }

            info!("health checker shutting down");
        })
    }

    /// Run one probe round over every upstream.
    pub async fn check_all_upstreams(&self) -> Vec<ProbeReport> {
        join_all(
            self.upstreams
                .iter()
                .map(|upstream| self.check_upstream(upstream)),
        )
        .await
    }

    /// Probe a single upstream and apply the verdict to its weight.
    pub async fn check_upstream(&self, upstream: &Upstream) -> ProbeReport {
        let protocol = upstream.protocol();
        let url = protocol.probe_url(upstream.address());
        let started = Instant::now();

        let (verdict, status_code, error) = match self
            .transport
            .fetch(&url, protocol.content_type(), protocol.reads_body())
            .await
        {
            Ok(response) => {
                let verdict = protocol.classify(response.status, &response.body);
                let error = (verdict == ProbeVerdict::Invalid).then(|| {
                    Error::Validation(format!("unexpected {} answer", protocol.content_type()))
                        .to_string()
                });
                (verdict, Some(response.status.as_u16()), error)
            }
            Err(e @ Error::Protocol(_)) => (ProbeVerdict::Malformed, None, Some(e.to_string())),
            Err(e) => (ProbeVerdict::TransportFailed, None, Some(e.to_string())),
        };

        let effective_weight = upstream.adjust(verdict.delta());

        let report = ProbeReport {
            address: upstream.address().to_string(),
            kind: upstream.kind().to_string(),
            verdict,
            status_code,
            error,
            latency_ms: duration_to_ms(started.elapsed()),
            effective_weight,
            timestamp: now(),
        };

        if verdict.is_healthy() {
            debug!(
                upstream = %report.address,
                weight = effective_weight,
                latency_ms = report.latency_ms,
                "probe succeeded"
            );
        } else {
            warn!(
                upstream = %report.address,
                verdict = ?verdict,
                status = ?status_code,
                error = report.error.as_deref().unwrap_or(""),
                weight = effective_weight,
                "probe failed"
            );
        }
        log_probe!(&report);

        report
    }
}
