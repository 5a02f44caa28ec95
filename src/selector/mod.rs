//! Smooth weighted round-robin selection over health-weighted upstreams
//!
//! The selector owns the upstream registry. Registration happens up front;
//! once probing starts the registry is frozen and only the upstreams'
//! effective weights move. Selection follows nginx's smooth WRR: every call
//! adds each effective weight to that upstream's current weight, picks the
//! largest (earliest registered on ties) and charges the winner the total.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SelectorConfig;
use crate::error::{Error, Result};
use crate::models::{ProbeReport, UpstreamStatus};
use crate::upstream::{lookup, HealthChecker, ProbeClient, ProbeTransport, Upstream};

/// Interval between two probe rounds unless configured otherwise
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(15);

struct Prober {
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

/// Picks the upstream for the next query
///
/// [`get`](Self::get) takes `&mut self`: the scheduling state is not
/// synchronized, so dispatchers sharing a selector across tasks must wrap it
/// in a mutex. Weight reports only need `&self`.
pub struct WeightRoundRobinSelector {
    upstreams: Vec<Arc<Upstream>>,
    // smooth WRR accumulators, parallel to `upstreams`
    current_weights: Vec<i64>,
    transport: Arc<dyn ProbeTransport>,
    probe_interval: Duration,
    prober: Option<Prober>,
}

impl WeightRoundRobinSelector {
    /// Create an empty selector whose probes time out after `request_timeout`
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = ProbeClient::new(request_timeout)?;
        Ok(Self::with_transport(Arc::new(client)))
    }

    /// Create an empty selector probing through a custom transport
    pub fn with_transport(transport: Arc<dyn ProbeTransport>) -> Self {
        Self {
            upstreams: Vec::new(),
            current_weights: Vec::new(),
            transport,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            prober: None,
        }
    }

    /// Build a selector from configuration and register every upstream in it
    pub fn from_config(config: &SelectorConfig) -> Result<Self> {
        let mut selector =
            Self::new(config.request_timeout())?.with_probe_interval(config.probe_interval());

        for upstream in &config.upstreams {
            selector.add(&upstream.url, &upstream.kind, upstream.weight)?;
        }

        Ok(selector)
    }

    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    pub fn probe_interval(&self) -> Duration {
        self.probe_interval
    }

    /// Register an upstream.
    ///
    /// Fails without touching the registry when the kind is unknown, the
    /// weight is not positive, or probing is running.
    pub fn add(&mut self, address: impl Into<String>, kind: &str, weight: i32) -> Result<()> {
        if self.prober.is_some() {
            return Err(Error::RegistryFrozen);
        }
        let protocol = lookup(kind)?;
        if weight <= 0 {
            return Err(Error::InvalidWeight(weight));
        }

        let upstream = Upstream::new(address.into(), protocol, weight);
        info!(
            "Registered upstream {} (type: {}, weight: {})",
            upstream.address(),
            upstream.kind(),
            weight
        );

        self.upstreams.push(Arc::new(upstream));
        self.current_weights.push(0);
        Ok(())
    }

    pub fn upstreams(&self) -> &[Arc<Upstream>] {
        &self.upstreams
    }

    pub fn len(&self) -> usize {
        self.upstreams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upstreams.is_empty()
    }

    /// Pick the upstream for the next query; `None` if none is registered.
    pub fn get(&mut self) -> Option<Arc<Upstream>> {
        let mut total: i64 = 0;
        let mut best: Option<usize> = None;

        for (i, upstream) in self.upstreams.iter().enumerate() {
            let effective_weight = i64::from(upstream.effective_weight());
            self.current_weights[i] += effective_weight;
            total += effective_weight;

            match best {
                Some(b) if self.current_weights[i] <= self.current_weights[b] => {}
                _ => best = Some(i),
            }
        }

        let best = best?;
        self.current_weights[best] -= total;
        Some(self.upstreams[best].clone())
    }

    /// Feed the outcome of a real query back into the upstream's weight.
    pub fn report_status(&self, upstream: &Upstream, status: UpstreamStatus) {
        let weight = upstream.adjust(status.delta());
        debug!(
            upstream = upstream.address(),
            status = ?status,
            weight,
            "upstream status reported"
        );
    }

    /// Launch background probing on the current tokio runtime.
    ///
    /// Calling it while probing is already running does nothing. Fails only
    /// when no runtime is available.
    pub fn start_probing(&mut self) -> Result<()> {
        if self.is_probing() {
            warn!("Health probing is already running");
            return Ok(());
        }

        tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Config(format!("Health probing needs a tokio runtime: {}", e)))?;

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = self.health_checker().start_with_shutdown(shutdown_rx);
        self.prober = Some(Prober { shutdown_tx, task });

        Ok(())
    }

    pub fn is_probing(&self) -> bool {
        self.prober
            .as_ref()
            .map_or(false, |prober| !prober.task.is_finished())
    }

    /// Stop background probing and wait for the task to exit.
    pub async fn stop_probing(&mut self) {
        let Some(prober) = self.prober.take() else {
            return;
        };

        // A send error only means the loop already exited.
        let _ = prober.shutdown_tx.send(());
        if let Err(e) = prober.task.await {
            warn!("Health checker task ended abnormally: {}", e);
        }
    }

    /// Run a single probe round in the foreground.
    pub async fn probe_once(&self) -> Vec<ProbeReport> {
        self.health_checker().check_all_upstreams().await
    }

    fn health_checker(&self) -> HealthChecker {
        HealthChecker::new(
            self.upstreams.clone(),
            self.transport.clone(),
            self.probe_interval,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProbeVerdict;
    use crate::upstream::ProbeResponse;
    use async_trait::async_trait;
    use bytes::Bytes;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every probe with the same status and body
    struct FixedTransport {
        status: u16,
        body: &'static str,
        calls: AtomicUsize,
    }

    impl FixedTransport {
        fn new(status: u16, body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                status,
                body,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ProbeTransport for FixedTransport {
        async fn fetch(&self, _url: &str, _accept: &str, _read_body: bool) -> Result<ProbeResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let body: &'static str = self.body;
            Ok(ProbeResponse {
                status: StatusCode::from_u16(self.status).unwrap(),
                body: Bytes::from_static(body.as_bytes()),
            })
        }
    }

    fn selector() -> WeightRoundRobinSelector {
        WeightRoundRobinSelector::with_transport(FixedTransport::new(200, ""))
    }

    fn picks(selector: &mut WeightRoundRobinSelector, n: usize) -> Vec<String> {
        (0..n)
            .map(|_| selector.get().unwrap().address().to_string())
            .collect()
    }

    #[test]
    fn test_smooth_wrr_cycle() {
        let mut selector = selector();
        selector.add("A", "google", 5).unwrap();
        selector.add("B", "ietf", 1).unwrap();
        selector.add("C", "ietf", 1).unwrap();

        let cycle = ["A", "A", "B", "A", "C", "A", "A"];
        for _ in 0..5 {
            assert_eq!(picks(&mut selector, 7), cycle);
        }
    }

    #[test]
    fn test_equal_weights_alternate() {
        let mut selector = selector();
        selector.add("A", "ietf", 3).unwrap();
        selector.add("B", "ietf", 3).unwrap();

        let seq = picks(&mut selector, 20);
        assert_eq!(seq[0], "A");
        assert!(seq.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn test_distribution_follows_effective_weights() {
        let mut selector = selector();
        selector.add("A", "ietf", 10).unwrap();
        selector.add("B", "google", 10).unwrap();
        selector.add("C", "ietf", 10).unwrap();

        let b = selector.upstreams()[1].clone();
        selector.report_status(&b, UpstreamStatus::Timeout);
        selector.report_status(&b, UpstreamStatus::Ok);
        selector.report_status(&b, UpstreamStatus::Ok);
        assert_eq!(b.effective_weight(), 4);

        // 24 = one full cycle of 10 + 4 + 10
        let seq = picks(&mut selector, 24);
        assert_eq!(seq.iter().filter(|p| *p == "A").count(), 10);
        assert_eq!(seq.iter().filter(|p| *p == "B").count(), 4);
        assert_eq!(seq.iter().filter(|p| *p == "C").count(), 10);
    }

    #[test]
    fn test_zero_weight_upstreams_stay_in_rotation() {
        let mut selector = selector();
        selector.add("A", "ietf", 5).unwrap();
        let a = selector.upstreams()[0].clone();
        selector.report_status(&a, UpstreamStatus::Timeout);
        assert_eq!(a.effective_weight(), 0);

        assert_eq!(selector.get().unwrap().address(), "A");
    }

    #[test]
    fn test_get_on_empty_registry() {
        let mut selector = selector();
        assert!(selector.get().is_none());
    }

    #[test]
    fn test_add_rejects_unknown_kind() {
        let mut selector = selector();
        selector.add("https://dns.google/resolve", "google", 10).unwrap();

        let err = selector.add("https://dns.quad9.net", "doq", 10).unwrap_err();
        assert!(matches!(err, Error::UnknownUpstreamKind(_)));
        assert_eq!(selector.len(), 1);
    }

    #[test]
    fn test_add_rejects_non_positive_weight() {
        let mut selector = selector();
        assert!(matches!(
            selector.add("https://dns.google/resolve", "google", 0),
            Err(Error::InvalidWeight(0))
        ));
        assert!(selector.is_empty());
    }

    #[test]
    fn test_add_exposes_request_type() {
        let mut selector = selector();
        selector.add("https://dns.google/resolve", "google", 10).unwrap();
        selector.add("https://cloudflare-dns.com/dns-query", "ietf", 10).unwrap();

        let upstreams = selector.upstreams();
        assert_eq!(upstreams[0].request_type(), "application/dns-json");
        assert_eq!(upstreams[1].request_type(), "application/dns-message");
        assert_eq!(upstreams[1].effective_weight(), 10);
    }

    #[test]
    fn test_report_status_sequence() {
        let mut selector = selector();
        selector.add("https://1.1.1.1/dns-query", "ietf", 10).unwrap();
        let upstream = selector.upstreams()[0].clone();
        upstream.adjust(-5);

        selector.report_status(&upstream, UpstreamStatus::Timeout);
        assert_eq!(upstream.effective_weight(), 0);
        selector.report_status(&upstream, UpstreamStatus::Ok);
        assert_eq!(upstream.effective_weight(), 2);
        selector.report_status(&upstream, UpstreamStatus::Error);
        assert_eq!(upstream.effective_weight(), 0);
    }

    #[test]
    fn test_ok_reports_saturate() {
        let mut selector = selector();
        selector.add("https://1.1.1.1/dns-query", "ietf", 9).unwrap();
        let upstream = selector.upstreams()[0].clone();
        upstream.adjust(-9);

        for n in 1..=10 {
            selector.report_status(&upstream, UpstreamStatus::Ok);
            assert_eq!(upstream.effective_weight(), (2 * n).min(9));
        }
    }

    #[test]
    fn test_concurrent_reports_keep_bound() {
        let mut selector = selector();
        selector.add("https://1.1.1.1/dns-query", "ietf", 50).unwrap();
        let selector = Arc::new(selector);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let selector = selector.clone();
                std::thread::spawn(move || {
                    let upstream = selector.upstreams()[0].clone();
                    for i in 0..5_000 {
                        let status = match (i + t) % 3 {
                            0 => UpstreamStatus::Timeout,
                            1 => UpstreamStatus::Error,
                            _ => UpstreamStatus::Ok,
                        };
                        selector.report_status(&upstream, status);
                        assert!((0..=50).contains(&upstream.effective_weight()));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[tokio::test]
    async fn test_probe_once_json_status_zero() {
        let transport = FixedTransport::new(200, r#"{"status": 0}"#);
        let mut selector = WeightRoundRobinSelector::with_transport(transport);
        selector.add("https://dns.google/resolve", "google", 10).unwrap();
        let upstream = selector.upstreams()[0].clone();
        upstream.adjust(-8);

        let reports = selector.probe_once().await;
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].verdict, ProbeVerdict::Healthy);
        assert_eq!(upstream.effective_weight(), 7);

        selector.probe_once().await;
        assert_eq!(upstream.effective_weight(), 10);
    }

    #[tokio::test]
    async fn test_probe_once_json_server_error() {
        let transport = FixedTransport::new(500, "");
        let mut selector = WeightRoundRobinSelector::with_transport(transport);
        selector.add("https://dns.google/resolve", "google", 10).unwrap();
        let upstream = selector.upstreams()[0].clone();
        upstream.adjust(-7);

        selector.probe_once().await;
        assert_eq!(upstream.effective_weight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probing_lifecycle() {
        let transport = FixedTransport::new(200, "");
        let mut selector = WeightRoundRobinSelector::with_transport(transport.clone())
            .with_probe_interval(Duration::from_secs(10));
        selector.add("https://1.1.1.1/dns-query", "ietf", 10).unwrap();

        selector.start_probing().unwrap();
        assert!(selector.is_probing());
        assert!(matches!(
            selector.add("https://8.8.8.8/dns-query", "ietf", 10),
            Err(Error::RegistryFrozen)
        ));

        // second start is a no-op
        selector.start_probing().unwrap();

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);

        selector.stop_probing().await;
        assert!(!selector.is_probing());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);

        // registry is open again once probing has stopped
        selector.add("https://8.8.8.8/dns-query", "ietf", 10).unwrap();
        assert_eq!(selector.len(), 2);
    }

    #[test]
    fn test_start_probing_without_runtime() {
        let mut selector = selector();
        selector.add("https://1.1.1.1/dns-query", "ietf", 10).unwrap();
        assert!(matches!(selector.start_probing(), Err(Error::Config(_))));
        assert!(!selector.is_probing());
    }
}
