//! Long-running selector with background probing

use anyhow::Result;
use clap::Args;
use std::future::Future;
use std::time::Duration;
use tracing::info;

use crate::config::SelectorConfig;
use crate::selector::WeightRoundRobinSelector;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Number of upcoming picks to show after every probe interval
    #[arg(long, default_value = "10")]
    pub picks: usize,
}

impl RunArgs {
    /// Probe in the background and report weights until Ctrl-C
    pub async fn execute(&self, config: &SelectorConfig) -> Result<()> {
        let mut selector = WeightRoundRobinSelector::from_config(config)?;

        info!("📋 Selector Configuration:");
        info!("   Upstreams: {}", selector.len());
        info!("   Request timeout: {}s", config.request_timeout_secs);
        info!("   Probe interval: {}s", config.probe_interval_secs);

        selector.start_probing()?;
        let period = selector.probe_interval();
        self.report_until(&mut selector, period, tokio::signal::ctrl_c())
            .await;

        info!("🛑 Stopping health probing");
        selector.stop_probing().await;
        Ok(())
    }

    /// Report once per `period` until `shutdown` resolves
    async fn report_until<F: Future>(
        &self,
        selector: &mut WeightRoundRobinSelector,
        period: Duration,
        shutdown: F,
    ) {
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => self.report(selector),
            }
        }
    }

    fn report(&self, selector: &mut WeightRoundRobinSelector) {
        for upstream in selector.upstreams() {
            info!(
                "   {} [{}] weight {}/{}",
                upstream.address(),
                upstream.kind(),
                upstream.effective_weight(),
                upstream.weight()
            );
        }

        let preview: Vec<String> = (0..self.picks)
            .filter_map(|_| selector.get())
            .map(|upstream| upstream.address().to_string())
            .collect();
        info!("   Next picks: {}", preview.join(", "));
    }
}
