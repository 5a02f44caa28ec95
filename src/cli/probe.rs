//! One-shot health probe of every configured upstream

use anyhow::Result;
use clap::Args;
use tracing::info;

use crate::config::SelectorConfig;
use crate::selector::WeightRoundRobinSelector;

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Pretty-print the JSON reports
    #[arg(long, default_value = "false")]
    pub pretty: bool,
}

impl ProbeArgs {
    /// Probe every upstream once and print the reports as JSON
    pub async fn execute(&self, config: &SelectorConfig) -> Result<()> {
        let selector = WeightRoundRobinSelector::from_config(config)?;
        info!("Probing {} upstreams", selector.len());

        let reports = selector.probe_once().await;
        let output = if self.pretty {
            serde_json::to_string_pretty(&reports)?
        } else {
            serde_json::to_string(&reports)?
        };
        println!("{}", output);

        let healthy = reports.iter().filter(|r| r.verdict.is_healthy()).count();
        info!("{} of {} upstreams healthy", healthy, reports.len());

        Ok(())
    }
}
