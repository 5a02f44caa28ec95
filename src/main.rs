//! CLI entry point for the DoH upstream selector

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use doh_selector::{
    cli::{ProbeArgs, RunArgs},
    init_logger_with_env, log_error, log_info, SelectorConfig,
};
use std::path::PathBuf;
use tokio::runtime::Builder;

#[derive(Parser)]
#[command(name = "doh-selector")]
#[command(about = "Health-weighted selection of DNS-over-HTTPS upstreams")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the YAML configuration file
    #[arg(short, long, global = true, default_value = "config.yml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe every upstream once and print the results
    #[command(name = "probe")]
    Probe(ProbeArgs),

    /// Keep probing in the background and report weights periodically
    #[command(name = "run")]
    Run(RunArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = SelectorConfig::load_config(&cli.config)?;

    // CLI flags take precedence over the config file and RUST_LOG
    let level = if cli.verbose {
        "debug".to_string()
    } else {
        cli.log_level.clone().unwrap_or_else(|| config.log_level.clone())
    };
    std::env::set_var("RUST_LOG", &level);
    init_logger_with_env();

    log_info!("🚀 Starting doh-selector {}", env!("CARGO_PKG_VERSION"));

    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create multi-threaded runtime")?;

    let result = runtime.block_on(async {
        match &cli.command {
            Commands::Probe(args) => args.execute(&config).await,
            Commands::Run(args) => args.execute(&config).await,
        }
    });

    if let Err(e) = &result {
        log_error!("Command failed: {:#}", e);
    }
    result
}
