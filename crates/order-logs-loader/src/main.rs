//! Order Logs Loader - batch entry point

use anyhow::{Context, Result};
use clap::Parser;
use order_logs_common::logging::{init_logging, LogConfig, LogLevel};
use order_logs_loader::{OrderLogsPipeline, PipelineConfig, PipelineServices, PurgePolicy};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "order-logs-loader")]
#[command(author, version, about = "Load staged order logs into Redshift and purge the staging bucket")]
struct Cli {
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Whether to audit and purge staged files when the load fails
    /// (always, after-successful-load); overrides ORDER_LOGS_PURGE_POLICY
    #[arg(long)]
    purge_policy: Option<PurgePolicy>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the builder defaults
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("order-logs-loader")
        .filter_directives("aws_config=warn,aws_smithy_runtime=warn,sqlx=warn")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    let mut config = PipelineConfig::load().context("Failed to load configuration")?;
    if let Some(policy) = cli.purge_policy {
        config.purge_policy = policy;
    }

    let services = PipelineServices::from_config(&config).await;
    let report = OrderLogsPipeline::new(config, services).run().await?;

    if report.is_clean() {
        info!("All staged files loaded, audited and purged");
    } else {
        warn!(
            loaded = report.load.is_loaded(),
            purged = report.purged(),
            listed = report.listed(),
            "Run finished with recovered failures; see log above"
        );
    }

    Ok(())
}
