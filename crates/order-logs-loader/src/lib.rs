//! Order Logs Loader
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Loads staged order log files into Redshift and clears the staging area.
//!
//! # Stages
//!
//! - **Credentials**: warehouse login from Secrets Manager
//! - **Staging**: one listing of the S3 staging bucket
//! - **Warehouse**: a transactional `COPY` of the whole bucket
//! - **Audit and purge**: a DynamoDB row per file, then the file is deleted
//!
//! # Example
//!
//! ```no_run
//! use order_logs_loader::{OrderLogsPipeline, PipelineConfig, PipelineServices};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::load()?;
//!     let services = PipelineServices::from_config(&config).await;
//!     let report = OrderLogsPipeline::new(config, services).run().await?;
//!     println!("purged {} of {} files", report.purged(), report.listed());
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod config;
pub mod credentials;
pub mod error;
pub mod pipeline;
pub mod staging;
pub mod warehouse;

pub use config::{PipelineConfig, PurgePolicy};
pub use error::PipelineError;
pub use pipeline::{
    LoadOutcome, ObjectOutcome, ObjectReport, OrderLogsPipeline, PipelineServices, RunReport,
};
