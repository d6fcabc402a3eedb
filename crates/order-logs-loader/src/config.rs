//! Run configuration
//!
//! Defaults reproduce the production job; each field can be overridden from
//! the environment (or a `.env` file) for other accounts and local stacks.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Defaults
// ============================================================================

/// Secrets Manager entry holding the cluster credentials.
pub const DEFAULT_SECRET_ID: &str = "order-logs-cluster-details";

/// Region the secret lives in.
pub const DEFAULT_SECRET_REGION: &str = "us-east-1";

/// Warehouse database name.
pub const DEFAULT_DATABASE: &str = "dev";

/// Redshift listens on 5439 rather than the Postgres default.
pub const DEFAULT_DATABASE_PORT: u16 = 5439;

/// Bucket holding files awaiting ingestion.
pub const DEFAULT_STAGING_BUCKET: &str = "order-logs-staging-area";

/// Table the COPY loads into.
pub const DEFAULT_DESTINATION_TABLE: &str = "main_data.order_logs";

/// Role the cluster assumes to read the staging bucket.
pub const DEFAULT_IAM_ROLE: &str = "arn:aws:iam::100163808729:role/order-logs-cluster-iam-role";

/// DynamoDB table recording processed files.
pub const DEFAULT_AUDIT_TABLE: &str = "order-logs-files-processed";

/// Warehouse connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Whether staged files are audited and purged when the load fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PurgePolicy {
    /// Audit and purge every listed object regardless of the load outcome
    #[default]
    Always,
    /// Leave every object in staging when the load failed
    AfterSuccessfulLoad,
}

impl FromStr for PurgePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "always" => Ok(PurgePolicy::Always),
            "after-successful-load" | "after-load" => Ok(PurgePolicy::AfterSuccessfulLoad),
            _ => Err(anyhow::anyhow!("Invalid purge policy: {}", s)),
        }
    }
}

impl std::fmt::Display for PurgePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PurgePolicy::Always => f.write_str("always"),
            PurgePolicy::AfterSuccessfulLoad => f.write_str("after-successful-load"),
        }
    }
}

/// Everything a run needs besides the credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub secret_id: String,
    pub secret_region: String,
    pub database: String,
    pub port: u16,
    pub staging_bucket: String,
    pub destination_table: String,
    pub iam_role: String,
    pub audit_table: String,
    pub purge_policy: PurgePolicy,

    /// Endpoint override for every AWS client (LocalStack, MinIO)
    pub aws_endpoint: Option<String>,

    pub connect_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            secret_id: DEFAULT_SECRET_ID.to_string(),
            secret_region: DEFAULT_SECRET_REGION.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            port: DEFAULT_DATABASE_PORT,
            staging_bucket: DEFAULT_STAGING_BUCKET.to_string(),
            destination_table: DEFAULT_DESTINATION_TABLE.to_string(),
            iam_role: DEFAULT_IAM_ROLE.to_string(),
            audit_table: DEFAULT_AUDIT_TABLE.to_string(),
            purge_policy: PurgePolicy::default(),
            aws_endpoint: None,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from `.env`, the environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::default().merge_env()?;
        config.validate()?;

        Ok(config)
    }

    /// Overlay `ORDER_LOGS_*` variables on top of `self`
    pub fn merge_env(mut self) -> anyhow::Result<Self> {
        override_string(&mut self.secret_id, "ORDER_LOGS_SECRET_ID");
        override_string(&mut self.secret_region, "ORDER_LOGS_SECRET_REGION");
        override_string(&mut self.database, "ORDER_LOGS_DB_NAME");
        override_string(&mut self.staging_bucket, "ORDER_LOGS_STAGING_BUCKET");
        override_string(&mut self.destination_table, "ORDER_LOGS_DESTINATION_TABLE");
        override_string(&mut self.iam_role, "ORDER_LOGS_IAM_ROLE");
        override_string(&mut self.audit_table, "ORDER_LOGS_AUDIT_TABLE");
        override_parsed(&mut self.port, "ORDER_LOGS_DB_PORT")?;
        override_parsed(&mut self.connect_timeout_secs, "ORDER_LOGS_DB_CONNECT_TIMEOUT")?;
        override_parsed(&mut self.purge_policy, "ORDER_LOGS_PURGE_POLICY")?;

        if let Ok(endpoint) = std::env::var("ORDER_LOGS_AWS_ENDPOINT") {
            self.aws_endpoint = Some(endpoint);
        }

        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let required = [
            ("secret_id", &self.secret_id),
            ("secret_region", &self.secret_region),
            ("database", &self.database),
            ("staging_bucket", &self.staging_bucket),
            ("destination_table", &self.destination_table),
            ("iam_role", &self.iam_role),
            ("audit_table", &self.audit_table),
        ];

        for (name, value) in required {
            if value.trim().is_empty() {
                anyhow::bail!("Configuration value {} cannot be empty", name);
            }
        }

        if self.port == 0 {
            anyhow::bail!("Warehouse port must be greater than 0");
        }

        if self.connect_timeout_secs == 0 {
            anyhow::bail!("Warehouse connect timeout must be greater than 0");
        }

        Ok(())
    }

    /// COPY source covering every object in the staging bucket
    pub fn staging_uri(&self) -> String {
        format!("s3://{}/", self.staging_bucket)
    }
}

fn override_string(field: &mut String, var: &str) {
    if let Ok(value) = std::env::var(var) {
        *field = value;
    }
}

fn override_parsed<T>(field: &mut T, var: &str) -> anyhow::Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(raw) = std::env::var(var) {
        *field = raw
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {} ({})", var, raw, e))?;
    }
    Ok(())
}
