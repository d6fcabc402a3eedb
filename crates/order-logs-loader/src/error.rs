//! Error types for the loader
//!
//! One enum per external collaborator. Only [`PipelineError`] ends a run;
//! everything else is recorded in the run report and the run carries on.

use thiserror::Error;

/// Secret store failures
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Failed to fetch secret {secret_id}: {message}")]
    Fetch { secret_id: String, message: String },

    #[error("Secret {0} has no string value")]
    MissingSecretString(String),

    /// Not JSON, or one of `username`/`password`/`host` is absent
    #[error("Malformed secret payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Warehouse connection and statement failures
#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("Failed to connect to {host}:{port}/{database}: {source}")]
    Connect {
        host: String,
        port: u16,
        database: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Load statement failed: {0}")]
    Statement(#[source] sqlx::Error),
}

/// Object store failures
#[derive(Error, Debug)]
pub enum StagingError {
    #[error("Failed to list objects in {bucket}: {message}")]
    List { bucket: String, message: String },

    #[error("Failed to delete s3://{bucket}/{key}: {message}")]
    Delete {
        bucket: String,
        key: String,
        message: String,
    },
}

/// Audit table failures
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Failed to write audit entry for {file_name} to {table}: {message}")]
    Put {
        table: String,
        file_name: String,
        message: String,
    },
}

/// Failures that halt the run before any audit or delete activity
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Credential retrieval failed: {0}")]
    Credentials(#[from] CredentialError),

    #[error("Staging listing failed: {0}")]
    Listing(#[source] StagingError),
}
