//! Processed-file audit trail in DynamoDB

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_dynamodb::{error::DisplayErrorContext, types::AttributeValue, Client};
use std::collections::HashMap;
use tracing::instrument;

use crate::error::AuditError;
use crate::staging::StagingObject;

/// One row of the audit table, keyed by `file_name`
///
/// A repeated file name overwrites the earlier row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub file_name: String,
    pub bucket_name: String,
    /// Kilobytes as a decimal string, see [`format_kilobytes`]
    pub file_size: String,
    pub file_etag: String,
}

impl AuditRecord {
    pub fn from_object(object: &StagingObject) -> Self {
        Self {
            file_name: object.key.clone(),
            bucket_name: object.bucket.clone(),
            file_size: format_kilobytes(object.size),
            file_etag: object.etag.clone(),
        }
    }

    /// All attributes are stored as DynamoDB strings
    pub fn to_item(&self) -> HashMap<String, AttributeValue> {
        HashMap::from([
            ("file_name".to_string(), AttributeValue::S(self.file_name.clone())),
            ("bucket_name".to_string(), AttributeValue::S(self.bucket_name.clone())),
            ("file_size".to_string(), AttributeValue::S(self.file_size.clone())),
            ("file_etag".to_string(), AttributeValue::S(self.file_etag.clone())),
        ])
    }
}

/// `bytes / 1000` with no rounding, always carrying a fractional part
///
/// `500000 -> "500.0"`, `1500 -> "1.5"`, `1234 -> "1.234"`.
pub fn format_kilobytes(bytes: i64) -> String {
    let kilobytes = bytes as f64 / 1000.0;
    let mut rendered = kilobytes.to_string();
    if !rendered.contains('.') {
        rendered.push_str(".0");
    }
    rendered
}

/// Write-only sink for audit records
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn put_record(&self, table: &str, record: &AuditRecord) -> Result<(), AuditError>;
}

/// [`AuditStore`] backed by DynamoDB `PutItem`
pub struct DynamoAuditStore {
    client: Client,
}

impl DynamoAuditStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_sdk_config(sdk_config: &SdkConfig) -> Self {
        Self::new(Client::new(sdk_config))
    }
}

#[async_trait]
impl AuditStore for DynamoAuditStore {
    #[instrument(skip(self, record), fields(file_name = %record.file_name))]
    async fn put_record(&self, table: &str, record: &AuditRecord) -> Result<(), AuditError> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(record.to_item()))
            .send()
            .await
            .map_err(|e| AuditError::Put {
                table: table.to_string(),
                file_name: record.file_name.clone(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(())
    }
}
