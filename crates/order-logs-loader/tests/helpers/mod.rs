//! In-memory stand-ins for the four pipeline collaborators
//!
//! Every fake appends to a shared [`CallLog`] so tests can assert on the
//! order of remote calls as well as their effects.

#![allow(dead_code)]

use async_trait::async_trait;
use order_logs_loader::audit::{AuditRecord, AuditStore};
use order_logs_loader::credentials::{Credentials, SecretStore};
use order_logs_loader::error::{AuditError, CredentialError, StagingError, WarehouseError};
use order_logs_loader::staging::{ObjectStore, StagingObject};
use order_logs_loader::warehouse::Warehouse;
use order_logs_loader::{PipelineConfig, PipelineServices};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

pub const SECRET_JSON: &str =
    r#"{"username":"loader","password":"pw","host":"cluster.example.com"}"#;

#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }

    pub fn contains_prefix(&self, prefix: &str) -> bool {
        self.entries().iter().any(|e| e.starts_with(prefix))
    }
}

pub fn staged(key: &str, size: i64) -> StagingObject {
    StagingObject {
        bucket: "order-logs-staging-area".to_string(),
        key: key.to_string(),
        size,
        etag: format!("\"etag-{}\"", key),
    }
}

// ============================================================================
// Secret store
// ============================================================================

pub struct FakeSecrets {
    log: CallLog,
    payload: Option<String>,
}

#[async_trait]
impl SecretStore for FakeSecrets {
    async fn fetch_secret(&self, secret_id: &str) -> Result<String, CredentialError> {
        self.log.push(format!("secret:{}", secret_id));
        self.payload.clone().ok_or_else(|| CredentialError::Fetch {
            secret_id: secret_id.to_string(),
            message: "ResourceNotFoundException".to_string(),
        })
    }
}

// ============================================================================
// Warehouse
// ============================================================================

pub struct FakeWarehouse {
    log: CallLog,
    fail: bool,
    pub executed: Mutex<Vec<(Credentials, String)>>,
}

#[async_trait]
impl Warehouse for FakeWarehouse {
    async fn execute_load(
        &self,
        credentials: &Credentials,
        statement: &str,
    ) -> Result<(), WarehouseError> {
        self.log.push("load");
        self.executed
            .lock()
            .unwrap()
            .push((credentials.clone(), statement.to_string()));
        if self.fail {
            Err(WarehouseError::Statement(sqlx::Error::Protocol(
                "S3ServiceException: Access Denied".to_string(),
            )))
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// Object store
// ============================================================================

pub struct FakeObjectStore {
    log: CallLog,
    fail_list: bool,
    fail_delete: HashSet<String>,
    pub objects: Mutex<Vec<StagingObject>>,
}

impl FakeObjectStore {
    pub fn remaining_keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .map(|o| o.key.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn list_objects(&self, bucket: &str) -> Result<Vec<StagingObject>, StagingError> {
        self.log.push("list");
        if self.fail_list {
            return Err(StagingError::List {
                bucket: bucket.to_string(),
                message: "NoSuchBucket".to_string(),
            });
        }
        Ok(self.objects.lock().unwrap().clone())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StagingError> {
        self.log.push(format!("delete:{}", key));
        if self.fail_delete.contains(key) {
            return Err(StagingError::Delete {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: "AccessDenied".to_string(),
            });
        }
        self.objects.lock().unwrap().retain(|o| o.key != key);
        Ok(())
    }
}

// ============================================================================
// Audit store
// ============================================================================

pub struct FakeAuditStore {
    log: CallLog,
    fail_for: HashSet<String>,
    pub rows: Mutex<BTreeMap<String, AuditRecord>>,
}

impl FakeAuditStore {
    pub fn row(&self, file_name: &str) -> Option<AuditRecord> {
        self.rows.lock().unwrap().get(file_name).cloned()
    }
}

#[async_trait]
impl AuditStore for FakeAuditStore {
    async fn put_record(&self, table: &str, record: &AuditRecord) -> Result<(), AuditError> {
        self.log.push(format!("audit:{}", record.file_name));
        if self.fail_for.contains(&record.file_name) {
            return Err(AuditError::Put {
                table: table.to_string(),
                file_name: record.file_name.clone(),
                message: "ProvisionedThroughputExceededException".to_string(),
            });
        }
        self.rows
            .lock()
            .unwrap()
            .insert(record.file_name.clone(), record.clone());
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Builder for a fully faked set of services
pub struct Harness {
    pub log: CallLog,
    pub secrets: Arc<FakeSecrets>,
    pub warehouse: Arc<FakeWarehouse>,
    pub staging: Arc<FakeObjectStore>,
    pub audit: Arc<FakeAuditStore>,
}

#[derive(Default)]
pub struct HarnessBuilder {
    objects: Vec<StagingObject>,
    secret: Option<Option<String>>,
    fail_load: bool,
    fail_list: bool,
    fail_audit: HashSet<String>,
    fail_delete: HashSet<String>,
}

impl HarnessBuilder {
    pub fn object(mut self, key: &str, size: i64) -> Self {
        self.objects.push(staged(key, size));
        self
    }

    pub fn secret(mut self, payload: Option<&str>) -> Self {
        self.secret = Some(payload.map(str::to_string));
        self
    }

    pub fn fail_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub fn fail_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn fail_audit(mut self, key: &str) -> Self {
        self.fail_audit.insert(key.to_string());
        self
    }

    pub fn fail_delete(mut self, key: &str) -> Self {
        self.fail_delete.insert(key.to_string());
        self
    }

    pub fn build(self) -> Harness {
        let log = CallLog::default();
        let payload = self.secret.unwrap_or_else(|| Some(SECRET_JSON.to_string()));

        Harness {
            secrets: Arc::new(FakeSecrets {
                log: log.clone(),
                payload,
            }),
            warehouse: Arc::new(FakeWarehouse {
                log: log.clone(),
                fail: self.fail_load,
                executed: Mutex::new(Vec::new()),
            }),
            staging: Arc::new(FakeObjectStore {
                log: log.clone(),
                fail_list: self.fail_list,
                fail_delete: self.fail_delete,
                objects: Mutex::new(self.objects),
            }),
            audit: Arc::new(FakeAuditStore {
                log: log.clone(),
                fail_for: self.fail_audit,
                rows: Mutex::new(BTreeMap::new()),
            }),
            log,
        }
    }
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    pub fn services(&self) -> PipelineServices {
        PipelineServices {
            secrets: self.secrets.clone(),
            warehouse: self.warehouse.clone(),
            staging: self.staging.clone(),
            audit: self.audit.clone(),
        }
    }

    pub fn config(&self) -> PipelineConfig {
        PipelineConfig::default()
    }
}
