//! Order logs load pipeline
//!
//! Runs the four stages strictly in order:
//! 1. Fetch warehouse credentials (fatal on failure)
//! 2. List the staging bucket once (fatal on failure)
//! 3. COPY the staging bucket into the warehouse (failure is recorded)
//! 4. For each listed object: write the audit row, then delete the object
//!
//! Stage 4 isolates objects from each other: a failed audit write leaves that
//! object in staging and moves on, a failed delete is recorded and the audit
//! row stays. Whether stage 4 runs after a failed load is governed by
//! [`PurgePolicy`].

use aws_config::BehaviorVersion;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

use crate::audit::{AuditRecord, AuditStore, DynamoAuditStore};
use crate::config::{PipelineConfig, PurgePolicy};
use crate::credentials::{load_credentials, SecretStore, SecretsManagerStore};
use crate::error::{AuditError, PipelineError, StagingError, WarehouseError};
use crate::staging::{ObjectStore, S3ObjectStore, StagingObject};
use crate::warehouse::{CopyCommand, RedshiftWarehouse, Warehouse};

/// The external collaborators of a run
#[derive(Clone)]
pub struct PipelineServices {
    pub secrets: Arc<dyn SecretStore>,
    pub warehouse: Arc<dyn Warehouse>,
    pub staging: Arc<dyn ObjectStore>,
    pub audit: Arc<dyn AuditStore>,
}

impl PipelineServices {
    /// Production clients from the default AWS credential chain
    pub async fn from_config(config: &PipelineConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(endpoint) = &config.aws_endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        Self {
            secrets: Arc::new(SecretsManagerStore::from_sdk_config(
                &sdk_config,
                &config.secret_region,
            )),
            warehouse: Arc::new(RedshiftWarehouse::from_config(config)),
            staging: Arc::new(S3ObjectStore::from_sdk_config(
                &sdk_config,
                config.aws_endpoint.is_some(),
            )),
            audit: Arc::new(DynamoAuditStore::from_sdk_config(&sdk_config)),
        }
    }
}

/// Result of the COPY stage
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded,
    Failed(WarehouseError),
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded)
    }
}

/// What happened to one staged object
#[derive(Debug)]
pub enum ObjectOutcome {
    /// Audited and deleted from staging
    Purged,
    /// Audit write failed; delete was not attempted
    AuditFailed(AuditError),
    /// Audited, but the object is still in staging
    DeleteFailed(StagingError),
    /// Not touched because the load failed under [`PurgePolicy::AfterSuccessfulLoad`]
    Retained,
}

impl ObjectOutcome {
    pub fn is_audited(&self) -> bool {
        matches!(self, ObjectOutcome::Purged | ObjectOutcome::DeleteFailed(_))
    }

    pub fn is_purged(&self) -> bool {
        matches!(self, ObjectOutcome::Purged)
    }
}

#[derive(Debug)]
pub struct ObjectReport {
    pub object: StagingObject,
    pub outcome: ObjectOutcome,
}

/// Everything a completed run did, in listing order
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub load: LoadOutcome,
    pub objects: Vec<ObjectReport>,
}

impl RunReport {
    pub fn listed(&self) -> usize {
        self.objects.len()
    }

    pub fn purged(&self) -> usize {
        self.count(|o| o.is_purged())
    }

    pub fn audit_failures(&self) -> usize {
        self.count(|o| matches!(o, ObjectOutcome::AuditFailed(_)))
    }

    pub fn delete_failures(&self) -> usize {
        self.count(|o| matches!(o, ObjectOutcome::DeleteFailed(_)))
    }

    pub fn retained(&self) -> usize {
        self.count(|o| matches!(o, ObjectOutcome::Retained))
    }

    /// Load succeeded and every listed object was purged
    pub fn is_clean(&self) -> bool {
        self.load.is_loaded() && self.purged() == self.listed()
    }

    pub fn outcome_for(&self, key: &str) -> Option<&ObjectOutcome> {
        self.objects
            .iter()
            .find(|report| report.object.key == key)
            .map(|report| &report.outcome)
    }

    fn count(&self, predicate: impl Fn(&ObjectOutcome) -> bool) -> usize {
        self.objects.iter().filter(|r| predicate(&r.outcome)).count()
    }

    fn log_summary(&self) {
        let duration_ms = (self.finished_at - self.started_at).num_milliseconds();
        info!(
            run_id = %self.run_id,
            loaded = self.load.is_loaded(),
            listed = self.listed(),
            purged = self.purged(),
            audit_failures = self.audit_failures(),
            delete_failures = self.delete_failures(),
            retained = self.retained(),
            duration_ms,
            "Order logs run complete"
        );
    }
}

pub struct OrderLogsPipeline {
    config: PipelineConfig,
    services: PipelineServices,
}

impl OrderLogsPipeline {
    pub fn new(config: PipelineConfig, services: PipelineServices) -> Self {
        Self { config, services }
    }

    /// Execute one run
    ///
    /// Returns `Err` only for the fatal stages; every later failure is
    /// reported through the [`RunReport`].
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("order_logs_run", %run_id);
        self.run_stages(run_id).instrument(span).await
    }

    async fn run_stages(&self, run_id: Uuid) -> Result<RunReport, PipelineError> {
        let started_at = Utc::now();
        info!(
            bucket = %self.config.staging_bucket,
            table = %self.config.destination_table,
            purge_policy = %self.config.purge_policy,
            "Starting order logs run"
        );

        let credentials =
            load_credentials(self.services.secrets.as_ref(), &self.config.secret_id).await?;

        let statement = CopyCommand::from_config(&self.config).render();
        info!(%statement, "Prepared load statement");

        let objects = self
            .services
            .staging
            .list_objects(&self.config.staging_bucket)
            .await
            .map_err(PipelineError::Listing)?;

        let load = match self
            .services
            .warehouse
            .execute_load(&credentials, &statement)
            .await
        {
            Ok(()) => {
                info!(table = %self.config.destination_table, "Warehouse load completed");
                LoadOutcome::Loaded
            },
            Err(e) => {
                error!(error = %e, "Warehouse load failed");
                LoadOutcome::Failed(e)
            },
        };

        let objects = self.audit_and_purge(objects, &load).await;

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            load,
            objects,
        };
        report.log_summary();

        Ok(report)
    }

    async fn audit_and_purge(
        &self,
        objects: Vec<StagingObject>,
        load: &LoadOutcome,
    ) -> Vec<ObjectReport> {
        if objects.is_empty() {
            info!(bucket = %self.config.staging_bucket, "Staging bucket is empty; nothing to audit");
            return Vec::new();
        }

        if !load.is_loaded() {
            match self.config.purge_policy {
                PurgePolicy::AfterSuccessfulLoad => {
                    warn!(
                        count = objects.len(),
                        "Load failed; leaving all staged objects in place"
                    );
                    return objects
                        .into_iter()
                        .map(|object| ObjectReport {
                            object,
                            outcome: ObjectOutcome::Retained,
                        })
                        .collect();
                },
                PurgePolicy::Always => {
                    warn!(
                        count = objects.len(),
                        "Load failed; auditing and purging staged objects anyway"
                    );
                },
            }
        }

        let mut reports = Vec::with_capacity(objects.len());
        for object in objects {
            let outcome = self.process_object(&object).await;
            reports.push(ObjectReport { object, outcome });
        }
        reports
    }

    #[instrument(skip(self, object), fields(file_name = %object.key))]
    async fn process_object(&self, object: &StagingObject) -> ObjectOutcome {
        let record = AuditRecord::from_object(object);

        if let Err(e) = self
            .services
            .audit
            .put_record(&self.config.audit_table, &record)
            .await
        {
            error!(error = %e, "Audit entry failed; object left in staging");
            return ObjectOutcome::AuditFailed(e);
        }
        info!(file_size = %record.file_size, "Audit entry completed");

        match self
            .services
            .staging
            .delete_object(&object.bucket, &object.key)
            .await
        {
            Ok(()) => {
                info!("Removed from staging");
                ObjectOutcome::Purged
            },
            Err(e) => {
                error!(error = %e, "Staging delete failed");
                ObjectOutcome::DeleteFailed(e)
            },
        }
    }
}
