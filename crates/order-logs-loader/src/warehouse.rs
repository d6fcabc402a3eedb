//! Bulk load into Redshift
//!
//! The load is a single `COPY` from the staging bucket wrapped in an explicit
//! transaction. Redshift speaks the Postgres wire protocol, so the driver is
//! sqlx's Postgres connection.

use async_trait::async_trait;
use sqlx::{postgres::PgConnectOptions, Connection, Executor, PgConnection};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::credentials::Credentials;
use crate::error::WarehouseError;

/// `COPY ... FROM 's3://...'` with the CSV options the order logs use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyCommand {
    pub table: String,
    pub source_uri: String,
    pub iam_role: String,
}

impl CopyCommand {
    pub fn new(
        table: impl Into<String>,
        source_uri: impl Into<String>,
        iam_role: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            source_uri: source_uri.into(),
            iam_role: iam_role.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.destination_table, config.staging_uri(), &config.iam_role)
    }

    /// Render the statement, transaction boundaries included
    ///
    /// `acceptinvchars` makes Redshift replace invalid UTF-8 characters
    /// instead of rejecting the row.
    pub fn render(&self) -> String {
        format!(
            "begin;\n\
             copy {table} from {source}\n\
             iam_role {role}\n\
             CSV QUOTE '\"' DELIMITER ','\n\
             acceptinvchars;\n\
             end;",
            table = self.table,
            source = quote_literal(&self.source_uri),
            role = quote_literal(&self.iam_role),
        )
    }
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Executes load statements against the warehouse
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Connect with `credentials` and run `statement` to completion
    async fn execute_load(
        &self,
        credentials: &Credentials,
        statement: &str,
    ) -> Result<(), WarehouseError>;
}

/// [`Warehouse`] over a single short-lived Postgres-protocol connection
pub struct RedshiftWarehouse {
    database: String,
    port: u16,
    connect_timeout: Duration,
}

impl RedshiftWarehouse {
    pub fn new(database: impl Into<String>, port: u16, connect_timeout: Duration) -> Self {
        Self {
            database: database.into(),
            port,
            connect_timeout,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            &config.database,
            config.port,
            Duration::from_secs(config.connect_timeout_secs),
        )
    }

    fn connect_options(&self, credentials: &Credentials) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&credentials.host)
            .port(self.port)
            .database(&self.database)
            .username(&credentials.username)
            .password(&credentials.password)
            .application_name("order-logs-loader")
    }

    async fn connect(&self, credentials: &Credentials) -> Result<PgConnection, WarehouseError> {
        let options = self.connect_options(credentials);
        let connect_error = |source| WarehouseError::Connect {
            host: credentials.host.clone(),
            port: self.port,
            database: self.database.clone(),
            source,
        };

        match tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&options)).await
        {
            Ok(result) => result.map_err(connect_error),
            Err(_) => Err(connect_error(sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("no connection after {:?}", self.connect_timeout),
            )))),
        }
    }
}

#[async_trait]
impl Warehouse for RedshiftWarehouse {
    #[instrument(skip(self, credentials, statement), fields(host = %credentials.host, database = %self.database))]
    async fn execute_load(
        &self,
        credentials: &Credentials,
        statement: &str,
    ) -> Result<(), WarehouseError> {
        let mut conn = self.connect(credentials).await?;
        debug!("Warehouse connection established");

        // Argument-free &str goes over the simple query protocol, so the whole
        // begin/copy/end batch runs in one round trip. Not `raw_sql`: its
        // future is not Send for every borrow of the connection.
        let result = conn.execute(statement).await;

        if let Err(e) = conn.close().await {
            warn!(error = %e, "Failed to close warehouse connection cleanly");
        }

        let done = result.map_err(WarehouseError::Statement)?;
        info!(rows_affected = done.rows_affected(), "Load statement completed");

        Ok(())
    }
}
