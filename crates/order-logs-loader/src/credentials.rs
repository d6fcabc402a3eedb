//! Warehouse credentials from AWS Secrets Manager

use async_trait::async_trait;
use aws_config::{Region, SdkConfig};
use aws_sdk_secretsmanager::{error::DisplayErrorContext, Client};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::error::CredentialError;

/// Connection parameters for the warehouse, read once per run
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub host: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .finish()
    }
}

impl Credentials {
    /// Parse the JSON payload stored in the secret
    ///
    /// Extra keys (Secrets Manager adds `engine`, `port`, ...) are ignored.
    pub fn from_secret_string(payload: &str) -> Result<Self, CredentialError> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Source of named secret strings
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Return the string payload of `secret_id`
    async fn fetch_secret(&self, secret_id: &str) -> Result<String, CredentialError>;
}

/// [`SecretStore`] backed by Secrets Manager
pub struct SecretsManagerStore {
    client: Client,
}

impl SecretsManagerStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from shared SDK config, pinned to the secret's region
    pub fn from_sdk_config(sdk_config: &SdkConfig, region: &str) -> Self {
        let config = aws_sdk_secretsmanager::config::Builder::from(sdk_config)
            .region(Region::new(region.to_string()))
            .build();
        Self::new(Client::from_conf(config))
    }
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    #[instrument(skip(self))]
    async fn fetch_secret(&self, secret_id: &str) -> Result<String, CredentialError> {
        let response = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|e| CredentialError::Fetch {
                secret_id: secret_id.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        response
            .secret_string()
            .map(str::to_string)
            .ok_or_else(|| CredentialError::MissingSecretString(secret_id.to_string()))
    }
}

/// Fetch and parse the warehouse credentials in one step
pub async fn load_credentials(
    store: &dyn SecretStore,
    secret_id: &str,
) -> Result<Credentials, CredentialError> {
    debug!(secret_id, "Fetching warehouse credentials");

    let payload = store.fetch_secret(secret_id).await?;
    let credentials = Credentials::from_secret_string(&payload)?;

    info!(
        secret_id,
        host = %credentials.host,
        username = %credentials.username,
        "Warehouse credentials loaded"
    );

    Ok(credentials)
}
