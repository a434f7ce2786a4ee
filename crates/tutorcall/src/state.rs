//! Shared application state.
//!
//! Holds the session repository as a trait object, the source of presigning
//! credentials, and the optional chat service used for analysis.

use std::sync::Arc;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use tutorcall_core::services::ChatCompletionService;
use tutorcall_core::session::SessionRepository;
use tutorcall_core::signing::{Credentials, SigningError};

use crate::config::{Config, StorageBackend};
use crate::credentials::{CredentialSource, SdkCredentialSource};
use crate::storage::dynamodb::DynamoDbStore;
use crate::storage::inmemory::InMemoryStore;
use crate::storage::StoreSessionRepository;

/// Shared application state.
///
/// Cloned for each request handler.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionRepository>,
    /// Model used by the `analyze` action. `None` always yields the fallback.
    pub chat: Option<Arc<dyn ChatCompletionService>>,
    /// Where presigning credentials come from. `None` fails every presign.
    pub credentials: Option<Arc<dyn CredentialSource>>,
    pub aws_region: String,
}

impl AppState {
    pub fn new(sessions: Arc<dyn SessionRepository>, config: &Config) -> Self {
        Self {
            sessions,
            chat: None,
            credentials: None,
            aws_region: config.aws_region.clone(),
        }
    }

    /// Builds the state with the storage backend the configuration selects.
    ///
    /// Presigning credentials come from the SDK provider chain for either
    /// backend.
    pub async fn from_config(config: &Config) -> Self {
        let sdk_config = load_sdk_config(config).await;

        let sessions: Arc<dyn SessionRepository> = match config.storage_backend {
            StorageBackend::DynamoDb => {
                let store = DynamoDbStore::from_sdk_config(&sdk_config, &config.table_name);
                tracing::info!(
                    table = %store.table_name(),
                    region = %config.aws_region,
                    "Using DynamoDB storage"
                );
                Arc::new(
                    StoreSessionRepository::new(store)
                        .with_retention_days(config.retention_days),
                )
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage, data is lost on restart");
                Arc::new(
                    StoreSessionRepository::new(InMemoryStore::new())
                        .with_retention_days(config.retention_days),
                )
            }
        };

        let state = Self::new(sessions, config);
        match sdk_config.credentials_provider() {
            Some(provider) => {
                state.with_credential_source(Arc::new(SdkCredentialSource::new(provider)))
            }
            None => {
                tracing::warn!("No AWS credentials provider, transcription URLs are unavailable");
                state
            }
        }
    }

    /// Sets where presigning credentials come from.
    pub fn with_credential_source(mut self, source: Arc<dyn CredentialSource>) -> Self {
        self.credentials = Some(source);
        self
    }

    /// Sets the model used for conversation analysis.
    ///
    /// The binary ships without a model client, so only tests reach the
    /// model-backed path through this.
    #[cfg(test)]
    pub fn with_chat_service(mut self, chat: Arc<dyn ChatCompletionService>) -> Self {
        self.chat = Some(chat);
        self
    }

    /// Credentials for the next presigned URL.
    pub async fn signing_credentials(&self) -> Result<Credentials, SigningError> {
        match &self.credentials {
            Some(source) => source.credentials().await,
            None => Err(SigningError::MissingCredentials("AWS credentials")),
        }
    }
}

/// Loads region, endpoint override and the default credential chain.
async fn load_sdk_config(config: &Config) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.aws_region.clone()));
    if let Some(url) = config.aws_endpoint_url.as_deref() {
        loader = loader.endpoint_url(url);
    }
    loader.load().await
}
