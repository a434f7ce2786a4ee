//! Credentials for presigning transcription URLs.
//!
//! Resolved when a URL is signed, not at startup, so rotated keys and
//! refreshed role credentials are picked up by a long-running server.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use aws_sdk_dynamodb::config::{
    Credentials as AwsCredentials, ProvideCredentials, SharedCredentialsProvider,
};
use tokio::sync::RwLock;
use tutorcall_core::signing::{Credentials, SigningError, PRESIGN_EXPIRY_SECONDS};

/// Supplies the credentials a URL is signed with.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn credentials(&self) -> Result<Credentials, SigningError>;
}

/// Resolves credentials through the AWS SDK provider chain
/// (environment, profile, web identity, ECS or IMDS).
///
/// The last resolved credentials are reused until they would expire
/// within the lifetime of a presigned URL.
pub struct SdkCredentialSource {
    provider: SharedCredentialsProvider,
    cached: RwLock<Option<AwsCredentials>>,
}

impl SdkCredentialSource {
    pub fn new(provider: SharedCredentialsProvider) -> Self {
        Self {
            provider,
            cached: RwLock::new(None),
        }
    }

    async fn resolve(&self) -> Result<AwsCredentials, SigningError> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            if is_fresh(cached, SystemTime::now()) {
                return Ok(cached.clone());
            }
        }

        let resolved = self.provider.provide_credentials().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to resolve AWS credentials");
            SigningError::MissingCredentials("AWS credentials")
        })?;
        tracing::debug!(expiry = ?resolved.expiry(), "Resolved AWS credentials");

        *self.cached.write().await = Some(resolved.clone());
        Ok(resolved)
    }
}

#[async_trait]
impl CredentialSource for SdkCredentialSource {
    async fn credentials(&self) -> Result<Credentials, SigningError> {
        let resolved = self.resolve().await?;
        Ok(Credentials {
            access_key_id: resolved.access_key_id().to_string(),
            secret_access_key: resolved.secret_access_key().to_string(),
            session_token: resolved.session_token().map(str::to_string),
        })
    }
}

/// Whether `credentials` outlive a URL signed at `now`.
fn is_fresh(credentials: &AwsCredentials, now: SystemTime) -> bool {
    let url_lifetime = Duration::from_secs(u64::from(PRESIGN_EXPIRY_SECONDS));
    credentials
        .expiry()
        .is_none_or(|expiry| expiry > now + url_lifetime)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aws_credentials(expiry: Option<SystemTime>) -> AwsCredentials {
        AwsCredentials::new("AKIDEXAMPLE", "secret", Some("token".to_string()), expiry, "test")
    }

    #[test]
    fn test_long_lived_credentials_stay_fresh() {
        assert!(is_fresh(&aws_credentials(None), SystemTime::now()));
    }

    #[test]
    fn test_credentials_expiring_within_url_lifetime_are_stale() {
        let now = SystemTime::now();

        let soon = aws_credentials(Some(now + Duration::from_secs(60)));
        assert!(!is_fresh(&soon, now));

        let later = aws_credentials(Some(now + Duration::from_secs(3600)));
        assert!(is_fresh(&later, now));
    }

    #[tokio::test]
    async fn test_sdk_source_converts_provider_credentials() {
        let source =
            SdkCredentialSource::new(SharedCredentialsProvider::new(aws_credentials(None)));

        let credentials = source.credentials().await.unwrap();

        assert_eq!(credentials.access_key_id, "AKIDEXAMPLE");
        assert_eq!(credentials.secret_access_key, "secret");
        assert_eq!(credentials.session_token.as_deref(), Some("token"));
    }
}
