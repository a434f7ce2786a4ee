//! Error types for DynamoDB operations.

use thiserror::Error;

/// Result type alias for dynamodb module.
pub type Result<T> = std::result::Result<T, DynamodbError>;

/// Errors that can occur during DynamoDB operations.
#[derive(Error, Debug)]
pub enum DynamodbError {
    #[error("AWS SDK error: {0}")]
    AwsSdk(String),

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("Operation cancelled by user")]
    UserCancelled,

    #[error("Timeout waiting for table to become active")]
    TableActivationTimeout,
}
