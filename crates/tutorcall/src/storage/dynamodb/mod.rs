//! DynamoDB storage backend implementation.
//!
//! Provides a DynamoDB-based implementation of [`KeyValueStore`] using
//! `aws-sdk-dynamodb`. The table is provisioned by `cargo xtask dynamodb deploy`.
//!
//! [`KeyValueStore`]: crate::storage::store::KeyValueStore

mod error;
mod store;

pub use store::DynamoDbStore;
