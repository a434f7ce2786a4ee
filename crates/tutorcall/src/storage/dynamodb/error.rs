//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to `RepositoryError` from `tutorcall_core::session`.
//! Conditional-check failures carry meaning for the caller; everything else
//! is an upstream failure.

use std::fmt::Debug;

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use tutorcall_core::session::RepositoryError;

const TABLE_NOT_FOUND: &str = "Table not found";
const THROUGHPUT_EXCEEDED: &str = "Throughput exceeded";
const REQUEST_LIMIT_EXCEEDED: &str = "Request limit exceeded";
const INTERNAL_SERVER_ERROR: &str = "DynamoDB internal server error";

fn upstream(message: &str) -> RepositoryError {
    RepositoryError::Upstream(message.to_string())
}

/// Map a GetItem SDK error to RepositoryError.
pub fn map_get_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<GetItemError, R>,
) -> RepositoryError {
    match err.into_service_error() {
        GetItemError::ResourceNotFoundException(_) => upstream(TABLE_NOT_FOUND),
        GetItemError::ProvisionedThroughputExceededException(_) => upstream(THROUGHPUT_EXCEEDED),
        GetItemError::RequestLimitExceeded(_) => upstream(REQUEST_LIMIT_EXCEEDED),
        GetItemError::InternalServerError(_) => upstream(INTERNAL_SERVER_ERROR),
        err => RepositoryError::Upstream(format!("GetItem failed: {:?}", err)),
    }
}

/// Map a Query SDK error to RepositoryError.
pub fn map_query_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<QueryError, R>,
) -> RepositoryError {
    match err.into_service_error() {
        QueryError::ResourceNotFoundException(_) => upstream(TABLE_NOT_FOUND),
        QueryError::ProvisionedThroughputExceededException(_) => upstream(THROUGHPUT_EXCEEDED),
        QueryError::RequestLimitExceeded(_) => upstream(REQUEST_LIMIT_EXCEEDED),
        QueryError::InternalServerError(_) => upstream(INTERNAL_SERVER_ERROR),
        err => RepositoryError::Upstream(format!("Query failed: {:?}", err)),
    }
}

/// Map a PutItem SDK error to RepositoryError.
///
/// A failed `attribute_not_exists` condition means the key is taken.
pub fn map_put_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<PutItemError, R>,
    entity_type: &'static str,
    id: impl Into<String>,
) -> RepositoryError {
    match err.into_service_error() {
        PutItemError::ConditionalCheckFailedException(_) => RepositoryError::AlreadyExists {
            entity_type,
            id: id.into(),
        },
        PutItemError::ResourceNotFoundException(_) => upstream(TABLE_NOT_FOUND),
        PutItemError::ProvisionedThroughputExceededException(_) => upstream(THROUGHPUT_EXCEEDED),
        PutItemError::RequestLimitExceeded(_) => upstream(REQUEST_LIMIT_EXCEEDED),
        PutItemError::ItemCollectionSizeLimitExceededException(_) => {
            upstream("Item collection size limit exceeded")
        }
        PutItemError::InternalServerError(_) => upstream(INTERNAL_SERVER_ERROR),
        err => RepositoryError::Upstream(format!("PutItem failed: {:?}", err)),
    }
}

/// Map an UpdateItem SDK error to RepositoryError.
///
/// A failed `attribute_exists` condition means the item is gone.
pub fn map_update_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<UpdateItemError, R>,
    entity_type: &'static str,
    id: impl Into<String>,
) -> RepositoryError {
    match err.into_service_error() {
        UpdateItemError::ConditionalCheckFailedException(_) => RepositoryError::NotFound {
            entity_type,
            id: id.into(),
        },
        UpdateItemError::ResourceNotFoundException(_) => upstream(TABLE_NOT_FOUND),
        UpdateItemError::ProvisionedThroughputExceededException(_) => {
            upstream(THROUGHPUT_EXCEEDED)
        }
        UpdateItemError::RequestLimitExceeded(_) => upstream(REQUEST_LIMIT_EXCEEDED),
        UpdateItemError::TransactionConflictException(_) => {
            upstream("Transaction conflict on update")
        }
        UpdateItemError::InternalServerError(_) => upstream(INTERNAL_SERVER_ERROR),
        err => RepositoryError::Upstream(format!("UpdateItem failed: {:?}", err)),
    }
}

/// Map a BatchWriteItem SDK error to RepositoryError.
pub fn map_batch_write_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<BatchWriteItemError, R>,
) -> RepositoryError {
    match err.into_service_error() {
        BatchWriteItemError::ResourceNotFoundException(_) => upstream(TABLE_NOT_FOUND),
        BatchWriteItemError::ProvisionedThroughputExceededException(_) => {
            upstream(THROUGHPUT_EXCEEDED)
        }
        BatchWriteItemError::RequestLimitExceeded(_) => upstream(REQUEST_LIMIT_EXCEEDED),
        BatchWriteItemError::ItemCollectionSizeLimitExceededException(_) => {
            upstream("Item collection size limit exceeded")
        }
        BatchWriteItemError::InternalServerError(_) => upstream(INTERNAL_SERVER_ERROR),
        err => RepositoryError::Upstream(format!("BatchWriteItem failed: {:?}", err)),
    }
}
