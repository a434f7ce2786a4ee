//! Storage layer.
//!
//! [`StoreSessionRepository`] implements the `SessionRepository` trait from
//! `tutorcall_core::session` on top of a [`store::KeyValueStore`]. Two stores are
//! provided, selected at startup through `STORAGE_BACKEND`:
//!
//! - `dynamodb` (default): [`dynamodb::DynamoDbStore`], a single DynamoDB table
//! - `memory`: [`inmemory::InMemoryStore`], for tests and local development

pub mod conversions;
pub mod cursor;
pub mod dynamodb;
pub mod inmemory;
pub mod keys;
mod repository;
pub mod store;

pub use repository::StoreSessionRepository;
