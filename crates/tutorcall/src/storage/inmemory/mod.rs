//! In-memory storage backend for testing.
//!
//! Items live in a `BTreeMap` wrapped in `Arc<RwLock<_>>`. Data is not
//! persisted and is lost when the last clone of the store is dropped.
//!
//! # Example
//!
//! ```rust,ignore
//! use tutorcall::storage::inmemory::InMemoryStore;
//! use tutorcall::storage::StoreSessionRepository;
//!
//! let repo = StoreSessionRepository::new(InMemoryStore::new());
//! ```

mod store;

pub use store::InMemoryStore;
