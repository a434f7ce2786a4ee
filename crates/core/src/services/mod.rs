//! Contracts for the managed AI services the backend delegates to.

mod error;
mod traits;

pub use error::{Result, ServiceError};
pub use traits::{ChatCompletionService, ChatTurn};
