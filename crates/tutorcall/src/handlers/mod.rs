pub mod analyze;
pub mod dispatch;
pub mod error;
pub mod health;

pub use error::AppError;
