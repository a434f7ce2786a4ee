//! Functional core for tutorcall.
//!
//! Pure domain types and functions shared by the server and tooling crates:
//! the conversation session model and repository contract, AWS Signature V4
//! URL presigning, the conversation analysis fallback, and the traits for
//! the managed AI services the backend talks to. Nothing in this crate
//! performs I/O.

pub mod analysis;
pub mod serde;
pub mod services;
pub mod session;
pub mod signing;
