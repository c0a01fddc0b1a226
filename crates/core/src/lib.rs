//! `staybook-core` — shared building blocks for the auth core.
//!
//! Pure value types only (no IO, no transport).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{CorrelationId, UserId};
