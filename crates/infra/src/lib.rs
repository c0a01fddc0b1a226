//! Infrastructure layer: grant storage backends for the permission resolver.

pub mod grant_store;
mod integration_tests;

pub use grant_store::{InMemoryGrantStore, PgGrantStore};
