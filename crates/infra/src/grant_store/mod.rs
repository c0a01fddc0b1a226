//! Grant store backends implementing [`staybook_auth::GrantStore`].

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryGrantStore;
pub use postgres::PgGrantStore;
