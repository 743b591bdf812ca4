//! History and fact storage implementations for Secretary.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::{InMemoryFactStore, InMemoryThreadStore};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteThreadStore;
