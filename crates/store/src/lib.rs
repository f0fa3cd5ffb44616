//! Store implementations for deskclaw.
//!
//! Two implementations of the core persistence traits:
//! - [`SqliteStore`] — the production store, one SQLite file
//! - [`InMemoryStore`] — ephemeral store for tests
//!
//! Both seed the same starter FAQ set on request.

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;
