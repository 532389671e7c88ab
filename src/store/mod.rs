//! Persistence layer: libSQL-backed storage for users, the component layout
//! and contact records, plus an in-memory stand-in.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use memory::MemoryDatabase;
pub use traits::Database;
