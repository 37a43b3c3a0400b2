//! SQLite persistence for contacts and the audit log.

pub mod sqlite;

pub use sqlite::SqliteStore;
