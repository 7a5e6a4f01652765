//! sqlx-backed [`crate::executor::SqlExecutor`] implementations
//!
//! One per bundled driver. Backends without a native sqlx driver (Oracle,
//! SQL Server, DB2, the domestic databases) are reached through whatever
//! executor the embedding application supplies; the dialect strategies only
//! see the trait.

pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use mysql::MySqlExecutor;
pub use postgres::PostgresExecutor;
pub use sqlite::SqliteExecutor;
