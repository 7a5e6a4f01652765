//! # Grappelli
//!
//! Dialect-aware SQL translation and query execution engine.
//!
//! One query or entity operation is written once and executed against any
//! supported backend; the engine rewrites the SQL text per dialect and
//! coordinates the surrounding execution flow:
//!
//! - **Dialect strategies** (`dialect` module): per-backend pagination,
//!   top-N/random sampling, MERGE vs. update-then-insert upserts, lock
//!   clauses, conflict-ignoring inserts
//! - **Templates** (`template` module): parsed once, cached, specialized
//!   per call; positional placeholders unified into named-parameter space
//! - **Text transformation** (`transform` module): literal-masked scanning,
//!   count-query derivation, pagination/random wrapping
//! - **Keys** (`pk` module): Assigned/Identity/Sequence resolution with
//!   per-dialect remapping and business-key generation
//! - **Batching** (`batch` module): chunked flushes with auto-commit
//!   handling and not-null default substitution
//! - **Paged queries** (`page` module): cached totals, parallel
//!   count+fetch, total reconciliation, overflow policy
//!
//! Statement execution goes through the [`executor::SqlExecutor`] seam;
//! sqlx-backed implementations for PostgreSQL, MySQL, and SQLite live under
//! [`drivers`].
//!
//! ## Example
//!
//! ```no_run
//! use grappelli::dialect::registry;
//! use grappelli::drivers::PostgresExecutor;
//! use grappelli::template::{QueryInvocation, SqlTemplate};
//! use grappelli::types::{DialectKey, QueryValue};
//!
//! # async fn example() -> grappelli::error::Result<()> {
//! let pool = sqlx::PgPool::connect("postgresql://localhost/app").await?;
//! let executor = PostgresExecutor::new(pool);
//! let strategy = registry::strategy(DialectKey::Postgres);
//!
//! let template = SqlTemplate::builder(
//!     "orders.by_status",
//!     "select * from orders where status = :status order by id",
//! )
//! .build()?;
//! let invocation = QueryInvocation::new(
//!     vec!["status".to_string()],
//!     vec![QueryValue::from("OPEN")],
//! )?;
//! let rows = strategy
//!     .find_page(&executor, &template, &invocation, 1, 20)
//!     .await?;
//! # let _ = rows;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod cache;
pub mod config;
pub mod dialect;
pub mod drivers;
pub mod error;
pub mod executor;
pub mod meta;
pub mod page;
pub mod pk;
pub mod sharding;
pub mod template;
pub mod transform;
pub mod types;

pub use cache::{InMemoryPageCountCache, PageCountCache};
pub use config::{BatchConfig, PageConfig, PageOverflowPolicy};
pub use dialect::{registry, DialectStrategy, RowModifier, UpsertOutcome};
pub use error::{DialectError, Result};
pub use executor::SqlExecutor;
pub use meta::{ColumnMeta, ColumnType, EntityMeta, FieldValues, IdGenerator, PkStrategy};
pub use page::{PageRequest, PageResult, PagedQueryOrchestrator};
pub use sharding::ShardingResolver;
pub use template::{QueryInvocation, SqlTemplate};
pub use types::{DialectKey, LockMode, QueryResult, QueryValue, Row};
