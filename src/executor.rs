//! Statement-execution seam
//!
//! The engine never opens or closes connections; it is handed something
//! that can run a bound statement and read rows back. The sqlx-backed
//! implementations live under [`crate::drivers`]; anything else (a JDBC
//! bridge, a test double) is supplied by the embedding application.

use crate::error::{DialectError, Result};
use crate::meta::ColumnType;
use crate::types::{DialectKey, QueryValue, QueryResult, Row};
use async_trait::async_trait;

/// A ready, transactionally scoped connection to one backend
///
/// All SQL arriving here is already in the backend's positional placeholder
/// form; parameter values are bound in order.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
	/// The backend family this connection talks to
	fn dialect(&self) -> DialectKey;

	/// Run a mutation statement
	async fn execute(&self, sql: &str, params: &[QueryValue]) -> Result<QueryResult>;

	/// Run a query, returning all rows
	async fn fetch_all(&self, sql: &str, params: &[QueryValue]) -> Result<Vec<Row>>;

	/// Run a query expected to return exactly one row
	async fn fetch_one(&self, sql: &str, params: &[QueryValue]) -> Result<Row>;

	/// Run one statement once per parameter row, as a single flush
	///
	/// Returns the summed affected count. Row order is preserved.
	async fn execute_many(&self, sql: &str, rows: &[Vec<QueryValue>]) -> Result<u64>;

	/// Per-row affected counts for one statement over many parameter rows
	///
	/// Used by the non-merge upsert path, which must know which rows an
	/// UPDATE missed.
	async fn execute_each(&self, sql: &str, rows: &[Vec<QueryValue>]) -> Result<Vec<u64>> {
		let mut counts = Vec::with_capacity(rows.len());
		for row in rows {
			counts.push(self.execute(sql, row).await?.rows_affected);
		}
		Ok(counts)
	}

	/// Toggle auto-commit, returning the previous mode
	///
	/// Pool-backed executors that cannot expose the toggle keep the no-op
	/// default.
	async fn set_auto_commit(&self, on: bool) -> Result<bool> {
		Ok(on)
	}

	/// Invoke a stored procedure/function
	///
	/// Returns result rows plus declared out-parameter values.
	async fn call_procedure(
		&self,
		_sql: &str,
		_in_params: &[QueryValue],
		_out_types: &[ColumnType],
	) -> Result<(Vec<Row>, Vec<QueryValue>)> {
		Err(DialectError::unsupported("call_procedure", self.dialect()))
	}
}
