//! Chunked batch execution
//!
//! Rows are flushed in fixed-size chunks, strictly in input order. Null
//! values hitting not-null columns with a configured default are
//! substituted with a type-appropriate value right before binding, so a
//! caller may legitimately omit what the database would default.

use crate::error::{DialectError, Result};
use crate::executor::SqlExecutor;
use crate::meta::{ColumnMeta, ColumnType};
use crate::types::QueryValue;

/// Execute `sql` over `rows` in chunks of `chunk_size`
///
/// A single-row input bypasses batching entirely. When
/// `auto_commit_override` differs from the connection's current mode it is
/// applied before execution and the original mode restored afterwards, on
/// success and on failure alike. The first bind/execution error aborts the
/// remaining chunks; already-flushed chunks stay as whatever commit mode
/// left them.
pub async fn execute_batch(
	executor: &dyn SqlExecutor,
	sql: &str,
	rows: Vec<Vec<QueryValue>>,
	columns: &[ColumnMeta],
	chunk_size: usize,
	auto_commit_override: Option<bool>,
) -> Result<u64> {
	if rows.is_empty() {
		return Ok(0);
	}
	if chunk_size == 0 {
		return Err(DialectError::Configuration(
			"batch chunk size must be at least 1".to_string(),
		));
	}

	let rows = substitute_defaults(rows, columns)?;

	let mut restore = None;
	if let Some(mode) = auto_commit_override {
		let previous = executor.set_auto_commit(mode).await?;
		if previous != mode {
			restore = Some(previous);
		}
	}

	let result = run_chunks(executor, sql, &rows, chunk_size).await;

	if let Some(previous) = restore
		&& let Err(e) = executor.set_auto_commit(previous).await
	{
		tracing::warn!(error = %e, "failed to restore auto-commit mode after batch");
	}

	result
}

async fn run_chunks(
	executor: &dyn SqlExecutor,
	sql: &str,
	rows: &[Vec<QueryValue>],
	chunk_size: usize,
) -> Result<u64> {
	if rows.len() == 1 {
		return Ok(executor.execute(sql, &rows[0]).await?.rows_affected);
	}

	let mut total = 0u64;
	for (index, chunk) in rows.chunks(chunk_size).enumerate() {
		match executor.execute_many(sql, chunk).await {
			Ok(affected) => total += affected,
			Err(e) => {
				return Err(DialectError::Batch {
					completed_chunks: index,
					source: Box::new(e),
				});
			}
		}
	}
	Ok(total)
}

/// Replace nulls bound for not-null defaulted columns
fn substitute_defaults(
	mut rows: Vec<Vec<QueryValue>>,
	columns: &[ColumnMeta],
) -> Result<Vec<Vec<QueryValue>>> {
	let needs_default: Vec<(usize, &ColumnMeta)> = columns
		.iter()
		.enumerate()
		.filter(|(_, c)| !c.nullable && c.default.is_some())
		.collect();
	if needs_default.is_empty() {
		return Ok(rows);
	}

	for row in rows.iter_mut() {
		for (index, column) in &needs_default {
			if let Some(value) = row.get_mut(*index)
				&& value.is_null()
			{
				*value = default_value(column)?;
			}
		}
	}
	Ok(rows)
}

fn default_value(column: &ColumnMeta) -> Result<QueryValue> {
	let raw = column.default.as_deref().unwrap_or_default();
	let value = match column.col_type {
		ColumnType::Int => QueryValue::Int(raw.trim().parse::<i64>().unwrap_or(0)),
		ColumnType::Float => QueryValue::Float(raw.trim().parse::<f64>().unwrap_or(0.0)),
		ColumnType::Decimal => QueryValue::Decimal(
			raw.trim()
				.parse::<rust_decimal::Decimal>()
				.unwrap_or_default(),
		),
		ColumnType::Bool => QueryValue::Bool(matches!(
			raw.trim().to_ascii_lowercase().as_str(),
			"true" | "1" | "t" | "yes"
		)),
		ColumnType::Timestamp => QueryValue::Timestamp(chrono::Utc::now()),
		ColumnType::String => QueryValue::String(raw.to_string()),
		ColumnType::Bytes | ColumnType::Uuid => {
			return Err(DialectError::Configuration(format!(
				"column `{}` cannot derive a default from `{}`",
				column.name, raw
			)));
		}
	};
	Ok(value)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::meta::ColumnMeta;
	use crate::types::{DialectKey, QueryResult, Row};
	use async_trait::async_trait;
	use parking_lot::Mutex;

	#[derive(Default)]
	struct RecordingExecutor {
		flushes: Mutex<Vec<usize>>,
		auto_commit_calls: Mutex<Vec<bool>>,
		fail_on_flush: Option<usize>,
	}

	#[async_trait]
	impl SqlExecutor for RecordingExecutor {
		fn dialect(&self) -> DialectKey {
			DialectKey::MySql
		}

		async fn execute(&self, _sql: &str, _params: &[QueryValue]) -> Result<QueryResult> {
			self.flushes.lock().push(1);
			Ok(QueryResult::affected(1))
		}

		async fn fetch_all(&self, _sql: &str, _params: &[QueryValue]) -> Result<Vec<Row>> {
			Ok(vec![])
		}

		async fn fetch_one(&self, _sql: &str, _params: &[QueryValue]) -> Result<Row> {
			Ok(Row::new())
		}

		async fn execute_many(&self, _sql: &str, rows: &[Vec<QueryValue>]) -> Result<u64> {
			let flush_index = self.flushes.lock().len();
			if self.fail_on_flush == Some(flush_index) {
				return Err(DialectError::Configuration("boom".to_string()));
			}
			self.flushes.lock().push(rows.len());
			Ok(rows.len() as u64)
		}

		async fn set_auto_commit(&self, on: bool) -> Result<bool> {
			let mut calls = self.auto_commit_calls.lock();
			let previous = calls.last().copied().unwrap_or(true);
			calls.push(on);
			Ok(previous)
		}
	}

	fn rows(n: usize) -> Vec<Vec<QueryValue>> {
		(0..n).map(|i| vec![QueryValue::Int(i as i64)]).collect()
	}

	fn columns() -> Vec<ColumnMeta> {
		vec![ColumnMeta::new("v", ColumnType::Int)]
	}

	#[tokio::test]
	async fn test_chunk_count() {
		let ex = RecordingExecutor::default();
		let total = execute_batch(&ex, "insert", rows(10), &columns(), 4, None)
			.await
			.unwrap();
		assert_eq!(total, 10);
		// ceil(10/4) flushes of sizes 4, 4, 2
		assert_eq!(*ex.flushes.lock(), vec![4, 4, 2]);
	}

	#[tokio::test]
	async fn test_single_row_bypasses_batching() {
		let ex = RecordingExecutor::default();
		let total = execute_batch(&ex, "insert", rows(1), &columns(), 100, None)
			.await
			.unwrap();
		assert_eq!(total, 1);
		assert_eq!(ex.flushes.lock().len(), 1);
	}

	#[tokio::test]
	async fn test_auto_commit_restored_on_failure() {
		let ex = RecordingExecutor {
			fail_on_flush: Some(1),
			..RecordingExecutor::default()
		};
		let err = execute_batch(&ex, "insert", rows(8), &columns(), 4, Some(false))
			.await
			.unwrap_err();
		match err {
			DialectError::Batch { completed_chunks, .. } => assert_eq!(completed_chunks, 1),
			other => panic!("unexpected error: {other}"),
		}
		// override applied, then restored despite the failure
		assert_eq!(*ex.auto_commit_calls.lock(), vec![false, true]);
	}

	#[tokio::test]
	async fn test_not_null_default_substitution() {
		let cols = vec![
			ColumnMeta::new("qty", ColumnType::Int).not_null(Some("0")),
			ColumnMeta::new("note", ColumnType::String),
		];
		let rows = vec![vec![QueryValue::Null, QueryValue::Null]];
		let out = substitute_defaults(rows, &cols).unwrap();
		assert_eq!(out[0][0], QueryValue::Int(0));
		// nullable column stays null
		assert_eq!(out[0][1], QueryValue::Null);
	}

	#[tokio::test]
	async fn test_zero_chunk_size_rejected() {
		let ex = RecordingExecutor::default();
		assert!(execute_batch(&ex, "insert", rows(2), &columns(), 0, None)
			.await
			.is_err());
	}
}
