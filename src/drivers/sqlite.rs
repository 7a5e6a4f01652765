//! SQLite executor

use crate::error::{DialectError, Result};
use crate::executor::SqlExecutor;
use crate::types::{describe_params, DialectKey, QueryResult, QueryValue, Row};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row as SqlxRow, SqlitePool};
use std::sync::Arc;

pub struct SqliteExecutor {
	pool: Arc<SqlitePool>,
}

impl SqliteExecutor {
	pub fn new(pool: SqlitePool) -> Self {
		Self {
			pool: Arc::new(pool),
		}
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	fn bind_value<'q>(
		query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
		value: &'q QueryValue,
	) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
		match value {
			QueryValue::Null => query.bind(None::<i32>),
			QueryValue::Bool(b) => query.bind(b),
			QueryValue::Int(i) => query.bind(i),
			QueryValue::Float(f) => query.bind(f),
			// SQLite has no decimal affinity; stored as text
			QueryValue::Decimal(d) => query.bind(d.to_string()),
			QueryValue::String(s) => query.bind(s),
			QueryValue::Bytes(b) => query.bind(b),
			QueryValue::Timestamp(dt) => query.bind(*dt),
			QueryValue::Uuid(u) => query.bind(u.to_string()),
			QueryValue::Now => query.bind(chrono::Utc::now()),
		}
	}

	fn convert_row(sqlite_row: SqliteRow) -> Result<Row> {
		let mut row = Row::new();
		for column in sqlite_row.columns() {
			let name = column.name();
			if let Ok(value) = sqlite_row.try_get::<i64, _>(name) {
				row.insert(name.to_string(), QueryValue::Int(value));
			} else if let Ok(value) = sqlite_row.try_get::<f64, _>(name) {
				row.insert(name.to_string(), QueryValue::Float(value));
			} else if let Ok(value) = sqlite_row.try_get::<String, _>(name) {
				row.insert(name.to_string(), QueryValue::String(value));
			} else if let Ok(value) = sqlite_row.try_get::<Vec<u8>, _>(name) {
				row.insert(name.to_string(), QueryValue::Bytes(value));
			} else {
				row.insert(name.to_string(), QueryValue::Null);
			}
		}
		Ok(row)
	}
}

#[async_trait]
impl SqlExecutor for SqliteExecutor {
	fn dialect(&self) -> DialectKey {
		DialectKey::Sqlite
	}

	async fn execute(&self, sql: &str, params: &[QueryValue]) -> Result<QueryResult> {
		let mut query = sqlx::query(sql);
		for param in params {
			query = Self::bind_value(query, param);
		}
		let result = query
			.execute(self.pool.as_ref())
			.await
			.map_err(|e| DialectError::execution(e, sql, describe_params(params)))?;
		let mut out = QueryResult::affected(result.rows_affected());
		let rowid = result.last_insert_rowid();
		if rowid > 0 {
			out.generated_keys.push(QueryValue::Int(rowid));
		}
		Ok(out)
	}

	async fn fetch_all(&self, sql: &str, params: &[QueryValue]) -> Result<Vec<Row>> {
		let mut query = sqlx::query(sql);
		for param in params {
			query = Self::bind_value(query, param);
		}
		let rows = query
			.fetch_all(self.pool.as_ref())
			.await
			.map_err(|e| DialectError::execution(e, sql, describe_params(params)))?;
		rows.into_iter().map(Self::convert_row).collect()
	}

	async fn fetch_one(&self, sql: &str, params: &[QueryValue]) -> Result<Row> {
		let mut query = sqlx::query(sql);
		for param in params {
			query = Self::bind_value(query, param);
		}
		let row = query
			.fetch_one(self.pool.as_ref())
			.await
			.map_err(|e| DialectError::execution(e, sql, describe_params(params)))?;
		Self::convert_row(row)
	}

	async fn execute_many(&self, sql: &str, rows: &[Vec<QueryValue>]) -> Result<u64> {
		let mut tx = self.pool.begin().await?;
		let mut total = 0u64;
		for params in rows {
			let mut query = sqlx::query(sql);
			for param in params {
				query = Self::bind_value(query, param);
			}
			let result = query
				.execute(&mut *tx)
				.await
				.map_err(|e| DialectError::execution(e, sql, describe_params(params)))?;
			total += result.rows_affected();
		}
		tx.commit().await?;
		Ok(total)
	}
}
