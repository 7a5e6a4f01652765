//! PostgreSQL executor
//!
//! Also used for GaussDB and Kingbase deployments reachable over the
//! PostgreSQL wire protocol; pass the matching [`DialectKey`] at
//! construction.

use crate::error::{DialectError, Result};
use crate::executor::SqlExecutor;
use crate::types::{describe_params, DialectKey, QueryResult, QueryValue, Row};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{Column, PgPool, Row as SqlxRow};
use std::sync::Arc;
use uuid::Uuid;

pub struct PostgresExecutor {
	pool: Arc<PgPool>,
	dialect: DialectKey,
}

impl PostgresExecutor {
	pub fn new(pool: PgPool) -> Self {
		Self::with_dialect(pool, DialectKey::Postgres)
	}

	/// For PostgreSQL-compatible backends (GaussDB, Kingbase)
	pub fn with_dialect(pool: PgPool, dialect: DialectKey) -> Self {
		Self {
			pool: Arc::new(pool),
			dialect,
		}
	}

	pub fn pool(&self) -> &PgPool {
		&self.pool
	}

	fn bind_value<'q>(
		query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
		value: &'q QueryValue,
	) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
		match value {
			QueryValue::Null => query.bind(None::<i32>),
			QueryValue::Bool(b) => query.bind(b),
			QueryValue::Int(i) => query.bind(i),
			QueryValue::Float(f) => query.bind(f),
			QueryValue::Decimal(d) => query.bind(d),
			QueryValue::String(s) => query.bind(s),
			QueryValue::Bytes(b) => query.bind(b),
			QueryValue::Timestamp(dt) => query.bind(dt),
			QueryValue::Uuid(u) => query.bind(u),
			QueryValue::Now => query.bind(chrono::Utc::now()),
		}
	}

	fn convert_row(pg_row: PgRow) -> Result<Row> {
		let mut row = Row::new();
		for column in pg_row.columns() {
			let name = column.name();
			if let Ok(value) = pg_row.try_get::<Uuid, _>(name) {
				row.insert(name.to_string(), QueryValue::Uuid(value));
			} else if let Ok(value) = pg_row.try_get::<bool, _>(name) {
				row.insert(name.to_string(), QueryValue::Bool(value));
			} else if let Ok(value) = pg_row.try_get::<i64, _>(name) {
				row.insert(name.to_string(), QueryValue::Int(value));
			} else if let Ok(value) = pg_row.try_get::<i32, _>(name) {
				row.insert(name.to_string(), QueryValue::Int(value as i64));
			} else if let Ok(value) = pg_row.try_get::<Decimal, _>(name) {
				row.insert(name.to_string(), QueryValue::Decimal(value));
			} else if let Ok(value) = pg_row.try_get::<f64, _>(name) {
				row.insert(name.to_string(), QueryValue::Float(value));
			} else if let Ok(value) = pg_row.try_get::<chrono::DateTime<chrono::Utc>, _>(name) {
				row.insert(name.to_string(), QueryValue::Timestamp(value));
			} else if let Ok(value) = pg_row.try_get::<Vec<u8>, _>(name) {
				row.insert(name.to_string(), QueryValue::Bytes(value));
			} else if let Ok(value) = pg_row.try_get::<String, _>(name) {
				row.insert(name.to_string(), QueryValue::String(value));
			} else {
				row.insert(name.to_string(), QueryValue::Null);
			}
		}
		Ok(row)
	}
}

#[async_trait]
impl SqlExecutor for PostgresExecutor {
	fn dialect(&self) -> DialectKey {
		self.dialect
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
		Ok(QueryResult::affected(result.rows_affected()))
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
		// One transaction per flush so a chunk is all-or-nothing
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

	async fn execute_each(&self, sql: &str, rows: &[Vec<QueryValue>]) -> Result<Vec<u64>> {
		let mut tx = self.pool.begin().await?;
		let mut counts = Vec::with_capacity(rows.len());
		for params in rows {
			let mut query = sqlx::query(sql);
			for param in params {
				query = Self::bind_value(query, param);
			}
			let result = query
				.execute(&mut *tx)
				.await
				.map_err(|e| DialectError::execution(e, sql, describe_params(params)))?;
			counts.push(result.rows_affected());
		}
		tx.commit().await?;
		Ok(counts)
	}
}
