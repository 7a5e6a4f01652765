//! ClickHouse strategy
//!
//! An OLAP engine: no row locks, no stored procedures, and the batch
//! driver cannot bind raw byte columns.

use super::DialectStrategy;
use crate::error::{DialectError, Result};
use crate::meta::ColumnType;
use crate::transform::{self, PAGE_LIMIT_PARAM, PAGE_OFFSET_PARAM};
use crate::types::{DialectKey, LockMode};
use async_trait::async_trait;

pub struct ClickHouseDialect;

#[async_trait]
impl DialectStrategy for ClickHouseDialect {
	fn key(&self) -> DialectKey {
		DialectKey::ClickHouse
	}

	fn paging_sql(&self, body: &str) -> Result<String> {
		Ok(format!(
			"{} limit :{}, :{}",
			body, PAGE_OFFSET_PARAM, PAGE_LIMIT_PARAM
		))
	}

	fn top_sql(&self, body: &str, n: u64) -> Result<String> {
		Ok(format!("{} limit {}", body, n))
	}

	fn random_sql(&self, body: &str, n: u64) -> Result<String> {
		let body = transform::wrap_for_random(body)?;
		Ok(format!("{} order by rand() limit {}", body, n))
	}

	fn lock_clause(&self, mode: LockMode) -> Result<Option<&'static str>> {
		match mode {
			LockMode::None => Ok(None),
			_ => Err(DialectError::unsupported("row lock clause", self.key())),
		}
	}

	fn excluded_column_types(&self) -> &'static [ColumnType] {
		&[ColumnType::Bytes]
	}
}
