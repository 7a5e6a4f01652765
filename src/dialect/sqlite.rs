//! SQLite strategy

use super::{common, DialectStrategy};
use crate::error::{DialectError, Result};
use crate::meta::EntityMeta;
use crate::pk::{self, KeyRetrieval};
use crate::transform::{self, PAGE_LIMIT_PARAM, PAGE_OFFSET_PARAM};
use crate::types::{DialectKey, LockMode};
use async_trait::async_trait;

pub struct SqliteDialect;

#[async_trait]
impl DialectStrategy for SqliteDialect {
	fn key(&self) -> DialectKey {
		DialectKey::Sqlite
	}

	fn paging_sql(&self, body: &str) -> Result<String> {
		Ok(format!(
			"{} limit :{} offset :{}",
			body, PAGE_LIMIT_PARAM, PAGE_OFFSET_PARAM
		))
	}

	fn top_sql(&self, body: &str, n: u64) -> Result<String> {
		Ok(format!("{} limit {}", body, n))
	}

	fn random_sql(&self, body: &str, n: u64) -> Result<String> {
		let body = transform::wrap_for_random(body)?;
		Ok(format!("{} order by random() limit {}", body, n))
	}

	fn lock_clause(&self, mode: LockMode) -> Result<Option<&'static str>> {
		// whole-database locking only; row locks cannot be expressed
		match mode {
			LockMode::None => Ok(None),
			_ => Err(DialectError::unsupported("row lock clause", self.key())),
		}
	}

	fn coalesce_fn(&self) -> &'static str {
		"ifnull"
	}

	fn insert_ignore_sql(&self, meta: &EntityMeta) -> Result<String> {
		let resolved = pk::resolve(meta, self.key())?;
		let mut plain = common::insert_statement(meta, &resolved, self)?;
		if resolved.retrieval == KeyRetrieval::ReturningClause {
			plain = common::strip_returning(&plain);
		}
		Ok(plain.replacen("insert into", "insert or ignore into", 1))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::meta::{ColumnMeta, ColumnType, PkStrategy};

	#[test]
	fn test_insert_ignore_form() {
		let meta = EntityMeta {
			table: "events".to_string(),
			columns: vec![
				ColumnMeta::new("id", ColumnType::Int),
				ColumnMeta::new("kind", ColumnType::String),
			],
			pk_columns: vec!["id".to_string()],
			pk_strategy: PkStrategy::Assigned,
			sequence: None,
			generator: None,
			allow_explicit_key: true,
		};
		let sql = SqliteDialect.insert_ignore_sql(&meta).unwrap();
		assert!(sql.starts_with("insert or ignore into events"));
	}

	#[test]
	fn test_row_locks_unsupported() {
		assert!(SqliteDialect.lock_clause(LockMode::Upgrade).is_err());
		assert!(SqliteDialect.lock_clause(LockMode::None).unwrap().is_none());
	}
}
