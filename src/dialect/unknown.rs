//! Fallback strategy for unrecognized backends
//!
//! Assumes ANSI `OFFSET .. FETCH` syntax and nothing beyond it; anything
//! backend-specific reports as unsupported so misconfiguration surfaces as
//! an explicit error rather than invalid SQL.

use super::DialectStrategy;
use crate::error::{DialectError, Result};
use crate::transform::{PAGE_LIMIT_PARAM, PAGE_OFFSET_PARAM};
use crate::types::DialectKey;
use async_trait::async_trait;

pub struct UnknownDialect;

#[async_trait]
impl DialectStrategy for UnknownDialect {
	fn key(&self) -> DialectKey {
		DialectKey::Unknown
	}

	fn paging_sql(&self, body: &str) -> Result<String> {
		Ok(format!(
			"{} offset :{} rows fetch next :{} rows only",
			body, PAGE_OFFSET_PARAM, PAGE_LIMIT_PARAM
		))
	}

	fn top_sql(&self, body: &str, n: u64) -> Result<String> {
		Ok(format!("{} fetch first {} rows only", body, n))
	}

	fn random_sql(&self, _body: &str, _n: u64) -> Result<String> {
		Err(DialectError::unsupported("random_sample", self.key()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_ansi_paging() {
		let sql = UnknownDialect.paging_sql("select * from t").unwrap();
		assert_eq!(
			sql,
			"select * from t offset :gp_page_offset rows fetch next :gp_page_limit rows only"
		);
	}

	#[test]
	fn test_random_is_explicit_error() {
		assert!(UnknownDialect.random_sql("select 1", 5).is_err());
	}
}
