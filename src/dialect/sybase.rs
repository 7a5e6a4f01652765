//! Sybase IQ strategy
//!
//! Pages through a ROW_NUMBER window; upserts fall back to the
//! update-then-insert flow with a plain (non-ignoring) insert, since IQ has
//! neither MERGE nor a conflict-ignoring insert form.

use super::{common, DialectStrategy};
use crate::error::Result;
use crate::transform::{self, PAGE_LIMIT_PARAM, PAGE_OFFSET_PARAM};
use crate::types::DialectKey;
use async_trait::async_trait;

pub struct SybaseIqDialect;

#[async_trait]
impl DialectStrategy for SybaseIqDialect {
	fn key(&self) -> DialectKey {
		DialectKey::SybaseIq
	}

	fn paging_sql(&self, body: &str) -> Result<String> {
		let body = transform::wrap_for_paging(body)?;
		Ok(format!(
			"select * from (select row_number() over (order by 1) rn_t, tmp_t.* from ({}) tmp_t) pg_w where rn_t > :{} and rn_t <= :{} + :{}",
			body, PAGE_OFFSET_PARAM, PAGE_OFFSET_PARAM, PAGE_LIMIT_PARAM
		))
	}

	fn top_sql(&self, body: &str, n: u64) -> Result<String> {
		common::inject_top(body, &format!("top {}", n))
	}

	fn random_sql(&self, body: &str, n: u64) -> Result<String> {
		let body = transform::strip_outer_order_by(body)?;
		Ok(format!(
			"select top {} rd_t.* from ({}) rd_t order by rand()",
			n, body
		))
	}

	fn coalesce_fn(&self) -> &'static str {
		"isnull"
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_paging_binds_offset_twice() {
		let sql = SybaseIqDialect.paging_sql("select * from t").unwrap();
		assert_eq!(sql.matches(":gp_page_offset").count(), 2);
		assert_eq!(sql.matches(":gp_page_limit").count(), 1);
	}

	#[test]
	fn test_top_injection() {
		assert_eq!(
			SybaseIqDialect.top_sql("select a from t", 4).unwrap(),
			"select top 4 a from t"
		);
	}
}
