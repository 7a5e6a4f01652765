//! DB2 strategy

use super::DialectStrategy;
use crate::error::Result;
use crate::transform::{self, PAGE_LIMIT_PARAM, PAGE_OFFSET_PARAM};
use crate::types::DialectKey;
use async_trait::async_trait;

pub struct Db2Dialect;

#[async_trait]
impl DialectStrategy for Db2Dialect {
	fn key(&self) -> DialectKey {
		DialectKey::Db2
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

	fn random_sql(&self, body: &str, n: u64) -> Result<String> {
		let body = transform::wrap_for_random(body)?;
		Ok(format!(
			"{} order by rand() fetch first {} rows only",
			body, n
		))
	}

	fn coalesce_fn(&self) -> &'static str {
		"nvl"
	}

	fn supports_merge(&self) -> bool {
		true
	}

	fn merge_source_suffix(&self) -> &'static str {
		" from sysibm.sysdummy1"
	}

	fn procedure_call_sql(&self, name: &str, arg_count: usize) -> Result<String> {
		let args = vec!["?"; arg_count].join(", ");
		Ok(format!("call {}({})", name, args))
	}
}
