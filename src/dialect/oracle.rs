//! Oracle-family strategies: modern Oracle (`OFFSET .. FETCH`), legacy
//! Oracle releases (ROWNUM windowing), and Dameng, which keeps Oracle
//! semantics throughout

use super::DialectStrategy;
use crate::error::Result;
use crate::transform::{self, PAGE_LIMIT_PARAM, PAGE_OFFSET_PARAM};
use crate::types::DialectKey;
use async_trait::async_trait;

pub struct OracleDialect;

fn offset_fetch(body: &str) -> String {
	format!(
		"{} offset :{} rows fetch next :{} rows only",
		body, PAGE_OFFSET_PARAM, PAGE_LIMIT_PARAM
	)
}

fn fetch_first(body: &str, n: u64) -> String {
	format!("{} fetch first {} rows only", body, n)
}

fn random_fetch(body: &str, n: u64) -> Result<String> {
	let body = transform::wrap_for_random(body)?;
	Ok(format!(
		"{} order by dbms_random.value fetch first {} rows only",
		body, n
	))
}

#[async_trait]
impl DialectStrategy for OracleDialect {
	fn key(&self) -> DialectKey {
		DialectKey::Oracle
	}

	fn paging_sql(&self, body: &str) -> Result<String> {
		Ok(offset_fetch(body))
	}

	fn top_sql(&self, body: &str, n: u64) -> Result<String> {
		Ok(fetch_first(body, n))
	}

	fn random_sql(&self, body: &str, n: u64) -> Result<String> {
		random_fetch(body, n)
	}

	fn coalesce_fn(&self) -> &'static str {
		"nvl"
	}

	fn supports_merge(&self) -> bool {
		true
	}

	fn merge_source_suffix(&self) -> &'static str {
		" from dual"
	}

	fn procedure_call_sql(&self, name: &str, arg_count: usize) -> Result<String> {
		Ok(format!("call {}({})", name, question_marks(arg_count)))
	}
}

/// Oracle releases predating `OFFSET .. FETCH`; pages through a ROWNUM
/// window, binding the upper row number rather than a page size
pub struct Oracle11Dialect;

#[async_trait]
impl DialectStrategy for Oracle11Dialect {
	fn key(&self) -> DialectKey {
		DialectKey::Oracle11
	}

	fn paging_sql(&self, body: &str) -> Result<String> {
		// ROWNUM is assigned before ORDER BY; a trailing sort must be
		// pushed into a subquery first
		let body = transform::wrap_for_paging(body)?;
		Ok(format!(
			"select * from (select tmp_t.*, rownum rn_t from ({}) tmp_t where rownum <= :{}) where rn_t > :{}",
			body, PAGE_LIMIT_PARAM, PAGE_OFFSET_PARAM
		))
	}

	fn top_sql(&self, body: &str, n: u64) -> Result<String> {
		let body = transform::wrap_for_paging(body)?;
		Ok(format!(
			"select * from ({}) where rownum <= {}",
			body, n
		))
	}

	fn random_sql(&self, body: &str, n: u64) -> Result<String> {
		let body = transform::wrap_for_random(body)?;
		Ok(format!(
			"select * from ({} order by dbms_random.value) where rownum <= {}",
			body, n
		))
	}

	fn page_bound_values(&self, page_no: u64, page_size: u64) -> (i64, i64) {
		// upper bound is an absolute row number, not a page size
		(((page_no - 1) * page_size) as i64, (page_no * page_size) as i64)
	}

	fn coalesce_fn(&self) -> &'static str {
		"nvl"
	}

	fn supports_merge(&self) -> bool {
		true
	}

	fn merge_source_suffix(&self) -> &'static str {
		" from dual"
	}

	fn procedure_call_sql(&self, name: &str, arg_count: usize) -> Result<String> {
		Ok(format!("call {}({})", name, question_marks(arg_count)))
	}
}

/// Dameng: Oracle-compatible syntax, including MERGE and sequences
pub struct DmDialect;

#[async_trait]
impl DialectStrategy for DmDialect {
	fn key(&self) -> DialectKey {
		DialectKey::Dm
	}

	fn paging_sql(&self, body: &str) -> Result<String> {
		Ok(offset_fetch(body))
	}

	fn top_sql(&self, body: &str, n: u64) -> Result<String> {
		Ok(fetch_first(body, n))
	}

	fn random_sql(&self, body: &str, n: u64) -> Result<String> {
		random_fetch(body, n)
	}

	fn coalesce_fn(&self) -> &'static str {
		"nvl"
	}

	fn supports_merge(&self) -> bool {
		true
	}

	fn merge_source_suffix(&self) -> &'static str {
		" from dual"
	}

	fn procedure_call_sql(&self, name: &str, arg_count: usize) -> Result<String> {
		Ok(format!("call {}({})", name, question_marks(arg_count)))
	}
}

fn question_marks(n: usize) -> String {
	vec!["?"; n].join(", ")
}
