//! SQL Server strategy

use super::{common, DialectStrategy};
use crate::error::{DialectError, Result};
use crate::transform::{self, PAGE_LIMIT_PARAM, PAGE_OFFSET_PARAM};
use crate::types::{DialectKey, LockMode};
use async_trait::async_trait;

pub struct SqlServerDialect;

#[async_trait]
impl DialectStrategy for SqlServerDialect {
	fn key(&self) -> DialectKey {
		DialectKey::SqlServer
	}

	fn paging_sql(&self, body: &str) -> Result<String> {
		// OFFSET .. FETCH is only legal after an ORDER BY
		let body = if transform::has_outer_order_by(body)? {
			body.to_string()
		} else {
			format!("{} order by (select null)", body)
		};
		Ok(format!(
			"{} offset :{} rows fetch next :{} rows only",
			body, PAGE_OFFSET_PARAM, PAGE_LIMIT_PARAM
		))
	}

	fn top_sql(&self, body: &str, n: u64) -> Result<String> {
		common::inject_top(body, &format!("top {}", n))
	}

	fn random_sql(&self, body: &str, n: u64) -> Result<String> {
		let body = transform::strip_outer_order_by(body)?;
		Ok(format!(
			"select top {} rd_t.* from ({}) rd_t order by newid()",
			n, body
		))
	}

	fn lock_clause(&self, mode: LockMode) -> Result<Option<&'static str>> {
		// row locks are table hints, not a trailing clause
		match mode {
			LockMode::None => Ok(None),
			_ => Err(DialectError::unsupported("row lock clause", self.key())),
		}
	}

	fn apply_lock(&self, sql: &str, mode: LockMode) -> Result<String> {
		let hint = match mode {
			LockMode::None => return Ok(sql.to_string()),
			LockMode::Upgrade => "with (updlock, rowlock)",
			LockMode::UpgradeNowait => "with (updlock, rowlock, nowait)",
			LockMode::UpgradeSkipLocked => "with (updlock, rowlock, readpast)",
		};
		let insert_at = lock_hint_position(sql)?;
		Ok(format!(
			"{} {}{}",
			&sql[..insert_at],
			hint,
			&sql[insert_at..]
		))
	}

	fn coalesce_fn(&self) -> &'static str {
		"isnull"
	}

	fn supports_merge(&self) -> bool {
		true
	}

	fn procedure_call_sql(&self, name: &str, arg_count: usize) -> Result<String> {
		let args = vec!["?"; arg_count].join(", ");
		Ok(format!("exec {} {}", name, args))
	}
}

fn is_ident(b: u8) -> bool {
	b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
}

/// Byte offset right after the first FROM-clause table reference (alias
/// included), where a table hint may be inserted
fn lock_hint_position(sql: &str) -> Result<usize> {
	const CLAUSE_STARTERS: [&str; 12] = [
		"where", "join", "on", "group", "order", "left", "right", "inner", "outer", "cross",
		"union", "having",
	];
	let mask = transform::mask_literals(sql)?;
	let from_ix = transform::find_keyword_at_depth0(&mask, "from", 0)
		.ok_or_else(|| DialectError::rewrite("no FROM clause to attach lock hints to", sql))?;
	let bytes = mask.as_bytes();
	let mut i = from_ix + "from".len();
	while i < bytes.len() && bytes[i].is_ascii_whitespace() {
		i += 1;
	}
	if i >= bytes.len() || bytes[i] == b'(' {
		return Err(DialectError::rewrite(
			"cannot attach lock hints to a derived table",
			sql,
		));
	}
	while i < bytes.len() && is_ident(bytes[i]) {
		i += 1;
	}
	// swallow an alias (with or without AS) so the hint lands after it
	let mut end = i;
	loop {
		let mut j = end;
		while j < bytes.len() && bytes[j].is_ascii_whitespace() {
			j += 1;
		}
		let word_start = j;
		while j < bytes.len() && is_ident(bytes[j]) {
			j += 1;
		}
		let word = &mask[word_start..j];
		if word.is_empty() || CLAUSE_STARTERS.contains(&word) {
			break;
		}
		end = j;
		if word != "as" {
			break;
		}
	}
	Ok(end)
}
