//! Pagination and top-N rewriting support
//!
//! The dialect strategies compose these helpers with their own syntax
//! fragments; nothing here is dialect-specific beyond the wrapping rule.

use super::has_outer_order_by;
use crate::error::Result;

/// Reserved named parameter carrying the page offset
pub const PAGE_OFFSET_PARAM: &str = "gp_page_offset";
/// Reserved named parameter carrying the page size / limit
pub const PAGE_LIMIT_PARAM: &str = "gp_page_limit";

/// Wrap the body in `select * from (body) alias` when it ends in a
/// depth-0 ORDER BY
///
/// ROWNUM- and TOP-style dialects number rows *before* an outer ORDER BY
/// would apply; wrapping first preserves the ordering under pagination.
/// LIMIT/OFFSET and OFFSET..FETCH dialects do not need this and should not
/// call it.
pub fn wrap_for_paging(body: &str) -> Result<String> {
	if has_outer_order_by(body)? {
		Ok(format!("select * from ({}) pg_t", body))
	} else {
		Ok(body.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_wraps_ordered_body() {
		let out = wrap_for_paging("select * from t order by id desc").unwrap();
		assert_eq!(out, "select * from (select * from t order by id desc) pg_t");
	}

	#[test]
	fn test_leaves_unordered_body() {
		let out = wrap_for_paging("select * from t where a = :a").unwrap();
		assert_eq!(out, "select * from t where a = :a");
	}

	#[test]
	fn test_subquery_order_by_not_wrapped() {
		let sql = "select * from (select * from t order by id) x";
		assert_eq!(wrap_for_paging(sql).unwrap(), sql);
	}
}
