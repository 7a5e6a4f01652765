//! Random-sample rewriting support

use super::{contains_keyword_at_depth0, has_outer_order_by, mask_literals};
use crate::error::Result;

/// Wrap the body before appending a random ordering
///
/// An un-wrapped trailing ORDER BY would override the random ordering, and
/// a depth-0 UNION would attach the random clause to the last branch only.
pub fn wrap_for_random(body: &str) -> Result<String> {
	let mask = mask_literals(body)?;
	if has_outer_order_by(body)? || contains_keyword_at_depth0(&mask, "union") {
		Ok(format!("select rd_t.* from ({}) rd_t", body))
	} else {
		Ok(body.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_wraps_ordered_body() {
		let out = wrap_for_random("select * from t order by id").unwrap();
		assert_eq!(out, "select rd_t.* from (select * from t order by id) rd_t");
	}

	#[test]
	fn test_wraps_union_body() {
		let out = wrap_for_random("select a from t union all select a from u").unwrap();
		assert!(out.starts_with("select rd_t.* from ("));
	}

	#[test]
	fn test_plain_body_untouched() {
		assert_eq!(
			wrap_for_random("select * from t").unwrap(),
			"select * from t"
		);
	}
}
