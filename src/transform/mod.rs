//! Pure SQL-text transformation
//!
//! Everything in this module rewrites SQL strings without executing
//! anything. All scanning works on a *mask* of the input: a byte-for-byte
//! copy with string-literal contents blanked out and ASCII lowercased, so
//! that keyword and bracket positions found in the mask are valid byte
//! offsets into the original text.
//!
//! A transformation that cannot determine nesting (mismatched parentheses,
//! unterminated literal) fails fast: a silently wrong COUNT rewrite would
//! corrupt pagination downstream.

mod count;
mod named;
mod paging;
mod random;

pub use count::{CountSql, derive_count_sql};
pub use named::{bind_named, convert_positional_to_named};
pub use paging::{PAGE_LIMIT_PARAM, PAGE_OFFSET_PARAM, wrap_for_paging};
pub use random::wrap_for_random;

use crate::error::{DialectError, Result};

/// Blank out string-literal contents and lowercase the rest
///
/// Handles `'..'` literals (with `''` escapes), `"..."` quoted identifiers
/// and MySQL-style `` ` `` quoting. The result has the same byte length as
/// the input. An unterminated literal is an error.
pub fn mask_literals(sql: &str) -> Result<String> {
	let bytes = sql.as_bytes();
	let mut mask = Vec::with_capacity(bytes.len());
	let mut i = 0;
	while i < bytes.len() {
		let b = bytes[i];
		match b {
			b'\'' | b'"' | b'`' => {
				let quote = b;
				mask.push(quote);
				i += 1;
				let mut closed = false;
				while i < bytes.len() {
					if bytes[i] == quote {
						// '' inside a '-literal is an escaped quote
						if quote == b'\'' && i + 1 < bytes.len() && bytes[i + 1] == b'\'' {
							mask.push(b' ');
							mask.push(b' ');
							i += 2;
							continue;
						}
						mask.push(quote);
						i += 1;
						closed = true;
						break;
					}
					mask.push(b' ');
					i += 1;
				}
				if !closed {
					return Err(DialectError::rewrite("unterminated string literal", sql));
				}
			}
			_ => {
				mask.push(b.to_ascii_lowercase());
				i += 1;
			}
		}
	}
	// Only ASCII bytes were altered, so this is still valid UTF-8
	String::from_utf8(mask).map_err(|_| DialectError::rewrite("invalid utf-8 in SQL", sql))
}

/// Verify parentheses balance outside of string literals
pub fn check_brackets(sql: &str) -> Result<()> {
	let mask = mask_literals(sql)?;
	let mut depth: i32 = 0;
	for b in mask.bytes() {
		match b {
			b'(' => depth += 1,
			b')' => {
				depth -= 1;
				if depth < 0 {
					return Err(DialectError::rewrite("unbalanced closing parenthesis", sql));
				}
			}
			_ => {}
		}
	}
	if depth != 0 {
		return Err(DialectError::rewrite("unbalanced opening parenthesis", sql));
	}
	Ok(())
}

fn is_ident_byte(b: u8) -> bool {
	b.is_ascii_alphanumeric() || b == b'_'
}

/// Find `keyword` in the mask starting at `from`, matching only whole words
/// at bracket depth 0 (relative to `from`). Returns the byte offset.
pub(crate) fn find_keyword_at_depth0(mask: &str, keyword: &str, from: usize) -> Option<usize> {
	let bytes = mask.as_bytes();
	let kw = keyword.as_bytes();
	let mut depth: i32 = 0;
	let mut i = from;
	while i < bytes.len() {
		match bytes[i] {
			b'(' => depth += 1,
			b')' => depth -= 1,
			_ => {
				if depth == 0
					&& bytes[i..].starts_with(kw)
					&& (i == 0 || !is_ident_byte(bytes[i - 1]))
					&& (i + kw.len() >= bytes.len() || !is_ident_byte(bytes[i + kw.len()]))
				{
					return Some(i);
				}
			}
		}
		i += 1;
	}
	None
}

/// Last depth-0 occurrence of `keyword` in the mask
pub(crate) fn find_last_keyword_at_depth0(mask: &str, keyword: &str) -> Option<usize> {
	let mut last = None;
	let mut from = 0;
	while let Some(ix) = find_keyword_at_depth0(mask, keyword, from) {
		last = Some(ix);
		from = ix + keyword.len();
	}
	last
}

pub(crate) fn contains_keyword_at_depth0(mask: &str, keyword: &str) -> bool {
	find_keyword_at_depth0(mask, keyword, 0).is_some()
}

/// Whether the SQL's first token is `keyword`
pub(crate) fn starts_with_keyword(mask: &str, keyword: &str) -> bool {
	let trimmed = mask.trim_start();
	let offset = mask.len() - trimmed.len();
	let bytes = mask.as_bytes();
	trimmed.starts_with(keyword)
		&& (offset + keyword.len() >= bytes.len() || !is_ident_byte(bytes[offset + keyword.len()]))
}

/// Index just past the next non-whitespace run equal to `expected`, or None
pub(crate) fn expect_word(mask: &str, from: usize, expected: &str) -> Option<usize> {
	let bytes = mask.as_bytes();
	let mut i = from;
	while i < bytes.len() && bytes[i].is_ascii_whitespace() {
		i += 1;
	}
	if mask[i..].starts_with(expected)
		&& (i + expected.len() >= bytes.len() || !is_ident_byte(bytes[i + expected.len()]))
	{
		Some(i + expected.len())
	} else {
		None
	}
}

/// Skip past a balanced `( .. )` group starting at the next non-whitespace
/// char, which must be `(`. Returns the index just past the closing paren.
pub(crate) fn skip_bracket_group(mask: &str, from: usize) -> Result<usize> {
	let bytes = mask.as_bytes();
	let mut i = from;
	while i < bytes.len() && bytes[i].is_ascii_whitespace() {
		i += 1;
	}
	if i >= bytes.len() || bytes[i] != b'(' {
		return Err(DialectError::rewrite(
			format!("expected `(` at byte {}", i),
			mask,
		));
	}
	let mut depth = 0;
	while i < bytes.len() {
		match bytes[i] {
			b'(' => depth += 1,
			b')' => {
				depth -= 1;
				if depth == 0 {
					return Ok(i + 1);
				}
			}
			_ => {}
		}
		i += 1;
	}
	Err(DialectError::rewrite("unbalanced opening parenthesis", mask))
}

/// Named parameters (`:name`) in order of appearance, skipping `::` casts
pub fn named_params(sql: &str) -> Result<Vec<String>> {
	let mask = mask_literals(sql)?;
	Ok(named_params_in_mask(&mask, sql))
}

pub(crate) fn named_params_in_mask(mask: &str, sql: &str) -> Vec<String> {
	let bytes = mask.as_bytes();
	let mut names = Vec::new();
	let mut i = 0;
	while i < bytes.len() {
		if bytes[i] == b':' {
			// `::type` casts and `a:b` are not parameters
			let prev_colon = i > 0 && bytes[i - 1] == b':';
			let next_colon = i + 1 < bytes.len() && bytes[i + 1] == b':';
			if prev_colon || next_colon {
				i += 1;
				continue;
			}
			let start = i + 1;
			let mut end = start;
			while end < bytes.len() && is_ident_byte(bytes[end]) {
				end += 1;
			}
			if end > start && bytes[start].is_ascii_alphabetic() {
				names.push(sql[start..end].to_string());
				i = end;
				continue;
			}
		}
		i += 1;
	}
	names
}

/// Whether the SQL carries positional `?` placeholders
pub fn has_positional(sql: &str) -> Result<bool> {
	let mask = mask_literals(sql)?;
	Ok(mask.bytes().any(|b| b == b'?'))
}

/// Replace whole-word references to `from` (a table name) with `to`,
/// leaving string literals untouched
pub fn replace_table(sql: &str, from: &str, to: &str) -> String {
	let mask = match mask_literals(sql) {
		Ok(m) => m,
		Err(_) => return sql.to_string(),
	};
	let needle = from.to_ascii_lowercase();
	let bytes = mask.as_bytes();
	let mut out = String::with_capacity(sql.len());
	let mut i = 0;
	while i < bytes.len() {
		if mask[i..].starts_with(&needle)
			&& (i == 0 || !is_ident_byte(bytes[i - 1]))
			&& (i + needle.len() >= bytes.len() || !is_ident_byte(bytes[i + needle.len()]))
		{
			out.push_str(to);
			i += needle.len();
		} else {
			let ch_len = sql[i..].chars().next().map_or(1, char::len_utf8);
			out.push_str(&sql[i..i + ch_len]);
			i += ch_len;
		}
	}
	out
}

/// Whether the body carries a trailing depth-0 ORDER BY
pub fn has_outer_order_by(sql: &str) -> Result<bool> {
	let mask = mask_literals(sql)?;
	if let Some(ix) = find_last_keyword_at_depth0(&mask, "order") {
		return Ok(expect_word(&mask, ix + "order".len(), "by").is_some());
	}
	Ok(false)
}

/// Strip a trailing depth-0 ORDER BY clause, returning the shortened text
///
/// The clause is only removed when nothing but its expressions follow it at
/// depth 0, which is exactly the case where it cannot affect a COUNT.
pub fn strip_outer_order_by(sql: &str) -> Result<String> {
	let mask = mask_literals(sql)?;
	if let Some(ix) = find_last_keyword_at_depth0(&mask, "order")
		&& expect_word(&mask, ix + "order".len(), "by").is_some()
		&& find_keyword_at_depth0(&mask, "select", ix).is_none()
		&& find_keyword_at_depth0(&mask, "from", ix).is_none()
	{
		return Ok(sql[..ix].trim_end().to_string());
	}
	Ok(sql.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_mask_blanks_literals() {
		let mask = mask_literals("select 'It''s (a) FROM' as x FROM t").unwrap();
		assert!(!mask.contains("(a)"));
		assert!(mask.contains("from t"));
		assert_eq!(mask.len(), "select 'It''s (a) FROM' as x FROM t".len());
	}

	#[test]
	fn test_unterminated_literal_fails() {
		assert!(mask_literals("select 'oops from t").is_err());
	}

	#[test]
	fn test_check_brackets() {
		assert!(check_brackets("select * from (select 1) t").is_ok());
		assert!(check_brackets("select * from (select 1 t").is_err());
		assert!(check_brackets("select ')' from (select 1) t").is_ok());
	}

	#[test]
	fn test_keyword_search_respects_depth() {
		let mask = mask_literals("select a from (select b from u order by b) x").unwrap();
		assert_eq!(find_keyword_at_depth0(&mask, "order", 0), None);
		assert!(find_keyword_at_depth0(&mask, "from", 0).is_some());
	}

	#[test]
	fn test_keyword_whole_word_only() {
		let mask = mask_literals("select unions from reorder").unwrap();
		assert!(!contains_keyword_at_depth0(&mask, "union"));
		assert!(!contains_keyword_at_depth0(&mask, "order"));
	}

	#[test]
	fn test_named_params_skip_casts() {
		let names = named_params("select a::text from t where b = :b and c = :c").unwrap();
		assert_eq!(names, vec!["b".to_string(), "c".to_string()]);
	}

	#[test]
	fn test_strip_outer_order_by() {
		let out =
			strip_outer_order_by("select * from orders where a = :a order by created desc")
				.unwrap();
		assert_eq!(out, "select * from orders where a = :a");
	}

	#[test]
	fn test_nested_order_by_kept() {
		let sql = "select * from (select * from t order by id) x where a = 1";
		assert_eq!(strip_outer_order_by(sql).unwrap(), sql);
		assert!(!has_outer_order_by(sql).unwrap());
	}

	#[test]
	fn test_replace_table_word_boundary() {
		let out = replace_table("select * from orders o join orders_log l", "orders", "orders_7");
		assert_eq!(out, "select * from orders_7 o join orders_log l");
	}
}
