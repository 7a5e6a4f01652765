//! COUNT-query derivation from arbitrary query text

use super::{
	check_brackets, expect_word, find_keyword_at_depth0, mask_literals, named_params_in_mask,
	skip_bracket_group, strip_outer_order_by,
};
use crate::error::{DialectError, Result};
use crate::types::DialectKey;

/// Aggregate functions whose presence in the select-list forbids the cheap
/// select-list replacement
const AGGREGATES: &[&str] = &[
	"sum",
	"avg",
	"min",
	"max",
	"count",
	"first",
	"last",
	"first_value",
	"last_value",
];

/// A derived count query
#[derive(Debug, Clone, PartialEq)]
pub struct CountSql {
	pub sql: String,
	/// The SQL must be used as-is; no further wrapping is allowed
	pub is_final: bool,
	/// How many bound parameters belong to the WITH-clause prefix.
	/// Positional binding must slice the original parameter array so that
	/// placeholder positions still align 1:1.
	pub with_param_count: usize,
}

/// Derive a count query from `body`
///
/// `count_override`, when configured on the template, passes through
/// verbatim. `union_all_count_safe` is the caller-declared opt-in for the
/// per-branch UNION ALL rewrite; it is never inferred from the text.
pub fn derive_count_sql(
	body: &str,
	count_override: Option<&str>,
	dialect: DialectKey,
	union_all_count_safe: bool,
	ignore_bracket: bool,
) -> Result<CountSql> {
	if let Some(sql) = count_override {
		return Ok(CountSql {
			sql: sql.to_string(),
			is_final: true,
			with_param_count: 0,
		});
	}
	if !ignore_bracket {
		check_brackets(body)?;
	}

	let (with_prefix, rest) = split_with_clause(body)?;
	let with_param_count = count_params(&with_prefix)?;
	let rest = strip_outer_order_by(rest.trim())?;
	let mask = mask_literals(&rest)?;

	if union_all_count_safe
		&& let Some(sql) = try_union_all_rewrite(&rest, &mask, dialect)?
	{
		return Ok(CountSql {
			sql: reattach_with(&with_prefix, &sql),
			is_final: true,
			with_param_count,
		});
	}

	let select_ix = find_keyword_at_depth0(&mask, "select", 0)
		.ok_or_else(|| DialectError::rewrite("no outer SELECT", body))?;
	let from_ix = find_keyword_at_depth0(&mask, "from", select_ix)
		.ok_or_else(|| DialectError::rewrite("no outer FROM", body))?;

	let list_mask = &mask[select_ix + "select".len()..from_ix];
	let distinct = list_mask.trim_start().starts_with("distinct");
	let has_union = find_keyword_at_depth0(&mask, "union", 0).is_some();
	let has_group_by = match find_keyword_at_depth0(&mask, "group", from_ix) {
		Some(ix) => expect_word(&mask, ix + "group".len(), "by").is_some(),
		None => false,
	};

	let sql = if distinct || has_union || has_group_by {
		// Set semantics or grouped cardinality: the row count can only be
		// taken over the whole body.
		wrap_count(&rest)
	} else if select_list_has_aggregate(list_mask) {
		// Aggregates collapse rows; replacing the select-list would change
		// the result value.
		wrap_count(&rest)
	} else {
		format!("select {} {}", count_expr(dialect), &rest[from_ix..])
	};

	Ok(CountSql {
		sql: reattach_with(&with_prefix, &sql),
		is_final: false,
		with_param_count,
	})
}

fn count_expr(dialect: DialectKey) -> &'static str {
	// Column stores count fastest over the star projection
	match dialect {
		DialectKey::ClickHouse => "count(*)",
		_ => "count(1)",
	}
}

fn wrap_count(body: &str) -> String {
	format!("select count(1) from ({}) ct_t", body)
}

fn reattach_with(with_prefix: &str, sql: &str) -> String {
	if with_prefix.is_empty() {
		sql.to_string()
	} else {
		format!("{} {}", with_prefix.trim_end(), sql)
	}
}

/// Split a leading WITH clause from the body, returning (prefix, rest)
fn split_with_clause(body: &str) -> Result<(String, &str)> {
	let mask = mask_literals(body)?;
	let trimmed_start = mask.len() - mask.trim_start().len();
	if !mask[trimmed_start..].starts_with("with")
		|| mask[trimmed_start + 4..]
			.bytes()
			.next()
			.is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
	{
		return Ok((String::new(), body));
	}

	let bytes = mask.as_bytes();
	let mut i = trimmed_start + "with".len();
	// Optional RECURSIVE
	if let Some(next) = expect_word(&mask, i, "recursive") {
		i = next;
	}
	loop {
		// cte name
		while i < bytes.len() && bytes[i].is_ascii_whitespace() {
			i += 1;
		}
		let name_start = i;
		while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
			i += 1;
		}
		if i == name_start {
			return Err(DialectError::rewrite("malformed WITH clause", body));
		}
		// optional column list
		{
			let mut j = i;
			while j < bytes.len() && bytes[j].is_ascii_whitespace() {
				j += 1;
			}
			if j < bytes.len() && bytes[j] == b'(' {
				i = skip_bracket_group(&mask, j)?;
			}
		}
		i = expect_word(&mask, i, "as")
			.ok_or_else(|| DialectError::rewrite("WITH clause missing AS", body))?;
		i = skip_bracket_group(&mask, i)?;
		// another cte?
		let mut j = i;
		while j < bytes.len() && bytes[j].is_ascii_whitespace() {
			j += 1;
		}
		if j < bytes.len() && bytes[j] == b',' {
			i = j + 1;
			continue;
		}
		return Ok((body[..i].to_string(), &body[i..]));
	}
}

/// Bound parameters (named or positional) inside a SQL fragment
fn count_params(fragment: &str) -> Result<usize> {
	if fragment.is_empty() {
		return Ok(0);
	}
	let mask = mask_literals(fragment)?;
	let named = named_params_in_mask(&mask, fragment).len();
	let positional = mask.bytes().filter(|b| *b == b'?').count();
	Ok(named + positional)
}

/// Whether the select-list calls an aggregate at its own nesting level
fn select_list_has_aggregate(list_mask: &str) -> bool {
	for agg in AGGREGATES {
		let mut from = 0;
		while let Some(ix) = find_keyword_at_depth0(list_mask, agg, from) {
			// must be a call: next non-space char is `(`
			let after = &list_mask[ix + agg.len()..];
			if after.trim_start().starts_with('(') {
				return true;
			}
			from = ix + agg.len();
		}
	}
	false
}

/// Per-branch UNION ALL count rewrite
///
/// Only applies when every depth-0 set operator is UNION ALL; summing
/// per-branch counts avoids materializing the unioned row set.
fn try_union_all_rewrite(
	rest: &str,
	mask: &str,
	dialect: DialectKey,
) -> Result<Option<String>> {
	let mut splits = Vec::new();
	let mut from = 0;
	while let Some(ix) = find_keyword_at_depth0(mask, "union", from) {
		let Some(after_all) = expect_word(mask, ix + "union".len(), "all") else {
			// plain UNION present: the rewrite would change the count
			return Ok(None);
		};
		splits.push((ix, after_all));
		from = after_all;
	}
	if splits.is_empty() {
		return Ok(None);
	}

	let mut branches = Vec::with_capacity(splits.len() + 1);
	let mut start = 0;
	for (ix, after) in &splits {
		branches.push(&rest[start..*ix]);
		start = *after;
	}
	branches.push(&rest[start..]);

	let count_fn = count_expr(dialect);
	let mut parts = Vec::with_capacity(branches.len());
	for branch in branches {
		let branch_mask = mask_literals(branch)?;
		let select_ix = find_keyword_at_depth0(&branch_mask, "select", 0)
			.ok_or_else(|| DialectError::rewrite("UNION ALL branch without SELECT", branch))?;
		let from_ix = find_keyword_at_depth0(&branch_mask, "from", select_ix)
			.ok_or_else(|| DialectError::rewrite("UNION ALL branch without FROM", branch))?;
		parts.push(format!(
			"select {} row_count {}",
			count_fn,
			branch[from_ix..].trim()
		));
	}
	Ok(Some(format!(
		"select sum(row_count) from ({}) ct_sum",
		parts.join(" union all ")
	)))
}
