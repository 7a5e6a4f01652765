//! Positional/named parameter conversion and final placeholder rendering

use super::{mask_literals, named_params_in_mask};
use crate::error::{DialectError, Result};
use crate::types::{PlaceholderStyle, QueryValue};
use std::collections::HashMap;

/// Prefix for synthesized parameter names
const GENERATED_PREFIX: &str = "gp_auto";

/// Replace `?` placeholders (outside string literals) with synthetic names
///
/// Returns the rewritten SQL and the generated names in placeholder order.
/// `start_index` offsets the generated names so that pre/body/tail segments
/// of a fast-wrapped template land in one shared namespace.
pub fn convert_positional_to_named(sql: &str, start_index: usize) -> Result<(String, Vec<String>)> {
	let mask = mask_literals(sql)?;
	let bytes = mask.as_bytes();
	let mut out = String::with_capacity(sql.len() + 16);
	let mut names = Vec::new();
	let mut last = 0;
	for (i, b) in bytes.iter().enumerate() {
		if *b == b'?' {
			let name = format!("{}{}", GENERATED_PREFIX, start_index + names.len());
			out.push_str(&sql[last..i]);
			out.push(':');
			out.push_str(&name);
			names.push(name);
			last = i + 1;
		}
	}
	out.push_str(&sql[last..]);
	Ok((out, names))
}

/// Render named-parameter SQL into the dialect's positional form
///
/// Every `:name` occurrence (outside literals, `::` casts excluded) is
/// replaced with `$n` or `?` and its value, looked up by name, is pushed
/// into the output parameter vector in occurrence order. A name with no
/// bound value is an error.
pub fn bind_named(
	sql: &str,
	params: &HashMap<String, QueryValue>,
	style: PlaceholderStyle,
) -> Result<(String, Vec<QueryValue>)> {
	let mask = mask_literals(sql)?;
	let names = named_params_in_mask(&mask, sql);
	let mut out = String::with_capacity(sql.len());
	let mut values = Vec::with_capacity(names.len());

	let bytes = mask.as_bytes();
	let mut i = 0;
	let mut ord = 0usize;
	while i < bytes.len() {
		if bytes[i] == b':'
			&& !(i > 0 && bytes[i - 1] == b':')
			&& !(i + 1 < bytes.len() && bytes[i + 1] == b':')
		{
			let start = i + 1;
			let mut end = start;
			while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
				end += 1;
			}
			if end > start && bytes[start].is_ascii_alphabetic() {
				let name = &sql[start..end];
				let value = params.get(name).ok_or_else(|| {
					DialectError::Parameter(format!("no value bound for parameter `{}`", name))
				})?;
				ord += 1;
				out.push_str(&style.render(ord));
				values.push(value.clone());
				i = end;
				continue;
			}
		}
		let ch_len = sql[i..].chars().next().map_or(1, char::len_utf8);
		out.push_str(&sql[i..i + ch_len]);
		i += ch_len;
	}
	Ok((out, values))
}
