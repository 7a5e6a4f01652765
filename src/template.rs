//! Dialect-neutral query/update templates and per-call invocations
//!
//! A [`SqlTemplate`] is parsed once, cached by id, and never mutated in
//! place: per-call specialization (sharded table names) always goes through
//! [`SqlTemplate::specialize`], which clones.

use crate::error::{DialectError, Result};
use crate::transform;
use crate::types::{DialectKey, LockMode, QueryValue};
use std::collections::HashMap;
use std::time::Duration;

/// SQL text variants for one dialect
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlSegments {
	/// Full query/update body
	pub main: String,
	/// Explicit count-query override; used verbatim when present
	pub count_override: Option<String>,
	/// Outer SQL preceding the reusable core ("fast" wrapping)
	pub fast_pre: Option<String>,
	/// The reusable core query
	pub fast_body: Option<String>,
	/// Outer SQL following the core
	pub fast_tail: Option<String>,
}

/// Page-optimize policy attached to a template
#[derive(Debug, Clone, PartialEq)]
pub struct PageOptimize {
	/// Reuse previously computed totals keyed by template + parameters
	pub enabled: bool,
	/// Fork count and fetch concurrently on a cache miss
	pub parallel: bool,
	/// How long a cached total stays valid
	pub alive: Duration,
	/// Join wait ceiling override for this template
	pub timeout: Option<Duration>,
}

impl Default for PageOptimize {
	fn default() -> Self {
		Self {
			enabled: true,
			parallel: false,
			alive: Duration::from_secs(5 * 60),
			timeout: None,
		}
	}
}

/// A parsed, dialect-neutral query/update definition
///
/// Immutable after [`SqlTemplateBuilder::build`]; cloned and specialized per
/// invocation when sharding rewrites table names.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlTemplate {
	id: String,
	segments: SqlSegments,
	dialect_segments: HashMap<DialectKey, SqlSegments>,
	param_names: Vec<String>,
	has_union: bool,
	has_with: bool,
	has_fast: bool,
	is_named_param: bool,
	ignore_bracket: bool,
	union_all_count_safe: bool,
	page_optimize: Option<PageOptimize>,
}

impl SqlTemplate {
	pub fn builder(id: impl Into<String>, sql: impl Into<String>) -> SqlTemplateBuilder {
		SqlTemplateBuilder::new(id, sql)
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	/// Segment set for a dialect, falling back to the default variant
	pub fn segments(&self, dialect: DialectKey) -> &SqlSegments {
		self.dialect_segments.get(&dialect).unwrap_or(&self.segments)
	}

	/// The text that paging/count/random rewrites operate on: the fast
	/// core when the template is fast-wrapped, otherwise the full body
	pub fn rewrite_body(&self, dialect: DialectKey) -> &str {
		let segments = self.segments(dialect);
		if self.has_fast {
			segments.fast_body.as_deref().unwrap_or(&segments.main)
		} else {
			&segments.main
		}
	}

	/// Fast pre/tail wrapping text, when present
	pub fn fast_wrap(&self, dialect: DialectKey) -> (Option<&str>, Option<&str>) {
		let segments = self.segments(dialect);
		(
			segments.fast_pre.as_deref(),
			segments.fast_tail.as_deref(),
		)
	}

	pub fn count_override(&self, dialect: DialectKey) -> Option<&str> {
		self.segments(dialect).count_override.as_deref()
	}

	pub fn param_names(&self) -> &[String] {
		&self.param_names
	}

	pub fn has_union(&self) -> bool {
		self.has_union
	}

	pub fn has_with(&self) -> bool {
		self.has_with
	}

	pub fn has_fast(&self) -> bool {
		self.has_fast
	}

	pub fn is_named_param(&self) -> bool {
		self.is_named_param
	}

	pub fn ignore_bracket(&self) -> bool {
		self.ignore_bracket
	}

	/// Caller-declared "all UNION ALL branches may be counted per branch
	/// and summed" optimization
	pub fn union_all_count_safe(&self) -> bool {
		self.union_all_count_safe
	}

	pub fn page_optimize(&self) -> Option<&PageOptimize> {
		self.page_optimize.as_ref()
	}

	/// Clone this template with table references rewritten
	///
	/// Used by sharding: the cached original stays untouched.
	pub fn specialize(&self, table_map: &HashMap<String, String>) -> SqlTemplate {
		let mut copy = self.clone();
		let rewrite = |sql: &mut String| {
			for (from, to) in table_map {
				*sql = transform::replace_table(sql, from, to);
			}
		};
		let rewrite_segments = |segments: &mut SqlSegments| {
			rewrite(&mut segments.main);
			if let Some(count) = segments.count_override.as_mut() {
				rewrite(count);
			}
			if let Some(pre) = segments.fast_pre.as_mut() {
				rewrite(pre);
			}
			if let Some(body) = segments.fast_body.as_mut() {
				rewrite(body);
			}
			if let Some(tail) = segments.fast_tail.as_mut() {
				rewrite(tail);
			}
		};
		rewrite_segments(&mut copy.segments);
		for segments in copy.dialect_segments.values_mut() {
			rewrite_segments(segments);
		}
		copy
	}
}

/// Builder for [`SqlTemplate`]
///
/// Structural flags (union, with, named-parameter mode) are detected from
/// the SQL text at build time; positional `?` templates are converted into
/// named form so every later rewrite works in one parameter space.
pub struct SqlTemplateBuilder {
	id: String,
	segments: SqlSegments,
	dialect_segments: HashMap<DialectKey, SqlSegments>,
	ignore_bracket: bool,
	union_all_count_safe: bool,
	page_optimize: Option<PageOptimize>,
}

impl SqlTemplateBuilder {
	pub fn new(id: impl Into<String>, sql: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			segments: SqlSegments {
				main: sql.into(),
				..SqlSegments::default()
			},
			dialect_segments: HashMap::new(),
			ignore_bracket: false,
			union_all_count_safe: false,
			page_optimize: None,
		}
	}

	/// Explicit count SQL, used verbatim instead of count derivation
	pub fn count_sql(mut self, sql: impl Into<String>) -> Self {
		self.segments.count_override = Some(sql.into());
		self
	}

	/// Fast-wrapped form: `pre` and `tail` wrap a reusable core query
	pub fn fast(
		mut self,
		pre: impl Into<String>,
		body: impl Into<String>,
		tail: impl Into<String>,
	) -> Self {
		self.segments.fast_pre = Some(pre.into());
		self.segments.fast_body = Some(body.into());
		self.segments.fast_tail = Some(tail.into());
		self
	}

	/// Dialect-specific SQL variant
	pub fn dialect_sql(mut self, dialect: DialectKey, sql: impl Into<String>) -> Self {
		self.dialect_segments
			.entry(dialect)
			.or_default()
			.main = sql.into();
		self
	}

	/// Dialect-specific count override
	pub fn dialect_count_sql(mut self, dialect: DialectKey, sql: impl Into<String>) -> Self {
		self.dialect_segments
			.entry(dialect)
			.or_default()
			.count_override = Some(sql.into());
		self
	}

	/// Suppress bracket-depth checks for templates whose literals contain
	/// unbalanced parentheses on purpose
	pub fn ignore_bracket(mut self, ignore: bool) -> Self {
		self.ignore_bracket = ignore;
		self
	}

	/// Opt in to the per-branch UNION ALL count rewrite
	pub fn union_all_count_safe(mut self, safe: bool) -> Self {
		self.union_all_count_safe = safe;
		self
	}

	pub fn page_optimize(mut self, policy: PageOptimize) -> Self {
		self.page_optimize = Some(policy);
		self
	}

	pub fn build(self) -> Result<SqlTemplate> {
		let mut segments = self.segments;
		if segments.main.trim().is_empty() {
			return Err(DialectError::Configuration(format!(
				"template `{}` has empty SQL",
				self.id
			)));
		}

		if !self.ignore_bracket {
			transform::check_brackets(&segments.main)?;
		}

		// Unify positional templates into named-parameter space so that
		// paging/count rewrites can inject parameters at well-defined
		// positions.
		let mut param_names = transform::named_params(&segments.main)?;
		let is_named_param = !param_names.is_empty() || !transform::has_positional(&segments.main)?;
		if !is_named_param {
			let (named, names) = transform::convert_positional_to_named(&segments.main, 0)?;
			segments.main = named;
			param_names = names;
		}
		if let (Some(pre), Some(body), Some(tail)) = (
			segments.fast_pre.clone(),
			segments.fast_body.clone(),
			segments.fast_tail.clone(),
		) {
			let (pre, pre_names) = transform::convert_positional_to_named(&pre, 0)?;
			let (body, body_names) =
				transform::convert_positional_to_named(&body, pre_names.len())?;
			let (tail, _) = transform::convert_positional_to_named(
				&tail,
				pre_names.len() + body_names.len(),
			)?;
			segments.fast_pre = Some(pre);
			segments.fast_body = Some(body);
			segments.fast_tail = Some(tail);
		}

		let mask = transform::mask_literals(&segments.main)?;
		let has_with = transform::starts_with_keyword(&mask, "with");
		let has_union = transform::contains_keyword_at_depth0(&mask, "union");
		let has_fast = segments.fast_body.is_some();

		Ok(SqlTemplate {
			id: self.id,
			segments,
			dialect_segments: self.dialect_segments,
			param_names,
			has_union,
			has_with,
			has_fast,
			is_named_param,
			ignore_bracket: self.ignore_bracket,
			union_all_count_safe: self.union_all_count_safe,
			page_optimize: self.page_optimize,
		})
	}
}

/// One runtime call against a template: bound parameters plus execution
/// hints. Created per call and discarded.
#[derive(Debug, Clone, Default)]
pub struct QueryInvocation {
	param_names: Vec<String>,
	param_values: Vec<QueryValue>,
	pub lock_mode: LockMode,
	pub max_rows: Option<usize>,
}

impl QueryInvocation {
	pub fn new(param_names: Vec<String>, param_values: Vec<QueryValue>) -> Result<Self> {
		if !param_names.is_empty() && param_names.len() != param_values.len() {
			return Err(DialectError::Parameter(format!(
				"{} parameter name(s) but {} value(s)",
				param_names.len(),
				param_values.len()
			)));
		}
		Ok(Self {
			param_names,
			param_values,
			lock_mode: LockMode::None,
			max_rows: None,
		})
	}

	/// Positional invocation: values bound in order against the template's
	/// generated parameter names
	pub fn positional(param_values: Vec<QueryValue>) -> Self {
		Self {
			param_names: Vec::new(),
			param_values,
			lock_mode: LockMode::None,
			max_rows: None,
		}
	}

	pub fn empty() -> Self {
		Self::default()
	}

	pub fn with_lock(mut self, mode: LockMode) -> Self {
		self.lock_mode = mode;
		self
	}

	pub fn param_names(&self) -> &[String] {
		&self.param_names
	}

	pub fn param_values(&self) -> &[QueryValue] {
		&self.param_values
	}

	/// Name→value view over the bound parameters
	///
	/// Positional invocations borrow the template's generated names.
	pub fn param_map(&self, template: &SqlTemplate) -> Result<HashMap<String, QueryValue>> {
		let names: &[String] = if self.param_names.is_empty() {
			template.param_names()
		} else {
			&self.param_names
		};
		if names.len() != self.param_values.len() {
			return Err(DialectError::Parameter(format!(
				"template `{}` expects {} parameter(s), invocation carries {}",
				template.id(),
				names.len(),
				self.param_values.len()
			)));
		}
		Ok(names
			.iter()
			.cloned()
			.zip(self.param_values.iter().cloned())
			.collect())
	}
}
