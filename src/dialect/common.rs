//! SQL builders and execution flows shared across dialect strategies

use super::{DialectStrategy, UpsertOutcome};
use crate::batch;
use crate::config::BatchConfig;
use crate::error::{DialectError, Result};
use crate::executor::SqlExecutor;
use crate::meta::{ColumnMeta, EntityMeta, FieldValues, IdGenerator, PkStrategy};
use crate::pk::{self, KeyRetrieval, ResolvedPk};
use crate::template::SqlTemplate;
use crate::transform;
use crate::types::{DialectKey, PlaceholderStyle, QueryValue, Row};
use std::collections::HashMap;

/// Re-wrap a paged/topped core with the template's fast pre/tail segments
pub fn apply_fast_wrap(template: &SqlTemplate, dialect: DialectKey, core: &str) -> String {
	if !template.has_fast() {
		return core.to_string();
	}
	let (pre, tail) = template.fast_wrap(dialect);
	format!(
		"{}{}{}",
		pre.unwrap_or_default(),
		core,
		tail.unwrap_or_default()
	)
}

/// Inject a `TOP n`-style clause right after the leading SELECT
///
/// Bodies carrying a depth-0 UNION are wrapped instead, so the clause
/// applies to the combined result rather than the first branch.
pub fn inject_top(body: &str, clause: &str) -> Result<String> {
	let mask = transform::mask_literals(body)?;
	if transform::contains_keyword_at_depth0(&mask, "union") {
		return Ok(format!("select {} u_t.* from ({}) u_t", clause, body));
	}
	let select_ix = transform::find_keyword_at_depth0(&mask, "select", 0).ok_or_else(|| {
		DialectError::rewrite("statement has no SELECT to inject into", body)
	})?;
	let mut insert_at = select_ix + "select".len();
	if let Some(after) = transform::expect_word(&mask, insert_at, "distinct") {
		insert_at = after;
	}
	Ok(format!(
		"{} {}{}",
		&body[..insert_at],
		clause,
		&body[insert_at..]
	))
}

/// Name→value view over an entity row, covering every column
///
/// Columns absent from the row bind as NULL.
pub fn row_param_map(meta: &EntityMeta, row: &FieldValues) -> HashMap<String, QueryValue> {
	meta.columns
		.iter()
		.map(|c| {
			(
				c.name.clone(),
				row.get(&c.name).cloned().unwrap_or(QueryValue::Null),
			)
		})
		.collect()
}

/// Whether every primary-key column carries a non-null value
pub fn has_key_values(meta: &EntityMeta, row: &FieldValues) -> bool {
	!meta.pk_columns.is_empty()
		&& meta.pk_columns.iter().all(|pkc| {
			row.get(pkc).map(|v| !v.is_null()).unwrap_or(false)
		})
}

pub fn require_key_values(meta: &EntityMeta, row: &FieldValues) -> Result<()> {
	if !has_key_values(meta, row) {
		return Err(DialectError::Configuration(format!(
			"row for table `{}` is missing primary-key value(s)",
			meta.table
		)));
	}
	Ok(())
}

/// Convert a fetched [`Row`] back into entity field values
pub fn row_to_fields(row: &Row) -> FieldValues {
	row.columns()
		.iter()
		.filter_map(|c| row.value(c).map(|v| (c.clone(), v.clone())))
		.collect()
}

fn insert_columns<'m, S: DialectStrategy + ?Sized>(
	meta: &'m EntityMeta,
	resolved: &ResolvedPk,
	strategy: &S,
) -> Vec<&'m ColumnMeta> {
	let excluded = strategy.excluded_column_types();
	meta.columns
		.iter()
		.filter(|c| {
			if meta.is_pk(&c.name) {
				resolved.insert_includes_pk
			} else {
				!excluded.contains(&c.col_type)
			}
		})
		.collect()
}

/// Named-parameter INSERT for one entity
///
/// Sequence-backed keys inline the sequence expression; RETURNING-style
/// key retrieval appends the clause (stripped again for batch execution).
pub fn insert_statement<S: DialectStrategy + ?Sized>(
	meta: &EntityMeta,
	resolved: &ResolvedPk,
	strategy: &S,
) -> Result<String> {
	let columns = insert_columns(meta, resolved, strategy);
	if columns.is_empty() {
		return Err(DialectError::Configuration(format!(
			"table `{}` has no insertable columns",
			meta.table
		)));
	}
	let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
	let values: Vec<String> = columns
		.iter()
		.map(|c| {
			if meta.is_pk(&c.name)
				&& resolved.strategy == PkStrategy::Sequence
				&& let Some(seq) = &resolved.sequence_expr
			{
				if meta.allow_explicit_key {
					// Caller-supplied keys win; NULL falls through to the sequence
					format!("{}(:{}, {})", strategy.coalesce_fn(), c.name, seq)
				} else {
					seq.clone()
				}
			} else {
				format!(":{}", c.name)
			}
		})
		.collect();

	let mut sql = format!(
		"insert into {} ({}) values ({})",
		meta.table,
		names.join(", "),
		values.join(", ")
	);
	if resolved.retrieval == KeyRetrieval::ReturningClause
		&& let Some(pkc) = meta.pk_columns.first()
	{
		sql.push_str(" returning ");
		sql.push_str(pkc);
	}
	Ok(sql)
}

/// Drop a trailing RETURNING clause, for batch paths that cannot read it
pub fn strip_returning(sql: &str) -> String {
	match sql.rfind(" returning ") {
		Some(ix) => sql[..ix].to_string(),
		None => sql.to_string(),
	}
}

/// Named-parameter UPDATE by primary key
///
/// With `coalesce_fn` set, unset fields keep their stored value:
/// `col = nvl(:col, col)`.
pub fn update_statement(meta: &EntityMeta, coalesce_fn: Option<&str>) -> Result<String> {
	let sets: Vec<String> = meta
		.value_columns()
		.map(|c| match coalesce_fn {
			Some(f) => format!("{} = {}(:{}, {})", c.name, f, c.name, c.name),
			None => format!("{} = :{}", c.name, c.name),
		})
		.collect();
	if sets.is_empty() {
		return Err(DialectError::Configuration(format!(
			"table `{}` has no non-key columns to update",
			meta.table
		)));
	}
	Ok(format!(
		"update {} set {} where {}",
		meta.table,
		sets.join(", "),
		pk_predicate(meta, "")
	))
}

/// Named-parameter DELETE by primary key
pub fn delete_statement(meta: &EntityMeta) -> String {
	format!("delete from {} where {}", meta.table, pk_predicate(meta, ""))
}

fn pk_predicate(meta: &EntityMeta, table_alias: &str) -> String {
	meta.pk_columns
		.iter()
		.map(|pkc| {
			if table_alias.is_empty() {
				format!("{} = :{}", pkc, pkc)
			} else {
				format!("{}.{} = :{}", table_alias, pkc, pkc)
			}
		})
		.collect::<Vec<_>>()
		.join(" and ")
}

/// Single-row MERGE statement for merge-capable backends
pub fn merge_statement<S: DialectStrategy + ?Sized>(
	meta: &EntityMeta,
	strategy: &S,
) -> Result<String> {
	let excluded = strategy.excluded_column_types();
	let columns: Vec<&ColumnMeta> = meta
		.columns
		.iter()
		.filter(|c| meta.is_pk(&c.name) || !excluded.contains(&c.col_type))
		.collect();
	let source_list: Vec<String> = columns
		.iter()
		.map(|c| format!(":{} {}", c.name, c.name))
		.collect();
	let on: Vec<String> = meta
		.pk_columns
		.iter()
		.map(|pkc| format!("t.{} = src.{}", pkc, pkc))
		.collect();
	let sets: Vec<String> = columns
		.iter()
		.filter(|c| !meta.is_pk(&c.name))
		.map(|c| format!("t.{} = src.{}", c.name, c.name))
		.collect();
	if sets.is_empty() {
		return Err(DialectError::Configuration(format!(
			"table `{}` has no non-key columns to merge",
			meta.table
		)));
	}
	let insert_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
	let insert_values: Vec<String> =
		columns.iter().map(|c| format!("src.{}", c.name)).collect();

	Ok(format!(
		"merge into {} t using (select {}{}) src on ({}) when matched then update set {} when not matched then insert ({}) values ({})",
		meta.table,
		source_list.join(", "),
		strategy.merge_source_suffix(),
		on.join(" and "),
		sets.join(", "),
		insert_names.join(", "),
		insert_values.join(", ")
	))
}

/// Uniqueness probe: count rows sharing `unique_columns` values, excluding
/// the row itself when its key is present
pub fn unique_probe_sql(
	meta: &EntityMeta,
	row: &FieldValues,
	unique_columns: &[String],
) -> Result<(String, HashMap<String, QueryValue>)> {
	if unique_columns.is_empty() {
		return Err(DialectError::Configuration(
			"is_unique requires at least one probe column".to_string(),
		));
	}
	let mut params = HashMap::new();
	let mut predicates = Vec::with_capacity(unique_columns.len());
	for column in unique_columns {
		if meta.column(column).is_none() {
			return Err(DialectError::Configuration(format!(
				"`{}` is not a column of table `{}`",
				column, meta.table
			)));
		}
		predicates.push(format!("{} = :{}", column, column));
		params.insert(
			column.clone(),
			row.get(column).cloned().unwrap_or(QueryValue::Null),
		);
	}
	let mut sql = format!(
		"select count(1) from {} where {}",
		meta.table,
		predicates.join(" and ")
	);
	if has_key_values(meta, row)
		&& !meta.pk_columns.iter().any(|pkc| unique_columns.contains(pkc))
	{
		let self_excludes: Vec<String> = meta
			.pk_columns
			.iter()
			.map(|pkc| format!("{} = :{}", pkc, pkc))
			.collect();
		sql.push_str(&format!(" and not ({})", self_excludes.join(" and ")));
		for pkc in &meta.pk_columns {
			params.insert(pkc.clone(), row.get(pkc).cloned().unwrap_or(QueryValue::Null));
		}
	}
	Ok((sql, params))
}

/// A statement rendered for repeated row binding
#[derive(Debug, Clone)]
pub struct RowStatement {
	pub sql: String,
	/// Column metadata per positional parameter, in binding order
	pub param_columns: Vec<ColumnMeta>,
}

/// Render named SQL into positional form, resolving each parameter to its
/// column metadata so batch binding can substitute not-null defaults
pub fn row_statement(
	named_sql: &str,
	meta: &EntityMeta,
	style: PlaceholderStyle,
) -> Result<RowStatement> {
	let names = transform::named_params(named_sql)?;
	let mut param_columns = Vec::with_capacity(names.len());
	let mut placeholder_values = HashMap::new();
	for name in &names {
		let column = meta.column(name).ok_or_else(|| {
			DialectError::Parameter(format!(
				"parameter `{}` does not match a column of table `{}`",
				name, meta.table
			))
		})?;
		param_columns.push(column.clone());
		placeholder_values.insert(name.clone(), QueryValue::Null);
	}
	let (sql, _) = transform::bind_named(named_sql, &placeholder_values, style)?;
	Ok(RowStatement { sql, param_columns })
}

/// Bind entity rows against a [`RowStatement`]'s parameter order
pub fn bind_rows(plan: &RowStatement, rows: &[FieldValues]) -> Vec<Vec<QueryValue>> {
	rows.iter()
		.map(|row| {
			plan.param_columns
				.iter()
				.map(|c| row.get(&c.name).cloned().unwrap_or(QueryValue::Null))
				.collect()
		})
		.collect()
}

/// Upsert via a single MERGE statement per batch (merge-capable family)
pub async fn merge_upsert<S: DialectStrategy + ?Sized>(
	strategy: &S,
	executor: &dyn SqlExecutor,
	meta: &EntityMeta,
	rows: Vec<FieldValues>,
	generator: Option<&dyn IdGenerator>,
	config: &BatchConfig,
) -> Result<UpsertOutcome> {
	let resolved = pk::resolve(meta, strategy.key())?;

	let (mut keyed, mut unkeyed): (Vec<_>, Vec<_>) = rows
		.into_iter()
		.partition(|row| has_key_values(meta, row));

	if !unkeyed.is_empty() && resolved.strategy == PkStrategy::Assigned {
		// Freshly generated keys cannot match an existing row, but MERGE
		// handles them as inserts, so they ride along with the keyed set
		pk::fill_assigned_keys(meta, &mut unkeyed, generator)?;
		keyed.append(&mut unkeyed);
	}

	let mut outcome = UpsertOutcome::default();
	if !keyed.is_empty() {
		let statement = merge_statement(meta, strategy)?;
		let plan = row_statement(&statement, meta, strategy.key().placeholder_style())?;
		let bound = bind_rows(&plan, &keyed);
		outcome.merged = batch::execute_batch(
			executor,
			&plan.sql,
			bound,
			&plan.param_columns,
			config.chunk_size,
			config.auto_commit,
		)
		.await?;
	}
	if !unkeyed.is_empty() {
		// Keyless rows cannot match; insert them directly
		let statement = strip_returning(&insert_statement(meta, &resolved, strategy)?);
		let plan = row_statement(&statement, meta, strategy.key().placeholder_style())?;
		let bound = bind_rows(&plan, &unkeyed);
		outcome.inserted = batch::execute_batch(
			executor,
			&plan.sql,
			bound,
			&plan.param_columns,
			config.chunk_size,
			config.auto_commit,
		)
		.await?;
	}
	Ok(outcome)
}

/// Upsert for merge-incapable backends: UPDATE first, then insert the rows
/// the UPDATE missed via the dialect's conflict-ignoring insert
pub async fn update_then_insert_upsert<S: DialectStrategy + ?Sized>(
	strategy: &S,
	executor: &dyn SqlExecutor,
	meta: &EntityMeta,
	rows: Vec<FieldValues>,
	generator: Option<&dyn IdGenerator>,
	config: &BatchConfig,
) -> Result<UpsertOutcome> {
	let resolved = pk::resolve(meta, strategy.key())?;

	let (keyed, mut unkeyed): (Vec<_>, Vec<_>) = rows
		.into_iter()
		.partition(|row| has_key_values(meta, row));

	let mut outcome = UpsertOutcome::default();
	let mut to_insert: Vec<FieldValues> = Vec::new();

	if !keyed.is_empty() {
		let statement = update_statement(meta, Some(strategy.coalesce_fn()))?;
		let plan = row_statement(&statement, meta, strategy.key().placeholder_style())?;
		let bound = bind_rows(&plan, &keyed);
		let counts = executor.execute_each(&plan.sql, &bound).await?;
		for (row, count) in keyed.into_iter().zip(counts) {
			if count > 0 {
				outcome.updated += 1;
			} else {
				to_insert.push(row);
			}
		}
	}

	if !unkeyed.is_empty() {
		if resolved.strategy == PkStrategy::Assigned {
			pk::fill_assigned_keys(meta, &mut unkeyed, generator)?;
		}
		to_insert.append(&mut unkeyed);
	}

	if !to_insert.is_empty() {
		let statement = match strategy.insert_ignore_sql(meta) {
			Ok(sql) => sql,
			// Only a missing conflict-ignoring form falls back to a plain insert
			Err(DialectError::Unsupported { .. }) => {
				strip_returning(&insert_statement(meta, &resolved, strategy)?)
			}
			Err(e) => return Err(e),
		};
		let plan = row_statement(&statement, meta, strategy.key().placeholder_style())?;
		let bound = bind_rows(&plan, &to_insert);
		let inserted_rows = to_insert.len() as u64;
		batch::execute_batch(
			executor,
			&plan.sql,
			bound,
			&plan.param_columns,
			config.chunk_size,
			config.auto_commit,
		)
		.await?;
		outcome.inserted = inserted_rows;
	}
	Ok(outcome)
}
