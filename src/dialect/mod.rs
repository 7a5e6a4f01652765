//! Dialect strategies
//!
//! One implementation per backend family, all exposing the same capability
//! set. The default trait methods carry the shared execution flow; each
//! dialect overrides the syntax hooks (pagination fragments, lock clauses,
//! merge sources, null-coalescing function) and, where a backend genuinely
//! cannot express an operation, reports it as unsupported instead of
//! falling back to something semantically weaker.

pub mod clickhouse;
pub mod common;
pub mod db2;
pub mod mysql;
pub mod oracle;
pub mod postgres;
pub mod registry;
pub mod sqlite;
pub mod sqlserver;
pub mod sybase;
pub mod unknown;

use crate::batch;
use crate::config::BatchConfig;
use crate::error::{DialectError, Result};
use crate::executor::SqlExecutor;
use crate::meta::{ColumnType, EntityMeta, FieldValues, IdGenerator};
use crate::pk::{self, KeyRetrieval};
use crate::template::{QueryInvocation, SqlTemplate};
use crate::transform::{self, PAGE_LIMIT_PARAM, PAGE_OFFSET_PARAM};
use crate::types::{DialectKey, LockMode, QueryValue, Row};
use async_trait::async_trait;

/// Outcome of an upsert over many rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpsertOutcome {
	/// Rows hit by the UPDATE phase (non-merge path)
	pub updated: u64,
	/// Rows routed to INSERT (non-merge path)
	pub inserted: u64,
	/// Rows processed through a single MERGE statement
	pub merged: u64,
}

impl UpsertOutcome {
	pub fn total(&self) -> u64 {
		self.updated + self.inserted + self.merged
	}
}

/// Caller-supplied row mutation used by `update_and_fetch`
pub trait RowModifier: Send + Sync {
	/// Mutate the locked row in place; return false to skip writing it back
	fn update_row(&self, row: &mut Row) -> Result<bool>;
}

/// Capability set every backend family implements
#[async_trait]
pub trait DialectStrategy: Send + Sync {
	fn key(&self) -> DialectKey;

	// ---- syntax hooks -------------------------------------------------

	/// Append pagination syntax around `body`, referencing the reserved
	/// named parameters [`PAGE_OFFSET_PARAM`] and [`PAGE_LIMIT_PARAM`]
	fn paging_sql(&self, body: &str) -> Result<String>;

	/// First-N-rows form of `body`
	fn top_sql(&self, body: &str, n: u64) -> Result<String>;

	/// Random-sample form of `body`
	fn random_sql(&self, body: &str, n: u64) -> Result<String>;

	/// Values bound for (offset, limit); ROWNUM dialects bind the upper
	/// row number instead of a page size
	fn page_bound_values(&self, page_no: u64, page_size: u64) -> (i64, i64) {
		(((page_no - 1) * page_size) as i64, page_size as i64)
	}

	/// Lock clause appended for a lock mode, or unsupported
	fn lock_clause(&self, mode: LockMode) -> Result<Option<&'static str>> {
		match mode {
			LockMode::None => Ok(None),
			LockMode::Upgrade => Ok(Some("for update")),
			LockMode::UpgradeNowait => Ok(Some("for update nowait")),
			LockMode::UpgradeSkipLocked => Ok(Some("for update skip locked")),
		}
	}

	/// Apply a row-lock request to a complete SELECT
	///
	/// Most backends append a trailing clause; SQL Server overrides this to
	/// inject table hints instead.
	fn apply_lock(&self, sql: &str, mode: LockMode) -> Result<String> {
		match self.lock_clause(mode)? {
			Some(clause) => Ok(format!("{} {}", sql, clause)),
			None => Ok(sql.to_string()),
		}
	}

	/// The backend's null-coalescing function
	fn coalesce_fn(&self) -> &'static str {
		"coalesce"
	}

	fn supports_merge(&self) -> bool {
		false
	}

	/// `FROM`-source suffix for a single-row MERGE USING clause
	/// (`" from dual"`, `" from sysibm.sysdummy1"`, or empty)
	fn merge_source_suffix(&self) -> &'static str {
		""
	}

	/// Insert statement that ignores key conflicts
	fn insert_ignore_sql(&self, meta: &EntityMeta) -> Result<String> {
		let _ = meta;
		Err(DialectError::unsupported("insert_ignore", self.key()))
	}

	/// Stored procedure/function call text with positional placeholders
	fn procedure_call_sql(&self, name: &str, arg_count: usize) -> Result<String> {
		let _ = (name, arg_count);
		Err(DialectError::unsupported("call_stored_procedure", self.key()))
	}

	/// Columns the backend's driver cannot batch-bind; excluded from
	/// generated insert/update column sets
	fn excluded_column_types(&self) -> &'static [ColumnType] {
		&[]
	}

	// ---- read operations ----------------------------------------------

	async fn find(
		&self,
		executor: &dyn SqlExecutor,
		template: &SqlTemplate,
		invocation: &QueryInvocation,
	) -> Result<Vec<Row>> {
		let segments = template.segments(self.key());
		let sql = self.apply_lock(&segments.main, invocation.lock_mode)?;
		let params = invocation.param_map(template)?;
		let (sql, values) =
			transform::bind_named(&sql, &params, self.key().placeholder_style())?;
		let mut rows = executor.fetch_all(&sql, &values).await?;
		if let Some(max) = invocation.max_rows
			&& rows.len() > max
		{
			rows.truncate(max);
		}
		Ok(rows)
	}

	async fn count(
		&self,
		executor: &dyn SqlExecutor,
		template: &SqlTemplate,
		invocation: &QueryInvocation,
	) -> Result<u64> {
		let count = transform::derive_count_sql(
			template.rewrite_body(self.key()),
			template.count_override(self.key()),
			self.key(),
			template.union_all_count_safe(),
			template.ignore_bracket(),
		)?;
		let params = invocation.param_map(template)?;
		let (sql, values) =
			transform::bind_named(&count.sql, &params, self.key().placeholder_style())?;
		let row = executor.fetch_one(&sql, &values).await?;
		let total = match row.first_value() {
			Some(v) => i64::try_from(v.clone()).unwrap_or(0),
			None => 0,
		};
		Ok(total.max(0) as u64)
	}

	async fn find_page(
		&self,
		executor: &dyn SqlExecutor,
		template: &SqlTemplate,
		invocation: &QueryInvocation,
		page_no: u64,
		page_size: u64,
	) -> Result<Vec<Row>> {
		if page_no == 0 || page_size == 0 {
			return Err(DialectError::Configuration(format!(
				"illegal page bounds: page_no={}, page_size={}",
				page_no, page_size
			)));
		}
		let paged = self.paging_sql(template.rewrite_body(self.key()))?;
		let sql = common::apply_fast_wrap(template, self.key(), &paged);

		let mut params = invocation.param_map(template)?;
		let (offset, limit) = self.page_bound_values(page_no, page_size);
		params.insert(PAGE_OFFSET_PARAM.to_string(), QueryValue::Int(offset));
		params.insert(PAGE_LIMIT_PARAM.to_string(), QueryValue::Int(limit));

		let (sql, values) =
			transform::bind_named(&sql, &params, self.key().placeholder_style())?;
		executor.fetch_all(&sql, &values).await
	}

	async fn find_top(
		&self,
		executor: &dyn SqlExecutor,
		template: &SqlTemplate,
		invocation: &QueryInvocation,
		top: f64,
	) -> Result<Vec<Row>> {
		let n = self
			.resolve_row_target(executor, template, invocation, top)
			.await?;
		if n == 0 {
			return Ok(Vec::new());
		}
		let topped = self.top_sql(template.rewrite_body(self.key()), n)?;
		let sql = common::apply_fast_wrap(template, self.key(), &topped);
		let params = invocation.param_map(template)?;
		let (sql, values) =
			transform::bind_named(&sql, &params, self.key().placeholder_style())?;
		executor.fetch_all(&sql, &values).await
	}

	async fn random_sample(
		&self,
		executor: &dyn SqlExecutor,
		template: &SqlTemplate,
		invocation: &QueryInvocation,
		sample: f64,
	) -> Result<Vec<Row>> {
		let n = self
			.resolve_row_target(executor, template, invocation, sample)
			.await?;
		if n == 0 {
			return Ok(Vec::new());
		}
		let sampled = self.random_sql(template.rewrite_body(self.key()), n)?;
		let sql = common::apply_fast_wrap(template, self.key(), &sampled);
		let params = invocation.param_map(template)?;
		let (sql, values) =
			transform::bind_named(&sql, &params, self.key().placeholder_style())?;
		executor.fetch_all(&sql, &values).await
	}

	/// Resolve a row target given either an absolute count (≥ 1) or a
	/// ratio (< 1.0), which requires a count query first
	async fn resolve_row_target(
		&self,
		executor: &dyn SqlExecutor,
		template: &SqlTemplate,
		invocation: &QueryInvocation,
		requested: f64,
	) -> Result<u64> {
		if requested <= 0.0 {
			return Err(DialectError::Configuration(format!(
				"row target must be positive, got {}",
				requested
			)));
		}
		if requested >= 1.0 {
			return Ok(requested as u64);
		}
		let total = self.count(executor, template, invocation).await?;
		Ok(((total as f64) * requested).round() as u64)
	}

	/// Probe whether `unique_columns` values are unused by any other row
	async fn is_unique(
		&self,
		executor: &dyn SqlExecutor,
		meta: &EntityMeta,
		row: &FieldValues,
		unique_columns: &[String],
	) -> Result<bool> {
		let (sql, params) = common::unique_probe_sql(meta, row, unique_columns)?;
		let (sql, values) =
			transform::bind_named(&sql, &params, self.key().placeholder_style())?;
		let result = executor.fetch_one(&sql, &values).await?;
		let hits = match result.first_value() {
			Some(v) => i64::try_from(v.clone()).unwrap_or(0),
			None => 0,
		};
		Ok(hits == 0)
	}

	// ---- write operations ---------------------------------------------

	async fn save(
		&self,
		executor: &dyn SqlExecutor,
		meta: &EntityMeta,
		row: FieldValues,
		generator: Option<&dyn IdGenerator>,
	) -> Result<Option<QueryValue>> {
		let resolved = pk::resolve(meta, self.key())?;
		let mut rows = vec![row];
		if resolved.strategy == crate::meta::PkStrategy::Assigned {
			pk::fill_assigned_keys(meta, &mut rows, generator)?;
		}
		let row = rows.pop().unwrap_or_default();

		let statement = common::insert_statement(meta, &resolved, self)?;
		let params = common::row_param_map(meta, &row);
		let (sql, values) =
			transform::bind_named(&statement, &params, self.key().placeholder_style())?;

		match resolved.retrieval {
			KeyRetrieval::BoundValue => {
				executor.execute(&sql, &values).await?;
				Ok(meta
					.pk_columns
					.first()
					.and_then(|pkc| row.get(pkc))
					.cloned())
			}
			KeyRetrieval::ReturningClause => {
				let result = executor.fetch_all(&sql, &values).await?;
				Ok(result
					.first()
					.and_then(|r| r.first_value())
					.cloned())
			}
			KeyRetrieval::DriverGeneratedKeys => {
				let result = executor.execute(&sql, &values).await?;
				Ok(result.generated_keys.into_iter().next())
			}
		}
	}

	async fn save_all(
		&self,
		executor: &dyn SqlExecutor,
		meta: &EntityMeta,
		mut rows: Vec<FieldValues>,
		generator: Option<&dyn IdGenerator>,
		config: &BatchConfig,
	) -> Result<u64> {
		if rows.is_empty() {
			return Ok(0);
		}
		let resolved = pk::resolve(meta, self.key())?;
		if resolved.strategy == crate::meta::PkStrategy::Assigned {
			pk::fill_assigned_keys(meta, &mut rows, generator)?;
		}
		let statement = common::insert_statement(meta, &resolved, self)?;
		let statement = common::strip_returning(&statement);
		let plan = common::row_statement(&statement, meta, self.key().placeholder_style())?;
		let bound = common::bind_rows(&plan, &rows);
		batch::execute_batch(
			executor,
			&plan.sql,
			bound,
			&plan.param_columns,
			config.chunk_size,
			config.auto_commit,
		)
		.await
	}

	async fn save_all_ignore_existing(
		&self,
		executor: &dyn SqlExecutor,
		meta: &EntityMeta,
		mut rows: Vec<FieldValues>,
		generator: Option<&dyn IdGenerator>,
		config: &BatchConfig,
	) -> Result<u64> {
		if rows.is_empty() {
			return Ok(0);
		}
		meta.require_pk("save_all_ignore_existing")?;
		let resolved = pk::resolve(meta, self.key())?;
		if resolved.strategy == crate::meta::PkStrategy::Assigned {
			pk::fill_assigned_keys(meta, &mut rows, generator)?;
		}
		let statement = self.insert_ignore_sql(meta)?;
		let plan = common::row_statement(&statement, meta, self.key().placeholder_style())?;
		let bound = common::bind_rows(&plan, &rows);
		batch::execute_batch(
			executor,
			&plan.sql,
			bound,
			&plan.param_columns,
			config.chunk_size,
			config.auto_commit,
		)
		.await
	}

	async fn save_or_update(
		&self,
		executor: &dyn SqlExecutor,
		meta: &EntityMeta,
		row: FieldValues,
		generator: Option<&dyn IdGenerator>,
	) -> Result<UpsertOutcome> {
		self.save_or_update_all(
			executor,
			meta,
			vec![row],
			generator,
			&BatchConfig::default(),
		)
		.await
	}

	async fn save_or_update_all(
		&self,
		executor: &dyn SqlExecutor,
		meta: &EntityMeta,
		rows: Vec<FieldValues>,
		generator: Option<&dyn IdGenerator>,
		config: &BatchConfig,
	) -> Result<UpsertOutcome> {
		if rows.is_empty() {
			return Ok(UpsertOutcome::default());
		}
		meta.require_pk("save_or_update")?;
		if self.supports_merge() {
			common::merge_upsert(self, executor, meta, rows, generator, config).await
		} else {
			common::update_then_insert_upsert(self, executor, meta, rows, generator, config)
				.await
		}
	}

	async fn update(
		&self,
		executor: &dyn SqlExecutor,
		meta: &EntityMeta,
		row: &FieldValues,
	) -> Result<u64> {
		meta.require_pk("update")?;
		common::require_key_values(meta, row)?;
		let statement = common::update_statement(meta, None)?;
		let params = common::row_param_map(meta, row);
		let (sql, values) =
			transform::bind_named(&statement, &params, self.key().placeholder_style())?;
		Ok(executor.execute(&sql, &values).await?.rows_affected)
	}

	async fn update_all(
		&self,
		executor: &dyn SqlExecutor,
		meta: &EntityMeta,
		rows: Vec<FieldValues>,
		config: &BatchConfig,
	) -> Result<u64> {
		if rows.is_empty() {
			return Ok(0);
		}
		meta.require_pk("update_all")?;
		for row in &rows {
			common::require_key_values(meta, row)?;
		}
		let statement = common::update_statement(meta, None)?;
		let plan = common::row_statement(&statement, meta, self.key().placeholder_style())?;
		let bound = common::bind_rows(&plan, &rows);
		batch::execute_batch(
			executor,
			&plan.sql,
			bound,
			&plan.param_columns,
			config.chunk_size,
			config.auto_commit,
		)
		.await
	}

	async fn delete(
		&self,
		executor: &dyn SqlExecutor,
		meta: &EntityMeta,
		row: &FieldValues,
	) -> Result<u64> {
		meta.require_pk("delete")?;
		common::require_key_values(meta, row)?;
		let statement = common::delete_statement(meta);
		let params = common::row_param_map(meta, row);
		let (sql, values) =
			transform::bind_named(&statement, &params, self.key().placeholder_style())?;
		Ok(executor.execute(&sql, &values).await?.rows_affected)
	}

	async fn delete_all(
		&self,
		executor: &dyn SqlExecutor,
		meta: &EntityMeta,
		rows: Vec<FieldValues>,
		config: &BatchConfig,
	) -> Result<u64> {
		if rows.is_empty() {
			return Ok(0);
		}
		meta.require_pk("delete_all")?;
		for row in &rows {
			common::require_key_values(meta, row)?;
		}
		let statement = common::delete_statement(meta);
		let plan = common::row_statement(&statement, meta, self.key().placeholder_style())?;
		let bound = common::bind_rows(&plan, &rows);
		batch::execute_batch(
			executor,
			&plan.sql,
			bound,
			&plan.param_columns,
			config.chunk_size,
			config.auto_commit,
		)
		.await
	}

	/// Lock matching rows, hand them to the caller's modifier, write the
	/// changed ones back
	async fn update_and_fetch(
		&self,
		executor: &dyn SqlExecutor,
		meta: &EntityMeta,
		template: &SqlTemplate,
		invocation: &QueryInvocation,
		modifier: &dyn RowModifier,
	) -> Result<Vec<Row>> {
		meta.require_pk("update_and_fetch")?;
		let lock = invocation.lock_mode;
		let lock = if lock == LockMode::None {
			LockMode::Upgrade
		} else {
			lock
		};
		let segments = template.segments(self.key());
		let sql = self.apply_lock(&segments.main, lock)?;
		let params = invocation.param_map(template)?;
		let (sql, values) =
			transform::bind_named(&sql, &params, self.key().placeholder_style())?;
		let mut rows = executor.fetch_all(&sql, &values).await?;

		let statement = common::update_statement(meta, None)?;
		for row in rows.iter_mut() {
			if !modifier.update_row(row)? {
				continue;
			}
			let fields = common::row_to_fields(row);
			common::require_key_values(meta, &fields)?;
			let params = common::row_param_map(meta, &fields);
			let (update_sql, update_values) =
				transform::bind_named(&statement, &params, self.key().placeholder_style())?;
			executor.execute(&update_sql, &update_values).await?;
		}
		Ok(rows)
	}

	async fn call_stored_procedure(
		&self,
		executor: &dyn SqlExecutor,
		name: &str,
		in_params: &[QueryValue],
		out_types: &[ColumnType],
	) -> Result<(Vec<Row>, Vec<QueryValue>)> {
		let sql = self.procedure_call_sql(name, in_params.len())?;
		executor.call_procedure(&sql, in_params, out_types).await
	}
}
