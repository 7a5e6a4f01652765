//! PostgreSQL-family strategy, also covering GaussDB/openGauss, plus the
//! Kingbase variant which keeps PostgreSQL syntax but supports MERGE

use super::{common, DialectStrategy};
use crate::error::Result;
use crate::meta::EntityMeta;
use crate::pk::{self, KeyRetrieval};
use crate::transform::{self, PAGE_LIMIT_PARAM, PAGE_OFFSET_PARAM};
use crate::types::DialectKey;
use async_trait::async_trait;

pub struct PostgresDialect {
	key: DialectKey,
}

impl PostgresDialect {
	pub fn new(key: DialectKey) -> Self {
		debug_assert!(matches!(key, DialectKey::Postgres | DialectKey::GaussDb));
		Self { key }
	}
}

fn limit_offset(body: &str) -> String {
	format!(
		"{} limit :{} offset :{}",
		body, PAGE_LIMIT_PARAM, PAGE_OFFSET_PARAM
	)
}

fn random_limit(body: &str, n: u64) -> Result<String> {
	let body = transform::wrap_for_random(body)?;
	Ok(format!("{} order by random() limit {}", body, n))
}

fn on_conflict_insert<S: DialectStrategy + ?Sized>(
	strategy: &S,
	meta: &EntityMeta,
) -> Result<String> {
	let resolved = pk::resolve(meta, strategy.key())?;
	let mut plain = common::insert_statement(meta, &resolved, strategy)?;
	if resolved.retrieval == KeyRetrieval::ReturningClause {
		plain = common::strip_returning(&plain);
	}
	Ok(format!(
		"{} on conflict ({}) do nothing",
		plain,
		meta.pk_columns.join(", ")
	))
}

fn dollar_call(name: &str, arg_count: usize) -> String {
	let args: Vec<String> = (1..=arg_count).map(|i| format!("${}", i)).collect();
	format!("call {}({})", name, args.join(", "))
}

#[async_trait]
impl DialectStrategy for PostgresDialect {
	fn key(&self) -> DialectKey {
		self.key
	}

	fn paging_sql(&self, body: &str) -> Result<String> {
		Ok(limit_offset(body))
	}

	fn top_sql(&self, body: &str, n: u64) -> Result<String> {
		Ok(format!("{} limit {}", body, n))
	}

	fn random_sql(&self, body: &str, n: u64) -> Result<String> {
		random_limit(body, n)
	}

	fn insert_ignore_sql(&self, meta: &EntityMeta) -> Result<String> {
		on_conflict_insert(self, meta)
	}

	fn procedure_call_sql(&self, name: &str, arg_count: usize) -> Result<String> {
		Ok(dollar_call(name, arg_count))
	}
}

pub struct KingbaseDialect;

#[async_trait]
impl DialectStrategy for KingbaseDialect {
	fn key(&self) -> DialectKey {
		DialectKey::Kingbase
	}

	fn paging_sql(&self, body: &str) -> Result<String> {
		Ok(limit_offset(body))
	}

	fn top_sql(&self, body: &str, n: u64) -> Result<String> {
		Ok(format!("{} limit {}", body, n))
	}

	fn random_sql(&self, body: &str, n: u64) -> Result<String> {
		random_limit(body, n)
	}

	fn supports_merge(&self) -> bool {
		true
	}

	fn merge_source_suffix(&self) -> &'static str {
		" from dual"
	}

	fn insert_ignore_sql(&self, meta: &EntityMeta) -> Result<String> {
		on_conflict_insert(self, meta)
	}

	fn procedure_call_sql(&self, name: &str, arg_count: usize) -> Result<String> {
		Ok(dollar_call(name, arg_count))
	}
}
