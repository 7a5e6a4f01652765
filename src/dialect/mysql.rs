//! MySQL-family strategy, also covering TiDB and OceanBase (MySQL mode)

use super::{common, DialectStrategy};
use crate::error::Result;
use crate::meta::EntityMeta;
use crate::pk;
use crate::transform::{self, PAGE_LIMIT_PARAM, PAGE_OFFSET_PARAM};
use crate::types::DialectKey;
use async_trait::async_trait;

pub struct MySqlDialect {
	key: DialectKey,
}

impl MySqlDialect {
	pub fn new(key: DialectKey) -> Self {
		debug_assert!(matches!(
			key,
			DialectKey::MySql | DialectKey::Tidb | DialectKey::OceanBase
		));
		Self { key }
	}
}

#[async_trait]
impl DialectStrategy for MySqlDialect {
	fn key(&self) -> DialectKey {
		self.key
	}

	fn paging_sql(&self, body: &str) -> Result<String> {
		Ok(format!(
			"{} limit :{}, :{}",
			body, PAGE_OFFSET_PARAM, PAGE_LIMIT_PARAM
		))
	}

	fn top_sql(&self, body: &str, n: u64) -> Result<String> {
		Ok(format!("{} limit {}", body, n))
	}

	fn random_sql(&self, body: &str, n: u64) -> Result<String> {
		let body = transform::wrap_for_random(body)?;
		Ok(format!("{} order by rand() limit {}", body, n))
	}

	fn coalesce_fn(&self) -> &'static str {
		"ifnull"
	}

	fn insert_ignore_sql(&self, meta: &EntityMeta) -> Result<String> {
		let resolved = pk::resolve(meta, self.key)?;
		let plain = common::insert_statement(meta, &resolved, self)?;
		Ok(plain.replacen("insert into", "insert ignore into", 1))
	}

	fn procedure_call_sql(&self, name: &str, arg_count: usize) -> Result<String> {
		Ok(format!("call {}({})", name, placeholders(arg_count)))
	}
}

fn placeholders(n: usize) -> String {
	vec!["?"; n].join(", ")
}
