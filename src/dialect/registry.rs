//! Dialect strategy registry
//!
//! Strategies are stateless; one instance per dialect is built on first use
//! and shared from then on. [`register`] lets an embedding application
//! install its own strategy (say, one for [`DialectKey::Unknown`] tuned to
//! its actual backend) before the key is first resolved.

use super::DialectStrategy;
use crate::types::DialectKey;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

static REGISTRY: Lazy<RwLock<HashMap<DialectKey, Arc<dyn DialectStrategy>>>> =
	Lazy::new(|| RwLock::new(HashMap::new()));

/// Strategy for a dialect key, building the built-in one on first use
pub fn strategy(key: DialectKey) -> Arc<dyn DialectStrategy> {
	if let Some(existing) = REGISTRY.read().get(&key) {
		return existing.clone();
	}
	// First access for this key; creation is serialized by the write lock
	let mut map = REGISTRY.write();
	map.entry(key).or_insert_with(|| built_in(key)).clone()
}

/// Install a custom strategy for its own key
///
/// Entries are created once and never replaced: registration is a no-op
/// (returning false) when the key has already been resolved or registered.
pub fn register(custom: Arc<dyn DialectStrategy>) -> bool {
	let mut map = REGISTRY.write();
	match map.entry(custom.key()) {
		std::collections::hash_map::Entry::Occupied(_) => false,
		std::collections::hash_map::Entry::Vacant(slot) => {
			slot.insert(custom);
			true
		}
	}
}

fn built_in(key: DialectKey) -> Arc<dyn DialectStrategy> {
	match key {
		DialectKey::Oracle => Arc::new(super::oracle::OracleDialect),
		DialectKey::Oracle11 => Arc::new(super::oracle::Oracle11Dialect),
		DialectKey::Dm => Arc::new(super::oracle::DmDialect),
		DialectKey::MySql | DialectKey::Tidb | DialectKey::OceanBase => {
			Arc::new(super::mysql::MySqlDialect::new(key))
		}
		DialectKey::Postgres | DialectKey::GaussDb => {
			Arc::new(super::postgres::PostgresDialect::new(key))
		}
		DialectKey::Kingbase => Arc::new(super::postgres::KingbaseDialect),
		DialectKey::SqlServer => Arc::new(super::sqlserver::SqlServerDialect),
		DialectKey::Db2 => Arc::new(super::db2::Db2Dialect),
		DialectKey::Sqlite => Arc::new(super::sqlite::SqliteDialect),
		DialectKey::ClickHouse => Arc::new(super::clickhouse::ClickHouseDialect),
		DialectKey::SybaseIq => Arc::new(super::sybase::SybaseIqDialect),
		DialectKey::Unknown => Arc::new(super::unknown::UnknownDialect),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_every_key_resolves() {
		for key in DialectKey::ALL {
			assert_eq!(strategy(key).key(), key);
		}
	}

	#[test]
	fn test_instances_are_shared() {
		let a = strategy(DialectKey::MySql);
		let b = strategy(DialectKey::MySql);
		assert!(Arc::ptr_eq(&a, &b));
	}
}
