//! Table-routing seam
//!
//! Sharding policy lives in the embedding application; this crate only
//! applies the resolved physical table name to a template before dialect
//! execution. The cached template is never mutated: routing goes through
//! [`SqlTemplate::specialize`], which clones.

use crate::meta::{EntityMeta, FieldValues};
use crate::template::SqlTemplate;
use std::collections::HashMap;

/// Resolves the physical table for an entity, per row where relevant
pub trait ShardingResolver: Send + Sync {
	/// The table to substitute for the entity's logical table, or `None`
	/// to leave it unchanged
	fn resolve_table(&self, meta: &EntityMeta, row: Option<&FieldValues>) -> Option<String>;
}

/// Clone `template` with the entity's table routed through `resolver`
///
/// Returns a plain clone when the resolver declines or resolves to the
/// logical table itself.
pub fn specialize_for_shard(
	template: &SqlTemplate,
	resolver: &dyn ShardingResolver,
	meta: &EntityMeta,
	row: Option<&FieldValues>,
) -> SqlTemplate {
	match resolver.resolve_table(meta, row) {
		Some(target) if target != meta.table => {
			let mut table_map = HashMap::new();
			table_map.insert(meta.table.clone(), target);
			template.specialize(&table_map)
		}
		_ => template.clone(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::meta::{ColumnMeta, ColumnType, PkStrategy};
	use crate::types::{DialectKey, QueryValue};

	struct RegionResolver;

	impl ShardingResolver for RegionResolver {
		fn resolve_table(&self, meta: &EntityMeta, row: Option<&FieldValues>) -> Option<String> {
			let region = row?.get("region")?;
			match region {
				QueryValue::String(r) => Some(format!("{}_{}", meta.table, r.to_lowercase())),
				_ => None,
			}
		}
	}

	fn order_meta() -> EntityMeta {
		EntityMeta {
			table: "orders".to_string(),
			columns: vec![
				ColumnMeta::new("id", ColumnType::Int),
				ColumnMeta::new("region", ColumnType::String),
			],
			pk_columns: vec!["id".to_string()],
			pk_strategy: PkStrategy::Assigned,
			sequence: None,
			generator: None,
			allow_explicit_key: true,
		}
	}

	#[test]
	fn test_routed_table_substituted() {
		let template = SqlTemplate::builder("q", "select * from orders where id = :id")
			.build()
			.unwrap();
		let row: FieldValues =
			[("region".to_string(), QueryValue::from("EU"))].into_iter().collect();
		let routed = specialize_for_shard(&template, &RegionResolver, &order_meta(), Some(&row));
		assert!(routed
			.segments(DialectKey::MySql)
			.main
			.contains("orders_eu"));
		// cached original untouched
		assert!(template.segments(DialectKey::MySql).main.contains("from orders "));
	}

	#[test]
	fn test_unrouted_row_keeps_table() {
		let template = SqlTemplate::builder("q", "select * from orders")
			.build()
			.unwrap();
		let routed = specialize_for_shard(&template, &RegionResolver, &order_meta(), None);
		assert_eq!(
			routed.segments(DialectKey::MySql).main,
			template.segments(DialectKey::MySql).main
		);
	}
}
