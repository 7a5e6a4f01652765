//! Entity metadata consumed by save/update/upsert operations
//!
//! Metadata is pre-resolved, read-only input supplied by the embedding
//! application; this crate never parses annotations or reflects on types.

use crate::error::{DialectError, Result};
use crate::types::QueryValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Logical column type, used for default-value substitution and procedure
/// out-parameter declarations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
	Bool,
	Int,
	Float,
	Decimal,
	String,
	Bytes,
	Timestamp,
	Uuid,
}

/// One column of an entity's table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMeta {
	pub name: String,
	pub col_type: ColumnType,
	pub nullable: bool,
	/// Textual default, parsed per [`ColumnType`] when a not-null column
	/// arrives with a null value
	pub default: Option<String>,
}

impl ColumnMeta {
	pub fn new(name: impl Into<String>, col_type: ColumnType) -> Self {
		Self {
			name: name.into(),
			col_type,
			nullable: true,
			default: None,
		}
	}

	pub fn not_null(mut self, default: Option<&str>) -> Self {
		self.nullable = false;
		self.default = default.map(str::to_string);
		self
	}
}

/// Key-generation mode configured for an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PkStrategy {
	/// Caller supplies the key (possibly via a business-key generator)
	Assigned,
	/// Database identity / auto-increment column
	Identity,
	/// Database sequence
	Sequence,
}

/// Business-key generator configuration attached to an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorMeta {
	/// Signature string the generator's key scheme is built from
	pub signature: String,
	/// Columns whose values feed into the generated key
	pub related_columns: Vec<String>,
	/// Maximum generated key length
	pub length: u32,
	/// Width of the rotating sequence segment
	pub sequence_size: i32,
}

/// Table/column/key metadata for one entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMeta {
	pub table: String,
	pub columns: Vec<ColumnMeta>,
	pub pk_columns: Vec<String>,
	pub pk_strategy: PkStrategy,
	/// Sequence expression used under [`PkStrategy::Sequence`] and as the
	/// identity fallback on dialects without native identity support
	pub sequence: Option<String>,
	pub generator: Option<GeneratorMeta>,
	/// Caller may still supply an explicit key even under
	/// Identity/Sequence
	pub allow_explicit_key: bool,
}

impl EntityMeta {
	pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
		self.columns.iter().find(|c| c.name == name)
	}

	pub fn is_pk(&self, name: &str) -> bool {
		self.pk_columns.iter().any(|c| c == name)
	}

	/// Non-key columns, in declaration order
	pub fn value_columns(&self) -> impl Iterator<Item = &ColumnMeta> {
		self.columns.iter().filter(|c| !self.is_pk(&c.name))
	}

	pub fn require_pk(&self, operation: &'static str) -> Result<()> {
		if self.pk_columns.is_empty() {
			return Err(DialectError::Configuration(format!(
				"table `{}` has no primary key; `{}` requires one",
				self.table, operation
			)));
		}
		Ok(())
	}
}

/// One entity row as a column-name → value map
pub type FieldValues = HashMap<String, QueryValue>;

/// Pluggable business-key / distributed-id generator
///
/// Invoked once per row needing a value under [`PkStrategy::Assigned`].
pub trait IdGenerator: Send + Sync {
	#[allow(clippy::too_many_arguments)]
	fn generate(
		&self,
		table: &str,
		signature: &str,
		related_column_names: &[String],
		related_column_values: &[QueryValue],
		col_type: ColumnType,
		length: u32,
		sequence_size: i32,
	) -> Result<QueryValue>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn order_meta() -> EntityMeta {
		EntityMeta {
			table: "orders".to_string(),
			columns: vec![
				ColumnMeta::new("id", ColumnType::Int),
				ColumnMeta::new("status", ColumnType::String).not_null(Some("OPEN")),
				ColumnMeta::new("qty", ColumnType::Int),
			],
			pk_columns: vec!["id".to_string()],
			pk_strategy: PkStrategy::Identity,
			sequence: None,
			generator: None,
			allow_explicit_key: false,
		}
	}

	#[test]
	fn test_value_columns_exclude_pk() {
		let meta = order_meta();
		let names: Vec<_> = meta.value_columns().map(|c| c.name.as_str()).collect();
		assert_eq!(names, vec!["status", "qty"]);
	}

	#[test]
	fn test_require_pk() {
		let mut meta = order_meta();
		assert!(meta.require_pk("update").is_ok());
		meta.pk_columns.clear();
		assert!(meta.require_pk("update").is_err());
	}
}
