//! Primary-key strategy resolution
//!
//! Decides, for an entity + dialect pair, how insert keys come into being
//! and how they are read back. The resolver only selects the mode; the
//! dialect strategy performs the actual retrieval.

use crate::error::{DialectError, Result};
use crate::meta::{EntityMeta, FieldValues, IdGenerator, PkStrategy};
use crate::types::{DialectKey, QueryValue};

/// How the generated key is read back after an insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRetrieval {
	/// The value was bound by the caller; return it directly
	BoundValue,
	/// Read the driver-reported generated-key set
	DriverGeneratedKeys,
	/// Read a `RETURNING`-style declared column
	ReturningClause,
}

/// Resolved key handling for one entity + dialect
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPk {
	pub strategy: PkStrategy,
	pub retrieval: KeyRetrieval,
	/// Sequence expression, set when `strategy` is Sequence
	pub sequence_expr: Option<String>,
	/// Whether the insert column set includes the key column(s)
	pub insert_includes_pk: bool,
}

/// Resolve the effective key strategy
///
/// Identity on a dialect without native identity support is remapped to
/// Sequence using the entity's configured fallback sequence expression.
pub fn resolve(meta: &EntityMeta, dialect: DialectKey) -> Result<ResolvedPk> {
	match meta.pk_strategy {
		PkStrategy::Assigned => Ok(ResolvedPk {
			strategy: PkStrategy::Assigned,
			retrieval: KeyRetrieval::BoundValue,
			sequence_expr: None,
			insert_includes_pk: true,
		}),
		PkStrategy::Identity if dialect.supports_identity() => Ok(ResolvedPk {
			strategy: PkStrategy::Identity,
			retrieval: if dialect.supports_returning() {
				KeyRetrieval::ReturningClause
			} else {
				KeyRetrieval::DriverGeneratedKeys
			},
			sequence_expr: None,
			insert_includes_pk: false,
		}),
		PkStrategy::Identity | PkStrategy::Sequence => {
			let sequence = meta.sequence.clone().ok_or_else(|| {
				DialectError::Configuration(format!(
					"table `{}` uses a sequence-backed key on dialect {} but no sequence is configured",
					meta.table, dialect
				))
			})?;
			Ok(ResolvedPk {
				strategy: PkStrategy::Sequence,
				retrieval: if dialect.supports_returning() {
					KeyRetrieval::ReturningClause
				} else {
					KeyRetrieval::DriverGeneratedKeys
				},
				sequence_expr: Some(sequence),
				insert_includes_pk: true,
			})
		}
	}
}

/// Fill missing assigned keys on `rows` via the caller's generator
///
/// Rows that already carry a key keep it. A related column required by the
/// generator's key scheme but absent from the row is a hard validation
/// error: the business key cannot be computed without it.
pub fn fill_assigned_keys(
	meta: &EntityMeta,
	rows: &mut [FieldValues],
	generator: Option<&dyn IdGenerator>,
) -> Result<usize> {
	meta.require_pk("key generation")?;
	if meta.pk_columns.len() > 1 {
		// Composite keys must always arrive fully assigned
		for row in rows.iter() {
			for pk in &meta.pk_columns {
				if row.get(pk).map(QueryValue::is_null).unwrap_or(true) {
					return Err(DialectError::Configuration(format!(
						"composite key column `{}` of table `{}` has no value",
						pk, meta.table
					)));
				}
			}
		}
		return Ok(0);
	}

	let pk = &meta.pk_columns[0];
	let pk_type = meta
		.column(pk)
		.map(|c| c.col_type)
		.ok_or_else(|| {
			DialectError::Configuration(format!(
				"primary key `{}` is not a column of table `{}`",
				pk, meta.table
			))
		})?;

	let mut filled = 0;
	for row in rows.iter_mut() {
		let missing = row.get(pk).map(QueryValue::is_null).unwrap_or(true);
		if !missing {
			continue;
		}
		let Some(generator) = generator else {
			return Err(DialectError::Configuration(format!(
				"row for table `{}` has no `{}` value and no generator is configured",
				meta.table, pk
			)));
		};
		let gen_meta = meta.generator.as_ref().ok_or_else(|| {
			DialectError::Configuration(format!(
				"table `{}` has a generator but no generator metadata",
				meta.table
			))
		})?;

		let mut related_values = Vec::with_capacity(gen_meta.related_columns.len());
		for related in &gen_meta.related_columns {
			match row.get(related) {
				Some(v) if !v.is_null() => related_values.push(v.clone()),
				_ => {
					return Err(DialectError::RelatedColumnMissing {
						table: meta.table.clone(),
						column: related.clone(),
					});
				}
			}
		}

		let value = generator.generate(
			&meta.table,
			&gen_meta.signature,
			&gen_meta.related_columns,
			&related_values,
			pk_type,
			gen_meta.length,
			gen_meta.sequence_size,
		)?;
		row.insert(pk.clone(), value);
		filled += 1;
	}
	Ok(filled)
}
