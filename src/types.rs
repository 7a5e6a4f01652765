//! Common type definitions for the dialect engine

use crate::error::DialectError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Backend database family
///
/// A stable, small key used to select a [`crate::dialect::DialectStrategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DialectKey {
	Oracle,
	/// Oracle releases without `OFFSET .. FETCH` support (ROWNUM paging)
	Oracle11,
	MySql,
	Postgres,
	SqlServer,
	Db2,
	Sqlite,
	ClickHouse,
	Tidb,
	GaussDb,
	Dm,
	Kingbase,
	SybaseIq,
	OceanBase,
	/// Unrecognized backend; ANSI `OFFSET .. FETCH` syntax is assumed
	Unknown,
}

impl DialectKey {
	pub const ALL: [DialectKey; 15] = [
		DialectKey::Oracle,
		DialectKey::Oracle11,
		DialectKey::MySql,
		DialectKey::Postgres,
		DialectKey::SqlServer,
		DialectKey::Db2,
		DialectKey::Sqlite,
		DialectKey::ClickHouse,
		DialectKey::Tidb,
		DialectKey::GaussDb,
		DialectKey::Dm,
		DialectKey::Kingbase,
		DialectKey::SybaseIq,
		DialectKey::OceanBase,
		DialectKey::Unknown,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			DialectKey::Oracle => "oracle",
			DialectKey::Oracle11 => "oracle11",
			DialectKey::MySql => "mysql",
			DialectKey::Postgres => "postgresql",
			DialectKey::SqlServer => "sqlserver",
			DialectKey::Db2 => "db2",
			DialectKey::Sqlite => "sqlite",
			DialectKey::ClickHouse => "clickhouse",
			DialectKey::Tidb => "tidb",
			DialectKey::GaussDb => "gaussdb",
			DialectKey::Dm => "dm",
			DialectKey::Kingbase => "kingbase",
			DialectKey::SybaseIq => "sybase_iq",
			DialectKey::OceanBase => "oceanbase",
			DialectKey::Unknown => "unknown",
		}
	}

	/// Resolve a connection-provider label to a dialect key
	///
	/// Unrecognized labels map to [`DialectKey::Unknown`] rather than
	/// failing; the unknown dialect uses ANSI paging syntax.
	pub fn from_label(label: &str) -> Self {
		match label.to_lowercase().as_str() {
			"oracle" => DialectKey::Oracle,
			"oracle11" | "oracle10" | "oracle11g" => DialectKey::Oracle11,
			"mysql" | "mariadb" | "innosql" => DialectKey::MySql,
			"postgresql" | "postgres" | "pg" => DialectKey::Postgres,
			"sqlserver" | "mssql" => DialectKey::SqlServer,
			"db2" => DialectKey::Db2,
			"sqlite" => DialectKey::Sqlite,
			"clickhouse" => DialectKey::ClickHouse,
			"tidb" => DialectKey::Tidb,
			"gaussdb" | "mogdb" | "opengauss" => DialectKey::GaussDb,
			"dm" | "dameng" => DialectKey::Dm,
			"kingbase" => DialectKey::Kingbase,
			"sybase_iq" | "sybaseiq" | "iq" => DialectKey::SybaseIq,
			"oceanbase" => DialectKey::OceanBase,
			_ => DialectKey::Unknown,
		}
	}

	/// Placeholder style the backend's driver binds with
	pub fn placeholder_style(&self) -> PlaceholderStyle {
		match self {
			DialectKey::Postgres | DialectKey::GaussDb | DialectKey::Kingbase => {
				PlaceholderStyle::Dollar
			}
			_ => PlaceholderStyle::Question,
		}
	}

	/// Whether the backend natively supports identity (auto-increment)
	/// key columns
	pub fn supports_identity(&self) -> bool {
		!matches!(
			self,
			DialectKey::Oracle | DialectKey::Oracle11 | DialectKey::Dm
		)
	}

	/// Whether `INSERT .. RETURNING`-style key retrieval is available
	pub fn supports_returning(&self) -> bool {
		matches!(
			self,
			DialectKey::Postgres
				| DialectKey::GaussDb
				| DialectKey::Kingbase
				| DialectKey::Oracle
				| DialectKey::Oracle11
				| DialectKey::Dm
				| DialectKey::Sqlite
		)
	}
}

impl fmt::Display for DialectKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// How bound parameters are rendered in final SQL text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
	/// `$1`, `$2`, ... (PostgreSQL family)
	Dollar,
	/// `?` (everything else)
	Question,
}

impl PlaceholderStyle {
	pub fn render(&self, index: usize) -> String {
		match self {
			PlaceholderStyle::Dollar => format!("${}", index),
			PlaceholderStyle::Question => "?".to_string(),
		}
	}
}

/// Row-lock mode requested by a query invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LockMode {
	#[default]
	None,
	Upgrade,
	UpgradeNowait,
	UpgradeSkipLocked,
}

/// Bound parameter / result cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryValue {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Decimal(Decimal),
	String(String),
	Bytes(Vec<u8>),
	Timestamp(chrono::DateTime<chrono::Utc>),
	Uuid(Uuid),
	/// Represents SQL NOW() / current timestamp
	Now,
}

impl QueryValue {
	pub fn is_null(&self) -> bool {
		matches!(self, QueryValue::Null)
	}

	/// Compact rendering used in error context attachment
	pub fn describe(&self) -> String {
		match self {
			QueryValue::Null => "null".to_string(),
			QueryValue::Bool(b) => b.to_string(),
			QueryValue::Int(i) => i.to_string(),
			QueryValue::Float(f) => f.to_string(),
			QueryValue::Decimal(d) => d.to_string(),
			QueryValue::String(s) => format!("'{}'", s),
			QueryValue::Bytes(b) => format!("<{} bytes>", b.len()),
			QueryValue::Timestamp(dt) => dt.to_rfc3339(),
			QueryValue::Uuid(u) => u.to_string(),
			QueryValue::Now => "now()".to_string(),
		}
	}
}

/// Render a parameter slice for error diagnostics
pub fn describe_params(params: &[QueryValue]) -> String {
	let parts: Vec<String> = params.iter().map(QueryValue::describe).collect();
	format!("[{}]", parts.join(", "))
}

impl From<&str> for QueryValue {
	fn from(s: &str) -> Self {
		QueryValue::String(s.to_string())
	}
}

impl From<String> for QueryValue {
	fn from(s: String) -> Self {
		QueryValue::String(s)
	}
}

impl From<i64> for QueryValue {
	fn from(i: i64) -> Self {
		QueryValue::Int(i)
	}
}

impl From<i32> for QueryValue {
	fn from(i: i32) -> Self {
		QueryValue::Int(i as i64)
	}
}

impl From<f64> for QueryValue {
	fn from(f: f64) -> Self {
		QueryValue::Float(f)
	}
}

impl From<bool> for QueryValue {
	fn from(b: bool) -> Self {
		QueryValue::Bool(b)
	}
}

impl From<Decimal> for QueryValue {
	fn from(d: Decimal) -> Self {
		QueryValue::Decimal(d)
	}
}

impl From<chrono::DateTime<chrono::Utc>> for QueryValue {
	fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
		QueryValue::Timestamp(dt)
	}
}

impl From<Uuid> for QueryValue {
	fn from(u: Uuid) -> Self {
		QueryValue::Uuid(u)
	}
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
	fn from(v: Option<T>) -> Self {
		match v {
			Some(v) => v.into(),
			None => QueryValue::Null,
		}
	}
}

impl TryFrom<QueryValue> for i64 {
	type Error = DialectError;

	fn try_from(v: QueryValue) -> Result<Self, Self::Error> {
		match v {
			QueryValue::Int(i) => Ok(i),
			QueryValue::Decimal(d) => {
				use rust_decimal::prelude::ToPrimitive;
				d.to_i64().ok_or(DialectError::TypeConversion {
					column: String::new(),
					expected: "i64",
				})
			}
			QueryValue::Float(f) => Ok(f as i64),
			_ => Err(DialectError::TypeConversion {
				column: String::new(),
				expected: "i64",
			}),
		}
	}
}

impl TryFrom<QueryValue> for String {
	type Error = DialectError;

	fn try_from(v: QueryValue) -> Result<Self, Self::Error> {
		match v {
			QueryValue::String(s) => Ok(s),
			_ => Err(DialectError::TypeConversion {
				column: String::new(),
				expected: "String",
			}),
		}
	}
}

impl TryFrom<QueryValue> for bool {
	type Error = DialectError;

	fn try_from(v: QueryValue) -> Result<Self, Self::Error> {
		match v {
			QueryValue::Bool(b) => Ok(b),
			QueryValue::Int(i) => Ok(i != 0),
			_ => Err(DialectError::TypeConversion {
				column: String::new(),
				expected: "bool",
			}),
		}
	}
}

impl TryFrom<QueryValue> for f64 {
	type Error = DialectError;

	fn try_from(v: QueryValue) -> Result<Self, Self::Error> {
		match v {
			QueryValue::Float(f) => Ok(f),
			QueryValue::Int(i) => Ok(i as f64),
			QueryValue::Decimal(d) => {
				use rust_decimal::prelude::ToPrimitive;
				d.to_f64().ok_or(DialectError::TypeConversion {
					column: String::new(),
					expected: "f64",
				})
			}
			_ => Err(DialectError::TypeConversion {
				column: String::new(),
				expected: "f64",
			}),
		}
	}
}

/// Row from a query result
///
/// Keeps column order alongside the name lookup so that single-column
/// results (counts, generated keys) can be read positionally.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
	columns: Vec<String>,
	data: HashMap<String, QueryValue>,
}

impl Row {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, key: String, value: QueryValue) {
		if !self.data.contains_key(&key) {
			self.columns.push(key.clone());
		}
		self.data.insert(key, value);
	}

	pub fn columns(&self) -> &[String] {
		&self.columns
	}

	pub fn len(&self) -> usize {
		self.columns.len()
	}

	pub fn is_empty(&self) -> bool {
		self.columns.is_empty()
	}

	pub fn value(&self, key: &str) -> Option<&QueryValue> {
		self.data.get(key)
	}

	/// First column's value, for scalar results
	pub fn first_value(&self) -> Option<&QueryValue> {
		self.columns.first().and_then(|c| self.data.get(c))
	}

	pub fn get<T: TryFrom<QueryValue, Error = DialectError>>(
		&self,
		key: &str,
	) -> Result<T, DialectError> {
		self.data
			.get(key)
			.cloned()
			.ok_or_else(|| DialectError::ColumnNotFound(key.to_string()))
			.and_then(|v| v.try_into())
	}
}

impl FromIterator<(String, QueryValue)> for Row {
	fn from_iter<I: IntoIterator<Item = (String, QueryValue)>>(iter: I) -> Self {
		let mut row = Row::new();
		for (k, v) in iter {
			row.insert(k, v);
		}
		row
	}
}

/// Result of a mutation statement
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
	pub rows_affected: u64,
	/// Driver-reported generated keys, when the backend surfaces them
	pub generated_keys: Vec<QueryValue>,
}

impl QueryResult {
	pub fn affected(rows_affected: u64) -> Self {
		Self {
			rows_affected,
			generated_keys: Vec::new(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_dialect_key_label_round_trip() {
		for key in DialectKey::ALL {
			assert_eq!(DialectKey::from_label(key.as_str()), key);
		}
	}

	#[test]
	fn test_unknown_label_falls_back() {
		assert_eq!(DialectKey::from_label("h2"), DialectKey::Unknown);
	}

	#[test]
	fn test_row_preserves_column_order() {
		let mut row = Row::new();
		row.insert("b".into(), QueryValue::Int(2));
		row.insert("a".into(), QueryValue::Int(1));
		assert_eq!(row.columns(), &["b".to_string(), "a".to_string()]);
		assert_eq!(row.first_value(), Some(&QueryValue::Int(2)));
	}

	#[test]
	fn test_scalar_conversion() {
		let mut row = Row::new();
		row.insert("total".into(), QueryValue::Int(42));
		let total: i64 = row.get("total").unwrap();
		assert_eq!(total, 42);
		assert!(row.get::<String>("missing").is_err());
	}
}
