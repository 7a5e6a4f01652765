//! Error types for dialect translation and query execution

use crate::types::DialectKey;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, DialectError>;

/// Errors raised by the dialect engine
#[derive(Debug, thiserror::Error)]
pub enum DialectError {
	/// Malformed template, bad page bounds, missing primary key, etc.
	/// Raised before any statement is issued.
	#[error("Invalid configuration: {0}")]
	Configuration(String),

	/// Parameter name/value count mismatch or a missing bound parameter
	#[error("Parameter error: {0}")]
	Parameter(String),

	/// SQL text that cannot be safely rewritten (mismatched parentheses,
	/// no outer FROM clause, unterminated string literal)
	#[error("Cannot rewrite SQL: {reason}; sql: {sql}")]
	Rewrite { reason: String, sql: String },

	/// Operation the target backend cannot express
	#[error("Operation `{operation}` is unsupported for dialect {dialect}")]
	Unsupported {
		operation: &'static str,
		dialect: DialectKey,
	},

	/// Backend rejected a statement; SQL and parameter context attached
	#[error("Execution failed: {source}; sql: {sql}; params: {params}")]
	Execution {
		#[source]
		source: sqlx::Error,
		sql: String,
		params: String,
	},

	/// Batch execution aborted; reports how many chunks flushed before
	/// the failure
	#[error("Batch failed after {completed_chunks} flushed chunk(s): {source}")]
	Batch {
		completed_chunks: usize,
		#[source]
		source: Box<DialectError>,
	},

	/// A forked count/fetch branch failed
	#[error("Parallel page branch `{branch}` failed: {message}")]
	ParallelBranch { branch: &'static str, message: String },

	/// The parallel count+fetch join exceeded its wait ceiling
	#[error("Parallel page request timed out after {0:?}")]
	ParallelTimeout(std::time::Duration),

	/// Column missing from a result row
	#[error("Column not found in result row: {0}")]
	ColumnNotFound(String),

	/// Result value could not be converted to the requested type
	#[error("Type conversion failed for column `{column}`: expected {expected}")]
	TypeConversion { column: String, expected: &'static str },

	/// A business-key generator could not run because a related column
	/// value was absent
	#[error("Related column `{column}` has no value; cannot generate key for table `{table}`")]
	RelatedColumnMissing { table: String, column: String },

	/// Raw driver error outside of a tracked statement
	#[error("Database error: {0}")]
	Database(#[from] sqlx::Error),

	/// Serialization error
	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	/// A spawned branch panicked or was cancelled
	#[error("Join error: {0}")]
	Join(#[from] tokio::task::JoinError),
}

impl DialectError {
	/// Attach SQL and parameter context to a driver error
	pub fn execution(source: sqlx::Error, sql: impl Into<String>, params: String) -> Self {
		DialectError::Execution {
			source,
			sql: sql.into(),
			params,
		}
	}

	pub fn rewrite(reason: impl Into<String>, sql: impl Into<String>) -> Self {
		DialectError::Rewrite {
			reason: reason.into(),
			sql: sql.into(),
		}
	}

	pub fn unsupported(operation: &'static str, dialect: DialectKey) -> Self {
		DialectError::Unsupported { operation, dialect }
	}
}
