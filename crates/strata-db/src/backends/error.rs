//! Error types for the adapter layer.
//!
//! Every failure surfaced by an [`Adapter`](crate::backends::Adapter) is a
//! [`DatabaseError`]. Driver failures are never swallowed or retried: they are
//! wrapped once with the statement that produced them and handed back to the
//! caller, which owns retry policy.

use thiserror::Error;

use super::types::DatabaseType;

/// Maximum number of characters of a statement kept in error context.
const STATEMENT_CONTEXT_LENGTH: usize = 512;

/// Failure reported by a [`Driver`](crate::backends::Driver).
#[derive(Debug, Error)]
pub enum DriverError {
	/// Error raised by sqlx while talking to the server.
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),

	/// The blocking runtime behind a driver could not be created.
	#[error("Runtime error: {0}")]
	Runtime(#[from] std::io::Error),

	/// Free-form backend error, used by drivers that do not go through sqlx.
	#[error("{0}")]
	Backend(String),
}

/// Errors produced by the adapter layer.
#[derive(Debug, Error)]
pub enum DatabaseError {
	/// Invalid or missing connection parameters.
	#[error("Configuration error: {0}")]
	Configuration(String),

	/// The driver could not establish a connection.
	#[error("Connection error: {source}")]
	Connection {
		#[source]
		source: DriverError,
	},

	/// A data-definition statement was issued while a transaction is open.
	#[error("DDL statements are not allowed in transactions: {statement}")]
	DdlInTransaction { statement: String },

	/// The backend rejected a statement.
	#[error("Query execution failed: {source} (statement: {statement})")]
	Execution {
		statement: String,
		#[source]
		source: DriverError,
	},

	/// The active dialect cannot express the requested operation.
	#[error("Operation not supported by {backend}: {operation}")]
	NotSupported {
		backend: DatabaseType,
		operation: String,
	},

	/// Caller-supplied arguments violate the operation's contract.
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	/// A row value could not be converted to the requested type.
	#[error("Type conversion error: {0}")]
	TypeError(String),

	/// A row does not contain the requested column.
	#[error("Column not found: {0}")]
	ColumnNotFound(String),

	/// The shared cache tier failed.
	#[error("Cache error: {0}")]
	Cache(String),

	/// Cached payload could not be (de)serialized.
	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

impl DatabaseError {
	/// Wrap a driver failure with the statement that caused it.
	pub fn execution(statement: &str, source: DriverError) -> Self {
		Self::Execution {
			statement: truncate_statement(statement),
			source,
		}
	}

	/// Build an unsupported-operation error for `backend`.
	pub fn not_supported(backend: DatabaseType, operation: impl Into<String>) -> Self {
		Self::NotSupported {
			backend,
			operation: operation.into(),
		}
	}

	/// Returns `true` when the error reports an unsupported dialect operation.
	pub fn is_not_supported(&self) -> bool {
		matches!(self, Self::NotSupported { .. })
	}
}

fn truncate_statement(statement: &str) -> String {
	if statement.chars().count() <= STATEMENT_CONTEXT_LENGTH {
		return statement.to_string();
	}
	let mut truncated: String = statement.chars().take(STATEMENT_CONTEXT_LENGTH).collect();
	truncated.push_str("...");
	truncated
}

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_execution_error_keeps_statement_context() {
		// Arrange
		let source = DriverError::Backend("table t does not exist".to_string());

		// Act
		let error = DatabaseError::execution("SELECT * FROM t", source);

		// Assert
		assert_eq!(
			error.to_string(),
			"Query execution failed: table t does not exist (statement: SELECT * FROM t)"
		);
	}

	#[rstest]
	fn test_execution_error_truncates_long_statements() {
		// Arrange
		let statement = format!("SELECT '{}'", "x".repeat(2000));

		// Act
		let error = DatabaseError::execution(&statement, DriverError::Backend("boom".into()));

		// Assert
		match error {
			DatabaseError::Execution { statement, .. } => {
				assert_eq!(statement.chars().count(), STATEMENT_CONTEXT_LENGTH + 3);
				assert!(statement.ends_with("..."));
			}
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[rstest]
	fn test_not_supported_is_detectable() {
		// Act
		let error = DatabaseError::not_supported(DatabaseType::Postgres, "timed advisory lock");

		// Assert
		assert!(error.is_not_supported());
		assert_eq!(
			error.to_string(),
			"Operation not supported by postgresql: timed advisory lock"
		);
	}
}
