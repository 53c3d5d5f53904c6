//! Blocking driver contract
//!
//! A [`Driver`] owns exactly one physical connection. Every call blocks until
//! the backend answers, and calls run on the server in the order they are made.
//! Catalog methods return rows in the backend's native shape; the active
//! [`Dialect`](crate::backends::Dialect) converts them.

use super::{
	error::DriverError,
	types::{DatabaseType, QueryResult, QueryValue, Row},
};

/// Result type alias for driver calls.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Backend driver used by the adapter.
pub trait Driver: Send {
	fn database_type(&self) -> DatabaseType;

	/// Execute a statement and report affected rows.
	///
	/// Statements without parameters run through the simple-query protocol, so
	/// they may contain several `;`-separated statements.
	fn execute(&mut self, sql: &str, params: &[QueryValue]) -> DriverResult<QueryResult>;

	/// Run a query and collect every row.
	fn fetch_all(&mut self, sql: &str, params: &[QueryValue]) -> DriverResult<Vec<Row>>;

	fn begin(&mut self) -> DriverResult<()>;

	fn commit(&mut self) -> DriverResult<()>;

	fn rollback(&mut self) -> DriverResult<()>;

	/// Names of the base tables in `schema`, sorted.
	fn list_tables(&mut self, schema: &str) -> DriverResult<Vec<String>>;

	/// Column rows of `schema.table`. Empty when the table does not exist.
	fn catalog_columns(&mut self, schema: &str, table: &str) -> DriverResult<Vec<Row>>;

	/// Index rows of `schema.table`, one per indexed column.
	fn catalog_indexes(&mut self, schema: &str, table: &str) -> DriverResult<Vec<Row>>;

	/// Primary key rows, for backends that report the primary key as a
	/// constraint apart from the index list. Others return no rows.
	fn catalog_primary_key(&mut self, schema: &str, table: &str) -> DriverResult<Vec<Row>>;

	/// Foreign key rows of `schema.table`, one per constrained column.
	fn catalog_foreign_keys(&mut self, schema: &str, table: &str) -> DriverResult<Vec<Row>>;

	/// Close the connection. Further calls fail.
	fn close(&mut self) -> DriverResult<()>;
}
