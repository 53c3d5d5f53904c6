//! Test support
//!
//! [`MockDriver`] is a scripted [`Driver`] that records every call. Clones
//! share their state, so a test keeps one handle for assertions and gives
//! another to the adapter.
//!
//! ```
//! use strata_db::backends::testing::{MockDriver, MockOperation};
//! use strata_db::backends::Driver;
//!
//! let mock = MockDriver::mysql();
//! let mut driver: Box<dyn Driver> = Box::new(mock.clone());
//! driver.begin().unwrap();
//! assert_eq!(mock.calls(MockOperation::Begin), 1);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::{
	driver::{Driver, DriverResult},
	error::DriverError,
	types::{DatabaseType, QueryResult, QueryValue, Row},
};

/// Driver operations counted by [`MockDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
	Execute,
	Fetch,
	Begin,
	Commit,
	Rollback,
	/// Any of the catalog methods, including `list_tables`.
	Catalog,
	Close,
}

/// One column of a scripted table.
#[derive(Debug, Clone)]
pub struct MockColumn {
	pub name: String,
	pub data_type: String,
	pub column_type: String,
	pub nullable: bool,
	pub default: Option<String>,
	pub length: Option<i64>,
	pub identity: bool,
}

impl MockColumn {
	pub fn new(name: &str, data_type: &str, column_type: &str) -> Self {
		Self {
			name: name.to_string(),
			data_type: data_type.to_string(),
			column_type: column_type.to_string(),
			nullable: true,
			default: None,
			length: None,
			identity: false,
		}
	}

	pub fn not_null(mut self) -> Self {
		self.nullable = false;
		self
	}

	pub fn length(mut self, length: i64) -> Self {
		self.length = Some(length);
		self
	}

	pub fn default_value(mut self, default: &str) -> Self {
		self.default = Some(default.to_string());
		self
	}

	pub fn identity(mut self) -> Self {
		self.identity = true;
		self
	}
}

/// Catalog content of a scripted table.
///
/// Catalog rows carry the keys both dialects read, so one table definition
/// serves MySQL and Postgres adapters alike.
#[derive(Debug, Clone, Default)]
pub struct MockTable {
	columns: Vec<MockColumn>,
	primary_key: Vec<String>,
	primary_name: Option<String>,
	indexes: Vec<(String, Vec<String>, bool, String)>,
	foreign_keys: Vec<(String, String, String, String, String)>,
}

impl MockTable {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn column(mut self, column: MockColumn) -> Self {
		self.columns.push(column);
		self
	}

	/// Primary key reported as a constraint named `name`.
	pub fn primary_key(mut self, name: &str, columns: &[&str]) -> Self {
		self.primary_name = Some(name.to_string());
		self.primary_key = columns.iter().map(|c| c.to_string()).collect();
		self
	}

	pub fn index(mut self, name: &str, columns: &[&str], unique: bool, index_type: &str) -> Self {
		self.indexes.push((
			name.to_string(),
			columns.iter().map(|c| c.to_string()).collect(),
			unique,
			index_type.to_string(),
		));
		self
	}

	/// Foreign key with `CASCADE` on delete and `NO ACTION` on update.
	pub fn foreign_key(
		mut self,
		name: &str,
		column: &str,
		ref_schema: &str,
		ref_table: &str,
		ref_column: &str,
	) -> Self {
		self.foreign_keys.push((
			name.to_string(),
			column.to_string(),
			ref_schema.to_string(),
			ref_table.to_string(),
			ref_column.to_string(),
		));
		self
	}

	fn column_rows(&self) -> Vec<Row> {
		self.columns
			.iter()
			.enumerate()
			.map(|(i, c)| {
				let key = if self.primary_key.contains(&c.name) {
					"PRI"
				} else {
					""
				};
				row([
					("column_name", QueryValue::from(c.name.as_str())),
					("ordinal_position", QueryValue::Int(i as i64 + 1)),
					("data_type", QueryValue::from(c.data_type.as_str())),
					("column_type", QueryValue::from(c.column_type.as_str())),
					("udt_name", QueryValue::from(c.column_type.as_str())),
					(
						"is_nullable",
						QueryValue::from(if c.nullable { "YES" } else { "NO" }),
					),
					("column_default", QueryValue::from(c.default.clone())),
					("character_maximum_length", QueryValue::from(c.length)),
					("numeric_precision", QueryValue::Null),
					("numeric_scale", QueryValue::Null),
					("column_key", QueryValue::from(key)),
					(
						"extra",
						QueryValue::from(if c.identity { "auto_increment" } else { "" }),
					),
					(
						"is_identity",
						QueryValue::from(if c.identity { "YES" } else { "NO" }),
					),
				])
			})
			.collect()
	}

	fn primary_rows(&self) -> Vec<Row> {
		let name = self.primary_name.clone().unwrap_or_default();
		self.primary_key
			.iter()
			.enumerate()
			.map(|(i, column)| {
				row([
					("column_name", QueryValue::from(column.as_str())),
					("ordinal_position", QueryValue::Int(i as i64 + 1)),
					("constraint_name", QueryValue::from(name.as_str())),
				])
			})
			.collect()
	}

	fn index_rows(&self) -> Vec<Row> {
		self.indexes
			.iter()
			.flat_map(|(name, columns, unique, index_type)| {
				columns.iter().enumerate().map(move |(i, column)| {
					row([
						("index_name", QueryValue::from(name.as_str())),
						("column_name", QueryValue::from(column.as_str())),
						("seq_in_index", QueryValue::Int(i as i64 + 1)),
						("non_unique", QueryValue::Int(if *unique { 0 } else { 1 })),
						("is_unique", QueryValue::Bool(*unique)),
						("index_type", QueryValue::from(index_type.as_str())),
					])
				})
			})
			.collect()
	}

	fn foreign_key_rows(&self, database_type: DatabaseType) -> Vec<Row> {
		let (on_delete, on_update) = match database_type {
			DatabaseType::Mysql => ("CASCADE", "NO ACTION"),
			DatabaseType::Postgres => ("c", "a"),
		};
		self.foreign_keys
			.iter()
			.map(|(name, column, ref_schema, ref_table, ref_column)| {
				row([
					("constraint_name", QueryValue::from(name.as_str())),
					("column_name", QueryValue::from(column.as_str())),
					("ref_schema", QueryValue::from(ref_schema.as_str())),
					("ref_table", QueryValue::from(ref_table.as_str())),
					("ref_column", QueryValue::from(ref_column.as_str())),
					("on_delete", QueryValue::from(on_delete)),
					("on_update", QueryValue::from(on_update)),
				])
			})
			.collect()
	}
}

fn row<const N: usize>(pairs: [(&str, QueryValue); N]) -> Row {
	pairs
		.into_iter()
		.map(|(k, v)| (k.to_string(), v))
		.collect()
}

#[derive(Debug, Default)]
struct MockState {
	calls: HashMap<MockOperation, usize>,
	statements: Vec<(String, Vec<QueryValue>)>,
	tables: IndexMap<String, MockTable>,
	rows: VecDeque<Vec<Row>>,
	results: VecDeque<QueryResult>,
	default_rows_affected: u64,
	failures: HashMap<MockOperation, VecDeque<String>>,
	closed: bool,
}

impl MockState {
	fn record(&mut self, operation: MockOperation) -> DriverResult<()> {
		*self.calls.entry(operation).or_default() += 1;
		if let Some(message) = self.failures.get_mut(&operation).and_then(|q| q.pop_front()) {
			return Err(DriverError::Backend(message));
		}
		if self.closed {
			return Err(DriverError::Backend("connection is closed".to_string()));
		}
		Ok(())
	}

	fn table(&self, schema: &str, table: &str) -> Option<&MockTable> {
		self.tables.get(&format!("{schema}.{table}"))
	}
}

/// Scripted in-memory driver.
#[derive(Debug, Clone)]
pub struct MockDriver {
	database_type: DatabaseType,
	state: Arc<Mutex<MockState>>,
}

impl MockDriver {
	pub fn new(database_type: DatabaseType) -> Self {
		Self {
			database_type,
			state: Arc::new(Mutex::new(MockState {
				default_rows_affected: 1,
				..MockState::default()
			})),
		}
	}

	pub fn mysql() -> Self {
		Self::new(DatabaseType::Mysql)
	}

	pub fn postgres() -> Self {
		Self::new(DatabaseType::Postgres)
	}

	/// Register (or replace) the catalog content of `schema.table`.
	pub fn with_table(self, schema: &str, table: &str, definition: MockTable) -> Self {
		self.set_table(schema, table, definition);
		self
	}

	pub fn set_table(&self, schema: &str, table: &str, definition: MockTable) {
		self.state
			.lock()
			.tables
			.insert(format!("{schema}.{table}"), definition);
	}

	pub fn remove_table(&self, schema: &str, table: &str) {
		self.state
			.lock()
			.tables
			.shift_remove(&format!("{schema}.{table}"));
	}

	/// Queue the rows returned by the next `fetch_all`. Unscripted fetches
	/// return no rows.
	pub fn push_rows(&self, rows: Vec<Row>) {
		self.state.lock().rows.push_back(rows);
	}

	/// Queue the result of the next `execute`.
	pub fn push_result(&self, result: QueryResult) {
		self.state.lock().results.push_back(result);
	}

	/// Rows affected reported by unscripted `execute` calls (1 unless changed).
	pub fn set_default_rows_affected(&self, rows_affected: u64) {
		self.state.lock().default_rows_affected = rows_affected;
	}

	/// Make the next call of `operation` fail with `message`.
	pub fn fail_next(&self, operation: MockOperation, message: &str) {
		self.state
			.lock()
			.failures
			.entry(operation)
			.or_default()
			.push_back(message.to_string());
	}

	pub fn calls(&self, operation: MockOperation) -> usize {
		self.state
			.lock()
			.calls
			.get(&operation)
			.copied()
			.unwrap_or(0)
	}

	/// SQL text of every executed or fetched statement, in order.
	pub fn statements(&self) -> Vec<String> {
		self.state
			.lock()
			.statements
			.iter()
			.map(|(sql, _)| sql.clone())
			.collect()
	}

	/// Last statement together with its bound parameters.
	pub fn last_statement(&self) -> Option<(String, Vec<QueryValue>)> {
		self.state.lock().statements.last().cloned()
	}

	pub fn is_closed(&self) -> bool {
		self.state.lock().closed
	}
}

impl Driver for MockDriver {
	fn database_type(&self) -> DatabaseType {
		self.database_type
	}

	fn execute(&mut self, sql: &str, params: &[QueryValue]) -> DriverResult<QueryResult> {
		let mut state = self.state.lock();
		state.record(MockOperation::Execute)?;
		state.statements.push((sql.to_string(), params.to_vec()));
		let fallback = QueryResult {
			rows_affected: state.default_rows_affected,
			last_insert_id: None,
		};
		Ok(state.results.pop_front().unwrap_or(fallback))
	}

	fn fetch_all(&mut self, sql: &str, params: &[QueryValue]) -> DriverResult<Vec<Row>> {
		let mut state = self.state.lock();
		state.record(MockOperation::Fetch)?;
		state.statements.push((sql.to_string(), params.to_vec()));
		Ok(state.rows.pop_front().unwrap_or_default())
	}

	fn begin(&mut self) -> DriverResult<()> {
		self.state.lock().record(MockOperation::Begin)
	}

	fn commit(&mut self) -> DriverResult<()> {
		self.state.lock().record(MockOperation::Commit)
	}

	fn rollback(&mut self) -> DriverResult<()> {
		self.state.lock().record(MockOperation::Rollback)
	}

	fn list_tables(&mut self, schema: &str) -> DriverResult<Vec<String>> {
		let mut state = self.state.lock();
		state.record(MockOperation::Catalog)?;
		let prefix = format!("{schema}.");
		let mut tables: Vec<String> = state
			.tables
			.keys()
			.filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
			.collect();
		tables.sort();
		Ok(tables)
	}

	fn catalog_columns(&mut self, schema: &str, table: &str) -> DriverResult<Vec<Row>> {
		let mut state = self.state.lock();
		state.record(MockOperation::Catalog)?;
		Ok(state
			.table(schema, table)
			.map(MockTable::column_rows)
			.unwrap_or_default())
	}

	fn catalog_indexes(&mut self, schema: &str, table: &str) -> DriverResult<Vec<Row>> {
		let mut state = self.state.lock();
		state.record(MockOperation::Catalog)?;
		Ok(state
			.table(schema, table)
			.map(MockTable::index_rows)
			.unwrap_or_default())
	}

	fn catalog_primary_key(&mut self, schema: &str, table: &str) -> DriverResult<Vec<Row>> {
		let mut state = self.state.lock();
		state.record(MockOperation::Catalog)?;
		Ok(state
			.table(schema, table)
			.map(MockTable::primary_rows)
			.unwrap_or_default())
	}

	fn catalog_foreign_keys(&mut self, schema: &str, table: &str) -> DriverResult<Vec<Row>> {
		let database_type = self.database_type;
		let mut state = self.state.lock();
		state.record(MockOperation::Catalog)?;
		Ok(state
			.table(schema, table)
			.map(|t| t.foreign_key_rows(database_type))
			.unwrap_or_default())
	}

	fn close(&mut self) -> DriverResult<()> {
		let mut state = self.state.lock();
		state.record(MockOperation::Close)?;
		state.closed = true;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_clones_share_state() {
		// Arrange
		let mock = MockDriver::mysql();
		let mut driver = mock.clone();

		// Act
		driver.execute("DELETE FROM t", &[]).unwrap();
		driver.begin().unwrap();

		// Assert
		assert_eq!(mock.calls(MockOperation::Execute), 1);
		assert_eq!(mock.calls(MockOperation::Begin), 1);
		assert_eq!(mock.statements(), vec!["DELETE FROM t".to_string()]);
	}

	#[rstest]
	fn test_injected_failure_fires_once() {
		// Arrange
		let mock = MockDriver::postgres();
		let mut driver = mock.clone();
		mock.fail_next(MockOperation::Commit, "serialization failure");

		// Act
		let first = driver.commit();
		let second = driver.commit();

		// Assert
		assert!(first.is_err());
		assert!(second.is_ok());
		assert_eq!(mock.calls(MockOperation::Commit), 2);
	}

	#[rstest]
	fn test_unknown_table_has_no_catalog_rows() {
		// Arrange
		let mut driver = MockDriver::mysql();

		// Act
		let rows = driver.catalog_columns("shop", "missing").unwrap();

		// Assert
		assert!(rows.is_empty());
	}

	#[rstest]
	fn test_closed_driver_rejects_calls() {
		// Arrange
		let mut driver = MockDriver::mysql();
		driver.close().unwrap();

		// Act
		let result = driver.fetch_all("SELECT 1", &[]);

		// Assert
		assert!(result.is_err());
	}
}
