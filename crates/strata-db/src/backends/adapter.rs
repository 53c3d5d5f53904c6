//! Database adapter
//!
//! [`Adapter`] is the entry point of the layer. It owns one driver connection
//! and the configuration it was built from, and puts the rest together:
//!
//! - statements run through the [`QueryTracer`]
//! - transactions nest through the [`TransactionManager`], whose DDL guard
//!   protects [`Adapter::query`] and every DDL helper
//! - introspection is served from the [`DdlCache`] when possible
//! - generated names come from the [`NamingScheme`]
//!
//! The dialect is chosen once, from the configured engine.
//!
//! ## Example
//!
//! ```
//! use strata_db::backends::{Adapter, ConnectionConfig, Where, testing::MockDriver};
//! use strata_db::data;
//!
//! let config = ConnectionConfig::mysql("shop", "app", "secret", "localhost", 3306);
//! let mut adapter = Adapter::with_driver(config, Box::new(MockDriver::mysql())).unwrap();
//!
//! adapter.begin().unwrap();
//! let inserted = adapter.insert("t", data! { "id" => 1, "name" => "a'b" }).unwrap();
//! let updated = adapter.update("t", data! { "name" => "c" }, Where::eq("id", 1)).unwrap();
//! adapter.commit().unwrap();
//!
//! assert_eq!((inserted, updated), (1, 1));
//! assert_eq!(adapter.transaction_level(), 0);
//! ```
//!
//! An adapter is not meant to be shared between threads without external
//! locking; use one adapter per unit of work.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use super::{
	cache::SharedCache,
	config::ConnectionConfig,
	crud::{Data, DeleteBuilder, InsertBuilder, OnConflict, UpdateBuilder, Where},
	ddl_cache::{DdlCache, DdlKind},
	dialect::{Dialect, dialect_for, split_qualified},
	driver::Driver,
	drivers,
	error::{DatabaseError, Result},
	introspection::{
		ColumnDescription, ForeignKeyAction, ForeignKeyDescription, IndexDescription, IndexKind,
		PRIMARY_KEY_NAME, SchemaIntrospector, TableRef,
	},
	naming::NamingScheme,
	query_builder::{AsSql, Select},
	query_trace::QueryTracer,
	quoting::{self, ValueType},
	transaction::TransactionManager,
	types::{DatabaseType, QueryResult, QueryValue, Row},
};

/// Connection-backed adapter over one backend.
pub struct Adapter {
	config: ConnectionConfig,
	driver: Box<dyn Driver>,
	dialect: Arc<dyn Dialect>,
	transactions: TransactionManager,
	ddl_cache: DdlCache,
	tracer: QueryTracer,
	naming: NamingScheme,
	last_insert_id: Option<u64>,
}

impl std::fmt::Debug for Adapter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Adapter")
			.field("engine", &self.config.engine)
			.field("database", &self.config.database)
			.field("transaction_level", &self.transactions.level())
			.finish_non_exhaustive()
	}
}

impl Adapter {
	/// Validate `config` and open a connection with the matching driver.
	pub fn connect(config: ConnectionConfig) -> Result<Self> {
		config.validate()?;
		let driver = drivers::connect(&config)?;
		Self::with_driver(config, driver)
	}

	/// Build an adapter over an already connected driver.
	///
	/// Fails with a configuration error when the driver speaks another
	/// backend than `config.engine`.
	pub fn with_driver(config: ConnectionConfig, driver: Box<dyn Driver>) -> Result<Self> {
		config.validate()?;
		if driver.database_type() != config.engine {
			return Err(DatabaseError::Configuration(format!(
				"configured for {} but the driver talks to {}",
				config.engine,
				driver.database_type()
			)));
		}
		let dialect = dialect_for(config.engine);
		let naming = NamingScheme::for_dialect(dialect.as_ref(), config.table_prefix.as_deref());
		debug!(engine = %config.engine, database = %config.database, "adapter ready");
		Ok(Self {
			ddl_cache: DdlCache::new(config.engine, config.ddl_cache),
			tracer: QueryTracer::new(config.engine, config.trace.clone()),
			transactions: TransactionManager::new(),
			last_insert_id: None,
			naming,
			dialect,
			driver,
			config,
		})
	}

	/// Mirror introspection results into `shared`.
	pub fn with_shared_cache(mut self, shared: Arc<dyn SharedCache>) -> Self {
		self.ddl_cache.set_shared(Some(shared));
		self
	}

	pub fn config(&self) -> &ConnectionConfig {
		&self.config
	}

	pub fn database_type(&self) -> DatabaseType {
		self.config.engine
	}

	/// The dialect rendering SQL for this adapter.
	pub fn platform(&self) -> &dyn Dialect {
		self.dialect.as_ref()
	}

	pub fn naming(&self) -> &NamingScheme {
		&self.naming
	}

	// Transactions

	pub fn begin(&mut self) -> Result<()> {
		self.transactions.begin(self.driver.as_mut())
	}

	pub fn commit(&mut self) -> Result<()> {
		self.transactions.commit(self.driver.as_mut())
	}

	pub fn rollback(&mut self) -> Result<()> {
		self.transactions.rollback(self.driver.as_mut())
	}

	/// Current nesting level; 0 outside transactions.
	pub fn transaction_level(&self) -> usize {
		self.transactions.level()
	}

	/// Run `work` inside a transaction level, committing on success and
	/// rolling back on error.
	///
	/// ```
	/// use strata_db::backends::{Adapter, ConnectionConfig, testing::MockDriver};
	///
	/// let config = ConnectionConfig::postgres("shop", "app", "secret", "localhost", 5432);
	/// let mut adapter = Adapter::with_driver(config, Box::new(MockDriver::postgres())).unwrap();
	///
	/// let affected = adapter
	///     .transaction(|tx| tx.query("UPDATE stock SET qty = qty - 1", &[]))
	///     .unwrap();
	/// assert_eq!(affected.rows_affected, 1);
	/// ```
	pub fn transaction<T, F>(&mut self, work: F) -> Result<T>
	where
		F: FnOnce(&mut Self) -> Result<T>,
	{
		if let Err(error) = self.begin() {
			if let Err(rollback_error) = self.rollback() {
				warn!(%rollback_error, "rollback after failed begin failed");
			}
			return Err(error);
		}
		match work(self) {
			Ok(value) => {
				self.commit()?;
				Ok(value)
			}
			Err(error) => {
				if let Err(rollback_error) = self.rollback() {
					warn!(%rollback_error, "rollback after failed transaction body failed");
				}
				Err(error)
			}
		}
	}

	// Statements

	/// Run a statement that returns no rows. DDL is refused inside
	/// transactions.
	pub fn query(&mut self, sql: &str, params: &[QueryValue]) -> Result<QueryResult> {
		self.transactions.guard_ddl(sql)?;
		self.execute_traced(sql, params)
	}

	pub fn fetch_all<Q: AsSql + ?Sized>(&mut self, query: &Q, params: &[QueryValue]) -> Result<Vec<Row>> {
		let sql = query.to_sql();
		self.fetch_traced(&sql, params)
	}

	/// First row, if any.
	pub fn fetch_row<Q: AsSql + ?Sized>(&mut self, query: &Q, params: &[QueryValue]) -> Result<Option<Row>> {
		Ok(self.fetch_all(query, params)?.into_iter().next())
	}

	/// First column of the first row, if any.
	pub fn fetch_one<Q: AsSql + ?Sized>(
		&mut self,
		query: &Q,
		params: &[QueryValue],
	) -> Result<Option<QueryValue>> {
		Ok(self
			.fetch_row(query, params)?
			.and_then(|row| row.value_at(0).cloned()))
	}

	/// First column of every row.
	pub fn fetch_col<Q: AsSql + ?Sized>(&mut self, query: &Q, params: &[QueryValue]) -> Result<Vec<QueryValue>> {
		Ok(self
			.fetch_all(query, params)?
			.iter()
			.filter_map(|row| row.value_at(0).cloned())
			.collect())
	}

	/// First column mapped to second column, in row order. Rows with a NULL
	/// key are skipped; a repeated key keeps its last value.
	pub fn fetch_pairs<Q: AsSql + ?Sized>(
		&mut self,
		query: &Q,
		params: &[QueryValue],
	) -> Result<IndexMap<String, QueryValue>> {
		let rows = self.fetch_all(query, params)?;
		let mut pairs = IndexMap::with_capacity(rows.len());
		for row in &rows {
			let Some(key) = row.columns().next().and_then(|column| row.text(column)) else {
				continue;
			};
			let value = row.value_at(1).cloned().unwrap_or(QueryValue::Null);
			pairs.insert(key, value);
		}
		Ok(pairs)
	}

	// CRUD

	/// Insert one row and return the affected row count.
	pub fn insert(&mut self, table: &str, data: Data) -> Result<u64> {
		self.insert_multiple(table, vec![data])
	}

	/// Insert several rows in one statement. Every row must carry the
	/// columns of the first.
	pub fn insert_multiple(&mut self, table: &str, rows: Vec<Data>) -> Result<u64> {
		let (sql, params) = InsertBuilder::new(self.dialect.clone(), table)
			.rows(rows)
			.build()?;
		Ok(self.execute_traced(&sql, &params)?.rows_affected)
	}

	/// Insert rows, skipping those that hit a unique key.
	pub fn insert_ignore(&mut self, table: &str, rows: Vec<Data>) -> Result<u64> {
		let (sql, params) = InsertBuilder::new(self.dialect.clone(), table)
			.rows(rows)
			.on_conflict(OnConflict::Ignore)
			.build()?;
		Ok(self.execute_traced(&sql, &params)?.rows_affected)
	}

	/// Insert rows, updating `update_columns` of rows that hit a unique key.
	///
	/// An empty `update_columns` updates every inserted column outside the
	/// conflict key. The conflict key is the primary key, or else the first
	/// unique index, whose columns are all present in the data.
	pub fn insert_on_duplicate(&mut self, table: &str, rows: Vec<Data>, update_columns: &[&str]) -> Result<u64> {
		let Some(first) = rows.first() else {
			return Err(DatabaseError::InvalidArgument(format!(
				"insert into {table} without rows"
			)));
		};
		let columns: Vec<String> = first.keys().cloned().collect();
		let conflict_columns = match self.conflict_key(table, &columns)? {
			Some(key) => key,
			None if self.dialect.upsert_requires_conflict_target() => {
				return Err(DatabaseError::InvalidArgument(format!(
					"no primary key or unique index of {table} is covered by the inserted columns"
				)));
			}
			None => Vec::new(),
		};
		let (sql, params) = InsertBuilder::new(self.dialect.clone(), table)
			.rows(rows)
			.on_conflict(OnConflict::Update {
				conflict_columns,
				update_columns: update_columns.iter().map(|c| c.to_string()).collect(),
			})
			.build()?;
		Ok(self.execute_traced(&sql, &params)?.rows_affected)
	}

	fn conflict_key(&mut self, table: &str, columns: &[String]) -> Result<Option<Vec<String>>> {
		let mut indexes = self.get_index_list(table, None)?;
		indexes.retain(|i| matches!(i.kind, IndexKind::Primary | IndexKind::Unique));
		indexes.sort_by_key(|i| i.kind != IndexKind::Primary);
		Ok(indexes
			.into_iter()
			.find(|i| !i.columns.is_empty() && i.columns.iter().all(|c| columns.contains(c)))
			.map(|i| i.columns))
	}

	/// Update rows matching `condition` and return the affected row count.
	pub fn update(&mut self, table: &str, data: Data, condition: impl Into<Where>) -> Result<u64> {
		let (sql, params) = UpdateBuilder::new(self.dialect.clone(), table)
			.data(data)
			.where_(condition)
			.build()?;
		Ok(self.execute_traced(&sql, &params)?.rows_affected)
	}

	/// Delete rows matching `condition` and return the affected row count.
	pub fn delete(&mut self, table: &str, condition: impl Into<Where>) -> Result<u64> {
		let (sql, params) = DeleteBuilder::new(self.dialect.clone(), table)
			.where_(condition)
			.build();
		Ok(self.execute_traced(&sql, &params)?.rows_affected)
	}

	/// Most recent auto-generated id of this session.
	pub fn last_insert_id(&mut self) -> Result<Option<u64>> {
		match self.config.engine {
			DatabaseType::Mysql => Ok(self.last_insert_id),
			DatabaseType::Postgres => {
				let value = self.fetch_one("SELECT lastval()", &[])?;
				match value {
					None | Some(QueryValue::Null) => Ok(None),
					Some(value) => u64::try_from(value).map(Some),
				}
			}
		}
	}

	/// New select builder for this adapter's dialect.
	pub fn select(&self) -> Select {
		Select::new(self.dialect.clone())
	}

	// Quoting

	pub fn quote(&self, value: &QueryValue) -> String {
		quoting::quote(self.dialect.as_ref(), value)
	}

	pub fn quote_typed(&self, value: &QueryValue, value_type: ValueType) -> String {
		quoting::quote_typed(self.dialect.as_ref(), value, value_type)
	}

	pub fn quote_into(&self, template: &str, value: &QueryValue, count: Option<usize>) -> String {
		quoting::quote_into(self.dialect.as_ref(), template, value, count)
	}

	pub fn quote_identifier(&self, name: &str) -> String {
		self.dialect.quote_identifier(name)
	}

	pub fn quote_table_as(&self, table: &str, alias: Option<&str>) -> String {
		quoting::quote_identifier_as(self.dialect.as_ref(), table, alias)
	}

	pub fn quote_column_as(&self, column: &str, alias: Option<&str>) -> String {
		quoting::quote_identifier_as(self.dialect.as_ref(), column, alias)
	}

	// Introspection

	/// Columns of `table`, ordered by position. Empty when the table does
	/// not exist.
	pub fn describe_table(&mut self, table: &str, schema: Option<&str>) -> Result<Vec<ColumnDescription>> {
		let table = self.table_ref(table, schema);
		self.introspect(&table, DdlKind::Describe, |i, t| i.describe_table(t))
	}

	/// Indexes of `table`, primary key first under the `PRIMARY` key name.
	pub fn get_index_list(&mut self, table: &str, schema: Option<&str>) -> Result<Vec<IndexDescription>> {
		let table = self.table_ref(table, schema);
		self.introspect(&table, DdlKind::Index, |i, t| i.index_list(t))
	}

	pub fn get_foreign_keys(&mut self, table: &str, schema: Option<&str>) -> Result<Vec<ForeignKeyDescription>> {
		let table = self.table_ref(table, schema);
		self.introspect(&table, DdlKind::ForeignKey, |i, t| i.foreign_keys(t))
	}

	/// Forget cached introspection of `table`, or of every table when `table`
	/// is `None`.
	pub fn reset_cache(&mut self, table: Option<&str>, schema: Option<&str>) {
		match table {
			Some(table) => {
				let table = self.table_ref(table, schema);
				self.ddl_cache.reset(Some(&table));
			}
			None => self.ddl_cache.reset(None),
		}
	}

	fn introspect<T, F>(&mut self, table: &TableRef, kind: DdlKind, load: F) -> Result<T>
	where
		T: Serialize + DeserializeOwned,
		F: FnOnce(&mut SchemaIntrospector<'_>, &TableRef) -> Result<T>,
	{
		if let Some(cached) = self.ddl_cache.get(table, kind) {
			debug!(table = %table.cache_key(), kind = kind.as_str(), "DDL cache hit");
			return Ok(cached);
		}
		let mut introspector = SchemaIntrospector::new(self.driver.as_mut(), self.dialect.as_ref());
		let loaded = load(&mut introspector, table)?;
		self.ddl_cache.put(table, kind, &loaded);
		Ok(loaded)
	}

	/// Base tables of `schema`, or of the default schema.
	pub fn list_tables(&mut self, schema: Option<&str>) -> Result<Vec<String>> {
		let schema = self.resolve_schema(schema);
		SchemaIntrospector::new(self.driver.as_mut(), self.dialect.as_ref()).list_tables(&schema)
	}

	pub fn is_table_exists(&mut self, table: &str, schema: Option<&str>) -> Result<bool> {
		Ok(!self.describe_table(table, schema)?.is_empty())
	}

	pub fn table_column_exists(&mut self, table: &str, column: &str, schema: Option<&str>) -> Result<bool> {
		Ok(self
			.describe_table(table, schema)?
			.iter()
			.any(|c| c.name == column))
	}

	// DDL helpers. Table names may be schema-qualified.

	pub fn drop_table(&mut self, table: &str) -> Result<()> {
		let sql = self.dialect.drop_table_sql(table);
		self.run_ddl(&sql, &[table])
	}

	pub fn truncate_table(&mut self, table: &str) -> Result<()> {
		let sql = self.dialect.truncate_table_sql(table);
		self.run_ddl(&sql, &[table])
	}

	pub fn rename_table(&mut self, from: &str, to: &str) -> Result<()> {
		let sql = self.dialect.rename_table_sql(from, to);
		self.run_ddl(&sql, &[from, to])
	}

	/// Add `column` with the raw SQL type `definition`, e.g. `VARCHAR(50) NOT NULL`.
	pub fn add_column(&mut self, table: &str, column: &str, definition: &str) -> Result<()> {
		let sql = self.dialect.add_column_sql(table, column, definition);
		self.run_ddl(&sql, &[table])
	}

	pub fn drop_column(&mut self, table: &str, column: &str) -> Result<()> {
		let sql = self.dialect.drop_column_sql(table, column);
		self.run_ddl(&sql, &[table])
	}

	/// Create an index and return its name. Without `name` the naming
	/// scheme generates one.
	pub fn add_index(
		&mut self,
		table: &str,
		name: Option<&str>,
		columns: &[&str],
		kind: IndexKind,
	) -> Result<String> {
		if columns.is_empty() {
			return Err(DatabaseError::InvalidArgument(format!(
				"index on {table} without columns"
			)));
		}
		let name = match name {
			Some(name) => name.to_string(),
			None => self
				.naming
				.index_name(split_qualified(table).1, columns, kind),
		};
		let sql = self.dialect.add_index_sql(table, &name, columns, kind)?;
		self.run_ddl(&sql, &[table])?;
		Ok(name)
	}

	/// Drop an index. `PRIMARY` drops the primary key.
	pub fn drop_index(&mut self, table: &str, name: &str) -> Result<()> {
		let sql = if name.eq_ignore_ascii_case(PRIMARY_KEY_NAME) {
			let constraint = self
				.get_index_list(table, None)?
				.into_iter()
				.find(|i| i.kind == IndexKind::Primary)
				.map(|i| i.native_name)
				.unwrap_or_else(|| format!("{}_pkey", split_qualified(table).1));
			self.dialect.drop_primary_key_sql(table, &constraint)
		} else {
			self.dialect.drop_index_sql(table, name)
		};
		self.run_ddl(&sql, &[table])
	}

	/// Add a foreign key and return its name. Without `name` the naming
	/// scheme generates one.
	#[allow(clippy::too_many_arguments)]
	pub fn add_foreign_key(
		&mut self,
		name: Option<&str>,
		table: &str,
		column: &str,
		ref_table: &str,
		ref_column: &str,
		on_delete: ForeignKeyAction,
	) -> Result<String> {
		let name = match name {
			Some(name) => name.to_string(),
			None => self.naming.foreign_key_name(
				split_qualified(table).1,
				column,
				split_qualified(ref_table).1,
				ref_column,
			),
		};
		let sql = self.dialect.add_foreign_key_sql(
			&name,
			table,
			column,
			ref_table,
			ref_column,
			on_delete,
			ForeignKeyAction::NoAction,
		);
		self.run_ddl(&sql, &[table])?;
		Ok(name)
	}

	pub fn drop_foreign_key(&mut self, table: &str, name: &str) -> Result<()> {
		let sql = self.dialect.drop_foreign_key_sql(table, name);
		self.run_ddl(&sql, &[table])
	}

	fn run_ddl(&mut self, sql: &str, touched: &[&str]) -> Result<()> {
		self.transactions.guard_ddl(sql)?;
		let result = self.execute_traced(sql, &[]);
		for table in touched {
			let table = self.table_ref(table, None);
			self.ddl_cache.reset(Some(&table));
		}
		result.map(|_| ())
	}

	// Naming

	/// Physical name of a logical table.
	pub fn table_name(&self, logical: &str) -> String {
		self.naming.table_name(logical)
	}

	pub fn index_name(&self, table: &str, fields: &[&str], kind: IndexKind) -> String {
		self.naming.index_name(table, fields, kind)
	}

	pub fn foreign_key_name(&self, table: &str, column: &str, ref_table: &str, ref_column: &str) -> String {
		self.naming
			.foreign_key_name(table, column, ref_table, ref_column)
	}

	// Advisory locks

	/// Acquire the named lock. `timeout_secs`: 0 tries once, negative waits
	/// indefinitely, positive waits up to that many seconds.
	pub fn get_lock(&mut self, name: &str, timeout_secs: i64) -> Result<bool> {
		let expr = self.dialect.acquire_lock(name, timeout_secs)?;
		self.fetch_flag(&format!("SELECT {expr} AS result"))
	}

	pub fn release_lock(&mut self, name: &str) -> Result<bool> {
		let expr = self.dialect.release_lock(name)?;
		self.fetch_flag(&format!("SELECT {expr} AS result"))
	}

	/// Whether any session holds the named lock.
	pub fn is_locked(&mut self, name: &str) -> Result<bool> {
		let expr = self.dialect.is_locked(name)?;
		self.fetch_flag(&format!("SELECT {expr} AS result"))
	}

	fn fetch_flag(&mut self, sql: &str) -> Result<bool> {
		match self.fetch_one(sql, &[])? {
			None | Some(QueryValue::Null) => Ok(false),
			Some(value) => bool::try_from(value),
		}
	}

	/// Close the connection. Later calls fail.
	pub fn close(&mut self) -> Result<()> {
		if self.transactions.level() > 0 {
			warn!(
				level = self.transactions.level(),
				"closing connection with an open transaction"
			);
		}
		self.driver
			.close()
			.map_err(|e| DatabaseError::execution("CLOSE", e))
	}

	// Internals

	fn execute_traced(&mut self, sql: &str, params: &[QueryValue]) -> Result<QueryResult> {
		let Self {
			driver,
			dialect,
			tracer,
			..
		} = self;
		let result = tracer.trace(dialect.as_ref(), sql, params, || {
			driver
				.execute(sql, params)
				.map_err(|e| DatabaseError::execution(sql, e))
		})?;
		if result.last_insert_id.is_some() {
			self.last_insert_id = result.last_insert_id;
		}
		Ok(result)
	}

	fn fetch_traced(&mut self, sql: &str, params: &[QueryValue]) -> Result<Vec<Row>> {
		let Self {
			driver,
			dialect,
			tracer,
			..
		} = self;
		tracer.trace(dialect.as_ref(), sql, params, || {
			driver
				.fetch_all(sql, params)
				.map_err(|e| DatabaseError::execution(sql, e))
		})
	}

	fn resolve_schema(&self, schema: Option<&str>) -> String {
		schema
			.map(str::to_string)
			.or_else(|| self.config.schema.clone())
			.unwrap_or_else(|| self.dialect.default_schema(&self.config.database))
	}

	fn table_ref(&self, table: &str, schema: Option<&str>) -> TableRef {
		let (qualifier, bare) = split_qualified(table);
		TableRef::new(self.resolve_schema(schema.or(qualifier)), bare)
	}
}
