//! MySQL / MariaDB driver

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use sqlx::{
	Column, Connection, MySql, MySqlConnection, Row as SqlxRow, TypeInfo, ValueRef,
	mysql::{MySqlArguments, MySqlConnectOptions, MySqlRow, MySqlSslMode},
	query::Query,
};
use tokio::runtime::Runtime;
use tracing::debug;

use super::{closed, reject_lists, runtime, table_names};
use crate::backends::{
	config::ConnectionConfig,
	driver::{Driver, DriverResult},
	types::{DatabaseType, QueryResult, QueryValue, Row},
};

// information_schema columns are cast so they decode the same on MySQL and
// MariaDB, whose metadata column types differ.
const LIST_TABLES_SQL: &str = "SELECT CAST(TABLE_NAME AS CHAR) AS table_name \
	FROM information_schema.TABLES \
	WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE' \
	ORDER BY TABLE_NAME";

const COLUMNS_SQL: &str = "SELECT CAST(COLUMN_NAME AS CHAR) AS column_name, \
	CAST(ORDINAL_POSITION AS SIGNED) AS ordinal_position, \
	CAST(DATA_TYPE AS CHAR) AS data_type, \
	CAST(COLUMN_TYPE AS CHAR) AS column_type, \
	CAST(IS_NULLABLE AS CHAR) AS is_nullable, \
	CAST(COLUMN_DEFAULT AS CHAR) AS column_default, \
	CAST(CHARACTER_MAXIMUM_LENGTH AS SIGNED) AS character_maximum_length, \
	CAST(NUMERIC_PRECISION AS SIGNED) AS numeric_precision, \
	CAST(NUMERIC_SCALE AS SIGNED) AS numeric_scale, \
	CAST(COLUMN_KEY AS CHAR) AS column_key, \
	CAST(EXTRA AS CHAR) AS extra \
	FROM information_schema.COLUMNS \
	WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
	ORDER BY ORDINAL_POSITION";

const PRIMARY_KEY_SQL: &str = "SELECT CAST(COLUMN_NAME AS CHAR) AS column_name, \
	CAST(ORDINAL_POSITION AS SIGNED) AS ordinal_position, \
	CAST(CONSTRAINT_NAME AS CHAR) AS constraint_name \
	FROM information_schema.KEY_COLUMN_USAGE \
	WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND CONSTRAINT_NAME = 'PRIMARY' \
	ORDER BY ORDINAL_POSITION";

const INDEXES_SQL: &str = "SELECT CAST(INDEX_NAME AS CHAR) AS index_name, \
	CAST(COLUMN_NAME AS CHAR) AS column_name, \
	CAST(SEQ_IN_INDEX AS SIGNED) AS seq_in_index, \
	CAST(NON_UNIQUE AS SIGNED) AS non_unique, \
	CAST(INDEX_TYPE AS CHAR) AS index_type \
	FROM information_schema.STATISTICS \
	WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
	ORDER BY INDEX_NAME = 'PRIMARY' DESC, INDEX_NAME, SEQ_IN_INDEX";

const FOREIGN_KEYS_SQL: &str = "SELECT CAST(k.CONSTRAINT_NAME AS CHAR) AS constraint_name, \
	CAST(k.COLUMN_NAME AS CHAR) AS column_name, \
	CAST(k.REFERENCED_TABLE_SCHEMA AS CHAR) AS ref_schema, \
	CAST(k.REFERENCED_TABLE_NAME AS CHAR) AS ref_table, \
	CAST(k.REFERENCED_COLUMN_NAME AS CHAR) AS ref_column, \
	CAST(r.DELETE_RULE AS CHAR) AS on_delete, \
	CAST(r.UPDATE_RULE AS CHAR) AS on_update \
	FROM information_schema.KEY_COLUMN_USAGE k \
	JOIN information_schema.REFERENTIAL_CONSTRAINTS r \
	ON r.CONSTRAINT_SCHEMA = k.CONSTRAINT_SCHEMA \
	AND r.CONSTRAINT_NAME = k.CONSTRAINT_NAME \
	AND r.TABLE_NAME = k.TABLE_NAME \
	WHERE k.TABLE_SCHEMA = ? AND k.TABLE_NAME = ? AND k.REFERENCED_TABLE_NAME IS NOT NULL \
	ORDER BY k.CONSTRAINT_NAME, k.ORDINAL_POSITION";

/// MySQL driver over a single connection
pub struct MySqlDriver {
	runtime: Runtime,
	connection: Option<MySqlConnection>,
}

impl MySqlDriver {
	pub fn connect(config: &ConnectionConfig) -> DriverResult<Self> {
		let runtime = runtime()?;
		let options = Self::connect_options(config)?;
		let connection = runtime.block_on(MySqlConnection::connect_with(&options))?;
		debug!(
			host = %config.host,
			port = config.resolved_port(),
			database = %config.database,
			"mysql connection opened"
		);
		Ok(Self {
			runtime,
			connection: Some(connection),
		})
	}

	fn connect_options(config: &ConnectionConfig) -> DriverResult<MySqlConnectOptions> {
		let mut options = MySqlConnectOptions::new()
			.host(&config.host)
			.port(config.resolved_port())
			.username(&config.username)
			.database(&config.database);
		if let Some(password) = &config.password {
			options = options.password(password);
		}
		if let Some(charset) = config.options.get("charset") {
			options = options.charset(charset);
		}
		if let Some(timezone) = config.options.get("timezone") {
			options = options.timezone(Some(timezone.clone()));
		}
		if let Some(mode) = config.options.get("ssl_mode") {
			options = options.ssl_mode(MySqlSslMode::from_str(mode)?);
		}
		Ok(options)
	}

	fn parts(&mut self) -> DriverResult<(&Runtime, &mut MySqlConnection)> {
		let connection = self.connection.as_mut().ok_or_else(closed)?;
		Ok((&self.runtime, connection))
	}

	fn bind_value<'q>(
		query: Query<'q, MySql, MySqlArguments>,
		value: &'q QueryValue,
	) -> Query<'q, MySql, MySqlArguments> {
		match value {
			QueryValue::Null => query.bind(None::<i32>),
			QueryValue::Bool(b) => query.bind(b),
			QueryValue::Int(i) => query.bind(i),
			QueryValue::Float(f) => query.bind(f),
			QueryValue::String(s) => query.bind(s),
			QueryValue::Bytes(b) => query.bind(b),
			QueryValue::Timestamp(dt) => query.bind(dt),
			QueryValue::Date(d) => query.bind(d),
			// MySQL has no UUID type
			QueryValue::Uuid(u) => query.bind(u.to_string()),
			QueryValue::Json(v) => query.bind(v),
			// Rejected before binding.
			QueryValue::List(_) => query,
		}
	}

	fn run_fetch(&mut self, sql: &str, params: &[QueryValue]) -> DriverResult<Vec<Row>> {
		reject_lists(params)?;
		let (runtime, connection) = self.parts()?;
		let rows = if params.is_empty() {
			runtime.block_on(sqlx::raw_sql(sql).fetch_all(&mut *connection))?
		} else {
			let mut query = sqlx::query(sql);
			for param in params {
				query = Self::bind_value(query, param);
			}
			runtime.block_on(query.fetch_all(&mut *connection))?
		};
		Ok(rows.into_iter().map(Self::convert_row).collect())
	}

	fn catalog(&mut self, sql: &str, schema: &str, table: &str) -> DriverResult<Vec<Row>> {
		self.run_fetch(
			sql,
			&[QueryValue::from(schema), QueryValue::from(table)],
		)
	}

	/// JSON columns come back as strings: sqlx decodes any text column as
	/// JSON, so the JSON probe would misread numeric-looking text.
	fn convert_row(mysql_row: MySqlRow) -> Row {
		let mut row = Row::new();
		for column in mysql_row.columns() {
			let column_name = column.name();
			let is_null = mysql_row
				.try_get_raw(column.ordinal())
				.map(|raw| raw.is_null())
				.unwrap_or(true);

			// bool decodes from any integer column; only TINYINT(1) is boolean
			let boolean = column.type_info().name() == "BOOLEAN";

			let value = if is_null {
				QueryValue::Null
			} else if let Some(value) = boolean
				.then(|| mysql_row.try_get::<bool, _>(column_name).ok())
				.flatten()
			{
				QueryValue::Bool(value)
			} else if let Ok(value) = mysql_row.try_get::<i64, _>(column_name) {
				QueryValue::Int(value)
			} else if let Ok(value) = mysql_row.try_get::<u64, _>(column_name) {
				match i64::try_from(value) {
					Ok(v) => QueryValue::Int(v),
					Err(_) => QueryValue::String(value.to_string()),
				}
			} else if let Ok(value) = mysql_row.try_get::<i32, _>(column_name) {
				QueryValue::Int(value as i64)
			} else if let Ok(value) = mysql_row.try_get::<rust_decimal::Decimal, _>(column_name) {
				match value.to_f64() {
					Some(f) => QueryValue::Float(f),
					None => QueryValue::String(value.to_string()),
				}
			} else if let Ok(value) = mysql_row.try_get::<f64, _>(column_name) {
				QueryValue::Float(value)
			} else if let Ok(value) = mysql_row.try_get::<f32, _>(column_name) {
				QueryValue::Float(value as f64)
			} else if let Ok(value) = mysql_row.try_get::<String, _>(column_name) {
				QueryValue::String(value)
			} else if let Ok(value) = mysql_row.try_get::<Vec<u8>, _>(column_name) {
				QueryValue::Bytes(value)
			} else if let Ok(value) = mysql_row.try_get::<chrono::NaiveDateTime, _>(column_name) {
				QueryValue::Timestamp(chrono::DateTime::from_naive_utc_and_offset(
					value,
					chrono::Utc,
				))
			} else if let Ok(value) =
				mysql_row.try_get::<chrono::DateTime<chrono::Utc>, _>(column_name)
			{
				QueryValue::Timestamp(value)
			} else if let Ok(value) = mysql_row.try_get::<chrono::NaiveDate, _>(column_name) {
				QueryValue::Date(value)
			} else if let Ok(value) = mysql_row.try_get_unchecked::<String, _>(column_name) {
				QueryValue::String(value)
			} else {
				QueryValue::Null
			};
			row.insert(column_name.to_string(), value);
		}
		row
	}
}

impl Driver for MySqlDriver {
	fn database_type(&self) -> DatabaseType {
		DatabaseType::Mysql
	}

	fn execute(&mut self, sql: &str, params: &[QueryValue]) -> DriverResult<QueryResult> {
		reject_lists(params)?;
		let (runtime, connection) = self.parts()?;
		let result = if params.is_empty() {
			runtime.block_on(sqlx::raw_sql(sql).execute(&mut *connection))?
		} else {
			let mut query = sqlx::query(sql);
			for param in params {
				query = Self::bind_value(query, param);
			}
			runtime.block_on(query.execute(&mut *connection))?
		};
		let last_insert_id = result.last_insert_id();
		Ok(QueryResult {
			rows_affected: result.rows_affected(),
			last_insert_id: (last_insert_id > 0).then_some(last_insert_id),
		})
	}

	fn fetch_all(&mut self, sql: &str, params: &[QueryValue]) -> DriverResult<Vec<Row>> {
		self.run_fetch(sql, params)
	}

	fn begin(&mut self) -> DriverResult<()> {
		self.execute("START TRANSACTION", &[]).map(|_| ())
	}

	fn commit(&mut self) -> DriverResult<()> {
		self.execute("COMMIT", &[]).map(|_| ())
	}

	fn rollback(&mut self) -> DriverResult<()> {
		self.execute("ROLLBACK", &[]).map(|_| ())
	}

	fn list_tables(&mut self, schema: &str) -> DriverResult<Vec<String>> {
		let rows = self.run_fetch(LIST_TABLES_SQL, &[QueryValue::from(schema)])?;
		Ok(table_names(rows))
	}

	fn catalog_columns(&mut self, schema: &str, table: &str) -> DriverResult<Vec<Row>> {
		self.catalog(COLUMNS_SQL, schema, table)
	}

	fn catalog_indexes(&mut self, schema: &str, table: &str) -> DriverResult<Vec<Row>> {
		self.catalog(INDEXES_SQL, schema, table)
	}

	fn catalog_primary_key(&mut self, schema: &str, table: &str) -> DriverResult<Vec<Row>> {
		self.catalog(PRIMARY_KEY_SQL, schema, table)
	}

	fn catalog_foreign_keys(&mut self, schema: &str, table: &str) -> DriverResult<Vec<Row>> {
		self.catalog(FOREIGN_KEYS_SQL, schema, table)
	}

	fn close(&mut self) -> DriverResult<()> {
		if let Some(connection) = self.connection.take() {
			self.runtime.block_on(connection.close())?;
			debug!("mysql connection closed");
		}
		Ok(())
	}
}
