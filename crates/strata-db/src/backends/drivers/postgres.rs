//! PostgreSQL driver

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use sqlx::{
	Column, Connection, Encode, PgConnection, Postgres, Row as SqlxRow, Type, ValueRef,
	encode::IsNull,
	error::BoxDynError,
	postgres::{
		PgArgumentBuffer, PgArguments, PgConnectOptions, PgRow, PgSslMode, PgTypeInfo, types::Oid,
	},
	query::Query,
};
use tokio::runtime::Runtime;
use tracing::debug;
use uuid::Uuid;

use super::{closed, reject_lists, runtime, table_names};
use crate::backends::{
	config::ConnectionConfig,
	driver::{Driver, DriverResult},
	types::{DatabaseType, QueryResult, QueryValue, Row},
};

/// A NULL parameter declared with OID 0, so the server infers its type
/// from the statement. A typed NULL (`None::<i32>`) is rejected by `date`,
/// `uuid` or `jsonb` targets.
struct UntypedNull;

impl Type<Postgres> for UntypedNull {
	fn type_info() -> PgTypeInfo {
		PgTypeInfo::with_oid(Oid(0))
	}
}

impl Encode<'_, Postgres> for UntypedNull {
	fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
		Ok(IsNull::Yes)
	}
}

const LIST_TABLES_SQL: &str = "SELECT CAST(table_name AS TEXT) AS table_name \
	FROM information_schema.tables \
	WHERE table_schema = $1 AND table_type = 'BASE TABLE' \
	ORDER BY table_name";

const COLUMNS_SQL: &str = "SELECT CAST(column_name AS TEXT) AS column_name, \
	CAST(ordinal_position AS INTEGER) AS ordinal_position, \
	CAST(data_type AS TEXT) AS data_type, \
	CAST(udt_name AS TEXT) AS udt_name, \
	CAST(is_nullable AS TEXT) AS is_nullable, \
	CAST(column_default AS TEXT) AS column_default, \
	CAST(character_maximum_length AS INTEGER) AS character_maximum_length, \
	CAST(numeric_precision AS INTEGER) AS numeric_precision, \
	CAST(numeric_scale AS INTEGER) AS numeric_scale, \
	CAST(is_identity AS TEXT) AS is_identity \
	FROM information_schema.columns \
	WHERE table_schema = $1 AND table_name = $2 \
	ORDER BY ordinal_position";

const PRIMARY_KEY_SQL: &str = "SELECT CAST(kcu.column_name AS TEXT) AS column_name, \
	CAST(kcu.ordinal_position AS INTEGER) AS ordinal_position, \
	CAST(tc.constraint_name AS TEXT) AS constraint_name \
	FROM information_schema.table_constraints tc \
	JOIN information_schema.key_column_usage kcu \
	ON kcu.constraint_schema = tc.constraint_schema \
	AND kcu.constraint_name = tc.constraint_name \
	AND kcu.table_name = tc.table_name \
	WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = $1 AND tc.table_name = $2 \
	ORDER BY kcu.ordinal_position";

// The primary key is reported through PRIMARY_KEY_SQL.
const INDEXES_SQL: &str = "SELECT CAST(i.relname AS TEXT) AS index_name, \
	CAST(a.attname AS TEXT) AS column_name, \
	CAST(k.ordinality AS INTEGER) AS seq_in_index, \
	ix.indisunique AS is_unique, \
	CAST(am.amname AS TEXT) AS index_type \
	FROM pg_index ix \
	JOIN pg_class t ON t.oid = ix.indrelid \
	JOIN pg_namespace n ON n.oid = t.relnamespace \
	JOIN pg_class i ON i.oid = ix.indexrelid \
	JOIN pg_am am ON am.oid = i.relam \
	CROSS JOIN LATERAL unnest(ix.indkey) WITH ORDINALITY AS k(attnum, ordinality) \
	JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum \
	WHERE n.nspname = $1 AND t.relname = $2 AND NOT ix.indisprimary \
	ORDER BY i.relname, k.ordinality";

const FOREIGN_KEYS_SQL: &str = "SELECT CAST(con.conname AS TEXT) AS constraint_name, \
	CAST(att.attname AS TEXT) AS column_name, \
	CAST(rn.nspname AS TEXT) AS ref_schema, \
	CAST(rt.relname AS TEXT) AS ref_table, \
	CAST(ratt.attname AS TEXT) AS ref_column, \
	CAST(con.confdeltype AS TEXT) AS on_delete, \
	CAST(con.confupdtype AS TEXT) AS on_update \
	FROM pg_constraint con \
	JOIN pg_class t ON t.oid = con.conrelid \
	JOIN pg_namespace n ON n.oid = t.relnamespace \
	JOIN pg_class rt ON rt.oid = con.confrelid \
	JOIN pg_namespace rn ON rn.oid = rt.relnamespace \
	CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(attnum, ref_attnum, ordinality) \
	JOIN pg_attribute att ON att.attrelid = con.conrelid AND att.attnum = k.attnum \
	JOIN pg_attribute ratt ON ratt.attrelid = con.confrelid AND ratt.attnum = k.ref_attnum \
	WHERE con.contype = 'f' AND n.nspname = $1 AND t.relname = $2 \
	ORDER BY con.conname, k.ordinality";

/// PostgreSQL driver over a single connection
pub struct PostgresDriver {
	runtime: Runtime,
	connection: Option<PgConnection>,
}

impl PostgresDriver {
	pub fn connect(config: &ConnectionConfig) -> DriverResult<Self> {
		let runtime = runtime()?;
		let options = Self::connect_options(config)?;
		let connection = runtime.block_on(PgConnection::connect_with(&options))?;
		debug!(
			host = %config.host,
			port = config.resolved_port(),
			database = %config.database,
			"postgres connection opened"
		);
		Ok(Self {
			runtime,
			connection: Some(connection),
		})
	}

	fn connect_options(config: &ConnectionConfig) -> DriverResult<PgConnectOptions> {
		let mut options = PgConnectOptions::new()
			.host(&config.host)
			.port(config.resolved_port())
			.username(&config.username)
			.database(&config.database);
		if let Some(password) = &config.password {
			options = options.password(password);
		}
		if let Some(mode) = config.options.get("ssl_mode") {
			options = options.ssl_mode(PgSslMode::from_str(mode)?);
		}
		if let Some(name) = config.options.get("application_name") {
			options = options.application_name(name);
		}
		if let Some(timeout) = config.options.get("statement_timeout") {
			options = options.options([("statement_timeout", timeout.as_str())]);
		}
		Ok(options)
	}

	fn parts(&mut self) -> DriverResult<(&Runtime, &mut PgConnection)> {
		let connection = self.connection.as_mut().ok_or_else(closed)?;
		Ok((&self.runtime, connection))
	}

	fn bind_value<'q>(
		query: Query<'q, Postgres, PgArguments>,
		value: &'q QueryValue,
	) -> Query<'q, Postgres, PgArguments> {
		match value {
			QueryValue::Null => query.bind(UntypedNull),
			QueryValue::Bool(b) => query.bind(b),
			QueryValue::Int(i) => query.bind(i),
			QueryValue::Float(f) => query.bind(f),
			QueryValue::String(s) => query.bind(s),
			QueryValue::Bytes(b) => query.bind(b),
			QueryValue::Timestamp(dt) => query.bind(dt),
			QueryValue::Date(d) => query.bind(d),
			QueryValue::Uuid(u) => query.bind(u),
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

	fn convert_row(pg_row: PgRow) -> Row {
		let mut row = Row::new();
		for column in pg_row.columns() {
			let column_name = column.name();
			let is_null = pg_row
				.try_get_raw(column.ordinal())
				.map(|raw| raw.is_null())
				.unwrap_or(true);

			let value = if is_null {
				QueryValue::Null
			} else if let Ok(value) = pg_row.try_get::<Uuid, _>(column_name) {
				QueryValue::Uuid(value)
			} else if let Ok(value) = pg_row.try_get::<bool, _>(column_name) {
				QueryValue::Bool(value)
			} else if let Ok(value) = pg_row.try_get::<i64, _>(column_name) {
				QueryValue::Int(value)
			} else if let Ok(value) = pg_row.try_get::<i32, _>(column_name) {
				QueryValue::Int(value as i64)
			} else if let Ok(value) = pg_row.try_get::<i16, _>(column_name) {
				QueryValue::Int(value as i64)
			} else if let Ok(value) = pg_row.try_get::<rust_decimal::Decimal, _>(column_name) {
				// NUMERIC is surfaced as a float
				match value.to_f64() {
					Some(f) => QueryValue::Float(f),
					None => QueryValue::String(value.to_string()),
				}
			} else if let Ok(value) = pg_row.try_get::<f64, _>(column_name) {
				QueryValue::Float(value)
			} else if let Ok(value) = pg_row.try_get::<f32, _>(column_name) {
				QueryValue::Float(value as f64)
			} else if let Ok(value) = pg_row.try_get::<String, _>(column_name) {
				QueryValue::String(value)
			} else if let Ok(value) = pg_row.try_get::<Vec<u8>, _>(column_name) {
				QueryValue::Bytes(value)
			} else if let Ok(value) = pg_row.try_get::<chrono::NaiveDateTime, _>(column_name) {
				QueryValue::Timestamp(chrono::DateTime::from_naive_utc_and_offset(
					value,
					chrono::Utc,
				))
			} else if let Ok(value) =
				pg_row.try_get::<chrono::DateTime<chrono::Utc>, _>(column_name)
			{
				QueryValue::Timestamp(value)
			} else if let Ok(value) = pg_row.try_get::<chrono::NaiveDate, _>(column_name) {
				QueryValue::Date(value)
			} else if let Ok(value) = pg_row.try_get::<serde_json::Value, _>(column_name) {
				QueryValue::Json(value)
			} else if let Ok(value) = pg_row.try_get_unchecked::<String, _>(column_name) {
				QueryValue::String(value)
			} else {
				QueryValue::Null
			};
			row.insert(column_name.to_string(), value);
		}
		row
	}
}

impl Driver for PostgresDriver {
	fn database_type(&self) -> DatabaseType {
		DatabaseType::Postgres
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
		Ok(QueryResult {
			rows_affected: result.rows_affected(),
			last_insert_id: None,
		})
	}

	fn fetch_all(&mut self, sql: &str, params: &[QueryValue]) -> DriverResult<Vec<Row>> {
		self.run_fetch(sql, params)
	}

	fn begin(&mut self) -> DriverResult<()> {
		self.execute("BEGIN", &[]).map(|_| ())
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
			debug!("postgres connection closed");
		}
		Ok(())
	}
}
