//! Platform dialects
//!
//! A [`Dialect`] is the single seam through which vendor-specific SQL leaks
//! into the adapter: identifier and literal quoting, function translation,
//! insert-ignore and upsert syntax, advisory locks, DDL spelling and the
//! conversion of catalog rows into neutral schema descriptions.
//!
//! Functions take SQL fragments (already quoted identifiers, literals or
//! expressions) and return a [`SqlExpr`]. Methods a backend cannot express
//! return [`DatabaseError::NotSupported`] instead of silently doing nothing.
//!
//! The concrete dialect is chosen once, when an adapter is constructed, via
//! [`dialect_for`].

pub mod mysql;
pub mod postgres;

use std::fmt;
use std::sync::Arc;

pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;

use super::{
	error::{DatabaseError, Result},
	expr::SqlExpr,
	introspection::{ColumnDescription, ForeignKeyDescription, IndexDescription, IndexKind, TableRef},
	types::{DatabaseType, QueryValue, Row},
};

/// Unit of a date interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntervalUnit {
	Second,
	Minute,
	Hour,
	Day,
	Week,
	Month,
	Quarter,
	Year,
}

impl IntervalUnit {
	pub fn keyword(&self) -> &'static str {
		match self {
			IntervalUnit::Second => "SECOND",
			IntervalUnit::Minute => "MINUTE",
			IntervalUnit::Hour => "HOUR",
			IntervalUnit::Day => "DAY",
			IntervalUnit::Week => "WEEK",
			IntervalUnit::Month => "MONTH",
			IntervalUnit::Quarter => "QUARTER",
			IntervalUnit::Year => "YEAR",
		}
	}
}

/// Field extracted by [`Dialect::date_part`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatePart {
	Year,
	Quarter,
	Month,
	/// ISO-8601 week number.
	Week,
	Day,
	Hour,
	Minute,
	Second,
	/// 1 = Sunday .. 7 = Saturday on every backend.
	DayOfWeek,
	DayOfYear,
}

/// Vendor-specific SQL rendering.
pub trait Dialect: Send + Sync + fmt::Debug {
	fn database_type(&self) -> DatabaseType;

	/// Character wrapped around identifiers.
	fn quote_char(&self) -> char;

	/// Identifier ceiling: maximum length of table, index and constraint names.
	fn identifier_max_length(&self) -> usize;

	/// Bind placeholder for the 1-based parameter `index`.
	fn placeholder(&self, index: usize) -> String;

	/// Quote an identifier. Dotted names are quoted per segment and a bare `*`
	/// segment is left alone.
	fn quote_identifier(&self, name: &str) -> String {
		let quote = self.quote_char();
		name.split('.')
			.map(|segment| {
				if segment == "*" {
					segment.to_string()
				} else {
					quote_identifier_segment(segment, quote)
				}
			})
			.collect::<Vec<_>>()
			.join(".")
	}

	/// Quote a string literal with the backend's native escaping rules.
	fn quote_string(&self, value: &str) -> String;

	fn quote_bool(&self, value: bool) -> &'static str;

	fn quote_bytes(&self, value: &[u8]) -> String;

	/// Render any value as a SQL literal.
	///
	/// Lists render each element joined with `, `. An empty list renders as
	/// `NULL`, so `x IN (NULL)` matches nothing; callers rely on this, keep it.
	fn quote_value(&self, value: &QueryValue) -> String {
		match value {
			QueryValue::Null => "NULL".to_string(),
			QueryValue::Bool(b) => self.quote_bool(*b).to_string(),
			QueryValue::Int(i) => i.to_string(),
			QueryValue::Float(f) => render_float(*f),
			QueryValue::String(s) => self.quote_string(s),
			QueryValue::Bytes(b) => self.quote_bytes(b),
			QueryValue::Timestamp(dt) => {
				self.quote_string(&dt.format("%Y-%m-%d %H:%M:%S%.f").to_string())
			}
			QueryValue::Date(d) => self.quote_string(&d.format("%Y-%m-%d").to_string()),
			QueryValue::Uuid(u) => self.quote_string(&u.to_string()),
			QueryValue::Json(v) => self.quote_string(&v.to_string()),
			QueryValue::List(items) if items.is_empty() => "NULL".to_string(),
			QueryValue::List(items) => items
				.iter()
				.map(|item| self.quote_value(item))
				.collect::<Vec<_>>()
				.join(", "),
		}
	}

	// String functions

	/// Concatenate `parts`, optionally with a separator literal between them.
	fn concat(&self, parts: &[&str], separator: Option<&str>) -> SqlExpr;

	/// Substring starting at 1-based `position`.
	fn substring(&self, expr: &str, position: i64, length: Option<i64>) -> SqlExpr;

	/// Length in characters.
	fn length(&self, expr: &str) -> SqlExpr {
		SqlExpr::new(format!("CHAR_LENGTH({expr})"))
	}

	// Date functions

	fn date_add(&self, date: &str, interval: &str, unit: IntervalUnit) -> SqlExpr;

	fn date_sub(&self, date: &str, interval: &str, unit: IntervalUnit) -> SqlExpr;

	/// Format a date. `format` uses `%Y-%m-%d %H:%i:%s` style tokens on every backend.
	fn date_format(&self, date: &str, format: &str) -> SqlExpr;

	/// Extract an integer field from a date.
	fn date_part(&self, part: DatePart, date: &str) -> SqlExpr;

	/// Whole days from `start` to `end`.
	fn date_diff(&self, end: &str, start: &str) -> SqlExpr;

	fn unix_timestamp(&self, date: &str) -> SqlExpr;

	fn from_unix_time(&self, timestamp: &str) -> SqlExpr;

	/// Days from `reference` until the next anniversary of the date in `field`.
	///
	/// A Feb-29 anniversary falls on Feb-28 in non-leap years, and an
	/// anniversary already passed in the reference year rolls into the next year.
	/// Today's anniversary yields 0.
	fn days_to_anniversary(&self, field: &str, reference: &str) -> SqlExpr;

	// Conditionals

	/// `IF`-style two-way conditional.
	fn check(&self, condition: &str, when_true: &str, when_false: &str) -> SqlExpr;

	/// `CASE` expression. With `value` set, `cases` are compared against it;
	/// otherwise each case is a boolean condition.
	fn case(&self, value: Option<&str>, cases: &[(&str, &str)], default: Option<&str>) -> SqlExpr {
		let mut sql = String::from("CASE");
		if let Some(value) = value {
			sql.push(' ');
			sql.push_str(value);
		}
		for (when, then) in cases {
			sql.push_str(&format!(" WHEN {when} THEN {then}"));
		}
		if let Some(default) = default {
			sql.push_str(&format!(" ELSE {default}"));
		}
		sql.push_str(" END");
		SqlExpr::new(sql)
	}

	fn if_null(&self, expr: &str, fallback: &str) -> SqlExpr;

	fn least(&self, exprs: &[&str]) -> SqlExpr {
		SqlExpr::new(format!("LEAST({})", exprs.join(", ")))
	}

	fn greatest(&self, exprs: &[&str]) -> SqlExpr {
		SqlExpr::new(format!("GREATEST({})", exprs.join(", ")))
	}

	// Statement syntax

	/// Verb opening an insert-ignore statement.
	fn insert_ignore_verb(&self) -> &'static str;

	/// Clause closing an insert-ignore statement, if the dialect needs one.
	fn insert_ignore_suffix(&self) -> Option<&'static str>;

	/// Clause turning an insert into an upsert. Column names are unquoted.
	fn upsert_clause(&self, conflict_columns: &[&str], update_columns: &[&str]) -> Result<String>;

	/// Whether upserts need an explicit conflict target.
	fn upsert_requires_conflict_target(&self) -> bool;

	/// `LIMIT`/`OFFSET` tail; empty when neither is set.
	fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String;

	// JSON

	/// Value at an exact or wildcard JSON path.
	fn json_extract(&self, column: &str, path: &str) -> Result<SqlExpr>;

	/// Whether any value matched by `path` (wildcards allowed) equals `needle`.
	fn json_search(&self, column: &str, path: &str, needle: &str) -> Result<SqlExpr>;

	/// Whether the value at the exact `path` contains the JSON document `candidate`.
	/// Wildcard paths are rejected.
	fn json_contains(&self, column: &str, path: &str, candidate: &str) -> Result<SqlExpr>;

	// Advisory locks. Backends without them keep the defaults.

	/// Boolean expression acquiring the named lock.
	///
	/// `timeout_secs`: 0 tries once, a negative value waits indefinitely and a
	/// positive value waits up to that many seconds.
	fn acquire_lock(&self, name: &str, timeout_secs: i64) -> Result<SqlExpr> {
		let _ = (name, timeout_secs);
		Err(DatabaseError::not_supported(self.database_type(), "advisory locks"))
	}

	/// Boolean expression releasing the named lock held by this session.
	fn release_lock(&self, name: &str) -> Result<SqlExpr> {
		let _ = name;
		Err(DatabaseError::not_supported(self.database_type(), "advisory locks"))
	}

	/// Boolean expression telling whether any session holds the named lock.
	fn is_locked(&self, name: &str) -> Result<SqlExpr> {
		let _ = name;
		Err(DatabaseError::not_supported(self.database_type(), "advisory locks"))
	}

	// DDL. Table and index names are unquoted.

	fn drop_table_sql(&self, table: &str) -> String {
		format!("DROP TABLE IF EXISTS {}", self.quote_identifier(table))
	}

	fn truncate_table_sql(&self, table: &str) -> String {
		format!("TRUNCATE TABLE {}", self.quote_identifier(table))
	}

	fn rename_table_sql(&self, from: &str, to: &str) -> String;

	fn add_column_sql(&self, table: &str, column: &str, definition: &str) -> String {
		format!(
			"ALTER TABLE {} ADD COLUMN {} {}",
			self.quote_identifier(table),
			self.quote_identifier(column),
			definition
		)
	}

	fn drop_column_sql(&self, table: &str, column: &str) -> String {
		format!(
			"ALTER TABLE {} DROP COLUMN {}",
			self.quote_identifier(table),
			self.quote_identifier(column)
		)
	}

	fn add_index_sql(&self, table: &str, name: &str, columns: &[&str], kind: IndexKind) -> Result<String>;

	fn drop_index_sql(&self, table: &str, name: &str) -> String;

	/// Drop the primary key whose native constraint is `constraint_name`.
	fn drop_primary_key_sql(&self, table: &str, constraint_name: &str) -> String;

	#[allow(clippy::too_many_arguments)]
	fn add_foreign_key_sql(
		&self,
		name: &str,
		table: &str,
		column: &str,
		ref_table: &str,
		ref_column: &str,
		on_delete: super::introspection::ForeignKeyAction,
		on_update: super::introspection::ForeignKeyAction,
	) -> String {
		format!(
			"ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
			self.quote_identifier(table),
			self.quote_identifier(name),
			self.quote_identifier(column),
			self.quote_identifier(ref_table),
			self.quote_identifier(ref_column),
			on_delete.to_sql(),
			on_update.to_sql()
		)
	}

	fn drop_foreign_key_sql(&self, table: &str, name: &str) -> String;

	// Catalog conversion

	/// Convert native column rows into descriptions.
	fn convert_columns(&self, table: &TableRef, rows: &[Row]) -> Vec<ColumnDescription>;

	/// Convert native index rows into descriptions.
	fn convert_indexes(&self, rows: &[Row]) -> Vec<IndexDescription>;

	/// Convert native foreign key rows into descriptions.
	fn convert_foreign_keys(&self, table: &TableRef, rows: &[Row]) -> Vec<ForeignKeyDescription>;

	/// Schema used when a call names none and the configuration sets none.
	fn default_schema(&self, database: &str) -> String;
}

/// Select the dialect for a backend.
pub fn dialect_for(database_type: DatabaseType) -> Arc<dyn Dialect> {
	match database_type {
		DatabaseType::Mysql => Arc::new(MySqlDialect::new()),
		DatabaseType::Postgres => Arc::new(PostgresDialect::new()),
	}
}

fn quote_identifier_segment(segment: &str, quote: char) -> String {
	let doubled: String = [quote, quote].iter().collect();
	let escaped = segment.replace(quote, &doubled);
	format!("{quote}{escaped}{quote}")
}

/// Non-finite floats have no literal form and become `NULL`.
pub(crate) fn render_float(value: f64) -> String {
	if value.is_finite() {
		value.to_string()
	} else {
		"NULL".to_string()
	}
}

/// Validate a `$`-rooted JSON path.
pub(crate) fn validate_json_path(path: &str, allow_wildcards: bool) -> Result<()> {
	if !path.starts_with('$') {
		return Err(DatabaseError::InvalidArgument(format!(
			"JSON path must start with '$': {path}"
		)));
	}
	if !allow_wildcards && path.contains('*') {
		return Err(DatabaseError::InvalidArgument(format!(
			"wildcard JSON paths are not accepted here: {path}"
		)));
	}
	Ok(())
}

/// Split `schema.table` into its optional schema and bare table name.
pub(crate) fn split_qualified(name: &str) -> (Option<&str>, &str) {
	match name.rsplit_once('.') {
		Some((schema, table)) => (Some(schema), table),
		None => (None, name),
	}
}

/// `(a, b, c)` column list with quoted identifiers.
pub(crate) fn quoted_column_list(dialect: &dyn Dialect, columns: &[&str]) -> String {
	columns
		.iter()
		.map(|c| dialect.quote_identifier(c))
		.collect::<Vec<_>>()
		.join(", ")
}
