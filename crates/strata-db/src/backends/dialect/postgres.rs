//! PostgreSQL dialect implementation

use super::{
	DatePart, Dialect, IntervalUnit, quoted_column_list, split_qualified, validate_json_path,
};
use crate::backends::{
	error::{DatabaseError, Result},
	expr::SqlExpr,
	introspection::{
		ColumnDescription, DataType, ForeignKeyAction, ForeignKeyDescription, IndexDescription,
		IndexKind, TableRef, group_index_rows,
	},
	types::{DatabaseType, Row},
};

/// First key of every two-key advisory lock taken by this layer.
const LOCK_NAMESPACE: i32 = 0x7374_7261;

/// PostgreSQL dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
	pub fn new() -> Self {
		Self
	}

	fn interval(unit: IntervalUnit) -> &'static str {
		match unit {
			IntervalUnit::Second => "INTERVAL '1 second'",
			IntervalUnit::Minute => "INTERVAL '1 minute'",
			IntervalUnit::Hour => "INTERVAL '1 hour'",
			IntervalUnit::Day => "INTERVAL '1 day'",
			IntervalUnit::Week => "INTERVAL '1 week'",
			IntervalUnit::Month => "INTERVAL '1 month'",
			IntervalUnit::Quarter => "INTERVAL '3 months'",
			IntervalUnit::Year => "INTERVAL '1 year'",
		}
	}

	fn lock_key(&self, name: &str) -> String {
		format!("{LOCK_NAMESPACE}, hashtext({})", self.quote_string(name))
	}

	fn data_type(data_type: &str, udt_name: &str) -> DataType {
		match data_type.to_ascii_lowercase().as_str() {
			"boolean" => DataType::Boolean,
			"smallint" => DataType::SmallInt,
			"integer" => DataType::Integer,
			"bigint" => DataType::BigInt,
			"numeric" | "decimal" => DataType::Decimal,
			"real" => DataType::Float,
			"double precision" => DataType::Double,
			"character" => DataType::Char,
			"character varying" => DataType::Varchar,
			"text" => DataType::Text,
			"bytea" => DataType::Blob,
			"date" => DataType::Date,
			"timestamp without time zone" => DataType::DateTime,
			"timestamp with time zone" => DataType::Timestamp,
			"time without time zone" | "time with time zone" => DataType::Time,
			"json" | "jsonb" => DataType::Json,
			"uuid" => DataType::Uuid,
			_ => DataType::Other(udt_name.to_string()),
		}
	}

	fn action(code: Option<String>) -> ForeignKeyAction {
		match code.as_deref() {
			Some("a") => ForeignKeyAction::NoAction,
			Some("r") => ForeignKeyAction::Restrict,
			Some("c") => ForeignKeyAction::Cascade,
			Some("n") => ForeignKeyAction::SetNull,
			Some("d") => ForeignKeyAction::SetDefault,
			Some(rule) => ForeignKeyAction::from_rule(rule).unwrap_or(ForeignKeyAction::NoAction),
			None => ForeignKeyAction::NoAction,
		}
	}
}

/// Translate `DATE_FORMAT` tokens into a `TO_CHAR` pattern.
///
/// Letters outside tokens are double-quoted so `TO_CHAR` prints them verbatim.
fn to_char_pattern(format: &str) -> String {
	let mut pattern = String::with_capacity(format.len() * 2);
	let mut literal = String::new();
	let flush = |pattern: &mut String, literal: &mut String| {
		if !literal.is_empty() {
			pattern.push('"');
			pattern.push_str(literal);
			pattern.push('"');
			literal.clear();
		}
	};

	let mut chars = format.chars();
	while let Some(c) = chars.next() {
		if c == '%' {
			flush(&mut pattern, &mut literal);
			let token = match chars.next() {
				Some('Y') => "YYYY",
				Some('y') => "YY",
				Some('m') => "MM",
				Some('c') => "FMMM",
				Some('d') => "DD",
				Some('e') => "FMDD",
				Some('H') => "HH24",
				Some('h') => "HH12",
				Some('i') => "MI",
				Some('s') | Some('S') => "SS",
				Some('f') => "US",
				Some('p') => "AM",
				Some('M') => "FMMonth",
				Some('b') => "Mon",
				Some('W') => "FMDay",
				Some('a') => "Dy",
				Some('j') => "DDD",
				Some('%') => "%",
				Some(_) | None => "",
			};
			pattern.push_str(token);
		} else if c.is_alphabetic() {
			literal.push(c);
		} else {
			flush(&mut pattern, &mut literal);
			pattern.push(c);
		}
	}
	flush(&mut pattern, &mut literal);
	pattern
}

impl Dialect for PostgresDialect {
	fn database_type(&self) -> DatabaseType {
		DatabaseType::Postgres
	}

	fn quote_char(&self) -> char {
		'"'
	}

	fn identifier_max_length(&self) -> usize {
		63
	}

	fn placeholder(&self, index: usize) -> String {
		format!("${}", index)
	}

	fn quote_string(&self, value: &str) -> String {
		pg_escape::quote_literal(value).trim_start().to_string()
	}

	fn quote_bool(&self, value: bool) -> &'static str {
		if value { "TRUE" } else { "FALSE" }
	}

	fn quote_bytes(&self, value: &[u8]) -> String {
		let hex: String = value.iter().map(|b| format!("{b:02x}")).collect();
		format!("'\\x{hex}'::bytea")
	}

	fn concat(&self, parts: &[&str], separator: Option<&str>) -> SqlExpr {
		match separator {
			Some(separator) => SqlExpr::new(format!("CONCAT_WS({separator}, {})", parts.join(", "))),
			None => SqlExpr::new(format!("({})", parts.join(" || "))),
		}
	}

	fn substring(&self, expr: &str, position: i64, length: Option<i64>) -> SqlExpr {
		match length {
			Some(length) => SqlExpr::new(format!("SUBSTRING({expr} FROM {position} FOR {length})")),
			None => SqlExpr::new(format!("SUBSTRING({expr} FROM {position})")),
		}
	}

	fn date_add(&self, date: &str, interval: &str, unit: IntervalUnit) -> SqlExpr {
		SqlExpr::new(format!("({date} + ({interval}) * {})", Self::interval(unit)))
	}

	fn date_sub(&self, date: &str, interval: &str, unit: IntervalUnit) -> SqlExpr {
		SqlExpr::new(format!("({date} - ({interval}) * {})", Self::interval(unit)))
	}

	fn date_format(&self, date: &str, format: &str) -> SqlExpr {
		SqlExpr::new(format!(
			"TO_CHAR({date}, {})",
			self.quote_string(&to_char_pattern(format))
		))
	}

	fn date_part(&self, part: DatePart, date: &str) -> SqlExpr {
		let sql = match part {
			DatePart::Year => format!("CAST(EXTRACT(YEAR FROM {date}) AS INTEGER)"),
			DatePart::Quarter => format!("CAST(EXTRACT(QUARTER FROM {date}) AS INTEGER)"),
			DatePart::Month => format!("CAST(EXTRACT(MONTH FROM {date}) AS INTEGER)"),
			DatePart::Week => format!("CAST(EXTRACT(WEEK FROM {date}) AS INTEGER)"),
			DatePart::Day => format!("CAST(EXTRACT(DAY FROM {date}) AS INTEGER)"),
			DatePart::Hour => format!("CAST(EXTRACT(HOUR FROM {date}) AS INTEGER)"),
			DatePart::Minute => format!("CAST(EXTRACT(MINUTE FROM {date}) AS INTEGER)"),
			DatePart::Second => format!("CAST(FLOOR(EXTRACT(SECOND FROM {date})) AS INTEGER)"),
			DatePart::DayOfWeek => format!("(CAST(EXTRACT(DOW FROM {date}) AS INTEGER) + 1)"),
			DatePart::DayOfYear => format!("CAST(EXTRACT(DOY FROM {date}) AS INTEGER)"),
		};
		SqlExpr::new(sql)
	}

	fn date_diff(&self, end: &str, start: &str) -> SqlExpr {
		SqlExpr::new(format!("(CAST({end} AS DATE) - CAST({start} AS DATE))"))
	}

	fn unix_timestamp(&self, date: &str) -> SqlExpr {
		SqlExpr::new(format!("CAST(EXTRACT(EPOCH FROM {date}) AS BIGINT)"))
	}

	fn from_unix_time(&self, timestamp: &str) -> SqlExpr {
		SqlExpr::new(format!("TO_TIMESTAMP({timestamp})"))
	}

	// date + interval clamps Feb-29 to Feb-28 in non-leap years; both
	// candidates start from the original field.
	fn days_to_anniversary(&self, field: &str, reference: &str) -> SqlExpr {
		let reference_date = format!("CAST({reference} AS DATE)");
		let field_date = format!("CAST({field} AS DATE)");
		let years = format!(
			"CAST(EXTRACT(YEAR FROM {reference_date}) - EXTRACT(YEAR FROM {field_date}) AS INTEGER)"
		);
		let this_year = format!("CAST({field_date} + {years} * INTERVAL '1 year' AS DATE)");
		let next_year = format!("CAST({field_date} + ({years} + 1) * INTERVAL '1 year' AS DATE)");
		SqlExpr::new(format!(
			"CASE WHEN {this_year} < {reference_date} THEN ({next_year} - {reference_date}) ELSE ({this_year} - {reference_date}) END"
		))
	}

	fn check(&self, condition: &str, when_true: &str, when_false: &str) -> SqlExpr {
		SqlExpr::new(format!(
			"CASE WHEN {condition} THEN {when_true} ELSE {when_false} END"
		))
	}

	fn if_null(&self, expr: &str, fallback: &str) -> SqlExpr {
		SqlExpr::new(format!("COALESCE({expr}, {fallback})"))
	}

	fn insert_ignore_verb(&self) -> &'static str {
		"INSERT INTO"
	}

	fn insert_ignore_suffix(&self) -> Option<&'static str> {
		Some("ON CONFLICT DO NOTHING")
	}

	fn upsert_clause(&self, conflict_columns: &[&str], update_columns: &[&str]) -> Result<String> {
		if conflict_columns.is_empty() {
			return Err(DatabaseError::InvalidArgument(
				"ON CONFLICT needs the columns of a unique key".to_string(),
			));
		}
		let target = quoted_column_list(self, conflict_columns);
		if update_columns.is_empty() {
			return Ok(format!("ON CONFLICT ({target}) DO NOTHING"));
		}
		let assignments = update_columns
			.iter()
			.map(|c| {
				let column = self.quote_identifier(c);
				format!("{column} = EXCLUDED.{column}")
			})
			.collect::<Vec<_>>()
			.join(", ");
		Ok(format!("ON CONFLICT ({target}) DO UPDATE SET {assignments}"))
	}

	fn upsert_requires_conflict_target(&self) -> bool {
		true
	}

	fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
		match (limit, offset) {
			(Some(limit), Some(offset)) => format!("LIMIT {limit} OFFSET {offset}"),
			(Some(limit), None) => format!("LIMIT {limit}"),
			(None, Some(offset)) => format!("OFFSET {offset}"),
			(None, None) => String::new(),
		}
	}

	fn json_extract(&self, column: &str, path: &str) -> Result<SqlExpr> {
		validate_json_path(path, true)?;
		Ok(SqlExpr::new(format!(
			"jsonb_path_query_first(CAST({column} AS jsonb), {})",
			self.quote_string(path)
		)))
	}

	fn json_search(&self, column: &str, path: &str, needle: &str) -> Result<SqlExpr> {
		validate_json_path(path, true)?;
		let filter = format!("{path} ? (@ == $needle)");
		Ok(SqlExpr::new(format!(
			"jsonb_path_exists(CAST({column} AS jsonb), {}, jsonb_build_object('needle', {needle}))",
			self.quote_string(&filter)
		)))
	}

	fn json_contains(&self, column: &str, path: &str, candidate: &str) -> Result<SqlExpr> {
		validate_json_path(path, false)?;
		Ok(SqlExpr::new(format!(
			"(jsonb_path_query_first(CAST({column} AS jsonb), {}) @> CAST({candidate} AS jsonb))",
			self.quote_string(path)
		)))
	}

	/// Only immediate (`0`) and unbounded (negative) waits exist for advisory
	/// locks; bounded waits are reported as unsupported.
	fn acquire_lock(&self, name: &str, timeout_secs: i64) -> Result<SqlExpr> {
		let key = self.lock_key(name);
		match timeout_secs {
			0 => Ok(SqlExpr::new(format!("pg_try_advisory_lock({key})"))),
			t if t < 0 => Ok(SqlExpr::new(format!(
				"(SELECT TRUE FROM (SELECT pg_advisory_lock({key})) AS acquired)"
			))),
			_ => Err(DatabaseError::not_supported(
				DatabaseType::Postgres,
				"advisory lock with a bounded wait",
			)),
		}
	}

	fn release_lock(&self, name: &str) -> Result<SqlExpr> {
		Ok(SqlExpr::new(format!(
			"pg_advisory_unlock({})",
			self.lock_key(name)
		)))
	}

	fn is_locked(&self, name: &str) -> Result<SqlExpr> {
		Ok(SqlExpr::new(format!(
			"EXISTS (SELECT 1 FROM pg_locks WHERE locktype = 'advisory' AND granted AND objsubid = 2 \
			 AND CAST(classid AS BIGINT) = {LOCK_NAMESPACE} \
			 AND CAST(objid AS BIGINT) = (CAST(hashtext({}) AS BIGINT) & 4294967295))",
			self.quote_string(name)
		)))
	}

	fn rename_table_sql(&self, from: &str, to: &str) -> String {
		format!(
			"ALTER TABLE {} RENAME TO {}",
			self.quote_identifier(from),
			self.quote_identifier(split_qualified(to).1)
		)
	}

	fn add_index_sql(&self, table: &str, name: &str, columns: &[&str], kind: IndexKind) -> Result<String> {
		let quoted_table = self.quote_identifier(table);
		let columns = quoted_column_list(self, columns);
		match kind {
			IndexKind::Primary => Ok(format!("ALTER TABLE {quoted_table} ADD PRIMARY KEY ({columns})")),
			IndexKind::Unique => Ok(format!(
				"CREATE UNIQUE INDEX {} ON {quoted_table} ({columns})",
				self.quote_identifier(split_qualified(name).1)
			)),
			IndexKind::Index => Ok(format!(
				"CREATE INDEX {} ON {quoted_table} ({columns})",
				self.quote_identifier(split_qualified(name).1)
			)),
			IndexKind::Fulltext => Err(DatabaseError::not_supported(
				DatabaseType::Postgres,
				"fulltext indexes",
			)),
		}
	}

	fn drop_index_sql(&self, table: &str, name: &str) -> String {
		let index = match split_qualified(table).0 {
			Some(schema) => format!("{schema}.{}", split_qualified(name).1),
			None => name.to_string(),
		};
		format!("DROP INDEX {}", self.quote_identifier(&index))
	}

	fn drop_primary_key_sql(&self, table: &str, constraint_name: &str) -> String {
		self.drop_foreign_key_sql(table, constraint_name)
	}

	fn drop_foreign_key_sql(&self, table: &str, name: &str) -> String {
		format!(
			"ALTER TABLE {} DROP CONSTRAINT {}",
			self.quote_identifier(table),
			self.quote_identifier(name)
		)
	}

	fn convert_columns(&self, table: &TableRef, rows: &[Row]) -> Vec<ColumnDescription> {
		rows.iter()
			.filter_map(|row| {
				let name = row.text("column_name")?;
				let data_type = row.text("data_type").unwrap_or_default();
				let udt_name = row.text("udt_name").unwrap_or_else(|| data_type.clone());
				let default = row.text("column_default");
				let identity = row
					.text("is_identity")
					.is_some_and(|v| v.eq_ignore_ascii_case("YES"))
					|| default
						.as_deref()
						.is_some_and(|d| d.starts_with("nextval("));
				Some(ColumnDescription {
					schema: table.schema.clone(),
					table: table.table.clone(),
					name,
					position: row.integer("ordinal_position").unwrap_or(0) as u32,
					data_type: Self::data_type(&data_type, &udt_name),
					native_type: udt_name,
					default,
					nullable: row
						.text("is_nullable")
						.is_some_and(|n| n.eq_ignore_ascii_case("YES")),
					length: row.integer("character_maximum_length").map(|l| l as u64),
					precision: row.integer("numeric_precision").map(|p| p as u32),
					scale: row.integer("numeric_scale").map(|s| s as u32),
					unsigned: false,
					primary: false,
					primary_position: None,
					identity,
				})
			})
			.collect()
	}

	fn convert_indexes(&self, rows: &[Row]) -> Vec<IndexDescription> {
		group_index_rows(rows, |_, row| {
			let unique = row
				.text("is_unique")
				.is_some_and(|v| matches!(v.as_str(), "true" | "t" | "1"));
			let kind = if unique {
				IndexKind::Unique
			} else {
				IndexKind::Index
			};
			(kind, row.text("index_type"))
		})
	}

	fn convert_foreign_keys(&self, table: &TableRef, rows: &[Row]) -> Vec<ForeignKeyDescription> {
		rows.iter()
			.filter_map(|row| {
				Some(ForeignKeyDescription {
					name: row.text("constraint_name")?,
					schema: table.schema.clone(),
					table: table.table.clone(),
					column: row.text("column_name")?,
					ref_schema: row.text("ref_schema"),
					ref_table: row.text("ref_table")?,
					ref_column: row.text("ref_column")?,
					on_delete: Self::action(row.text("on_delete")),
					on_update: Self::action(row.text("on_update")),
				})
			})
			.collect()
	}

	fn default_schema(&self, _database: &str) -> String {
		"public".to_string()
	}
}
