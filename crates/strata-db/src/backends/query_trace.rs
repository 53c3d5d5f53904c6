//! Query tracing hook
//!
//! Every statement the adapter runs is wrapped in a `db.query` span:
//!
//! | Field | Value |
//! |-------|-------|
//! | `db.system` | `mysql` or `postgresql` |
//! | `db.operation` | First SQL keyword, upper-cased |
//! | `db.sql.table` | Table after the first `FROM`, `INTO` or `UPDATE`, unquoted |
//! | `db.statement` | Statement with parameters interpolated, truncated |
//! | `db.rows_affected` | Recorded once the statement finished |
//!
//! The interpolated statement is for reading only and is never executed.
//! Without a subscriber the span costs nothing.

use std::time::Instant;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{debug, field};

use super::{
	config::TraceConfig,
	dialect::Dialect,
	error::Result,
	types::{DatabaseType, QueryResult, QueryValue, Row},
};

static TABLE_PATTERN: Lazy<Regex> = Lazy::new(|| {
	Regex::new(
		r#"(?i)\b(?:from|into|update)\s+((?:`[^`]+`|"[^"]+"|[\w$]+)(?:\.(?:`[^`]+`|"[^"]+"|[\w$]+))?)"#,
	)
	.expect("Invalid table regex pattern")
});

static NUMBERED_PLACEHOLDER: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"\$(\d+)").expect("Invalid placeholder regex pattern"));

/// Row count reported to the `db.rows_affected` field.
pub trait RowCount {
	fn row_count(&self) -> u64;
}

impl RowCount for QueryResult {
	fn row_count(&self) -> u64 {
		self.rows_affected
	}
}

impl RowCount for Vec<Row> {
	fn row_count(&self) -> u64 {
		self.len() as u64
	}
}

impl RowCount for () {
	fn row_count(&self) -> u64 {
		0
	}
}

/// Wraps statement execution in a `db.query` span.
#[derive(Debug, Clone)]
pub struct QueryTracer {
	backend: DatabaseType,
	config: TraceConfig,
}

impl QueryTracer {
	pub fn new(backend: DatabaseType, config: TraceConfig) -> Self {
		Self { backend, config }
	}

	pub fn is_enabled(&self) -> bool {
		self.config.enabled
	}

	/// Run `execute` inside a span describing `sql`.
	pub fn trace<T, F>(&self, dialect: &dyn Dialect, sql: &str, params: &[QueryValue], execute: F) -> Result<T>
	where
		T: RowCount,
		F: FnOnce() -> Result<T>,
	{
		if !self.config.enabled {
			return execute();
		}

		let span = tracing::info_span!(
			"db.query",
			db.system = self.backend.as_str(),
			db.operation = %operation(sql),
			db.sql.table = %table_of(sql),
			db.statement = %interpolate(dialect, sql, params, self.config.max_statement_length),
			db.rows_affected = field::Empty,
		);
		let _entered = span.enter();

		let started = Instant::now();
		let result = execute();
		let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
		match &result {
			Ok(value) => {
				span.record("db.rows_affected", value.row_count());
				debug!(elapsed_ms, "query finished");
			}
			Err(error) => debug!(elapsed_ms, %error, "query failed"),
		}
		result
	}
}

/// First keyword of `sql`, upper-cased.
pub fn operation(sql: &str) -> String {
	sql.split_whitespace()
		.next()
		.map(|token| token.trim_start_matches('(').to_ascii_uppercase())
		.unwrap_or_default()
}

/// Table named after the first `FROM`, `INTO` or `UPDATE`, without quotes.
/// Empty when there is none.
pub fn table_of(sql: &str) -> String {
	TABLE_PATTERN
		.captures(sql)
		.map(|c| c[1].chars().filter(|c| !matches!(c, '`' | '"')).collect())
		.unwrap_or_default()
}

/// `sql` with each placeholder replaced by its quoted parameter, cut to
/// `max_length` characters.
pub fn interpolate(dialect: &dyn Dialect, sql: &str, params: &[QueryValue], max_length: usize) -> String {
	let rendered = if params.is_empty() {
		sql.to_string()
	} else {
		match dialect.database_type() {
			DatabaseType::Postgres => NUMBERED_PLACEHOLDER
				.replace_all(sql, |caps: &Captures<'_>| {
					caps[1]
						.parse::<usize>()
						.ok()
						.and_then(|n| n.checked_sub(1))
						.and_then(|index| params.get(index))
						.map(|value| dialect.quote_value(value))
						.unwrap_or_else(|| caps[0].to_string())
				})
				.into_owned(),
			DatabaseType::Mysql => {
				let mut values = params.iter();
				let mut out = String::with_capacity(sql.len());
				for c in sql.chars() {
					match (c, values.as_slice().is_empty()) {
						('?', false) => {
							if let Some(value) = values.next() {
								out.push_str(&dialect.quote_value(value));
							}
						}
						_ => out.push(c),
					}
				}
				out
			}
		}
	};
	truncate(rendered, max_length)
}

fn truncate(value: String, max_length: usize) -> String {
	if value.chars().count() <= max_length {
		return value;
	}
	let mut truncated: String = value.chars().take(max_length).collect();
	truncated.push_str("...");
	truncated
}
