//! Identifier and value quoting
//!
//! Helpers on top of [`Dialect`] quoting used by the CRUD builders, the select
//! builder and the adapter's public quoting surface.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{
	dialect::{Dialect, render_float},
	types::QueryValue,
};

static LEADING_INTEGER: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^\s*([+-]?\d+)").expect("Invalid integer regex pattern"));

static LEADING_NUMBER: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"^\s*([+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)").expect("Invalid number regex pattern")
});

/// Type a value is coerced to by [`quote_typed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
	Int,
	BigInt,
	Float,
	Decimal,
	Text,
}

/// Quote `value` as a literal of the active dialect.
pub fn quote(dialect: &dyn Dialect, value: &QueryValue) -> String {
	dialect.quote_value(value)
}

/// Quote `value` after coercing it to `value_type`.
///
/// Numeric types render unquoted. Text is coerced by its leading number, as
/// in `"12abc"` to `12`, and falls back to `0` when it has none. `NULL` stays
/// `NULL`.
pub fn quote_typed(dialect: &dyn Dialect, value: &QueryValue, value_type: ValueType) -> String {
	if let QueryValue::List(items) = value {
		if items.is_empty() {
			return "NULL".to_string();
		}
		return items
			.iter()
			.map(|item| quote_typed(dialect, item, value_type))
			.collect::<Vec<_>>()
			.join(", ");
	}
	if value.is_null() {
		return "NULL".to_string();
	}
	match value_type {
		ValueType::Int | ValueType::BigInt => coerce_integer(value).to_string(),
		ValueType::Float => render_float(coerce_float(value)),
		ValueType::Decimal => coerce_decimal(value),
		ValueType::Text => match value {
			QueryValue::Int(i) => dialect.quote_string(&i.to_string()),
			QueryValue::Float(f) => dialect.quote_string(&f.to_string()),
			QueryValue::Bool(b) => dialect.quote_string(if *b { "1" } else { "0" }),
			other => dialect.quote_value(other),
		},
	}
}

/// Replace `?` in `template` with the quoted `value`.
///
/// `count` limits how many placeholders are replaced, from the left. A list
/// value expands to its comma-separated elements, so `id IN (?)` works with
/// lists.
///
/// # Examples
///
/// ```
/// use strata_db::backends::{MySqlDialect, QueryValue, quoting::quote_into};
///
/// let dialect = MySqlDialect::new();
/// let sql = quote_into(&dialect, "name = ?", &QueryValue::from("O'Brien"), None);
/// assert_eq!(sql, "name = 'O\\'Brien'");
/// ```
pub fn quote_into(
	dialect: &dyn Dialect,
	template: &str,
	value: &QueryValue,
	count: Option<usize>,
) -> String {
	let quoted = dialect.quote_value(value);
	match count {
		Some(count) => template.replacen('?', &quoted, count),
		None => template.replace('?', &quoted),
	}
}

/// `name AS alias` with both sides quoted as identifiers. No alias, or an
/// alias equal to the last segment of `name`, renders just the name.
pub fn quote_identifier_as(dialect: &dyn Dialect, name: &str, alias: Option<&str>) -> String {
	let quoted = dialect.quote_identifier(name);
	match alias {
		Some(alias) if !alias.is_empty() && name.rsplit('.').next() != Some(alias) => {
			format!("{quoted} AS {}", dialect.quote_identifier(alias))
		}
		_ => quoted,
	}
}

fn text_of(value: &QueryValue) -> Option<String> {
	match value {
		QueryValue::String(s) => Some(s.clone()),
		QueryValue::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
		_ => None,
	}
}

fn coerce_integer(value: &QueryValue) -> i64 {
	match value {
		QueryValue::Int(i) => *i,
		QueryValue::Float(f) if f.is_finite() => f.trunc() as i64,
		QueryValue::Bool(b) => i64::from(*b),
		other => text_of(other)
			.and_then(|text| {
				LEADING_INTEGER
					.captures(&text)
					.and_then(|c| c[1].parse::<i64>().ok())
			})
			.unwrap_or(0),
	}
}

fn coerce_float(value: &QueryValue) -> f64 {
	match value {
		QueryValue::Int(i) => *i as f64,
		QueryValue::Float(f) => *f,
		QueryValue::Bool(b) => f64::from(u8::from(*b)),
		other => text_of(other)
			.and_then(|text| {
				LEADING_NUMBER
					.captures(&text)
					.and_then(|c| c[1].parse::<f64>().ok())
			})
			.unwrap_or(0.0),
	}
}

// Keeps the digits of textual input so no precision is lost to f64.
fn coerce_decimal(value: &QueryValue) -> String {
	match value {
		QueryValue::Int(i) => i.to_string(),
		QueryValue::Float(f) => render_float(*f),
		QueryValue::Bool(b) => u8::from(*b).to_string(),
		other => text_of(other)
			.and_then(|text| {
				LEADING_NUMBER
					.captures(&text)
					.map(|c| c[1].trim_start_matches('+').to_string())
			})
			.unwrap_or_else(|| "0".to_string()),
	}
}
