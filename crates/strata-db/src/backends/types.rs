//! Common type definitions shared by drivers, dialects and the adapter.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::DatabaseError;

/// Backend family an adapter talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
	#[serde(alias = "mariadb")]
	Mysql,
	#[serde(alias = "postgresql", alias = "pgsql")]
	Postgres,
}

impl DatabaseType {
	/// Default TCP port of the backend.
	pub fn default_port(&self) -> u16 {
		match self {
			DatabaseType::Mysql => 3306,
			DatabaseType::Postgres => 5432,
		}
	}

	/// Check if this database type supports transactional DDL
	///
	/// - PostgreSQL: Supports transactional DDL
	/// - MySQL/MariaDB: Does NOT support transactional DDL (DDL causes implicit commit)
	///
	/// The adapter refuses DDL inside transactions on both backends; this flag is
	/// informational for callers that run their own schema tooling.
	///
	/// # Examples
	///
	/// ```
	/// use strata_db::backends::DatabaseType;
	///
	/// assert!(DatabaseType::Postgres.supports_transactional_ddl());
	/// assert!(!DatabaseType::Mysql.supports_transactional_ddl());
	/// ```
	pub fn supports_transactional_ddl(&self) -> bool {
		matches!(self, DatabaseType::Postgres)
	}

	/// Name used in trace spans and cache keys.
	pub fn as_str(&self) -> &'static str {
		match self {
			DatabaseType::Mysql => "mysql",
			DatabaseType::Postgres => "postgresql",
		}
	}
}

impl fmt::Display for DatabaseType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for DatabaseType {
	type Err = DatabaseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"mysql" | "mariadb" => Ok(DatabaseType::Mysql),
			"postgres" | "postgresql" | "pgsql" => Ok(DatabaseType::Postgres),
			other => Err(DatabaseError::Configuration(format!(
				"unknown database engine '{other}'"
			))),
		}
	}
}

/// Query value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryValue {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	String(String),
	Bytes(Vec<u8>),
	Timestamp(DateTime<Utc>),
	Date(NaiveDate),
	Uuid(Uuid),
	Json(serde_json::Value),
	/// A list of values. Lists are only ever rendered as literals (for
	/// `IN (...)` clauses); drivers refuse to bind them.
	List(Vec<QueryValue>),
}

impl QueryValue {
	/// Build a [`QueryValue::List`] from anything convertible into values.
	pub fn list<I, T>(values: I) -> Self
	where
		I: IntoIterator<Item = T>,
		T: Into<QueryValue>,
	{
		QueryValue::List(values.into_iter().map(Into::into).collect())
	}

	pub fn is_null(&self) -> bool {
		matches!(self, QueryValue::Null)
	}
}

impl From<&str> for QueryValue {
	fn from(s: &str) -> Self {
		QueryValue::String(s.to_string())
	}
}

impl From<String> for QueryValue {
	fn from(s: String) -> Self {
		QueryValue::String(s)
	}
}

impl From<&String> for QueryValue {
	fn from(s: &String) -> Self {
		QueryValue::String(s.clone())
	}
}

impl From<i64> for QueryValue {
	fn from(i: i64) -> Self {
		QueryValue::Int(i)
	}
}

impl From<i32> for QueryValue {
	fn from(i: i32) -> Self {
		QueryValue::Int(i as i64)
	}
}

impl From<u32> for QueryValue {
	fn from(i: u32) -> Self {
		QueryValue::Int(i as i64)
	}
}

impl From<f64> for QueryValue {
	fn from(f: f64) -> Self {
		QueryValue::Float(f)
	}
}

impl From<bool> for QueryValue {
	fn from(b: bool) -> Self {
		QueryValue::Bool(b)
	}
}

impl From<Vec<u8>> for QueryValue {
	fn from(b: Vec<u8>) -> Self {
		QueryValue::Bytes(b)
	}
}

impl From<DateTime<Utc>> for QueryValue {
	fn from(dt: DateTime<Utc>) -> Self {
		QueryValue::Timestamp(dt)
	}
}

impl From<NaiveDate> for QueryValue {
	fn from(d: NaiveDate) -> Self {
		QueryValue::Date(d)
	}
}

impl From<Uuid> for QueryValue {
	fn from(u: Uuid) -> Self {
		QueryValue::Uuid(u)
	}
}

impl From<serde_json::Value> for QueryValue {
	fn from(v: serde_json::Value) -> Self {
		QueryValue::Json(v)
	}
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
	fn from(value: Option<T>) -> Self {
		match value {
			Some(v) => v.into(),
			None => QueryValue::Null,
		}
	}
}

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryResult {
	pub rows_affected: u64,
	/// Auto-increment value generated by the statement, when the backend reports one.
	pub last_insert_id: Option<u64>,
}

/// A fetched row. Column order follows the result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
	pub data: IndexMap<String, QueryValue>,
}

impl Row {
	pub fn new() -> Self {
		Self {
			data: IndexMap::new(),
		}
	}

	pub fn insert(&mut self, key: String, value: QueryValue) {
		self.data.insert(key, value);
	}

	pub fn get<T: TryFrom<QueryValue>>(&self, key: &str) -> std::result::Result<T, DatabaseError>
	where
		DatabaseError: From<<T as TryFrom<QueryValue>>::Error>,
	{
		self.data
			.get(key)
			.cloned()
			.ok_or_else(|| DatabaseError::ColumnNotFound(key.to_string()))
			.and_then(|v| v.try_into().map_err(Into::into))
	}

	/// Raw value of `key`, if present.
	pub fn value(&self, key: &str) -> Option<&QueryValue> {
		self.data.get(key)
	}

	/// Value at result-set position `index`.
	pub fn value_at(&self, index: usize) -> Option<&QueryValue> {
		self.data.get_index(index).map(|(_, v)| v)
	}

	/// Column names in result-set order.
	pub fn columns(&self) -> impl Iterator<Item = &str> {
		self.data.keys().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.data.len()
	}

	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}

	/// Text of `key`, treating NULL and missing columns as `None`.
	///
	/// Numbers are rendered in decimal. Catalog queries lean on this because
	/// backends disagree on whether metadata columns are text or blobs.
	pub fn text(&self, key: &str) -> Option<String> {
		match self.data.get(key)? {
			QueryValue::Null => None,
			QueryValue::String(s) => Some(s.clone()),
			QueryValue::Int(i) => Some(i.to_string()),
			QueryValue::Float(f) => Some(f.to_string()),
			QueryValue::Bool(b) => Some(b.to_string()),
			QueryValue::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
			other => Some(format!("{other:?}")),
		}
	}

	/// Integer value of `key`, parsing textual numbers.
	pub fn integer(&self, key: &str) -> Option<i64> {
		match self.data.get(key)? {
			QueryValue::Int(i) => Some(*i),
			QueryValue::Bool(b) => Some(i64::from(*b)),
			QueryValue::Float(f) => Some(*f as i64),
			QueryValue::String(s) => s.trim().parse().ok(),
			QueryValue::Bytes(b) => std::str::from_utf8(b).ok()?.trim().parse().ok(),
			_ => None,
		}
	}
}

impl FromIterator<(String, QueryValue)> for Row {
	fn from_iter<I: IntoIterator<Item = (String, QueryValue)>>(iter: I) -> Self {
		Self {
			data: iter.into_iter().collect(),
		}
	}
}

// Type conversions for QueryValue
impl TryFrom<QueryValue> for i64 {
	type Error = DatabaseError;

	fn try_from(value: QueryValue) -> std::result::Result<Self, Self::Error> {
		match value {
			QueryValue::Int(i) => Ok(i),
			QueryValue::Bool(b) => Ok(i64::from(b)),
			QueryValue::String(ref s) => s.trim().parse().map_err(|_| {
				DatabaseError::TypeError(format!("Cannot convert {:?} to i64", value))
			}),
			_ => Err(DatabaseError::TypeError(format!(
				"Cannot convert {:?} to i64",
				value
			))),
		}
	}
}

impl TryFrom<QueryValue> for i32 {
	type Error = DatabaseError;

	fn try_from(value: QueryValue) -> std::result::Result<Self, Self::Error> {
		let wide = i64::try_from(value)?;
		i32::try_from(wide)
			.map_err(|_| DatabaseError::TypeError(format!("Value {} out of range for i32", wide)))
	}
}

impl TryFrom<QueryValue> for u64 {
	type Error = DatabaseError;

	fn try_from(value: QueryValue) -> std::result::Result<Self, Self::Error> {
		let wide = i64::try_from(value)?;
		u64::try_from(wide)
			.map_err(|_| DatabaseError::TypeError(format!("Value {} out of range for u64", wide)))
	}
}

impl TryFrom<QueryValue> for f64 {
	type Error = DatabaseError;

	fn try_from(value: QueryValue) -> std::result::Result<Self, Self::Error> {
		match value {
			QueryValue::Float(f) => Ok(f),
			QueryValue::Int(i) => Ok(i as f64),
			_ => Err(DatabaseError::TypeError(format!(
				"Cannot convert {:?} to f64",
				value
			))),
		}
	}
}

impl TryFrom<QueryValue> for bool {
	type Error = DatabaseError;

	fn try_from(value: QueryValue) -> std::result::Result<Self, Self::Error> {
		match value {
			QueryValue::Bool(b) => Ok(b),
			// MySQL reports boolean expressions as integers
			QueryValue::Int(i) => Ok(i != 0),
			_ => Err(DatabaseError::TypeError(format!(
				"Cannot convert {:?} to bool",
				value
			))),
		}
	}
}

impl TryFrom<QueryValue> for String {
	type Error = DatabaseError;

	fn try_from(value: QueryValue) -> std::result::Result<Self, Self::Error> {
		match value {
			QueryValue::String(s) => Ok(s),
			QueryValue::Bytes(b) => String::from_utf8(b)
				.map_err(|e| DatabaseError::TypeError(format!("Invalid UTF-8 in column: {e}"))),
			QueryValue::Int(i) => Ok(i.to_string()),
			QueryValue::Uuid(u) => Ok(u.to_string()),
			_ => Err(DatabaseError::TypeError(format!(
				"Cannot convert {:?} to String",
				value
			))),
		}
	}
}

impl TryFrom<QueryValue> for Option<String> {
	type Error = DatabaseError;

	fn try_from(value: QueryValue) -> std::result::Result<Self, Self::Error> {
		match value {
			QueryValue::Null => Ok(None),
			other => String::try_from(other).map(Some),
		}
	}
}

impl TryFrom<QueryValue> for Option<i64> {
	type Error = DatabaseError;

	fn try_from(value: QueryValue) -> std::result::Result<Self, Self::Error> {
		match value {
			QueryValue::Null => Ok(None),
			other => i64::try_from(other).map(Some),
		}
	}
}

impl TryFrom<QueryValue> for DateTime<Utc> {
	type Error = DatabaseError;

	fn try_from(value: QueryValue) -> std::result::Result<Self, Self::Error> {
		match value {
			QueryValue::Timestamp(dt) => Ok(dt),
			_ => Err(DatabaseError::TypeError(format!(
				"Cannot convert {:?} to DateTime<Utc>",
				value
			))),
		}
	}
}

impl TryFrom<QueryValue> for NaiveDate {
	type Error = DatabaseError;

	fn try_from(value: QueryValue) -> std::result::Result<Self, Self::Error> {
		match value {
			QueryValue::Date(d) => Ok(d),
			QueryValue::Timestamp(dt) => Ok(dt.date_naive()),
			_ => Err(DatabaseError::TypeError(format!(
				"Cannot convert {:?} to NaiveDate",
				value
			))),
		}
	}
}

impl TryFrom<QueryValue> for Uuid {
	type Error = DatabaseError;

	fn try_from(value: QueryValue) -> std::result::Result<Self, Self::Error> {
		match value {
			QueryValue::Uuid(u) => Ok(u),
			QueryValue::String(ref s) => Uuid::parse_str(s)
				.map_err(|e| DatabaseError::TypeError(format!("Invalid UUID {s:?}: {e}"))),
			_ => Err(DatabaseError::TypeError(format!(
				"Cannot convert {:?} to Uuid",
				value
			))),
		}
	}
}

impl TryFrom<QueryValue> for serde_json::Value {
	type Error = DatabaseError;

	fn try_from(value: QueryValue) -> std::result::Result<Self, Self::Error> {
		match value {
			QueryValue::Json(v) => Ok(v),
			QueryValue::String(s) => serde_json::from_str(&s).map_err(Into::into),
			_ => Err(DatabaseError::TypeError(format!(
				"Cannot convert {:?} to serde_json::Value",
				value
			))),
		}
	}
}
