//! CRUD statement builders
//!
//! Builders separate bound values from raw SQL. A [`DataValue::Bind`] becomes
//! a dialect placeholder with its value pushed onto the parameter list, while
//! a [`DataValue::Raw`] expression is inserted verbatim.
//!
//! WHERE clauses are rendered as literal SQL through the dialect's quoting,
//! so only SET and VALUES data is bound.
//!
//! | Backend | Example |
//! |---------|---------|
//! | PostgreSQL | `INSERT INTO "users" ("name", "email") VALUES ($1, $2)` |
//! | MySQL | `` INSERT INTO `users` (`name`, `email`) VALUES (?, ?) `` |

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use uuid::Uuid;

use super::{
	dialect::Dialect,
	error::{DatabaseError, Result},
	expr::SqlExpr,
	quoting::quote_into,
	types::QueryValue,
};

/// A value written by an insert or update.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
	/// Sent as a bound parameter.
	Bind(QueryValue),
	/// Inserted into the statement verbatim.
	Raw(SqlExpr),
}

impl From<SqlExpr> for DataValue {
	fn from(expr: SqlExpr) -> Self {
		DataValue::Raw(expr)
	}
}

macro_rules! bind_from {
	($($ty:ty),* $(,)?) => {
		$(
			impl From<$ty> for DataValue {
				fn from(value: $ty) -> Self {
					DataValue::Bind(QueryValue::from(value))
				}
			}

			impl From<Option<$ty>> for DataValue {
				fn from(value: Option<$ty>) -> Self {
					DataValue::Bind(QueryValue::from(value))
				}
			}
		)*
	};
}

bind_from!(
	&str,
	String,
	i64,
	i32,
	u32,
	f64,
	bool,
	Vec<u8>,
	DateTime<Utc>,
	NaiveDate,
	Uuid,
	serde_json::Value,
);

impl From<QueryValue> for DataValue {
	fn from(value: QueryValue) -> Self {
		DataValue::Bind(value)
	}
}

/// Column name to value map for inserts and updates. Column order is kept.
pub type Data = IndexMap<String, DataValue>;

/// Build a [`Data`] map.
///
/// # Examples
///
/// ```
/// use strata_db::data;
/// use strata_db::backends::{DataValue, SqlExpr};
///
/// let row = data! { "id" => 1, "name" => "a'b", "created_at" => SqlExpr::now() };
///
/// assert_eq!(row.len(), 3);
/// assert!(matches!(row["created_at"], DataValue::Raw(_)));
/// ```
#[macro_export]
macro_rules! data {
	() => {
		$crate::backends::Data::new()
	};
	($($column:expr => $value:expr),+ $(,)?) => {{
		let mut data = $crate::backends::Data::new();
		$(
			data.insert(
				::std::string::String::from($column),
				$crate::backends::DataValue::from($value),
			);
		)+
		data
	}};
}

/// WHERE clause
///
/// A map renders each entry as `column = value`, joined with `AND`:
///
/// - A key containing `?` is a template; the value is quoted into it.
/// - A list value renders `column IN (...)`. An empty list renders
///   `column IN (NULL)`, which matches no row.
/// - `NULL` renders `column IS NULL`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Where {
	/// No condition
	#[default]
	None,
	/// Raw SQL fragment, used verbatim
	Raw(String),
	Map(IndexMap<String, QueryValue>),
	/// Every part must hold
	All(Vec<Where>),
	/// Any part may hold
	Any(Vec<Where>),
}

impl Where {
	/// Build a map condition from `(column, value)` pairs.
	pub fn map<K, V, I>(pairs: I) -> Self
	where
		K: Into<String>,
		V: Into<QueryValue>,
		I: IntoIterator<Item = (K, V)>,
	{
		Where::Map(
			pairs
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		)
	}

	/// Single-entry map condition.
	pub fn eq(column: impl Into<String>, value: impl Into<QueryValue>) -> Self {
		Self::map([(column.into(), value.into())])
	}

	pub fn all(parts: Vec<Where>) -> Self {
		Where::All(parts)
	}

	pub fn any(parts: Vec<Where>) -> Self {
		Where::Any(parts)
	}

	/// Render the condition; `None` when there is nothing to render.
	pub fn render(&self, dialect: &dyn Dialect) -> Option<String> {
		match self {
			Where::None => None,
			Where::Raw(sql) => {
				let sql = sql.trim();
				(!sql.is_empty()).then(|| sql.to_string())
			}
			Where::Map(entries) => {
				let parts: Vec<String> = entries
					.iter()
					.map(|(column, value)| render_entry(dialect, column, value))
					.collect();
				join(parts, " AND ")
			}
			Where::All(parts) => join(Self::render_parts(parts, dialect), " AND "),
			Where::Any(parts) => join(Self::render_parts(parts, dialect), " OR "),
		}
	}

	fn render_parts(parts: &[Where], dialect: &dyn Dialect) -> Vec<String> {
		parts.iter().filter_map(|p| p.render(dialect)).collect()
	}
}

impl From<&str> for Where {
	fn from(sql: &str) -> Self {
		Where::Raw(sql.to_string())
	}
}

impl From<String> for Where {
	fn from(sql: String) -> Self {
		Where::Raw(sql)
	}
}

impl From<IndexMap<String, QueryValue>> for Where {
	fn from(map: IndexMap<String, QueryValue>) -> Self {
		Where::Map(map)
	}
}

impl From<Vec<Where>> for Where {
	fn from(parts: Vec<Where>) -> Self {
		Where::All(parts)
	}
}

fn render_entry(dialect: &dyn Dialect, column: &str, value: &QueryValue) -> String {
	if column.contains('?') {
		return quote_into(dialect, column, value, None);
	}
	let column = dialect.quote_identifier(column);
	match value {
		QueryValue::Null => format!("{column} IS NULL"),
		QueryValue::List(_) => format!("{column} IN ({})", dialect.quote_value(value)),
		other => format!("{column} = {}", dialect.quote_value(other)),
	}
}

// Several parts are each parenthesised so AND/OR nesting keeps its meaning.
fn join(parts: Vec<String>, separator: &str) -> Option<String> {
	match parts.len() {
		0 => None,
		1 => parts.into_iter().next(),
		_ => Some(
			parts
				.iter()
				.map(|p| format!("({p})"))
				.collect::<Vec<_>>()
				.join(separator),
		),
	}
}

/// Conflict handling of an insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnConflict {
	/// Plain insert; conflicts fail.
	Fail,
	/// Skip conflicting rows.
	Ignore,
	/// Update conflicting rows.
	Update {
		/// Unique key to detect conflicts on. Required by dialects that need
		/// an explicit target.
		conflict_columns: Vec<String>,
		/// Columns overwritten with the new values. Empty means every
		/// inserted column outside the conflict key.
		update_columns: Vec<String>,
	},
}

/// INSERT statement builder
pub struct InsertBuilder {
	dialect: Arc<dyn Dialect>,
	table: String,
	rows: Vec<Data>,
	on_conflict: OnConflict,
}

impl InsertBuilder {
	pub fn new(dialect: Arc<dyn Dialect>, table: impl Into<String>) -> Self {
		Self {
			dialect,
			table: table.into(),
			rows: Vec::new(),
			on_conflict: OnConflict::Fail,
		}
	}

	pub fn row(mut self, data: Data) -> Self {
		self.rows.push(data);
		self
	}

	pub fn rows(mut self, rows: impl IntoIterator<Item = Data>) -> Self {
		self.rows.extend(rows);
		self
	}

	pub fn on_conflict(mut self, on_conflict: OnConflict) -> Self {
		self.on_conflict = on_conflict;
		self
	}

	/// Render the statement and its parameters.
	///
	/// Every row must carry the first row's columns; the first row fixes
	/// column order.
	pub fn build(&self) -> Result<(String, Vec<QueryValue>)> {
		let first = self.rows.first().ok_or_else(|| {
			DatabaseError::InvalidArgument(format!("insert into {} without rows", self.table))
		})?;
		if first.is_empty() {
			return Err(DatabaseError::InvalidArgument(format!(
				"insert into {} without columns",
				self.table
			)));
		}
		let columns: Vec<&str> = first.keys().map(String::as_str).collect();

		let mut params = Vec::new();
		let mut tuples = Vec::with_capacity(self.rows.len());
		for (index, row) in self.rows.iter().enumerate() {
			if row.len() != columns.len() || columns.iter().any(|c| !row.contains_key(*c)) {
				return Err(DatabaseError::InvalidArgument(format!(
					"row {index} of insert into {} does not match the columns of the first row",
					self.table
				)));
			}
			let values: Vec<String> = columns
				.iter()
				.map(|c| self.render_value(&row[*c], &mut params))
				.collect();
			tuples.push(format!("({})", values.join(", ")));
		}

		let verb = match self.on_conflict {
			OnConflict::Ignore => self.dialect.insert_ignore_verb(),
			_ => "INSERT INTO",
		};
		let mut sql = format!(
			"{verb} {} ({}) VALUES {}",
			self.dialect.quote_identifier(&self.table),
			columns
				.iter()
				.map(|c| self.dialect.quote_identifier(c))
				.collect::<Vec<_>>()
				.join(", "),
			tuples.join(", ")
		);

		match &self.on_conflict {
			OnConflict::Fail => {}
			OnConflict::Ignore => {
				if let Some(suffix) = self.dialect.insert_ignore_suffix() {
					sql.push(' ');
					sql.push_str(suffix);
				}
			}
			OnConflict::Update {
				conflict_columns,
				update_columns,
			} => {
				let conflict: Vec<&str> = conflict_columns.iter().map(String::as_str).collect();
				let update: Vec<&str> = if update_columns.is_empty() {
					columns
						.iter()
						.copied()
						.filter(|c| !conflict.contains(c))
						.collect()
				} else {
					update_columns.iter().map(String::as_str).collect()
				};
				sql.push(' ');
				sql.push_str(&self.dialect.upsert_clause(&conflict, &update)?);
			}
		}
		Ok((sql, params))
	}

	fn render_value(&self, value: &DataValue, params: &mut Vec<QueryValue>) -> String {
		match value {
			DataValue::Raw(expr) => expr.to_string(),
			DataValue::Bind(v @ QueryValue::List(_)) => self.dialect.quote_value(v),
			DataValue::Bind(v) => {
				params.push(v.clone());
				self.dialect.placeholder(params.len())
			}
		}
	}
}

/// UPDATE statement builder
pub struct UpdateBuilder {
	dialect: Arc<dyn Dialect>,
	table: String,
	data: Data,
	condition: Where,
}

impl UpdateBuilder {
	pub fn new(dialect: Arc<dyn Dialect>, table: impl Into<String>) -> Self {
		Self {
			dialect,
			table: table.into(),
			data: Data::new(),
			condition: Where::None,
		}
	}

	pub fn set(mut self, column: impl Into<String>, value: impl Into<DataValue>) -> Self {
		self.data.insert(column.into(), value.into());
		self
	}

	pub fn data(mut self, data: Data) -> Self {
		self.data.extend(data);
		self
	}

	pub fn where_(mut self, condition: impl Into<Where>) -> Self {
		self.condition = condition.into();
		self
	}

	pub fn build(&self) -> Result<(String, Vec<QueryValue>)> {
		if self.data.is_empty() {
			return Err(DatabaseError::InvalidArgument(format!(
				"update of {} without columns",
				self.table
			)));
		}
		let mut params = Vec::new();
		let assignments: Vec<String> = self
			.data
			.iter()
			.map(|(column, value)| {
				let rendered = match value {
					DataValue::Raw(expr) => expr.to_string(),
					DataValue::Bind(v @ QueryValue::List(_)) => self.dialect.quote_value(v),
					DataValue::Bind(v) => {
						params.push(v.clone());
						self.dialect.placeholder(params.len())
					}
				};
				format!("{} = {rendered}", self.dialect.quote_identifier(column))
			})
			.collect();

		let mut sql = format!(
			"UPDATE {} SET {}",
			self.dialect.quote_identifier(&self.table),
			assignments.join(", ")
		);
		if let Some(condition) = self.condition.render(self.dialect.as_ref()) {
			sql.push_str(" WHERE ");
			sql.push_str(&condition);
		}
		Ok((sql, params))
	}
}

/// DELETE statement builder
pub struct DeleteBuilder {
	dialect: Arc<dyn Dialect>,
	table: String,
	condition: Where,
}

impl DeleteBuilder {
	pub fn new(dialect: Arc<dyn Dialect>, table: impl Into<String>) -> Self {
		Self {
			dialect,
			table: table.into(),
			condition: Where::None,
		}
	}

	pub fn where_(mut self, condition: impl Into<Where>) -> Self {
		self.condition = condition.into();
		self
	}

	pub fn build(&self) -> (String, Vec<QueryValue>) {
		let mut sql = format!("DELETE FROM {}", self.dialect.quote_identifier(&self.table));
		if let Some(condition) = self.condition.render(self.dialect.as_ref()) {
			sql.push_str(" WHERE ");
			sql.push_str(&condition);
		}
		(sql, Vec::new())
	}
}
