//! Schema introspection
//!
//! Catalog rows come back from a [`Driver`] in a backend-native shape. The
//! active [`Dialect`] converts them into the dialect-neutral descriptions
//! defined here, and [`SchemaIntrospector`] merges primary keys reported as a
//! separate constraint into the unified `PRIMARY` index.
//!
//! A table that does not exist yields empty vectors, never an error.

use serde::{Deserialize, Serialize};

use super::{
	dialect::Dialect,
	driver::Driver,
	error::{DatabaseError, Result},
	types::Row,
};

/// Key under which the primary key is always reported.
pub const PRIMARY_KEY_NAME: &str = "PRIMARY";

/// Dialect-neutral column type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
	Boolean,
	SmallInt,
	Integer,
	BigInt,
	Decimal,
	Float,
	Double,
	Char,
	Varchar,
	Text,
	Blob,
	Date,
	DateTime,
	Timestamp,
	Time,
	Json,
	Uuid,
	/// Any type the dialect has no neutral tag for, with its native name.
	Other(String),
}

/// One column of a described table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescription {
	pub schema: String,
	pub table: String,
	pub name: String,
	/// 1-based ordinal position.
	pub position: u32,
	pub data_type: DataType,
	/// Type as the backend spells it, e.g. `varchar(50)` or `character varying`.
	pub native_type: String,
	pub default: Option<String>,
	pub nullable: bool,
	pub length: Option<u64>,
	pub precision: Option<u32>,
	pub scale: Option<u32>,
	pub unsigned: bool,
	pub primary: bool,
	/// 1-based position inside the primary key.
	pub primary_position: Option<u32>,
	pub identity: bool,
}

/// Kind of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexKind {
	Primary,
	Unique,
	Index,
	Fulltext,
}

impl IndexKind {
	/// Marker used by the naming scheme for generated index names.
	pub fn name_prefix(&self) -> &'static str {
		match self {
			IndexKind::Primary => "PK_",
			IndexKind::Unique => "UNQ_",
			IndexKind::Index => "IDX_",
			IndexKind::Fulltext => "FTI_",
		}
	}
}

/// One index of a described table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescription {
	/// Upper-cased key name; the primary key is always [`PRIMARY_KEY_NAME`].
	pub key_name: String,
	/// Name as reported by the backend.
	pub native_name: String,
	pub columns: Vec<String>,
	pub kind: IndexKind,
	/// Access method reported by the backend, e.g. `BTREE` or `gin`.
	pub index_type: Option<String>,
}

/// Referential action of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForeignKeyAction {
	Cascade,
	SetNull,
	SetDefault,
	Restrict,
	NoAction,
}

impl ForeignKeyAction {
	pub fn to_sql(&self) -> &'static str {
		match self {
			ForeignKeyAction::Cascade => "CASCADE",
			ForeignKeyAction::SetNull => "SET NULL",
			ForeignKeyAction::SetDefault => "SET DEFAULT",
			ForeignKeyAction::Restrict => "RESTRICT",
			ForeignKeyAction::NoAction => "NO ACTION",
		}
	}

	/// Parse the rule spelling used by `information_schema`.
	pub fn from_rule(rule: &str) -> Option<Self> {
		match rule.trim().to_ascii_uppercase().as_str() {
			"CASCADE" => Some(ForeignKeyAction::Cascade),
			"SET NULL" => Some(ForeignKeyAction::SetNull),
			"SET DEFAULT" => Some(ForeignKeyAction::SetDefault),
			"RESTRICT" => Some(ForeignKeyAction::Restrict),
			"NO ACTION" => Some(ForeignKeyAction::NoAction),
			_ => None,
		}
	}
}

/// One column pair of a foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDescription {
	pub name: String,
	pub schema: String,
	pub table: String,
	pub column: String,
	pub ref_schema: Option<String>,
	pub ref_table: String,
	pub ref_column: String,
	pub on_delete: ForeignKeyAction,
	pub on_update: ForeignKeyAction,
}

/// Location of a table: the schema it lives in and its bare name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
	pub schema: String,
	pub table: String,
}

impl TableRef {
	pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
		Self {
			schema: schema.into(),
			table: table.into(),
		}
	}

	/// `schema.table`, the DDL cache key.
	pub fn cache_key(&self) -> String {
		format!("{}.{}", self.schema, self.table)
	}
}

/// Runs catalog queries on a driver and converts them through a dialect.
///
/// The introspector never consults the DDL cache; the adapter layers caching
/// on top of it.
pub struct SchemaIntrospector<'a> {
	driver: &'a mut dyn Driver,
	dialect: &'a dyn Dialect,
}

impl<'a> SchemaIntrospector<'a> {
	pub fn new(driver: &'a mut dyn Driver, dialect: &'a dyn Dialect) -> Self {
		Self { driver, dialect }
	}

	pub fn describe_table(&mut self, table: &TableRef) -> Result<Vec<ColumnDescription>> {
		let native = self
			.driver
			.catalog_columns(&table.schema, &table.table)
			.map_err(|e| catalog_error("columns", table, e))?;
		if native.is_empty() {
			return Ok(Vec::new());
		}
		let primary = self
			.driver
			.catalog_primary_key(&table.schema, &table.table)
			.map_err(|e| catalog_error("primary key", table, e))?;

		let mut columns = self.dialect.convert_columns(table, &native);
		merge_primary_into_columns(&mut columns, &primary_constraint(&primary).columns);
		columns.sort_by_key(|c| c.position);
		Ok(columns)
	}

	pub fn index_list(&mut self, table: &TableRef) -> Result<Vec<IndexDescription>> {
		let native = self
			.driver
			.catalog_indexes(&table.schema, &table.table)
			.map_err(|e| catalog_error("indexes", table, e))?;
		let primary = self
			.driver
			.catalog_primary_key(&table.schema, &table.table)
			.map_err(|e| catalog_error("primary key", table, e))?;

		let mut indexes = self.dialect.convert_indexes(&native);
		merge_primary_into_indexes(&mut indexes, &primary_constraint(&primary));
		Ok(indexes)
	}

	pub fn foreign_keys(&mut self, table: &TableRef) -> Result<Vec<ForeignKeyDescription>> {
		let native = self
			.driver
			.catalog_foreign_keys(&table.schema, &table.table)
			.map_err(|e| catalog_error("foreign keys", table, e))?;
		Ok(self.dialect.convert_foreign_keys(table, &native))
	}

	pub fn list_tables(&mut self, schema: &str) -> Result<Vec<String>> {
		self.driver
			.list_tables(schema)
			.map_err(|e| DatabaseError::execution(&format!("catalog: tables of {schema}"), e))
	}
}

fn catalog_error(
	what: &str,
	table: &TableRef,
	source: super::error::DriverError,
) -> DatabaseError {
	DatabaseError::execution(
		&format!("catalog: {what} of {}", table.cache_key()),
		source,
	)
}

/// Primary key reported as a constraint, separately from the index list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PrimaryConstraint {
	name: Option<String>,
	columns: Vec<String>,
}

/// Rows carry `column_name`, `ordinal_position` and optionally `constraint_name`.
fn primary_constraint(rows: &[Row]) -> PrimaryConstraint {
	let mut keyed: Vec<(i64, String)> = rows
		.iter()
		.filter_map(|row| {
			let name = row.text("column_name")?;
			let position = row.integer("ordinal_position").unwrap_or(i64::MAX);
			Some((position, name))
		})
		.collect();
	keyed.sort_by_key(|(position, _)| *position);
	PrimaryConstraint {
		name: rows.iter().find_map(|row| row.text("constraint_name")),
		columns: keyed.into_iter().map(|(_, name)| name).collect(),
	}
}

fn merge_primary_into_columns(columns: &mut [ColumnDescription], primary: &[String]) {
	if primary.is_empty() {
		return;
	}
	for column in columns.iter_mut() {
		if let Some(index) = primary.iter().position(|p| p == &column.name) {
			column.primary = true;
			column.primary_position = Some(index as u32 + 1);
		}
	}
}

fn merge_primary_into_indexes(indexes: &mut Vec<IndexDescription>, primary: &PrimaryConstraint) {
	if primary.columns.is_empty() {
		return;
	}
	let native_name = primary
		.name
		.clone()
		.or_else(|| {
			indexes
				.iter()
				.find(|i| i.kind == IndexKind::Primary)
				.map(|i| i.native_name.clone())
		})
		.unwrap_or_else(|| PRIMARY_KEY_NAME.to_string());
	indexes.retain(|i| i.kind != IndexKind::Primary && i.native_name != native_name);
	indexes.insert(
		0,
		IndexDescription {
			key_name: PRIMARY_KEY_NAME.to_string(),
			native_name,
			columns: primary.columns.clone(),
			kind: IndexKind::Primary,
			index_type: None,
		},
	);
}

/// Group catalog index rows by index name, ordering columns by their sequence.
///
/// Rows carry `index_name`, `column_name` and `seq_in_index`. The `classify`
/// callback derives kind and access method from the first row of each index.
pub(crate) fn group_index_rows<F>(rows: &[Row], classify: F) -> Vec<IndexDescription>
where
	F: Fn(&str, &Row) -> (IndexKind, Option<String>),
{
	let mut grouped: indexmap::IndexMap<String, (Vec<(i64, String)>, IndexKind, Option<String>)> =
		indexmap::IndexMap::new();
	for row in rows {
		let (Some(name), Some(column)) = (row.text("index_name"), row.text("column_name")) else {
			continue;
		};
		let sequence = row.integer("seq_in_index").unwrap_or(0);
		let entry = grouped.entry(name.clone()).or_insert_with(|| {
			let (kind, index_type) = classify(&name, row);
			(Vec::new(), kind, index_type)
		});
		entry.0.push((sequence, column));
	}

	grouped
		.into_iter()
		.map(|(native_name, (mut columns, kind, index_type))| {
			columns.sort_by_key(|(sequence, _)| *sequence);
			let key_name = if kind == IndexKind::Primary {
				PRIMARY_KEY_NAME.to_string()
			} else {
				native_name.to_uppercase()
			};
			IndexDescription {
				key_name,
				native_name,
				columns: columns.into_iter().map(|(_, c)| c).collect(),
				kind,
				index_type,
			}
		})
		.collect()
}
