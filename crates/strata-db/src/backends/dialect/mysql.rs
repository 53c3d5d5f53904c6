//! MySQL dialect implementation

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

/// `LIMIT` used when only an offset is requested; MySQL has no offset-only form.
const MAX_LIMIT: u64 = u64::MAX;

/// MySQL / MariaDB dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
	pub fn new() -> Self {
		Self
	}

	fn data_type(data_type: &str, column_type: &str) -> DataType {
		match data_type.to_ascii_lowercase().as_str() {
			"tinyint" if column_type.eq_ignore_ascii_case("tinyint(1)") => DataType::Boolean,
			"bool" | "boolean" => DataType::Boolean,
			"tinyint" | "smallint" => DataType::SmallInt,
			"mediumint" | "int" | "integer" => DataType::Integer,
			"bigint" => DataType::BigInt,
			"decimal" | "numeric" => DataType::Decimal,
			"float" => DataType::Float,
			"double" | "real" => DataType::Double,
			"char" => DataType::Char,
			"varchar" => DataType::Varchar,
			"tinytext" | "text" | "mediumtext" | "longtext" => DataType::Text,
			"tinyblob" | "blob" | "mediumblob" | "longblob" | "binary" | "varbinary" => DataType::Blob,
			"date" => DataType::Date,
			"datetime" => DataType::DateTime,
			"timestamp" => DataType::Timestamp,
			"time" => DataType::Time,
			"json" => DataType::Json,
			other => DataType::Other(other.to_string()),
		}
	}
}

impl Dialect for MySqlDialect {
	fn database_type(&self) -> DatabaseType {
		DatabaseType::Mysql
	}

	fn quote_char(&self) -> char {
		'`'
	}

	fn identifier_max_length(&self) -> usize {
		64
	}

	fn placeholder(&self, _index: usize) -> String {
		"?".to_string()
	}

	/// Escapes the characters `mysql_real_escape_string` escapes. Assumes the
	/// server runs without `NO_BACKSLASH_ESCAPES`.
	fn quote_string(&self, value: &str) -> String {
		let mut quoted = String::with_capacity(value.len() + 2);
		quoted.push('\'');
		for c in value.chars() {
			match c {
				'\0' => quoted.push_str("\\0"),
				'\n' => quoted.push_str("\\n"),
				'\r' => quoted.push_str("\\r"),
				'\\' => quoted.push_str("\\\\"),
				'\'' => quoted.push_str("\\'"),
				'"' => quoted.push_str("\\\""),
				'\x1a' => quoted.push_str("\\Z"),
				c => quoted.push(c),
			}
		}
		quoted.push('\'');
		quoted
	}

	fn quote_bool(&self, value: bool) -> &'static str {
		if value { "1" } else { "0" }
	}

	fn quote_bytes(&self, value: &[u8]) -> String {
		let hex: String = value.iter().map(|b| format!("{b:02x}")).collect();
		format!("X'{hex}'")
	}

	fn concat(&self, parts: &[&str], separator: Option<&str>) -> SqlExpr {
		match separator {
			Some(separator) => SqlExpr::new(format!("CONCAT_WS({separator}, {})", parts.join(", "))),
			None => SqlExpr::new(format!("CONCAT({})", parts.join(", "))),
		}
	}

	fn substring(&self, expr: &str, position: i64, length: Option<i64>) -> SqlExpr {
		match length {
			Some(length) => SqlExpr::new(format!("SUBSTRING({expr}, {position}, {length})")),
			None => SqlExpr::new(format!("SUBSTRING({expr}, {position})")),
		}
	}

	fn date_add(&self, date: &str, interval: &str, unit: IntervalUnit) -> SqlExpr {
		SqlExpr::new(format!("DATE_ADD({date}, INTERVAL {interval} {})", unit.keyword()))
	}

	fn date_sub(&self, date: &str, interval: &str, unit: IntervalUnit) -> SqlExpr {
		SqlExpr::new(format!("DATE_SUB({date}, INTERVAL {interval} {})", unit.keyword()))
	}

	fn date_format(&self, date: &str, format: &str) -> SqlExpr {
		SqlExpr::new(format!("DATE_FORMAT({date}, {})", self.quote_string(format)))
	}

	fn date_part(&self, part: DatePart, date: &str) -> SqlExpr {
		let sql = match part {
			DatePart::Year => format!("EXTRACT(YEAR FROM {date})"),
			DatePart::Quarter => format!("EXTRACT(QUARTER FROM {date})"),
			DatePart::Month => format!("EXTRACT(MONTH FROM {date})"),
			DatePart::Week => format!("WEEK({date}, 3)"),
			DatePart::Day => format!("EXTRACT(DAY FROM {date})"),
			DatePart::Hour => format!("EXTRACT(HOUR FROM {date})"),
			DatePart::Minute => format!("EXTRACT(MINUTE FROM {date})"),
			DatePart::Second => format!("EXTRACT(SECOND FROM {date})"),
			DatePart::DayOfWeek => format!("DAYOFWEEK({date})"),
			DatePart::DayOfYear => format!("DAYOFYEAR({date})"),
		};
		SqlExpr::new(sql)
	}

	fn date_diff(&self, end: &str, start: &str) -> SqlExpr {
		SqlExpr::new(format!("DATEDIFF({end}, {start})"))
	}

	fn unix_timestamp(&self, date: &str) -> SqlExpr {
		SqlExpr::new(format!("UNIX_TIMESTAMP({date})"))
	}

	fn from_unix_time(&self, timestamp: &str) -> SqlExpr {
		SqlExpr::new(format!("FROM_UNIXTIME({timestamp})"))
	}

	// DATE_ADD with a YEAR interval clamps Feb-29 to Feb-28 in non-leap years.
	// Both candidates are computed from the original field so a leap-day
	// anniversary lands on Feb-29 again whenever the target year allows it.
	fn days_to_anniversary(&self, field: &str, reference: &str) -> SqlExpr {
		let reference_date = format!("DATE({reference})");
		let years = format!("YEAR({reference}) - YEAR({field})");
		let this_year = format!("DATE_ADD({field}, INTERVAL ({years}) YEAR)");
		let next_year = format!("DATE_ADD({field}, INTERVAL ({years} + 1) YEAR)");
		SqlExpr::new(format!(
			"CASE WHEN {this_year} < {reference_date} THEN DATEDIFF({next_year}, {reference_date}) ELSE DATEDIFF({this_year}, {reference_date}) END"
		))
	}

	fn check(&self, condition: &str, when_true: &str, when_false: &str) -> SqlExpr {
		SqlExpr::new(format!("IF({condition}, {when_true}, {when_false})"))
	}

	fn if_null(&self, expr: &str, fallback: &str) -> SqlExpr {
		SqlExpr::new(format!("IFNULL({expr}, {fallback})"))
	}

	fn insert_ignore_verb(&self) -> &'static str {
		"INSERT IGNORE INTO"
	}

	fn insert_ignore_suffix(&self) -> Option<&'static str> {
		None
	}

	fn upsert_clause(&self, _conflict_columns: &[&str], update_columns: &[&str]) -> Result<String> {
		if update_columns.is_empty() {
			return Err(DatabaseError::InvalidArgument(
				"ON DUPLICATE KEY UPDATE needs at least one column to update".to_string(),
			));
		}
		let assignments = update_columns
			.iter()
			.map(|c| {
				let column = self.quote_identifier(c);
				format!("{column} = VALUES({column})")
			})
			.collect::<Vec<_>>()
			.join(", ");
		Ok(format!("ON DUPLICATE KEY UPDATE {assignments}"))
	}

	fn upsert_requires_conflict_target(&self) -> bool {
		false
	}

	fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
		match (limit, offset) {
			(Some(limit), Some(offset)) => format!("LIMIT {limit} OFFSET {offset}"),
			(Some(limit), None) => format!("LIMIT {limit}"),
			(None, Some(offset)) => format!("LIMIT {MAX_LIMIT} OFFSET {offset}"),
			(None, None) => String::new(),
		}
	}

	fn json_extract(&self, column: &str, path: &str) -> Result<SqlExpr> {
		validate_json_path(path, true)?;
		Ok(SqlExpr::new(format!(
			"JSON_EXTRACT({column}, {})",
			self.quote_string(path)
		)))
	}

	/// `JSON_SEARCH` only matches string scalars.
	fn json_search(&self, column: &str, path: &str, needle: &str) -> Result<SqlExpr> {
		validate_json_path(path, true)?;
		Ok(SqlExpr::new(format!(
			"JSON_SEARCH({column}, 'one', {needle}, NULL, {}) IS NOT NULL",
			self.quote_string(path)
		)))
	}

	fn json_contains(&self, column: &str, path: &str, candidate: &str) -> Result<SqlExpr> {
		validate_json_path(path, false)?;
		Ok(SqlExpr::new(format!(
			"JSON_CONTAINS({column}, {candidate}, {})",
			self.quote_string(path)
		)))
	}

	fn acquire_lock(&self, name: &str, timeout_secs: i64) -> Result<SqlExpr> {
		let timeout = if timeout_secs < 0 { -1 } else { timeout_secs };
		Ok(SqlExpr::new(format!(
			"COALESCE(GET_LOCK({}, {timeout}), 0) = 1",
			self.quote_string(name)
		)))
	}

	fn release_lock(&self, name: &str) -> Result<SqlExpr> {
		Ok(SqlExpr::new(format!(
			"COALESCE(RELEASE_LOCK({}), 0) = 1",
			self.quote_string(name)
		)))
	}

	fn is_locked(&self, name: &str) -> Result<SqlExpr> {
		Ok(SqlExpr::new(format!(
			"IS_USED_LOCK({}) IS NOT NULL",
			self.quote_string(name)
		)))
	}

	fn rename_table_sql(&self, from: &str, to: &str) -> String {
		format!(
			"RENAME TABLE {} TO {}",
			self.quote_identifier(from),
			self.quote_identifier(to)
		)
	}

	fn add_index_sql(&self, table: &str, name: &str, columns: &[&str], kind: IndexKind) -> Result<String> {
		let table = self.quote_identifier(table);
		let columns = quoted_column_list(self, columns);
		let sql = match kind {
			IndexKind::Primary => format!("ALTER TABLE {table} ADD PRIMARY KEY ({columns})"),
			IndexKind::Unique => format!(
				"CREATE UNIQUE INDEX {} ON {table} ({columns})",
				self.quote_identifier(name)
			),
			IndexKind::Index => format!(
				"CREATE INDEX {} ON {table} ({columns})",
				self.quote_identifier(name)
			),
			IndexKind::Fulltext => format!(
				"CREATE FULLTEXT INDEX {} ON {table} ({columns})",
				self.quote_identifier(name)
			),
		};
		Ok(sql)
	}

	fn drop_index_sql(&self, table: &str, name: &str) -> String {
		if name.eq_ignore_ascii_case("PRIMARY") {
			return self.drop_primary_key_sql(table, name);
		}
		format!(
			"DROP INDEX {} ON {}",
			self.quote_identifier(split_qualified(name).1),
			self.quote_identifier(table)
		)
	}

	fn drop_primary_key_sql(&self, table: &str, _constraint_name: &str) -> String {
		format!("ALTER TABLE {} DROP PRIMARY KEY", self.quote_identifier(table))
	}

	fn drop_foreign_key_sql(&self, table: &str, name: &str) -> String {
		format!(
			"ALTER TABLE {} DROP FOREIGN KEY {}",
			self.quote_identifier(table),
			self.quote_identifier(name)
		)
	}

	fn convert_columns(&self, table: &TableRef, rows: &[Row]) -> Vec<ColumnDescription> {
		rows.iter()
			.filter_map(|row| {
				let name = row.text("column_name")?;
				let data_type = row.text("data_type").unwrap_or_default();
				let column_type = row.text("column_type").unwrap_or_else(|| data_type.clone());
				let extra = row.text("extra").unwrap_or_default().to_ascii_lowercase();
				let primary = row
					.text("column_key")
					.is_some_and(|key| key.eq_ignore_ascii_case("PRI"));
				Some(ColumnDescription {
					schema: table.schema.clone(),
					table: table.table.clone(),
					name,
					position: row.integer("ordinal_position").unwrap_or(0) as u32,
					data_type: Self::data_type(&data_type, &column_type),
					unsigned: column_type.to_ascii_lowercase().contains("unsigned"),
					native_type: column_type,
					default: row.text("column_default"),
					nullable: row
						.text("is_nullable")
						.is_some_and(|n| n.eq_ignore_ascii_case("YES")),
					length: row.integer("character_maximum_length").map(|l| l as u64),
					precision: row.integer("numeric_precision").map(|p| p as u32),
					scale: row.integer("numeric_scale").map(|s| s as u32),
					primary,
					primary_position: None,
					identity: extra.contains("auto_increment"),
				})
			})
			.collect()
	}

	fn convert_indexes(&self, rows: &[Row]) -> Vec<IndexDescription> {
		group_index_rows(rows, |name, row| {
			let index_type = row.text("index_type");
			let kind = if name.eq_ignore_ascii_case("PRIMARY") {
				IndexKind::Primary
			} else if index_type
				.as_deref()
				.is_some_and(|t| t.eq_ignore_ascii_case("FULLTEXT"))
			{
				IndexKind::Fulltext
			} else if row.integer("non_unique") == Some(0) {
				IndexKind::Unique
			} else {
				IndexKind::Index
			};
			(kind, index_type)
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
					on_delete: row
						.text("on_delete")
						.and_then(|r| ForeignKeyAction::from_rule(&r))
						.unwrap_or(ForeignKeyAction::Restrict),
					on_update: row
						.text("on_update")
						.and_then(|r| ForeignKeyAction::from_rule(&r))
						.unwrap_or(ForeignKeyAction::Restrict),
				})
			})
			.collect()
	}

	fn default_schema(&self, database: &str) -> String {
		database.to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::backends::types::QueryValue;
	use rstest::{fixture, rstest};

	#[fixture]
	fn dialect() -> MySqlDialect {
		MySqlDialect::new()
	}

	fn row(pairs: &[(&str, QueryValue)]) -> Row {
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.clone()))
			.collect()
	}

	#[rstest]
	#[case("a'b", "'a\\'b'")]
	#[case("back\\slash", "'back\\\\slash'")]
	#[case("line\nbreak", "'line\\nbreak'")]
	#[case("nul\0", "'nul\\0'")]
	#[case("say \"hi\"", "'say \\\"hi\\\"'")]
	#[case("日本語", "'日本語'")]
	fn test_quote_string_escapes(dialect: MySqlDialect, #[case] input: &str, #[case] expected: &str) {
		// Act
		let quoted = dialect.quote_string(input);

		// Assert
		assert_eq!(quoted, expected);
	}

	#[rstest]
	fn test_quote_bytes_and_bool(dialect: MySqlDialect) {
		// Act & Assert
		assert_eq!(dialect.quote_bytes(&[0x0a, 0xff]), "X'0aff'");
		assert_eq!(dialect.quote_bool(true), "1");
		assert_eq!(dialect.quote_bool(false), "0");
	}

	#[rstest]
	fn test_concat_with_and_without_separator(dialect: MySqlDialect) {
		// Act
		let plain = dialect.concat(&["first", "last"], None);
		let separated = dialect.concat(&["first", "last"], Some("' '"));

		// Assert
		assert_eq!(plain.as_str(), "CONCAT(first, last)");
		assert_eq!(separated.as_str(), "CONCAT_WS(' ', first, last)");
	}

	#[rstest]
	fn test_date_arithmetic(dialect: MySqlDialect) {
		// Act
		let added = dialect.date_add("created_at", "3", IntervalUnit::Day);
		let subtracted = dialect.date_sub("NOW()", "1", IntervalUnit::Month);

		// Assert
		assert_eq!(added.as_str(), "DATE_ADD(created_at, INTERVAL 3 DAY)");
		assert_eq!(subtracted.as_str(), "DATE_SUB(NOW(), INTERVAL 1 MONTH)");
	}

	#[rstest]
	fn test_days_to_anniversary_rolls_from_original_date(dialect: MySqlDialect) {
		// Act
		let expr = dialect.days_to_anniversary("dob", "'2024-03-01'");

		// Assert
		assert_eq!(
			expr.as_str(),
			"CASE WHEN DATE_ADD(dob, INTERVAL (YEAR('2024-03-01') - YEAR(dob)) YEAR) < DATE('2024-03-01') \
			 THEN DATEDIFF(DATE_ADD(dob, INTERVAL (YEAR('2024-03-01') - YEAR(dob) + 1) YEAR), DATE('2024-03-01')) \
			 ELSE DATEDIFF(DATE_ADD(dob, INTERVAL (YEAR('2024-03-01') - YEAR(dob)) YEAR), DATE('2024-03-01')) END"
		);
	}

	#[rstest]
	fn test_upsert_clause_uses_values(dialect: MySqlDialect) {
		// Act
		let clause = dialect.upsert_clause(&[], &["name", "qty"]).unwrap();

		// Assert
		assert_eq!(
			clause,
			"ON DUPLICATE KEY UPDATE `name` = VALUES(`name`), `qty` = VALUES(`qty`)"
		);
	}

	#[rstest]
	fn test_upsert_clause_requires_update_columns(dialect: MySqlDialect) {
		// Act
		let result = dialect.upsert_clause(&["id"], &[]);

		// Assert
		assert!(matches!(result, Err(DatabaseError::InvalidArgument(_))));
	}

	#[rstest]
	#[case(Some(10), Some(20), "LIMIT 10 OFFSET 20")]
	#[case(Some(10), None, "LIMIT 10")]
	#[case(None, Some(5), "LIMIT 18446744073709551615 OFFSET 5")]
	#[case(None, None, "")]
	fn test_limit_offset(
		dialect: MySqlDialect,
		#[case] limit: Option<u64>,
		#[case] offset: Option<u64>,
		#[case] expected: &str,
	) {
		// Act & Assert
		assert_eq!(dialect.limit_offset(limit, offset), expected);
	}

	#[rstest]
	fn test_json_operations(dialect: MySqlDialect) {
		// Act
		let extract = dialect.json_extract("attrs", "$.color").unwrap();
		let search = dialect.json_search("attrs", "$.tags[*]", "'red'").unwrap();
		let contains = dialect.json_contains("attrs", "$.tags", "'[\"red\"]'").unwrap();

		// Assert
		assert_eq!(extract.as_str(), "JSON_EXTRACT(attrs, '$.color')");
		assert_eq!(
			search.as_str(),
			"JSON_SEARCH(attrs, 'one', 'red', NULL, '$.tags[*]') IS NOT NULL"
		);
		assert_eq!(contains.as_str(), "JSON_CONTAINS(attrs, '[\"red\"]', '$.tags')");
	}

	#[rstest]
	fn test_json_contains_rejects_wildcards(dialect: MySqlDialect) {
		// Act
		let result = dialect.json_contains("attrs", "$.tags[*]", "'\"red\"'");

		// Assert
		assert!(matches!(result, Err(DatabaseError::InvalidArgument(_))));
	}

	#[rstest]
	#[case(0, "COALESCE(GET_LOCK('jobs', 0), 0) = 1")]
	#[case(-5, "COALESCE(GET_LOCK('jobs', -1), 0) = 1")]
	#[case(30, "COALESCE(GET_LOCK('jobs', 30), 0) = 1")]
	fn test_acquire_lock(dialect: MySqlDialect, #[case] timeout: i64, #[case] expected: &str) {
		// Act
		let expr = dialect.acquire_lock("jobs", timeout).unwrap();

		// Assert
		assert_eq!(expr.as_str(), expected);
	}

	#[rstest]
	fn test_ddl_rendering(dialect: MySqlDialect) {
		// Act & Assert
		assert_eq!(
			dialect.rename_table_sql("old", "new"),
			"RENAME TABLE `old` TO `new`"
		);
		assert_eq!(
			dialect.drop_index_sql("orders", "IDX_ORDERS_EMAIL"),
			"DROP INDEX `IDX_ORDERS_EMAIL` ON `orders`"
		);
		assert_eq!(
			dialect.drop_index_sql("orders", "primary"),
			"ALTER TABLE `orders` DROP PRIMARY KEY"
		);
		assert_eq!(
			dialect.drop_foreign_key_sql("orders", "FK_X"),
			"ALTER TABLE `orders` DROP FOREIGN KEY `FK_X`"
		);
		assert_eq!(
			dialect
				.add_index_sql("posts", "FTI_POSTS_BODY", &["body"], IndexKind::Fulltext)
				.unwrap(),
			"CREATE FULLTEXT INDEX `FTI_POSTS_BODY` ON `posts` (`body`)"
		);
	}

	#[rstest]
	fn test_convert_columns_reads_information_schema_shape(dialect: MySqlDialect) {
		// Arrange
		let rows = vec![
			row(&[
				("column_name", QueryValue::from("id")),
				("ordinal_position", QueryValue::Int(1)),
				("data_type", QueryValue::from("int")),
				("column_type", QueryValue::from("int unsigned")),
				("is_nullable", QueryValue::from("NO")),
				("column_default", QueryValue::Null),
				("character_maximum_length", QueryValue::Null),
				("numeric_precision", QueryValue::Int(10)),
				("numeric_scale", QueryValue::Int(0)),
				("column_key", QueryValue::from("PRI")),
				("extra", QueryValue::from("auto_increment")),
			]),
			row(&[
				("column_name", QueryValue::from("name")),
				("ordinal_position", QueryValue::Int(2)),
				("data_type", QueryValue::from("varchar")),
				("column_type", QueryValue::from("varchar(50)")),
				("is_nullable", QueryValue::from("YES")),
				("column_default", QueryValue::Null),
				("character_maximum_length", QueryValue::Int(50)),
				("numeric_precision", QueryValue::Null),
				("numeric_scale", QueryValue::Null),
				("column_key", QueryValue::from("")),
				("extra", QueryValue::from("")),
			]),
		];
		let table = TableRef::new("shop", "t");

		// Act
		let columns = dialect.convert_columns(&table, &rows);

		// Assert
		assert_eq!(columns.len(), 2);
		assert_eq!(columns[0].data_type, DataType::Integer);
		assert!(columns[0].unsigned);
		assert!(columns[0].primary);
		assert!(columns[0].identity);
		assert!(!columns[0].nullable);
		assert_eq!(columns[1].name, "name");
		assert_eq!(columns[1].data_type, DataType::Varchar);
		assert_eq!(columns[1].length, Some(50));
		assert!(columns[1].nullable);
	}

	#[rstest]
	fn test_convert_indexes_classifies_kinds(dialect: MySqlDialect) {
		// Arrange
		let index_row = |name: &str, column: &str, non_unique: i64, index_type: &str| {
			row(&[
				("index_name", QueryValue::from(name)),
				("column_name", QueryValue::from(column)),
				("seq_in_index", QueryValue::Int(1)),
				("non_unique", QueryValue::Int(non_unique)),
				("index_type", QueryValue::from(index_type)),
			])
		};
		let rows = vec![
			index_row("PRIMARY", "id", 0, "BTREE"),
			index_row("unq_email", "email", 0, "BTREE"),
			index_row("fti_body", "body", 1, "FULLTEXT"),
			index_row("idx_name", "name", 1, "BTREE"),
		];

		// Act
		let indexes = dialect.convert_indexes(&rows);

		// Assert
		let kinds: Vec<(&str, IndexKind)> = indexes
			.iter()
			.map(|i| (i.key_name.as_str(), i.kind))
			.collect();
		assert_eq!(
			kinds,
			vec![
				("PRIMARY", IndexKind::Primary),
				("UNQ_EMAIL", IndexKind::Unique),
				("FTI_BODY", IndexKind::Fulltext),
				("IDX_NAME", IndexKind::Index),
			]
		);
	}

	#[rstest]
	fn test_convert_foreign_keys_parses_rules(dialect: MySqlDialect) {
		// Arrange
		let rows = vec![row(&[
			("constraint_name", QueryValue::from("FK_ORDER_CUSTOMER")),
			("column_name", QueryValue::from("customer_id")),
			("ref_schema", QueryValue::from("shop")),
			("ref_table", QueryValue::from("customer")),
			("ref_column", QueryValue::from("id")),
			("on_delete", QueryValue::from("CASCADE")),
			("on_update", QueryValue::from("NO ACTION")),
		])];

		// Act
		let keys = dialect.convert_foreign_keys(&TableRef::new("shop", "orders"), &rows);

		// Assert
		assert_eq!(keys.len(), 1);
		assert_eq!(keys[0].ref_table, "customer");
		assert_eq!(keys[0].on_delete, ForeignKeyAction::Cascade);
		assert_eq!(keys[0].on_update, ForeignKeyAction::NoAction);
	}
}
