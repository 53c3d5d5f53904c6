//! Adapter scenarios against the scripted driver
//!
//! These tests drive the full adapter stack (builders, dialect, transaction
//! manager, DDL cache) without a database server. The scripted driver
//! records every statement and counts catalog round trips.

use rstest::*;
use strata_db::backends::testing::{MockColumn, MockDriver, MockOperation, MockTable};
use strata_db::backends::{
	Adapter, ConnectionConfig, DataType, DatabaseError, IndexKind, InMemorySharedCache, Order,
	QueryValue, SqlExpr, Where,
};
use strata_db::data;
use std::sync::Arc;

fn t_table() -> MockTable {
	MockTable::new()
		.column(MockColumn::new("id", "int", "int(11)").not_null())
		.column(MockColumn::new("name", "varchar", "varchar(50)").length(50))
		.primary_key("PRIMARY", &["id"])
}

#[fixture]
fn mysql() -> (Adapter, MockDriver) {
	let mock = MockDriver::mysql().with_table("shop", "t", t_table());
	let config = ConnectionConfig::mysql("shop", "app", "secret", "localhost", 3306);
	let adapter = Adapter::with_driver(config, Box::new(mock.clone())).unwrap();
	(adapter, mock)
}

#[fixture]
fn postgres() -> (Adapter, MockDriver) {
	let mock = MockDriver::postgres();
	let config = ConnectionConfig::postgres("shop", "app", "secret", "localhost", 5432);
	let adapter = Adapter::with_driver(config, Box::new(mock.clone())).unwrap();
	(adapter, mock)
}

#[rstest]
fn test_end_to_end_crud_keeps_describe_cache(mysql: (Adapter, MockDriver)) {
	// Arrange
	let (mut adapter, mock) = mysql;

	// Act
	let inserted = adapter
		.insert("t", data! { "id" => 1, "name" => "a'b" })
		.unwrap();
	let columns = adapter.describe_table("t", None).unwrap();
	let catalog_after_first_describe = mock.calls(MockOperation::Catalog);
	let updated = adapter
		.update("t", data! { "name" => "c" }, Where::eq("id", 1))
		.unwrap();
	let deleted = adapter.delete("t", Where::eq("id", 1)).unwrap();
	adapter.describe_table("t", None).unwrap();
	let catalog_before_reset = mock.calls(MockOperation::Catalog);
	adapter.reset_cache(Some("t"), None);
	adapter.describe_table("t", None).unwrap();

	// Assert
	assert_eq!(inserted, 1);
	assert_eq!(columns.len(), 2);
	assert_eq!(columns[1].name, "name");
	assert!(columns[1].nullable);
	assert_eq!(columns[1].length, Some(50));
	assert_eq!(columns[1].data_type, DataType::Varchar);
	assert!(columns[0].primary);
	assert_eq!(updated, 1);
	assert_eq!(deleted, 1);
	assert_eq!(catalog_before_reset, catalog_after_first_describe);
	assert!(mock.calls(MockOperation::Catalog) > catalog_before_reset);
}

#[rstest]
fn test_crud_statements_bind_data_and_inline_conditions(mysql: (Adapter, MockDriver)) {
	// Arrange
	let (mut adapter, mock) = mysql;

	// Act
	adapter
		.insert("t", data! { "id" => 1, "name" => "a'b" })
		.unwrap();
	adapter
		.update("t", data! { "name" => "c" }, Where::eq("id", 1))
		.unwrap();
	adapter.delete("t", Where::eq("id", 1)).unwrap();

	// Assert
	assert_eq!(
		mock.statements(),
		vec![
			"INSERT INTO `t` (`id`, `name`) VALUES (?, ?)".to_string(),
			"UPDATE `t` SET `name` = ? WHERE `id` = 1".to_string(),
			"DELETE FROM `t` WHERE `id` = 1".to_string(),
		]
	);
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(10)]
fn test_nested_commits_share_one_physical_transaction(
	postgres: (Adapter, MockDriver),
	#[case] depth: usize,
) {
	// Arrange
	let (mut adapter, mock) = postgres;

	// Act
	for _ in 0..depth {
		adapter.begin().unwrap();
	}
	let level_inside = adapter.transaction_level();
	for _ in 0..depth {
		adapter.commit().unwrap();
	}

	// Assert
	assert_eq!(level_inside, depth);
	assert_eq!(adapter.transaction_level(), 0);
	assert_eq!(mock.calls(MockOperation::Begin), 1);
	assert_eq!(mock.calls(MockOperation::Commit), 1);
}

#[rstest]
fn test_nested_rollback_closes_on_outermost_level(postgres: (Adapter, MockDriver)) {
	// Arrange
	let (mut adapter, mock) = postgres;
	adapter.begin().unwrap();
	adapter.begin().unwrap();

	// Act
	adapter.commit().unwrap();
	adapter.rollback().unwrap();

	// Assert
	assert_eq!(adapter.transaction_level(), 0);
	assert_eq!(mock.calls(MockOperation::Commit), 0);
	assert_eq!(mock.calls(MockOperation::Rollback), 1);
}

#[rstest]
fn test_failed_commit_still_closes_the_level(postgres: (Adapter, MockDriver)) {
	// Arrange
	let (mut adapter, mock) = postgres;
	adapter.begin().unwrap();
	mock.fail_next(MockOperation::Commit, "serialization failure");

	// Act
	let result = adapter.commit();

	// Assert
	assert!(matches!(result, Err(DatabaseError::Execution { .. })));
	assert_eq!(adapter.transaction_level(), 0);
}

#[rstest]
#[case("CREATE TABLE x (id INT)")]
#[case("  alter table t add column c int")]
#[case("DROP INDEX idx")]
#[case("TRUNCATE t")]
#[case("RENAME TABLE a TO b")]
fn test_ddl_inside_transaction_is_refused(postgres: (Adapter, MockDriver), #[case] sql: &str) {
	// Arrange
	let (mut adapter, mock) = postgres;
	adapter.begin().unwrap();

	// Act
	let result = adapter.query(sql, &[]);

	// Assert
	assert!(matches!(result, Err(DatabaseError::DdlInTransaction { .. })));
	assert_eq!(mock.calls(MockOperation::Execute), 0);
	assert_eq!(adapter.transaction_level(), 1);
}

#[rstest]
#[case("CREATE TEMPORARY TABLE scratch (id INT)")]
#[case("CREATE TEMP TABLE scratch (id INT)")]
#[case("CREATE LOCAL TEMPORARY TABLE scratch (id INT)")]
#[case("create global temp table scratch (id INT)")]
fn test_temporary_tables_are_allowed_inside_transaction(
	postgres: (Adapter, MockDriver),
	#[case] sql: &str,
) {
	// Arrange
	let (mut adapter, mock) = postgres;
	adapter.begin().unwrap();

	// Act
	let result = adapter.query(sql, &[]);

	// Assert
	assert!(result.is_ok());
	assert_eq!(mock.statements().last().map(String::as_str), Some(sql));
}

#[rstest]
fn test_empty_list_renders_always_false_membership(mysql: (Adapter, MockDriver)) {
	// Arrange
	let (mut adapter, mock) = mysql;
	let empty = QueryValue::list(Vec::<i64>::new());

	// Act
	let quoted = adapter.quote(&empty);
	adapter
		.delete("t", Where::map([("id", empty.clone())]))
		.unwrap();

	// Assert
	assert_eq!(quoted, "NULL");
	assert_eq!(
		mock.statements().last().map(String::as_str),
		Some("DELETE FROM `t` WHERE `id` IN (NULL)")
	);
}

#[rstest]
fn test_missing_table_describes_as_empty_and_is_not_cached(postgres: (Adapter, MockDriver)) {
	// Arrange
	let (mut adapter, mock) = postgres;

	// Act
	let before = adapter.describe_table("ghost", None).unwrap();
	mock.set_table(
		"public",
		"ghost",
		MockTable::new().column(MockColumn::new("id", "integer", "int4")),
	);
	let after = adapter.describe_table("ghost", None).unwrap();

	// Assert
	assert!(before.is_empty());
	assert_eq!(after.len(), 1);
	assert!(adapter.is_table_exists("ghost", None).unwrap());
	assert!(adapter.table_column_exists("ghost", "id", None).unwrap());
}

#[rstest]
fn test_catalog_failure_is_an_error_not_an_empty_result(postgres: (Adapter, MockDriver)) {
	// Arrange
	let (mut adapter, mock) = postgres;
	mock.fail_next(MockOperation::Catalog, "connection reset");

	// Act
	let result = adapter.describe_table("orders", None);

	// Assert
	assert!(matches!(result, Err(DatabaseError::Execution { .. })));
}

#[rstest]
fn test_rename_resets_both_tables(mysql: (Adapter, MockDriver)) {
	// Arrange
	let (mut adapter, mock) = mysql;
	adapter.describe_table("t", None).unwrap();
	let before = mock.calls(MockOperation::Catalog);

	// Act
	adapter.rename_table("t", "t_old").unwrap();
	mock.remove_table("shop", "t");
	let described = adapter.describe_table("t", None).unwrap();

	// Assert
	assert_eq!(
		mock.statements().last().map(String::as_str),
		Some("RENAME TABLE `t` TO `t_old`")
	);
	assert!(described.is_empty());
	assert!(mock.calls(MockOperation::Catalog) > before);
}

#[rstest]
fn test_shared_cache_serves_a_second_adapter() {
	// Arrange
	let shared = Arc::new(InMemorySharedCache::new());
	let first_mock = MockDriver::mysql().with_table("shop", "t", t_table());
	let second_mock = MockDriver::mysql().with_table("shop", "t", t_table());
	let config = ConnectionConfig::mysql("shop", "app", "secret", "localhost", 3306);
	let mut first = Adapter::with_driver(config.clone(), Box::new(first_mock))
		.unwrap()
		.with_shared_cache(shared.clone());
	let mut second = Adapter::with_driver(config, Box::new(second_mock.clone()))
		.unwrap()
		.with_shared_cache(shared.clone());

	// Act
	first.get_index_list("t", None).unwrap();
	let indexes = second.get_index_list("t", None).unwrap();

	// Assert
	assert_eq!(second_mock.calls(MockOperation::Catalog), 0);
	assert_eq!(indexes[0].key_name, "PRIMARY");
	assert_eq!(indexes[0].kind, IndexKind::Primary);
	assert_eq!(indexes[0].columns, vec!["id".to_string()]);
}

#[rstest]
fn test_select_builder_runs_through_the_adapter(postgres: (Adapter, MockDriver)) {
	// Arrange
	let (mut adapter, mock) = postgres;
	let query = adapter
		.select()
		.from("orders", Some("o"))
		.columns(["o.sku"])
		.column_as(SqlExpr::new("COUNT(*)"), "n")
		.where_value("o.qty > ?", 1)
		.group(["o.sku"])
		.order("o.sku", Order::Asc)
		.limit(10);

	// Act
	adapter.fetch_all(&query, &[]).unwrap();

	// Assert
	assert_eq!(
		mock.statements().last().map(String::as_str),
		Some(
			"SELECT \"o\".\"sku\", COUNT(*) AS \"n\" FROM \"orders\" AS \"o\" \
			 WHERE (o.qty > 1) GROUP BY \"o\".\"sku\" ORDER BY \"o\".\"sku\" ASC LIMIT 10"
		)
	);
}

#[rstest]
fn test_insert_ignore_and_upsert_on_mysql(mysql: (Adapter, MockDriver)) {
	// Arrange
	let (mut adapter, mock) = mysql;

	// Act
	adapter
		.insert_ignore("t", vec![data! { "id" => 1, "name" => "a" }])
		.unwrap();
	adapter
		.insert_on_duplicate("t", vec![data! { "id" => 1, "name" => "b" }], &[])
		.unwrap();

	// Assert
	let statements = mock.statements();
	assert_eq!(statements[0], "INSERT IGNORE INTO `t` (`id`, `name`) VALUES (?, ?)");
	assert_eq!(
		statements[1],
		"INSERT INTO `t` (`id`, `name`) VALUES (?, ?) ON DUPLICATE KEY UPDATE `name` = VALUES(`name`)"
	);
}

#[rstest]
fn test_closed_adapter_rejects_statements(postgres: (Adapter, MockDriver)) {
	// Arrange
	let (mut adapter, mock) = postgres;

	// Act
	adapter.close().unwrap();
	let result = adapter.query("SELECT 1", &[]);

	// Assert
	assert!(mock.is_closed());
	assert!(result.is_err());
}
