//! MySQL integration tests
//!
//! Runs the adapter against a real MySQL server started with TestContainers.

use std::cell::RefCell;

use proptest::prelude::*;
use proptest::test_runner::{Config, TestRunner};
use rstest::*;
use serial_test::serial;
use strata_db::backends::{
	Adapter, ConnectionConfig, DataType, ForeignKeyAction, IndexKind, QueryValue, Where,
};
use strata_db::data;
use testcontainers::runners::SyncRunner;
use testcontainers::{Container, ImageExt};
use testcontainers_modules::mysql::Mysql;

#[fixture]
fn mysql() -> (Container<Mysql>, Adapter) {
	let container = Mysql::default()
		.with_env_var("MYSQL_ROOT_PASSWORD", "test")
		.with_env_var("MYSQL_DATABASE", "test")
		.start()
		.expect("Failed to start MySQL container");
	let port = container.get_host_port_ipv4(3306).unwrap();
	let config = ConnectionConfig::mysql("test", "root", "test", "127.0.0.1", port);
	let adapter = Adapter::connect(config).expect("Failed to connect to MySQL");
	(container, adapter)
}

#[rstest]
#[serial(mysql)]
#[ignore] // Requires Docker
fn test_quoted_strings_round_trip(mysql: (Container<Mysql>, Adapter)) {
	// Arrange
	let (_container, adapter) = mysql;
	let adapter = RefCell::new(adapter);
	let mut runner = TestRunner::new(Config {
		cases: 128,
		..Config::default()
	});
	let strings = prop_oneof![
		"\\PC{0,40}",
		"['\\\\\"\\n\\x00\\x1a ]{0,8}",
		Just("multi-byte: ñ 日本語 🚀".to_string()),
	];

	// Act & Assert
	runner
		.run(&strings, |value| {
			let mut adapter = adapter.borrow_mut();
			let quoted = adapter.quote(&QueryValue::from(value.as_str()));
			let sql = format!("SELECT {quoted} AS v");
			let fetched = adapter.fetch_one(sql.as_str(), &[]).unwrap();
			prop_assert_eq!(fetched, Some(QueryValue::from(value.as_str())));
			Ok(())
		})
		.unwrap();
}

#[rstest]
#[serial(mysql)]
#[ignore] // Requires Docker
fn test_end_to_end_scenario(mysql: (Container<Mysql>, Adapter)) {
	// Arrange
	let (_container, mut adapter) = mysql;
	adapter
		.query("CREATE TABLE t (id INT PRIMARY KEY, name VARCHAR(50))", &[])
		.unwrap();

	// Act
	adapter
		.insert("t", data! { "id" => 1, "name" => "a'b" })
		.unwrap();
	let columns = adapter.describe_table("t", None).unwrap();
	let stored = adapter
		.fetch_one("SELECT name FROM t WHERE id = ?", &[QueryValue::Int(1)])
		.unwrap();
	let updated = adapter
		.update("t", data! { "name" => "c" }, Where::eq("id", 1))
		.unwrap();
	let deleted = adapter.delete("t", Where::eq("id", 1)).unwrap();

	// Assert
	assert_eq!(columns.len(), 2);
	assert_eq!(columns[0].name, "id");
	assert!(columns[0].primary);
	assert_eq!(columns[1].name, "name");
	assert!(columns[1].nullable);
	assert_eq!(columns[1].length, Some(50));
	assert_eq!(columns[1].data_type, DataType::Varchar);
	assert_eq!(stored, Some(QueryValue::from("a'b")));
	assert_eq!(updated, 1);
	assert_eq!(deleted, 1);
}

#[rstest]
#[serial(mysql)]
#[ignore] // Requires Docker
fn test_empty_in_list_matches_nothing(mysql: (Container<Mysql>, Adapter)) {
	// Arrange
	let (_container, mut adapter) = mysql;
	adapter
		.query("CREATE TABLE n (x INT NOT NULL)", &[])
		.unwrap();
	adapter
		.insert_multiple("n", vec![data! { "x" => 1 }, data! { "x" => 2 }])
		.unwrap();
	let empty = QueryValue::list(Vec::<i64>::new());

	// Act
	let sql = format!("SELECT COUNT(*) FROM n WHERE x IN ({})", adapter.quote(&empty));
	let count = adapter.fetch_one(sql.as_str(), &[]).unwrap();

	// Assert
	assert_eq!(count, Some(QueryValue::Int(0)));
}

#[rstest]
#[serial(mysql)]
#[ignore] // Requires Docker
fn test_nested_rollback_discards_inner_work(mysql: (Container<Mysql>, Adapter)) {
	// Arrange
	let (_container, mut adapter) = mysql;
	adapter
		.query("CREATE TABLE tx (id INT PRIMARY KEY) ENGINE=InnoDB", &[])
		.unwrap();

	// Act
	adapter.begin().unwrap();
	adapter.begin().unwrap();
	adapter.insert("tx", data! { "id" => 1 }).unwrap();
	adapter.commit().unwrap();
	adapter.rollback().unwrap();
	let count = adapter.fetch_one("SELECT COUNT(*) FROM tx", &[]).unwrap();

	// Assert
	assert_eq!(count, Some(QueryValue::Int(0)));
	assert_eq!(adapter.transaction_level(), 0);
}

#[rstest]
#[serial(mysql)]
#[ignore] // Requires Docker
fn test_upsert_and_last_insert_id(mysql: (Container<Mysql>, Adapter)) {
	// Arrange
	let (_container, mut adapter) = mysql;
	adapter
		.query(
			"CREATE TABLE stock (id INT AUTO_INCREMENT PRIMARY KEY, sku VARCHAR(20) NOT NULL UNIQUE, qty INT)",
			&[],
		)
		.unwrap();

	// Act
	adapter
		.insert("stock", data! { "sku" => "A-1", "qty" => 1 })
		.unwrap();
	let id = adapter.last_insert_id().unwrap();
	adapter
		.insert_on_duplicate("stock", vec![data! { "sku" => "A-1", "qty" => 5 }], &["qty"])
		.unwrap();
	adapter
		.insert_ignore("stock", vec![data! { "sku" => "A-1", "qty" => 9 }])
		.unwrap();
	let qty = adapter
		.fetch_one("SELECT qty FROM stock WHERE sku = 'A-1'", &[])
		.unwrap();

	// Assert
	assert_eq!(id, Some(1));
	assert_eq!(qty, Some(QueryValue::Int(5)));
}

#[rstest]
#[serial(mysql)]
#[ignore] // Requires Docker
fn test_indexes_and_foreign_keys(mysql: (Container<Mysql>, Adapter)) {
	// Arrange
	let (_container, mut adapter) = mysql;
	adapter
		.query("CREATE TABLE parent (id INT PRIMARY KEY)", &[])
		.unwrap();
	adapter
		.query("CREATE TABLE child (id INT PRIMARY KEY, parent_id INT, code VARCHAR(10))", &[])
		.unwrap();

	// Act
	let index = adapter
		.add_index("child", None, &["code"], IndexKind::Unique)
		.unwrap();
	let fk = adapter
		.add_foreign_key(None, "child", "parent_id", "parent", "id", ForeignKeyAction::Cascade)
		.unwrap();
	let indexes = adapter.get_index_list("child", None).unwrap();
	let foreign_keys = adapter.get_foreign_keys("child", None).unwrap();

	// Assert
	assert_eq!(index, "UNQ_CHILD_CODE");
	assert_eq!(indexes[0].key_name, "PRIMARY");
	assert!(
		indexes
			.iter()
			.any(|i| i.key_name == "UNQ_CHILD_CODE" && i.kind == IndexKind::Unique)
	);
	assert_eq!(foreign_keys.len(), 1);
	assert_eq!(foreign_keys[0].name, fk);
	assert_eq!(foreign_keys[0].ref_table, "parent");
	assert_eq!(foreign_keys[0].on_delete, ForeignKeyAction::Cascade);
}

#[rstest]
#[serial(mysql)]
#[ignore] // Requires Docker
fn test_advisory_locks(mysql: (Container<Mysql>, Adapter)) {
	// Arrange
	let (_container, mut adapter) = mysql;

	// Act
	let acquired = adapter.get_lock("nightly-import", 0).unwrap();
	let held = adapter.is_locked("nightly-import").unwrap();
	let released = adapter.release_lock("nightly-import").unwrap();
	let held_after = adapter.is_locked("nightly-import").unwrap();

	// Assert
	assert!(acquired);
	assert!(held);
	assert!(released);
	assert!(!held_after);
}

#[rstest]
#[serial(mysql)]
#[ignore] // Requires Docker
fn test_list_tables(mysql: (Container<Mysql>, Adapter)) {
	// Arrange
	let (_container, mut adapter) = mysql;
	adapter
		.query("CREATE TABLE listed (id INT)", &[])
		.unwrap();

	// Act
	let tables = adapter.list_tables(None).unwrap();

	// Assert
	assert!(tables.contains(&"listed".to_string()));
}

#[rstest]
#[case("2023-02-27", 1)]
#[case("2023-03-01", 365)]
#[case("2024-02-28", 1)]
#[case("2024-02-29", 0)]
#[serial(mysql)]
#[ignore] // Requires Docker
fn test_days_to_anniversary_of_leap_day(
	mysql: (Container<Mysql>, Adapter),
	#[case] reference: &str,
	#[case] expected: i64,
) {
	// Arrange
	let (_container, mut adapter) = mysql;
	let days = adapter
		.platform()
		.days_to_anniversary("DATE('2000-02-29')", &format!("DATE('{reference}')"));

	// Act
	let fetched = adapter
		.fetch_one(format!("SELECT {days} AS days").as_str(), &[])
		.unwrap();

	// Assert
	assert_eq!(fetched, Some(QueryValue::Int(expected)));
}
