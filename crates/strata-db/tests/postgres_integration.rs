//! PostgreSQL integration tests
//!
//! Runs the adapter against a real PostgreSQL server started with TestContainers.

use std::cell::RefCell;

use proptest::prelude::*;
use proptest::test_runner::{Config, TestRunner};
use rstest::*;
use serial_test::serial;
use strata_db::backends::{
	Adapter, ConnectionConfig, DataType, DatabaseError, ForeignKeyAction, IndexKind, QueryValue,
	Where,
};
use strata_db::data;
use testcontainers::runners::SyncRunner;
use testcontainers::{Container, ImageExt};
use testcontainers_modules::postgres::Postgres;

#[fixture]
fn postgres() -> (Container<Postgres>, Adapter) {
	let container = Postgres::default()
		.with_env_var("POSTGRES_USER", "postgres")
		.with_env_var("POSTGRES_PASSWORD", "postgres")
		.with_env_var("POSTGRES_DB", "test")
		.start()
		.expect("Failed to start PostgreSQL container");
	let port = container.get_host_port_ipv4(5432).unwrap();
	let config = ConnectionConfig::postgres("test", "postgres", "postgres", "127.0.0.1", port);
	let adapter = Adapter::connect(config).expect("Failed to connect to PostgreSQL");
	(container, adapter)
}

#[rstest]
#[serial(postgres)]
#[ignore] // Requires Docker
fn test_quoted_strings_round_trip(postgres: (Container<Postgres>, Adapter)) {
	// Arrange
	let (_container, adapter) = postgres;
	let adapter = RefCell::new(adapter);
	let mut runner = TestRunner::new(Config {
		cases: 128,
		..Config::default()
	});
	// Text values cannot hold NUL on PostgreSQL.
	let strings = prop_oneof![
		"[^\\x00]{0,40}",
		"['\\\\\"\\n ]{0,8}",
		Just("multi-byte: ñ 日本語 🚀".to_string()),
	];

	// Act & Assert
	runner
		.run(&strings, |value| {
			let mut adapter = adapter.borrow_mut();
			let quoted = adapter.quote(&QueryValue::from(value.as_str()));
			let sql = format!("SELECT CAST({quoted} AS TEXT) AS v");
			let fetched = adapter.fetch_one(sql.as_str(), &[]).unwrap();
			prop_assert_eq!(fetched, Some(QueryValue::from(value.as_str())));
			Ok(())
		})
		.unwrap();
}

#[rstest]
#[serial(postgres)]
#[ignore] // Requires Docker
fn test_end_to_end_scenario(postgres: (Container<Postgres>, Adapter)) {
	// Arrange
	let (_container, mut adapter) = postgres;
	adapter
		.query("CREATE TABLE t (id INT PRIMARY KEY, name VARCHAR(50))", &[])
		.unwrap();

	// Act
	adapter
		.insert("t", data! { "id" => 1, "name" => "a'b" })
		.unwrap();
	let columns = adapter.describe_table("t", None).unwrap();
	let updated = adapter
		.update("t", data! { "name" => "c" }, Where::eq("id", 1))
		.unwrap();
	let deleted = adapter.delete("t", Where::eq("id", 1)).unwrap();

	// Assert
	assert_eq!(columns.len(), 2);
	assert!(columns[0].primary);
	assert_eq!(columns[0].primary_position, Some(1));
	assert_eq!(columns[1].name, "name");
	assert!(columns[1].nullable);
	assert_eq!(columns[1].length, Some(50));
	assert_eq!(columns[1].data_type, DataType::Varchar);
	assert_eq!(updated, 1);
	assert_eq!(deleted, 1);
}

#[rstest]
#[serial(postgres)]
#[ignore] // Requires Docker
fn test_ddl_is_refused_inside_transaction(postgres: (Container<Postgres>, Adapter)) {
	// Arrange
	let (_container, mut adapter) = postgres;
	adapter.begin().unwrap();

	// Act
	let result = adapter.query("CREATE TABLE refused (id INT)", &[]);
	adapter.rollback().unwrap();
	let exists = adapter.is_table_exists("refused", None).unwrap();

	// Assert
	assert!(matches!(result, Err(DatabaseError::DdlInTransaction { .. })));
	assert!(!exists);
}

#[rstest]
#[serial(postgres)]
#[ignore] // Requires Docker
fn test_upsert_and_lastval(postgres: (Container<Postgres>, Adapter)) {
	// Arrange
	let (_container, mut adapter) = postgres;
	adapter
		.query(
			"CREATE TABLE stock (id SERIAL PRIMARY KEY, sku VARCHAR(20) NOT NULL UNIQUE, qty INT)",
			&[],
		)
		.unwrap();

	// Act
	adapter
		.insert("stock", data! { "sku" => "A-1", "qty" => 1 })
		.unwrap();
	let id = adapter.last_insert_id().unwrap();
	adapter
		.insert_on_duplicate("stock", vec![data! { "sku" => "A-1", "qty" => 5 }], &[])
		.unwrap();
	let skipped = adapter
		.insert_ignore("stock", vec![data! { "sku" => "A-1", "qty" => 9 }])
		.unwrap();
	let qty = adapter
		.fetch_one("SELECT qty FROM stock WHERE sku = $1", &[QueryValue::from("A-1")])
		.unwrap();

	// Assert
	assert_eq!(id, Some(1));
	assert_eq!(skipped, 0);
	assert_eq!(qty, Some(QueryValue::Int(5)));
}

#[rstest]
#[serial(postgres)]
#[ignore] // Requires Docker
fn test_indexes_and_foreign_keys(postgres: (Container<Postgres>, Adapter)) {
	// Arrange
	let (_container, mut adapter) = postgres;
	adapter
		.query("CREATE TABLE parent (id INT PRIMARY KEY)", &[])
		.unwrap();
	adapter
		.query("CREATE TABLE child (id INT PRIMARY KEY, parent_id INT, code VARCHAR(10))", &[])
		.unwrap();

	// Act
	adapter
		.add_index("child", None, &["code"], IndexKind::Index)
		.unwrap();
	let fk = adapter
		.add_foreign_key(None, "child", "parent_id", "parent", "id", ForeignKeyAction::SetNull)
		.unwrap();
	let indexes = adapter.get_index_list("child", None).unwrap();
	let foreign_keys = adapter.get_foreign_keys("child", None).unwrap();
	adapter.drop_index("child", "PRIMARY").unwrap();
	let after_drop = adapter.get_index_list("child", None).unwrap();

	// Assert
	assert_eq!(indexes[0].key_name, "PRIMARY");
	assert_eq!(indexes[0].native_name, "child_pkey");
	assert!(indexes.iter().any(|i| i.key_name == "IDX_CHILD_CODE"));
	assert_eq!(foreign_keys[0].name, fk);
	assert_eq!(foreign_keys[0].on_delete, ForeignKeyAction::SetNull);
	assert!(after_drop.iter().all(|i| i.kind != IndexKind::Primary));
}

#[rstest]
#[serial(postgres)]
#[ignore] // Requires Docker
fn test_advisory_locks(postgres: (Container<Postgres>, Adapter)) {
	// Arrange
	let (_container, mut adapter) = postgres;

	// Act
	let acquired = adapter.get_lock("nightly-import", 0).unwrap();
	let held = adapter.is_locked("nightly-import").unwrap();
	let released = adapter.release_lock("nightly-import").unwrap();
	let bounded = adapter.get_lock("nightly-import", 5);

	// Assert
	assert!(acquired);
	assert!(held);
	assert!(released);
	assert!(matches!(bounded, Err(e) if e.is_not_supported()));
}

#[rstest]
#[case("2023-02-27", 1)]
#[case("2023-03-01", 365)]
#[case("2024-02-28", 1)]
#[case("2024-02-29", 0)]
#[serial(postgres)]
#[ignore] // Requires Docker
fn test_days_to_anniversary_of_leap_day(
	postgres: (Container<Postgres>, Adapter),
	#[case] reference: &str,
	#[case] expected: i64,
) {
	// Arrange
	let (_container, mut adapter) = postgres;
	let days = adapter
		.platform()
		.days_to_anniversary("'2000-02-29'", &format!("'{reference}'"));

	// Act
	let fetched = adapter
		.fetch_one(format!("SELECT {days} AS days").as_str(), &[])
		.unwrap();

	// Assert
	assert_eq!(fetched, Some(QueryValue::Int(expected)));
}

#[rstest]
#[serial(postgres)]
#[ignore] // Requires Docker
fn test_null_binds_into_any_column_type(postgres: (Container<Postgres>, Adapter)) {
	// Arrange
	let (_container, mut adapter) = postgres;
	adapter
		.query(
			"CREATE TABLE events (id INT PRIMARY KEY, happened DATE, token UUID, payload JSONB)",
			&[],
		)
		.unwrap();

	// Act
	let inserted = adapter
		.insert(
			"events",
			data! {
				"id" => 1,
				"happened" => QueryValue::Null,
				"token" => QueryValue::Null,
				"payload" => QueryValue::Null,
			},
		)
		.unwrap();
	let nulls = adapter
		.fetch_one(
			"SELECT COUNT(*) FROM events WHERE happened IS NULL AND token IS NULL AND payload IS NULL",
			&[],
		)
		.unwrap();

	// Assert
	assert_eq!(inserted, 1);
	assert_eq!(nulls, Some(QueryValue::Int(1)));
}
