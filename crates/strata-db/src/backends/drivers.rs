//! sqlx-backed drivers
//!
//! Each driver owns one sqlx connection and a current-thread tokio runtime.
//! Calls are driven to completion with `block_on`, so a driver must not be
//! used from inside another tokio runtime.

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "mysql")]
pub use mysql::MySqlDriver;
#[cfg(feature = "postgres")]
pub use postgres::PostgresDriver;

use tokio::runtime::{Builder, Runtime};

use super::{
	config::ConnectionConfig,
	driver::{Driver, DriverResult},
	error::{DatabaseError, DriverError, Result},
	types::{DatabaseType, QueryValue, Row},
};

/// Open a driver for the engine named in `config`.
///
/// Fails with a configuration error when the engine's driver feature is not
/// compiled in.
pub fn connect(config: &ConnectionConfig) -> Result<Box<dyn Driver>> {
	match config.engine {
		#[cfg(feature = "mysql")]
		DatabaseType::Mysql => MySqlDriver::connect(config)
			.map(|d| Box::new(d) as Box<dyn Driver>)
			.map_err(|source| DatabaseError::Connection { source }),
		#[cfg(feature = "postgres")]
		DatabaseType::Postgres => PostgresDriver::connect(config)
			.map(|d| Box::new(d) as Box<dyn Driver>)
			.map_err(|source| DatabaseError::Connection { source }),
		#[allow(unreachable_patterns)]
		other => Err(DatabaseError::Configuration(format!(
			"the {other} driver is not enabled in this build"
		))),
	}
}

pub(crate) fn runtime() -> DriverResult<Runtime> {
	Ok(Builder::new_current_thread().enable_all().build()?)
}

pub(crate) fn closed() -> DriverError {
	DriverError::Backend("connection is closed".to_string())
}

/// Lists are rendered into SQL text by the quoting layer and never bound.
pub(crate) fn reject_lists(params: &[QueryValue]) -> DriverResult<()> {
	if params.iter().any(|p| matches!(p, QueryValue::List(_))) {
		return Err(DriverError::Backend(
			"list values cannot be bound as parameters; quote them into the statement".to_string(),
		));
	}
	Ok(())
}

pub(crate) fn table_names(rows: Vec<Row>) -> Vec<String> {
	rows.iter().filter_map(|row| row.text("table_name")).collect()
}
