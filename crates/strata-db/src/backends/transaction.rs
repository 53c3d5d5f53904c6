//! # Transaction Management
//!
//! Nested transactions share one physical transaction. [`TransactionManager`]
//! counts the nesting level: only the outermost `begin` opens the physical
//! transaction, and only the `commit`/`rollback` that brings the level from 1
//! to 0 closes it. Inner calls just move the counter.
//!
//! ```
//! use strata_db::backends::{testing::MockDriver, transaction::TransactionManager};
//!
//! let mut driver = MockDriver::mysql();
//! let mut tx = TransactionManager::new();
//!
//! tx.begin(&mut driver).unwrap();
//! tx.begin(&mut driver).unwrap();
//! assert_eq!(tx.level(), 2);
//!
//! tx.commit(&mut driver).unwrap();
//! tx.commit(&mut driver).unwrap();
//! assert_eq!(tx.level(), 0);
//! ```
//!
//! ## DDL guard
//!
//! Most backends cannot roll back schema changes, so [`TransactionManager::guard_ddl`]
//! refuses `CREATE`, `ALTER`, `RENAME`, `DROP` and `TRUNCATE` statements while a
//! transaction is open. `CREATE TEMPORARY ...` and `DROP TEMPORARY ...` are
//! allowed.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use super::{
	driver::Driver,
	error::{DatabaseError, Result},
};

static WHITESPACE: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex pattern"));

static DDL_PREFIX: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"(?i)^(cre|alt|ren|dro|tru)").expect("Invalid DDL regex pattern"));

/// Transaction state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
	/// No physical transaction is open.
	Idle,
	/// A physical transaction is open at the given nesting level.
	Active(usize),
}

/// Nesting counter over a driver's physical transaction.
#[derive(Debug, Default)]
pub struct TransactionManager {
	level: usize,
}

impl TransactionManager {
	pub fn new() -> Self {
		Self::default()
	}

	/// Current nesting level; 0 means no open transaction.
	pub fn level(&self) -> usize {
		self.level
	}

	pub fn state(&self) -> TransactionState {
		match self.level {
			0 => TransactionState::Idle,
			level => TransactionState::Active(level),
		}
	}

	/// Open a transaction level. Only the first level issues a physical
	/// BEGIN.
	///
	/// The level is raised even when the physical BEGIN fails, so callers
	/// balance it with [`rollback`](Self::rollback) as usual.
	pub fn begin(&mut self, driver: &mut dyn Driver) -> Result<()> {
		self.level += 1;
		if self.level == 1 {
			driver
				.begin()
				.map_err(|e| DatabaseError::execution("BEGIN", e))?;
			debug!("transaction started");
		}
		debug!(level = self.level, "transaction level raised");
		Ok(())
	}

	/// Close a transaction level, committing when it is the outermost one.
	///
	/// The level drops even when the physical COMMIT fails.
	pub fn commit(&mut self, driver: &mut dyn Driver) -> Result<()> {
		self.close_level("COMMIT", |d| d.commit(), driver)
	}

	/// Close a transaction level, rolling back when it is the outermost one.
	///
	/// The level drops even when the physical ROLLBACK fails.
	pub fn rollback(&mut self, driver: &mut dyn Driver) -> Result<()> {
		self.close_level("ROLLBACK", |d| d.rollback(), driver)
	}

	fn close_level<F>(&mut self, statement: &str, physical: F, driver: &mut dyn Driver) -> Result<()>
	where
		F: FnOnce(&mut dyn Driver) -> super::driver::DriverResult<()>,
	{
		match self.level {
			0 => {
				warn!(statement, "no open transaction; ignoring");
				Ok(())
			}
			1 => {
				self.level = 0;
				physical(driver).map_err(|e| DatabaseError::execution(statement, e))?;
				debug!(statement, "transaction finished");
				Ok(())
			}
			_ => {
				self.level -= 1;
				debug!(level = self.level, statement, "transaction level lowered");
				Ok(())
			}
		}
	}

	/// Fail with [`DatabaseError::DdlInTransaction`] when `statement` is DDL
	/// and a transaction is open.
	pub fn guard_ddl(&self, statement: &str) -> Result<()> {
		if self.level > 0 && is_ddl(statement) {
			return Err(DatabaseError::DdlInTransaction {
				statement: statement.trim().to_string(),
			});
		}
		Ok(())
	}
}

/// Whether `statement` changes the schema. Temporary-table statements do not
/// count.
pub fn is_ddl(statement: &str) -> bool {
	let normalized = WHITESPACE.replace_all(statement.trim(), " ");
	let mut tokens = normalized.split(' ');
	let Some(first) = tokens.next() else {
		return false;
	};
	if !DDL_PREFIX.is_match(first) {
		return false;
	}
	let is_temporary =
		|token: &str| token.eq_ignore_ascii_case("TEMPORARY") || token.eq_ignore_ascii_case("TEMP");
	match tokens.next() {
		Some(second) if is_temporary(second) => false,
		Some(second)
			if second.eq_ignore_ascii_case("LOCAL") || second.eq_ignore_ascii_case("GLOBAL") =>
		{
			!tokens.next().is_some_and(is_temporary)
		}
		_ => true,
	}
}
