//! # Strata Database
//!
//! Relational adapter layer giving MySQL and PostgreSQL one programmatic
//! surface.
//!
//! ## Features
//!
//! - **Quoting**: values and identifiers escaped per dialect, raw
//!   [`SqlExpr`](backends::SqlExpr) fragments passed through untouched
//! - **CRUD**: insert, multi-row insert, insert-ignore, upsert, update and
//!   delete from column maps, returning affected row counts
//! - **Select builder**: columns, joins, where/having, grouping, ordering,
//!   limits, unions and row locks
//! - **Transactions**: nested levels over one physical transaction, with DDL
//!   refused while one is open
//! - **Introspection**: columns, indexes and foreign keys in a
//!   backend-neutral shape, cached per table
//! - **DDL helpers**: table, column, index and foreign key changes that keep
//!   the cache consistent
//! - **Advisory locks** and deterministic identifier naming
//!
//! ## Feature Flags
//!
//! - `mysql` (default): MySQL driver
//! - `postgres` (default): PostgreSQL driver
//! - `redis-cache`: Redis-backed shared DDL cache tier

pub mod backends;

/// Prelude module for convenient imports
pub mod prelude {
	pub use crate::backends::*;
	pub use crate::data;
}

pub use backends::{Adapter, ConnectionConfig, DatabaseError, Result};
