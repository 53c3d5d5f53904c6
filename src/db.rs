//! Database adapter layer module.
//!
//! This module provides access to the adapter, dialects, drivers,
//! statement builders and schema introspection.
//!
//! # Examples
//!
//! ```rust,no_run
//! use strata::db::backends::{Adapter, ConnectionConfig};
//!
//! let config = ConnectionConfig::mysql("shop", "app", "secret", "localhost", 3306);
//! let adapter = Adapter::connect(config);
//! ```

pub use strata_db::*;
