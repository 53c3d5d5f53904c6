//! Raw SQL expressions.
//!
//! A [`SqlExpr`] is inserted into generated SQL verbatim. It bypasses both
//! parameter binding and quoting, so callers are responsible for its safety.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A raw SQL fragment.
///
/// # Examples
///
/// ```
/// use strata_db::backends::SqlExpr;
///
/// let now = SqlExpr::new("NOW()");
/// assert_eq!(now.as_str(), "NOW()");
/// assert_eq!(now.to_string(), "NOW()");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SqlExpr(String);

impl SqlExpr {
	pub fn new(sql: impl Into<String>) -> Self {
		Self(sql.into())
	}

	/// `NOW()`, understood by every supported backend.
	pub fn now() -> Self {
		Self::new("NOW()")
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn into_string(self) -> String {
		self.0
	}
}

impl fmt::Display for SqlExpr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for SqlExpr {
	fn from(sql: &str) -> Self {
		Self::new(sql)
	}
}

impl From<String> for SqlExpr {
	fn from(sql: String) -> Self {
		Self(sql)
	}
}

impl AsRef<str> for SqlExpr {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
