//! DDL cache
//!
//! Introspection results keyed by `schema.table` and the kind of description.
//! The in-process map is authoritative; an optional [`SharedCache`] mirrors it
//! for other processes.
//!
//! There is no automatic invalidation. Whoever changes a table resets its
//! entry with [`DdlCache::reset`].
//!
//! Shared keys and tags:
//!
//! | Item | Format |
//! |------|--------|
//! | Key | `strata:ddl:{backend}:{schema.table}:{kind}` |
//! | Table tag | `strata:ddl:{backend}:{schema.table}` |
//! | Global tag | `strata:ddl` |

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, warn};

use super::{cache::SharedCache, introspection::TableRef, types::DatabaseType};

/// Tag carried by every shared entry.
pub const GLOBAL_TAG: &str = "strata:ddl";

/// Kind of cached description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DdlKind {
	Describe,
	Index,
	ForeignKey,
}

impl DdlKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			DdlKind::Describe => "describe",
			DdlKind::Index => "index",
			DdlKind::ForeignKey => "foreign_key",
		}
	}
}

/// Two-tier cache of introspection results.
#[derive(Debug)]
pub struct DdlCache {
	backend: DatabaseType,
	enabled: bool,
	local: HashMap<String, HashMap<DdlKind, Value>>,
	shared: Option<Arc<dyn SharedCache>>,
}

impl DdlCache {
	pub fn new(backend: DatabaseType, enabled: bool) -> Self {
		Self {
			backend,
			enabled,
			local: HashMap::new(),
			shared: None,
		}
	}

	pub fn with_shared(mut self, shared: Arc<dyn SharedCache>) -> Self {
		self.shared = Some(shared);
		self
	}

	pub fn set_shared(&mut self, shared: Option<Arc<dyn SharedCache>>) {
		self.shared = shared;
	}

	pub fn is_enabled(&self) -> bool {
		self.enabled
	}

	/// Number of tables with at least one in-process entry.
	pub fn len(&self) -> usize {
		self.local.len()
	}

	pub fn is_empty(&self) -> bool {
		self.local.is_empty()
	}

	/// Cached value of `kind` for `table`.
	///
	/// Looks in process first, then in the shared tier; a shared hit is
	/// copied into the process map. Shared-tier failures count as misses.
	pub fn get<T: DeserializeOwned>(&mut self, table: &TableRef, kind: DdlKind) -> Option<T> {
		if !self.enabled {
			return None;
		}
		let table_key = table.cache_key();
		if let Some(value) = self.local.get(&table_key).and_then(|kinds| kinds.get(&kind)) {
			return decode(value.clone(), &table_key, kind);
		}

		let shared = self.shared.as_ref()?;
		let key = self.shared_key(&table_key, kind);
		let payload = match shared.get(&key) {
			Ok(Some(payload)) => payload,
			Ok(None) => return None,
			Err(error) => {
				warn!(%error, key = %key, "shared DDL cache lookup failed");
				return None;
			}
		};
		let value: Value = match serde_json::from_str(&payload) {
			Ok(value) => value,
			Err(error) => {
				warn!(%error, key = %key, "discarding malformed shared DDL cache entry");
				return None;
			}
		};
		debug!(table = %table_key, kind = kind.as_str(), "DDL cache hit in shared tier");
		self.local
			.entry(table_key.clone())
			.or_default()
			.insert(kind, value.clone());
		decode(value, &table_key, kind)
	}

	/// Store `value` in both tiers. Empty results are not cached, so a table
	/// created later is seen on the next call.
	pub fn put<T: Serialize>(&mut self, table: &TableRef, kind: DdlKind, value: &T) {
		if !self.enabled {
			return;
		}
		let value = match serde_json::to_value(value) {
			Ok(value) => value,
			Err(error) => {
				warn!(%error, "DDL cache entry could not be serialized");
				return;
			}
		};
		if is_empty_value(&value) {
			return;
		}
		let table_key = table.cache_key();
		if let Some(shared) = &self.shared {
			let key = self.shared_key(&table_key, kind);
			let tag = self.table_tag(&table_key);
			if let Err(error) = shared.set(&key, &value.to_string(), &[GLOBAL_TAG, &tag]) {
				warn!(%error, key = %key, "shared DDL cache store failed");
			}
		}
		self.local.entry(table_key).or_default().insert(kind, value);
	}

	/// Forget `table`, or everything when `table` is `None`, in both tiers.
	pub fn reset(&mut self, table: Option<&TableRef>) {
		let tag = match table {
			Some(table) => {
				let table_key = table.cache_key();
				self.local.remove(&table_key);
				debug!(table = %table_key, "DDL cache entry reset");
				self.table_tag(&table_key)
			}
			None => {
				self.local.clear();
				debug!("DDL cache cleared");
				GLOBAL_TAG.to_string()
			}
		};
		if let Some(shared) = &self.shared {
			if let Err(error) = shared.delete_by_tags(&[&tag]) {
				warn!(%error, tag = %tag, "shared DDL cache invalidation failed");
			}
		}
	}

	fn shared_key(&self, table_key: &str, kind: DdlKind) -> String {
		format!("{}:{}", self.table_tag(table_key), kind.as_str())
	}

	fn table_tag(&self, table_key: &str) -> String {
		format!("{GLOBAL_TAG}:{}:{table_key}", self.backend.as_str())
	}
}

fn decode<T: DeserializeOwned>(value: Value, table_key: &str, kind: DdlKind) -> Option<T> {
	match serde_json::from_value(value) {
		Ok(decoded) => Some(decoded),
		Err(error) => {
			warn!(%error, table = %table_key, kind = kind.as_str(), "DDL cache entry has an unexpected shape");
			None
		}
	}
}

fn is_empty_value(value: &Value) -> bool {
	match value {
		Value::Null => true,
		Value::Array(items) => items.is_empty(),
		Value::Object(map) => map.is_empty(),
		_ => false,
	}
}
