//! Shared cache tier
//!
//! The DDL cache keeps an in-process map and can mirror it into a
//! [`SharedCache`] so several processes reuse introspection results. Entries
//! carry tags and are invalidated by tag, never by expiry.
//!
//! # Examples
//!
//! ```
//! use strata_db::backends::cache::{InMemorySharedCache, SharedCache};
//!
//! let cache = InMemorySharedCache::new();
//! cache.set("user:1", "John", &["users", "active"]).unwrap();
//! cache.set("post:1", "Hello", &["posts"]).unwrap();
//!
//! cache.delete_by_tags(&["users"]).unwrap();
//!
//! assert_eq!(cache.get("user:1").unwrap(), None);
//! assert_eq!(cache.get("post:1").unwrap().as_deref(), Some("Hello"));
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::error::Result;

/// Key/value store with tag-based invalidation.
///
/// Implementations are shared between adapters, possibly across processes,
/// and must be usable from any thread.
pub trait SharedCache: Send + Sync + fmt::Debug {
	fn get(&self, key: &str) -> Result<Option<String>>;

	/// Store `value` under `key`, associating it with every tag in `tags`.
	fn set(&self, key: &str, value: &str, tags: &[&str]) -> Result<()>;

	/// Delete every entry carrying any of `tags`.
	fn delete_by_tags(&self, tags: &[&str]) -> Result<()>;
}

#[derive(Debug, Default)]
struct TagIndex {
	entries: HashMap<String, String>,
	// tag -> set of keys
	tag_to_keys: HashMap<String, HashSet<String>>,
}

/// Process-local [`SharedCache`]. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct InMemorySharedCache {
	index: Arc<RwLock<TagIndex>>,
}

impl InMemorySharedCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of stored entries.
	pub fn len(&self) -> usize {
		self.index.read().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Keys currently associated with `tag`.
	pub fn keys_for_tag(&self, tag: &str) -> Vec<String> {
		let index = self.index.read();
		let mut keys: Vec<String> = index
			.tag_to_keys
			.get(tag)
			.map(|keys| keys.iter().cloned().collect())
			.unwrap_or_default();
		keys.sort();
		keys
	}
}

impl SharedCache for InMemorySharedCache {
	fn get(&self, key: &str) -> Result<Option<String>> {
		Ok(self.index.read().entries.get(key).cloned())
	}

	fn set(&self, key: &str, value: &str, tags: &[&str]) -> Result<()> {
		let mut index = self.index.write();
		index.entries.insert(key.to_string(), value.to_string());
		for tag in tags {
			index
				.tag_to_keys
				.entry(tag.to_string())
				.or_default()
				.insert(key.to_string());
		}
		Ok(())
	}

	fn delete_by_tags(&self, tags: &[&str]) -> Result<()> {
		let mut index = self.index.write();
		for tag in tags {
			let Some(keys) = index.tag_to_keys.remove(*tag) else {
				continue;
			};
			for key in keys {
				index.entries.remove(&key);
			}
		}
		// Drop keys that no longer exist from the remaining tag sets.
		let TagIndex {
			entries,
			tag_to_keys,
		} = &mut *index;
		tag_to_keys.retain(|_, keys| {
			keys.retain(|key| entries.contains_key(key));
			!keys.is_empty()
		});
		Ok(())
	}
}

#[cfg(feature = "redis-cache")]
pub use redis_tier::RedisSharedCache;

#[cfg(feature = "redis-cache")]
mod redis_tier {
	use std::fmt;

	use parking_lot::Mutex;
	use redis::Commands;

	use super::SharedCache;
	use crate::backends::error::{DatabaseError, Result};

	/// [`SharedCache`] over Redis.
	///
	/// Values are plain strings. Each tag is a Redis set holding the keys
	/// tagged with it, stored under `{tag}:keys`.
	pub struct RedisSharedCache {
		connection: Mutex<redis::Connection>,
	}

	impl RedisSharedCache {
		/// Connect to the Redis server at `url`.
		///
		/// # Examples
		///
		/// ```no_run
		/// use strata_db::backends::cache::RedisSharedCache;
		///
		/// let cache = RedisSharedCache::connect("redis://localhost:6379").unwrap();
		/// ```
		pub fn connect(url: &str) -> Result<Self> {
			let client = redis::Client::open(url).map_err(cache_error)?;
			let connection = client.get_connection().map_err(cache_error)?;
			Ok(Self {
				connection: Mutex::new(connection),
			})
		}

		fn tag_key(tag: &str) -> String {
			format!("{tag}:keys")
		}
	}

	impl fmt::Debug for RedisSharedCache {
		fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
			f.debug_struct("RedisSharedCache").finish_non_exhaustive()
		}
	}

	impl SharedCache for RedisSharedCache {
		fn get(&self, key: &str) -> Result<Option<String>> {
			let mut conn = self.connection.lock();
			conn.get(key).map_err(cache_error)
		}

		fn set(&self, key: &str, value: &str, tags: &[&str]) -> Result<()> {
			let mut conn = self.connection.lock();
			let _: () = conn.set(key, value).map_err(cache_error)?;
			for tag in tags {
				let _: () = conn.sadd(Self::tag_key(tag), key).map_err(cache_error)?;
			}
			Ok(())
		}

		fn delete_by_tags(&self, tags: &[&str]) -> Result<()> {
			let mut conn = self.connection.lock();
			for tag in tags {
				let tag_key = Self::tag_key(tag);
				let keys: Vec<String> = conn.smembers(&tag_key).map_err(cache_error)?;
				if !keys.is_empty() {
					let _: () = conn.del(keys).map_err(cache_error)?;
				}
				let _: () = conn.del(&tag_key).map_err(cache_error)?;
			}
			Ok(())
		}
	}

	fn cache_error(error: redis::RedisError) -> DatabaseError {
		DatabaseError::Cache(error.to_string())
	}
}
