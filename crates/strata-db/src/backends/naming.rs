//! Generated identifier names
//!
//! Table, index and foreign key names are composed from their parts and then
//! shortened until they fit the dialect's identifier ceiling:
//!
//! 1. The natural name (`IDX_ORDERS_CUSTOMER_ID`) when it fits.
//! 2. The natural name with vowels and repeated letters stripped from each
//!    word (`IDX_ORDRS_CSTMR_ID`).
//! 3. The kind marker followed by the SHA-256 hex digest of the natural name.
//! 4. That digest trimmed in the middle, keeping both ends.
//!
//! The output depends only on the inputs, so the same definition yields the
//! same name on every machine.
//!
//! ```
//! use strata_db::backends::{IndexKind, naming::NamingScheme};
//!
//! let naming = NamingScheme::new(64, None);
//! assert_eq!(
//!     naming.index_name("orders", &["customer_id"], IndexKind::Index),
//!     "IDX_ORDERS_CUSTOMER_ID"
//! );
//! ```

use sha2::{Digest, Sha256};

use super::{dialect::Dialect, introspection::IndexKind};

/// Marker of hashed table names.
const TABLE_HASH_PREFIX: &str = "t_";

/// Marker of foreign key names.
const FOREIGN_KEY_PREFIX: &str = "FK_";

/// Deterministic name generator bound to one identifier ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingScheme {
	max_length: usize,
	table_prefix: String,
}

impl NamingScheme {
	pub fn new(max_length: usize, table_prefix: Option<&str>) -> Self {
		Self {
			max_length,
			table_prefix: table_prefix.unwrap_or_default().to_string(),
		}
	}

	/// Scheme using the ceiling of `dialect`.
	pub fn for_dialect(dialect: &dyn Dialect, table_prefix: Option<&str>) -> Self {
		Self::new(dialect.identifier_max_length(), table_prefix)
	}

	pub fn max_length(&self) -> usize {
		self.max_length
	}

	/// Physical name of the logical table `logical`, with the table prefix applied.
	pub fn table_name(&self, logical: &str) -> String {
		let natural = format!("{}{logical}", self.table_prefix);
		self.fit(&natural, TABLE_HASH_PREFIX, |s| s.to_string())
	}

	/// Name of an index of `kind` over `fields` of `table`.
	pub fn index_name(&self, table: &str, fields: &[&str], kind: IndexKind) -> String {
		let natural = format!("{}{}", kind.name_prefix(), compose(table, fields)).to_uppercase();
		self.fit(&natural, kind.name_prefix(), str::to_uppercase)
	}

	/// Name of the foreign key from `table.column` to `ref_table.ref_column`.
	pub fn foreign_key_name(
		&self,
		table: &str,
		column: &str,
		ref_table: &str,
		ref_column: &str,
	) -> String {
		let natural = format!(
			"{FOREIGN_KEY_PREFIX}{}",
			compose(table, &[column, ref_table, ref_column])
		)
		.to_uppercase();
		self.fit(&natural, FOREIGN_KEY_PREFIX, str::to_uppercase)
	}

	fn fit(&self, natural: &str, marker: &str, case: impl Fn(&str) -> String) -> String {
		if natural.chars().count() <= self.max_length {
			return natural.to_string();
		}

		// The kind marker is kept verbatim; only the words after it are stripped.
		let shortened = match natural.strip_prefix(marker) {
			Some(rest) => format!("{marker}{}", strip_words(rest)),
			None => strip_words(natural),
		};
		if shortened.chars().count() <= self.max_length {
			return shortened;
		}

		let digest = case(&hex::encode(Sha256::digest(natural.as_bytes())));
		let room = self.max_length.saturating_sub(marker.chars().count());
		format!("{marker}{}", trim_middle(&digest, room))
	}
}

fn compose(table: &str, fields: &[&str]) -> String {
	let mut parts = Vec::with_capacity(fields.len() + 1);
	parts.push(table);
	parts.extend_from_slice(fields);
	parts.join("_")
}

fn is_vowel(c: char) -> bool {
	matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}

// Keeps the first letter of every `_`-separated word, drops the other vowels
// and collapses runs of the same letter.
fn strip_words(name: &str) -> String {
	name.split('_')
		.map(|word| {
			let mut out = String::with_capacity(word.len());
			let mut last: Option<char> = None;
			for (index, c) in word.chars().enumerate() {
				if index > 0 && is_vowel(c) {
					continue;
				}
				if last.is_some_and(|l| l.eq_ignore_ascii_case(&c)) {
					continue;
				}
				out.push(c);
				last = Some(c);
			}
			out
		})
		.collect::<Vec<_>>()
		.join("_")
}

fn trim_middle(value: &str, length: usize) -> String {
	let chars: Vec<char> = value.chars().collect();
	if chars.len() <= length {
		return value.to_string();
	}
	let head = length.div_ceil(2);
	let tail = length / 2;
	chars[..head]
		.iter()
		.chain(chars[chars.len() - tail..].iter())
		.collect()
}
