//! SELECT query builder
//!
//! [`Select`] accumulates the parts of a query and renders them for the
//! dialect it was created with. Identifiers go through
//! [`Dialect::quote_identifier`] and values through the dialect's literal
//! quoting, so the rendered text carries no placeholders.
//!
//! ## Quoting
//!
//! | Input | Rendered (PostgreSQL) |
//! |-------|-----------------------|
//! | `"orders"` | `"orders"` |
//! | `"shop.orders"` | `"shop"."orders"` |
//! | `"o.*"` | `"o".*` |
//! | `SqlExpr::new("COUNT(*)")` | `COUNT(*)` |
//!
//! Conditions are raw SQL fragments; a `?` in a fragment is replaced with the
//! quoted value passed alongside it.
//!
//! ## Testing Generated SQL
//!
//! ```
//! use std::sync::Arc;
//! use strata_db::backends::{Order, PostgresDialect, Select};
//!
//! let sql = Select::new(Arc::new(PostgresDialect::new()))
//!     .from("orders", Some("o"))
//!     .columns(["o.id", "o.total"])
//!     .where_value("o.status = ?", "paid")
//!     .order("o.id", Order::Desc)
//!     .limit(10)
//!     .render();
//!
//! assert_eq!(
//!     sql,
//!     "SELECT \"o\".\"id\", \"o\".\"total\" FROM \"orders\" AS \"o\" \
//!      WHERE (o.status = 'paid') ORDER BY \"o\".\"id\" DESC LIMIT 10"
//! );
//! ```

use std::fmt;
use std::sync::Arc;

use super::{
	crud::Where,
	dialect::Dialect,
	expr::SqlExpr,
	quoting::{quote_identifier_as, quote_into},
	types::QueryValue,
};

/// A selected column: an identifier to quote or a raw expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
	Name(String),
	Expr(SqlExpr),
}

impl From<&str> for Column {
	fn from(name: &str) -> Self {
		Column::Name(name.to_string())
	}
}

impl From<String> for Column {
	fn from(name: String) -> Self {
		Column::Name(name)
	}
}

impl From<SqlExpr> for Column {
	fn from(expr: SqlExpr) -> Self {
		Column::Expr(expr)
	}
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
	#[default]
	Asc,
	Desc,
}

impl Order {
	fn keyword(self) -> &'static str {
		match self {
			Order::Asc => "ASC",
			Order::Desc => "DESC",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinKind {
	Inner,
	Left,
	Right,
	Cross,
}

impl JoinKind {
	fn keyword(self) -> &'static str {
		match self {
			JoinKind::Inner => "INNER JOIN",
			JoinKind::Left => "LEFT JOIN",
			JoinKind::Right => "RIGHT JOIN",
			JoinKind::Cross => "CROSS JOIN",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conjunction {
	And,
	Or,
}

/// Part of a [`Select`] cleared by [`Select::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectPart {
	Distinct,
	Columns,
	From,
	Joins,
	Where,
	Group,
	Having,
	Order,
	LimitOffset,
	ForUpdate,
	Union,
}

#[derive(Debug, Clone)]
struct SelectColumn {
	column: Column,
	alias: Option<String>,
}

#[derive(Debug, Clone)]
struct Join {
	kind: JoinKind,
	source: String,
	on: Option<String>,
}

/// SELECT statement builder
#[derive(Debug, Clone)]
pub struct Select {
	dialect: Arc<dyn Dialect>,
	distinct: bool,
	columns: Vec<SelectColumn>,
	from: Option<String>,
	joins: Vec<Join>,
	wheres: Vec<(Conjunction, String)>,
	group: Vec<String>,
	having: Vec<(Conjunction, String)>,
	order: Vec<String>,
	limit: Option<u64>,
	offset: Option<u64>,
	for_update: bool,
	unions: Vec<(bool, String)>,
}

impl Select {
	pub fn new(dialect: Arc<dyn Dialect>) -> Self {
		Self {
			dialect,
			distinct: false,
			columns: Vec::new(),
			from: None,
			joins: Vec::new(),
			wheres: Vec::new(),
			group: Vec::new(),
			having: Vec::new(),
			order: Vec::new(),
			limit: None,
			offset: None,
			for_update: false,
			unions: Vec::new(),
		}
	}

	pub fn distinct(mut self, distinct: bool) -> Self {
		self.distinct = distinct;
		self
	}

	/// Set the FROM table, optionally aliased.
	pub fn from(mut self, table: &str, alias: Option<&str>) -> Self {
		self.from = Some(quote_identifier_as(self.dialect.as_ref(), table, alias));
		self
	}

	/// Use another query as the FROM source.
	pub fn from_select(mut self, subquery: &Select, alias: &str) -> Self {
		self.from = Some(format!(
			"{} AS {}",
			subquery.as_subquery(),
			self.dialect.quote_identifier(alias)
		));
		self
	}

	/// Append columns. With no columns the query selects `*`.
	pub fn columns<I, C>(mut self, columns: I) -> Self
	where
		I: IntoIterator<Item = C>,
		C: Into<Column>,
	{
		self.columns.extend(columns.into_iter().map(|c| SelectColumn {
			column: c.into(),
			alias: None,
		}));
		self
	}

	/// Append one column under `alias`.
	pub fn column_as(mut self, column: impl Into<Column>, alias: &str) -> Self {
		self.columns.push(SelectColumn {
			column: column.into(),
			alias: Some(alias.to_string()),
		});
		self
	}

	pub fn join_inner(self, table: &str, alias: Option<&str>, on: &str) -> Self {
		self.join(JoinKind::Inner, table, alias, Some(on))
	}

	pub fn join_left(self, table: &str, alias: Option<&str>, on: &str) -> Self {
		self.join(JoinKind::Left, table, alias, Some(on))
	}

	pub fn join_right(self, table: &str, alias: Option<&str>, on: &str) -> Self {
		self.join(JoinKind::Right, table, alias, Some(on))
	}

	pub fn join_cross(self, table: &str, alias: Option<&str>) -> Self {
		self.join(JoinKind::Cross, table, alias, None)
	}

	fn join(mut self, kind: JoinKind, table: &str, alias: Option<&str>, on: Option<&str>) -> Self {
		let source = quote_identifier_as(self.dialect.as_ref(), table, alias);
		self.joins.push(Join {
			kind,
			source,
			on: on.map(str::to_string),
		});
		self
	}

	/// AND a raw condition.
	pub fn where_(mut self, condition: &str) -> Self {
		self.wheres.push((Conjunction::And, condition.to_string()));
		self
	}

	/// AND a condition, replacing its `?` with the quoted `value`.
	pub fn where_value(self, condition: &str, value: impl Into<QueryValue>) -> Self {
		let condition = quote_into(self.dialect.as_ref(), condition, &value.into(), None);
		self.where_(&condition)
	}

	/// AND a structured condition. Empty conditions are skipped.
	pub fn where_clause(self, condition: &Where) -> Self {
		match condition.render(self.dialect.as_ref()) {
			Some(rendered) => self.where_(&rendered),
			None => self,
		}
	}

	/// AND `column IN (subquery)`.
	pub fn where_in(self, column: &str, subquery: &Select) -> Self {
		let condition = format!(
			"{} IN {}",
			self.dialect.quote_identifier(column),
			subquery.as_subquery()
		);
		self.where_(&condition)
	}

	/// OR a raw condition.
	pub fn or_where(mut self, condition: &str) -> Self {
		self.wheres.push((Conjunction::Or, condition.to_string()));
		self
	}

	pub fn or_where_value(self, condition: &str, value: impl Into<QueryValue>) -> Self {
		let condition = quote_into(self.dialect.as_ref(), condition, &value.into(), None);
		self.or_where(&condition)
	}

	pub fn group<I, S>(mut self, columns: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let quoted = columns
			.into_iter()
			.map(|c| self.dialect.quote_identifier(c.as_ref()))
			.collect::<Vec<_>>();
		self.group.extend(quoted);
		self
	}

	pub fn having(mut self, condition: &str) -> Self {
		self.having.push((Conjunction::And, condition.to_string()));
		self
	}

	pub fn having_value(self, condition: &str, value: impl Into<QueryValue>) -> Self {
		let condition = quote_into(self.dialect.as_ref(), condition, &value.into(), None);
		self.having(&condition)
	}

	pub fn or_having(mut self, condition: &str) -> Self {
		self.having.push((Conjunction::Or, condition.to_string()));
		self
	}

	pub fn order(mut self, column: &str, direction: Order) -> Self {
		let entry = format!(
			"{} {}",
			self.dialect.quote_identifier(column),
			direction.keyword()
		);
		self.order.push(entry);
		self
	}

	/// Order by a raw expression.
	pub fn order_expr(mut self, expr: SqlExpr, direction: Order) -> Self {
		self.order.push(format!("{expr} {}", direction.keyword()));
		self
	}

	pub fn limit(mut self, limit: u64) -> Self {
		self.limit = Some(limit);
		self
	}

	pub fn offset(mut self, offset: u64) -> Self {
		self.offset = Some(offset);
		self
	}

	/// Limit to page `page` (1-based) of `rows_per_page` rows. Page 0 is
	/// treated as page 1.
	pub fn limit_page(mut self, page: u64, rows_per_page: u64) -> Self {
		let page = page.max(1);
		self.limit = Some(rows_per_page);
		self.offset = Some((page - 1).saturating_mul(rows_per_page));
		self
	}

	/// Lock the selected rows. Neither backend can lock the result of a
	/// `UNION`, so the clause is left out once unions are added.
	pub fn for_update(mut self, for_update: bool) -> Self {
		self.for_update = for_update;
		self
	}

	pub fn union(mut self, other: &Select) -> Self {
		self.unions.push((false, other.render()));
		self
	}

	pub fn union_all(mut self, other: &Select) -> Self {
		self.unions.push((true, other.render()));
		self
	}

	/// Clear one accumulated part.
	pub fn reset(mut self, part: SelectPart) -> Self {
		match part {
			SelectPart::Distinct => self.distinct = false,
			SelectPart::Columns => self.columns.clear(),
			SelectPart::From => self.from = None,
			SelectPart::Joins => self.joins.clear(),
			SelectPart::Where => self.wheres.clear(),
			SelectPart::Group => self.group.clear(),
			SelectPart::Having => self.having.clear(),
			SelectPart::Order => self.order.clear(),
			SelectPart::LimitOffset => {
				self.limit = None;
				self.offset = None;
			}
			SelectPart::ForUpdate => self.for_update = false,
			SelectPart::Union => self.unions.clear(),
		}
		self
	}

	/// Render the query for use as a FROM source or a scalar/IN value.
	pub fn as_subquery(&self) -> SqlExpr {
		SqlExpr::new(format!("({})", self.render()))
	}

	pub fn render(&self) -> String {
		let body = self.render_body();
		let mut sql = if self.unions.is_empty() {
			body
		} else {
			let mut combined = format!("({body})");
			for (all, other) in &self.unions {
				combined.push_str(if *all { " UNION ALL " } else { " UNION " });
				combined.push('(');
				combined.push_str(other);
				combined.push(')');
			}
			combined
		};

		if !self.order.is_empty() {
			sql.push_str(" ORDER BY ");
			sql.push_str(&self.order.join(", "));
		}
		let tail = self.dialect.limit_offset(self.limit, self.offset);
		if !tail.is_empty() {
			sql.push(' ');
			sql.push_str(&tail);
		}
		if self.for_update && self.unions.is_empty() {
			sql.push_str(" FOR UPDATE");
		}
		sql
	}

	fn render_body(&self) -> String {
		let mut sql = String::from("SELECT ");
		if self.distinct {
			sql.push_str("DISTINCT ");
		}
		sql.push_str(&self.render_columns());
		if let Some(from) = &self.from {
			sql.push_str(" FROM ");
			sql.push_str(from);
		}
		for join in &self.joins {
			sql.push(' ');
			sql.push_str(join.kind.keyword());
			sql.push(' ');
			sql.push_str(&join.source);
			if let Some(on) = &join.on {
				sql.push_str(" ON ");
				sql.push_str(on);
			}
		}
		if let Some(conditions) = render_conditions(&self.wheres) {
			sql.push_str(" WHERE ");
			sql.push_str(&conditions);
		}
		if !self.group.is_empty() {
			sql.push_str(" GROUP BY ");
			sql.push_str(&self.group.join(", "));
		}
		if let Some(conditions) = render_conditions(&self.having) {
			sql.push_str(" HAVING ");
			sql.push_str(&conditions);
		}
		sql
	}

	fn render_columns(&self) -> String {
		if self.columns.is_empty() {
			return "*".to_string();
		}
		self.columns
			.iter()
			.map(|c| self.render_column(c))
			.collect::<Vec<_>>()
			.join(", ")
	}

	fn render_column(&self, column: &SelectColumn) -> String {
		let dialect = self.dialect.as_ref();
		match &column.column {
			Column::Name(name) if name == "*" => "*".to_string(),
			Column::Name(name) if name.ends_with(".*") => {
				format!("{}.*", dialect.quote_identifier(&name[..name.len() - 2]))
			}
			Column::Name(name) => quote_identifier_as(dialect, name, column.alias.as_deref()),
			Column::Expr(expr) => match &column.alias {
				Some(alias) => format!("{expr} AS {}", dialect.quote_identifier(alias)),
				None => expr.to_string(),
			},
		}
	}
}

impl fmt::Display for Select {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.render())
	}
}

fn render_conditions(conditions: &[(Conjunction, String)]) -> Option<String> {
	let mut rendered = String::new();
	for (index, (conjunction, condition)) in conditions.iter().enumerate() {
		if index > 0 {
			rendered.push_str(match conjunction {
				Conjunction::And => " AND ",
				Conjunction::Or => " OR ",
			});
		}
		rendered.push('(');
		rendered.push_str(condition);
		rendered.push(')');
	}
	(!rendered.is_empty()).then_some(rendered)
}

/// Anything the adapter can run as a query: SQL text or a [`Select`].
pub trait AsSql {
	fn to_sql(&self) -> String;
}

impl AsSql for str {
	fn to_sql(&self) -> String {
		self.to_string()
	}
}

impl AsSql for String {
	fn to_sql(&self) -> String {
		self.clone()
	}
}

impl AsSql for Select {
	fn to_sql(&self) -> String {
		self.render()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::backends::dialect::{MySqlDialect, PostgresDialect};
	use rstest::{fixture, rstest};

	#[fixture]
	fn mysql() -> Arc<dyn Dialect> {
		Arc::new(MySqlDialect::new())
	}

	#[fixture]
	fn postgres() -> Arc<dyn Dialect> {
		Arc::new(PostgresDialect::new())
	}

	#[rstest]
	fn test_select_star_by_default(mysql: Arc<dyn Dialect>) {
		// Act
		let sql = Select::new(mysql).from("users", None).render();

		// Assert
		assert_eq!(sql, "SELECT * FROM `users`");
	}

	#[rstest]
	fn test_columns_aliases_and_expressions(postgres: Arc<dyn Dialect>) {
		// Arrange
		let select = Select::new(postgres)
			.distinct(true)
			.from("shop.orders", Some("o"))
			.columns(["o.*"])
			.column_as("o.customer_id", "customer")
			.column_as(SqlExpr::new("COUNT(*)"), "n");

		// Act
		let sql = select.render();

		// Assert
		assert_eq!(
			sql,
			"SELECT DISTINCT \"o\".*, \"o\".\"customer_id\" AS \"customer\", COUNT(*) AS \"n\" \
			 FROM \"shop\".\"orders\" AS \"o\""
		);
	}

	#[rstest]
	fn test_joins(mysql: Arc<dyn Dialect>) {
		// Arrange
		let select = Select::new(mysql)
			.from("orders", Some("o"))
			.join_inner("customers", Some("c"), "c.id = o.customer_id")
			.join_left("notes", Some("n"), "n.order_id = o.id")
			.join_right("shipments", None, "shipments.order_id = o.id")
			.join_cross("regions", Some("r"));

		// Act
		let sql = select.render();

		// Assert
		assert_eq!(
			sql,
			"SELECT * FROM `orders` AS `o` \
			 INNER JOIN `customers` AS `c` ON c.id = o.customer_id \
			 LEFT JOIN `notes` AS `n` ON n.order_id = o.id \
			 RIGHT JOIN `shipments` ON shipments.order_id = o.id \
			 CROSS JOIN `regions` AS `r`"
		);
	}

	#[rstest]
	fn test_where_and_or_substitute_values(mysql: Arc<dyn Dialect>) {
		// Arrange
		let select = Select::new(mysql)
			.from("t", None)
			.where_value("name = ?", "O'Brien")
			.where_value("id IN (?)", QueryValue::list([1i64, 2]))
			.or_where("deleted = 0");

		// Act
		let sql = select.render();

		// Assert
		assert_eq!(
			sql,
			"SELECT * FROM `t` WHERE (name = 'O\\'Brien') AND (id IN (1, 2)) OR (deleted = 0)"
		);
	}

	#[rstest]
	fn test_where_clause_uses_structured_conditions(postgres: Arc<dyn Dialect>) {
		// Arrange
		let condition = Where::eq("id", QueryValue::List(vec![]));

		// Act
		let sql = Select::new(postgres)
			.from("t", None)
			.where_clause(&condition)
			.where_clause(&Where::None)
			.render();

		// Assert
		assert_eq!(sql, "SELECT * FROM \"t\" WHERE (\"id\" IN (NULL))");
	}

	#[rstest]
	fn test_group_having_order(postgres: Arc<dyn Dialect>) {
		// Arrange
		let select = Select::new(postgres)
			.from("orders", None)
			.columns([Column::from("status"), SqlExpr::new("COUNT(*)").into()])
			.group(["status"])
			.having_value("COUNT(*) > ?", 5)
			.order("status", Order::Asc)
			.order_expr(SqlExpr::new("COUNT(*)"), Order::Desc);

		// Act
		let sql = select.render();

		// Assert
		assert_eq!(
			sql,
			"SELECT \"status\", COUNT(*) FROM \"orders\" GROUP BY \"status\" \
			 HAVING (COUNT(*) > 5) ORDER BY \"status\" ASC, COUNT(*) DESC"
		);
	}

	#[rstest]
	#[case(1, 20, "LIMIT 20 OFFSET 0")]
	#[case(3, 20, "LIMIT 20 OFFSET 40")]
	#[case(0, 10, "LIMIT 10 OFFSET 0")]
	fn test_limit_page(
		postgres: Arc<dyn Dialect>,
		#[case] page: u64,
		#[case] rows: u64,
		#[case] expected_tail: &str,
	) {
		// Act
		let sql = Select::new(postgres)
			.from("t", None)
			.limit_page(page, rows)
			.render();

		// Assert
		assert_eq!(sql, format!("SELECT * FROM \"t\" {expected_tail}"));
	}

	#[rstest]
	fn test_offset_only_per_dialect(mysql: Arc<dyn Dialect>, postgres: Arc<dyn Dialect>) {
		// Act
		let mysql_sql = Select::new(mysql).from("t", None).offset(5).render();
		let pg_sql = Select::new(postgres).from("t", None).offset(5).render();

		// Assert
		assert_eq!(mysql_sql, "SELECT * FROM `t` LIMIT 18446744073709551615 OFFSET 5");
		assert_eq!(pg_sql, "SELECT * FROM \"t\" OFFSET 5");
	}

	#[rstest]
	fn test_for_update(mysql: Arc<dyn Dialect>) {
		// Act
		let sql = Select::new(mysql)
			.from("t", None)
			.where_("id = 1")
			.for_update(true)
			.render();

		// Assert
		assert_eq!(sql, "SELECT * FROM `t` WHERE (id = 1) FOR UPDATE");
	}

	#[rstest]
	fn test_for_update_is_left_out_of_unions(mysql: Arc<dyn Dialect>) {
		// Arrange
		let archived = Select::new(mysql.clone()).from("archived", None).columns(["id"]);

		// Act
		let sql = Select::new(mysql)
			.from("orders", None)
			.columns(["id"])
			.for_update(true)
			.union(&archived)
			.render();

		// Assert
		assert_eq!(sql, "(SELECT `id` FROM `orders`) UNION (SELECT `id` FROM `archived`)");
	}

	#[rstest]
	fn test_union_wraps_each_part(mysql: Arc<dyn Dialect>) {
		// Arrange
		let archived = Select::new(mysql.clone()).from("archived", None).columns(["id"]);
		let recent = Select::new(mysql.clone()).from("recent", None).columns(["id"]);

		// Act
		let sql = Select::new(mysql)
			.from("orders", None)
			.columns(["id"])
			.union(&archived)
			.union_all(&recent)
			.order("id", Order::Asc)
			.render();

		// Assert
		assert_eq!(
			sql,
			"(SELECT `id` FROM `orders`) UNION (SELECT `id` FROM `archived`) \
			 UNION ALL (SELECT `id` FROM `recent`) ORDER BY `id` ASC"
		);
	}

	#[rstest]
	fn test_subquery_as_source_and_value(postgres: Arc<dyn Dialect>) {
		// Arrange
		let paid = Select::new(postgres.clone())
			.from("payments", None)
			.columns(["order_id"]);

		// Act
		let from_sql = Select::new(postgres.clone())
			.from_select(&paid, "p")
			.render();
		let in_sql = Select::new(postgres)
			.from("orders", None)
			.where_in("id", &paid)
			.render();

		// Assert
		assert_eq!(
			from_sql,
			"SELECT * FROM (SELECT \"order_id\" FROM \"payments\") AS \"p\""
		);
		assert_eq!(
			in_sql,
			"SELECT * FROM \"orders\" WHERE (\"id\" IN (SELECT \"order_id\" FROM \"payments\"))"
		);
	}

	#[rstest]
	fn test_reset_clears_one_part(mysql: Arc<dyn Dialect>) {
		// Arrange
		let select = Select::new(mysql)
			.from("t", None)
			.where_("a = 1")
			.order("a", Order::Desc)
			.limit(3);

		// Act
		let sql = select
			.reset(SelectPart::Where)
			.reset(SelectPart::LimitOffset)
			.render();

		// Assert
		assert_eq!(sql, "SELECT * FROM `t` ORDER BY `a` DESC");
	}
}
