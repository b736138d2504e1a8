//! Immutable query values and their compilation to SQL.
//!
//! A query is built by chaining transformations, each of which returns a new
//! [`Query`] and leaves the receiver untouched:
//!
//! ```rust,ignore
//! use sqlweave::prelude::*;
//!
//! let q = Query::table("iris")
//!     .add_where_clause(Expr::binary(Expr::column("SepalLengthCm"), ">", Expr::literal(5)))?
//!     .add_sample_rows(10)
//!     .select_columns(&["Species", "SepalLengthCm"]);
//!
//! let sql = q.to_sql(&db)?;
//! ```
//!
//! Every transformation either folds into the current SELECT level or wraps
//! it as a FROM-subquery first; see [`BaseQuery`] for the rules.

mod base;
mod join;

pub use base::BaseQuery;
pub use join::{JoinCriterion, JoinTable};

use serde::{Deserialize, Serialize};

use crate::ast::{Expr, IntoExpr};
use crate::database::{ColumnInfo, Database};
use crate::error::WeaveResult;

pub(crate) const INDENT: &str = "    ";

/// A query value: a table, a SELECT level over another query, or a join.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Table(BaseTable),
    Base(BaseQuery),
    Join(JoinTable),
}

/// Reference to a named table; the leaf of every query chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseTable {
    pub name: String,
}

impl BaseTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn compile(&self, outer: bool, depth: usize) -> String {
        if outer {
            format!("{}SELECT * FROM {}", INDENT.repeat(depth), self.name)
        } else {
            self.name.clone()
        }
    }
}

/// A projected column with an optional output name.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnAlias {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl ColumnAlias {
    /// Project `column` under a new name.
    pub fn renamed(column: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            expr: Expr::column(column),
            alias: Some(alias.into()),
        }
    }

    /// Project `column` as is.
    pub fn keep(column: impl Into<String>) -> Self {
        Self {
            expr: Expr::column(column),
            alias: None,
        }
    }
}

/// One aggregate output of [`Query::summarise`]: `function(column) AS "output"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub function: String,
    pub column: String,
    pub output: String,
}

impl Aggregate {
    pub fn new(
        function: impl Into<String>,
        column: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            function: function.into(),
            column: column.into(),
            output: output.into(),
        }
    }

    pub fn to_expr(&self) -> Expr {
        Expr::aggregate(&self.function, &self.column)
    }
}

impl Query {
    pub fn table(name: impl Into<String>) -> Self {
        Query::Table(BaseTable::new(name))
    }

    /// Join this query (as `T1`) with `other` (as `T2`).
    pub fn join(&self, other: &Query, criteria: Vec<JoinCriterion>) -> Self {
        Query::Join(JoinTable::new(self.clone(), other.clone(), criteria))
    }

    /// This query as a SELECT level that transformations can extend.
    fn lift(&self) -> BaseQuery {
        match self {
            Query::Base(bq) => bq.clone(),
            other => BaseQuery::wrap(other.clone()),
        }
    }

    /// Project only the named columns.
    pub fn select_columns<S: AsRef<str>>(&self, names: &[S]) -> Query {
        if names.is_empty() {
            return self.clone();
        }
        Query::Base(self.lift().select_columns(names))
    }

    /// Replace the projection with explicit (expression, alias) pairs.
    pub fn with_aliases(&self, aliases: Vec<ColumnAlias>) -> Query {
        if aliases.is_empty() {
            return self.clone();
        }
        Query::Base(self.lift().with_aliases(aliases))
    }

    /// Filter rows. An empty expression leaves the query unchanged.
    pub fn add_where_clause(&self, expr: impl IntoExpr) -> WeaveResult<Query> {
        match expr.into_expr()? {
            Some(expr) => Ok(Query::Base(self.lift().add_where_clause(expr))),
            None => Ok(self.clone()),
        }
    }

    /// Add a computed output column. An empty name or expression leaves the
    /// query unchanged.
    pub fn add_derived_column(&self, name: &str, expr: impl IntoExpr) -> WeaveResult<Query> {
        if name.trim().is_empty() {
            return Ok(self.clone());
        }
        match expr.into_expr()? {
            Some(expr) => Ok(Query::Base(self.lift().add_derived_column(name, expr))),
            None => Ok(self.clone()),
        }
    }

    /// Randomly sample `rows` rows.
    pub fn add_sample_rows(&self, rows: u64) -> Query {
        Query::Base(self.lift().add_sample_rows(rows))
    }

    /// Group by `keys` and compute `aggregates`.
    ///
    /// A bare table is aggregated at the level that wraps it; any other query
    /// is nested first so earlier projections cannot leak into the grouping.
    pub fn summarise<S: AsRef<str>>(&self, keys: &[S], aggregates: &[Aggregate]) -> Query {
        let nest = !matches!(self, Query::Table(_));
        Query::Base(self.lift().summarise(keys, aggregates, nest))
    }

    /// Compile to a complete SQL statement.
    pub fn to_sql(&self, db: &dyn Database) -> WeaveResult<String> {
        let sql = self.compile(db, true, 0)?;
        tracing::debug!(sql = %sql, "compiled query");
        Ok(sql)
    }

    /// Compile at a nesting depth. With `outer == false` the result is usable
    /// as a FROM source.
    pub fn compile(&self, db: &dyn Database, outer: bool, depth: usize) -> WeaveResult<String> {
        match self {
            Query::Table(t) => Ok(t.compile(outer, depth)),
            Query::Base(bq) => bq.compile(db, outer, depth),
            Query::Join(jt) => jt.compile(db, outer, depth),
        }
    }

    /// Ask the backend for the columns this query produces.
    pub fn get_schema(&self, db: &dyn Database) -> WeaveResult<Vec<ColumnInfo>> {
        let sql = self.to_sql(db)?;
        db.check_schema(&sql)
    }
}

impl From<BaseTable> for Query {
    fn from(t: BaseTable) -> Self {
        Query::Table(t)
    }
}

impl From<BaseQuery> for Query {
    fn from(q: BaseQuery) -> Self {
        Query::Base(q)
    }
}

impl From<JoinTable> for Query {
    fn from(j: JoinTable) -> Self {
        Query::Join(j)
    }
}

/// Wrap a compiled SELECT body in parentheses for use as a FROM source.
pub(crate) fn subquery(body: &str, depth: usize) -> String {
    format!("(\n{}\n{})", body, INDENT.repeat(depth.saturating_sub(1)))
}
