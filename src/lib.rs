//! # sqlweave
//!
//! Build relational queries one transformation at a time and compile the
//! whole chain to a single SQL statement.
//!
//! Each transformation returns a new [`Query`](query::Query); the receiver is
//! never modified, so any intermediate step can be kept, branched from or
//! compiled on its own.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use sqlweave::prelude::*;
//!
//! let q = Query::table("iris")
//!     .add_where_clause(sqlweave::parse_formula("SepalLengthCm > 5")?)?
//!     .summarise(&["Species"], &[Aggregate::new("COUNT", "*", "n")]);
//!
//! let sql = q.to_sql(&db)?;
//! // SELECT Species AS "Species", COUNT(*) AS "n"
//! // FROM (
//! //     SELECT *
//! //     FROM iris
//! //     WHERE ( SepalLengthCm > 5 )
//! // )
//! // GROUP BY "Species"
//! ```
//!
//! ## Transformations
//!
//! | Method | SQL |
//! |--------|-----|
//! | `select_columns` | projection |
//! | `with_aliases` | `expr AS "name"` |
//! | `add_where_clause` | `WHERE` |
//! | `add_derived_column` | computed column |
//! | `add_sample_rows` | `USING SAMPLE n ROWS` |
//! | `summarise` | `GROUP BY` with aggregates |
//! | `join` | `FROM a T1, b T2 WHERE ...` |

pub mod ast;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod query;
pub mod transpiler;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::database::{ColumnInfo, Database, ResultSet};
    pub use crate::engine::SqlxDatabase;
    pub use crate::error::*;
    pub use crate::parser::{ExpressionParser, OperatorTable};
    pub use crate::query::{
        Aggregate, BaseQuery, BaseTable, ColumnAlias, JoinCriterion, JoinTable, Query,
    };
    pub use crate::transpiler::ToSql;
}

/// Parse a formula with the default operator table.
///
/// # Example
///
/// ```
/// use sqlweave::transpiler::ToSql;
///
/// let expr = sqlweave::parse_formula("SepalLengthCm * 2 > 10").unwrap();
/// assert_eq!(expr.to_sql(), "( ( SepalLengthCm * 2 ) > 10 )");
/// ```
pub fn parse_formula(input: &str) -> Result<ast::Expr, error::WeaveError> {
    parser::ExpressionParser::default().parse_expr(input)
}
